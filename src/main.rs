//! palaver — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config from environment
//!   3. Init logger at configured level
//!   4. Open the SQLite store (creates file + schema)
//!   5. Build the model client (hard error without credentials)
//!   6. Run the shell until exit / Ctrl-C / EOF

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use palaver::config;
use palaver::error::AppError;
use palaver::llm::azure::AzureChatClient;
use palaver::logger;
use palaver::memory::{MemoryManager, SqliteStore};
use palaver::repl;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    if config.missing_credentials() {
        warn!("missing model endpoint or API key — set AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_APIKEY in .env");
    }

    info!(
        model = %config.model,
        sqlite_path = %config.sqlite_path.display(),
        short_memory_size = config.short_memory_size,
        "config loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let store = SqliteStore::open(&config.sqlite_path)?;
        let client = AzureChatClient::from_config(&config)?;
        let mem = MemoryManager::new(store, config.short_memory_size);

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_token.cancel();
            }
        });

        repl::run(client, mem, &config, shutdown).await
    })
}
