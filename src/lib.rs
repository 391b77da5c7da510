//! palaver — console chat client with layered conversation memory.
//!
//! Library surface exists so integration tests (and embedders) can drive
//! the memory manager and model client without the shell.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod memory;
pub mod repl;
pub mod retry;
pub mod tokens;
