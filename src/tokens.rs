//! Crude token estimation.
//!
//! The model endpoint reports exact usage after the fact; this estimate is
//! only stored alongside each message so history size can be eyeballed
//! without a tokenizer dependency. Policy: one token per four bytes,
//! rounded up, never zero for non-empty text.

/// Estimate the token count of `text`.
///
/// Empty input yields 0; anything else yields `max(1, ceil(len / 4))`.
pub fn estimate_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as u32).div_ceil(4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
    }

    #[test]
    fn rounds_up() {
        // ceil(5/4) = 2
        assert_eq!(estimate_tokens("hello"), 2);
        assert_eq!(estimate_tokens("hi there"), 2);
        assert_eq!(estimate_tokens("123456789"), 3);
    }

    #[test]
    fn monotonic_in_length() {
        let mut prev = 0;
        for n in 0..64 {
            let est = estimate_tokens(&"x".repeat(n));
            assert!(est >= prev, "estimate shrank at length {n}");
            prev = est;
        }
    }
}
