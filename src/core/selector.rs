//! Operation selectors.
//!
//! A selector is the wire-level identity of an operation: the first
//! 4 bytes (hex) of the SHA-256 of its canonical name. The selector
//! table keys on it; humans and the CLI use the operation name and
//! derive the selector on the way in.

use sha2::{Digest, Sha256};

pub const SELECTOR_HEX_LEN: usize = 8;

pub fn selector_of(operation: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..SELECTOR_HEX_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_stable() {
        assert_eq!(selector_of("createAAO"), selector_of("createAAO"));
    }

    #[test]
    fn test_selector_distinguishes_operations() {
        assert_ne!(selector_of("createAAO"), selector_of("terminateAAO"));
    }

    #[test]
    fn test_selector_shape() {
        let sel = selector_of("joinAAO");
        assert_eq!(sel.len(), SELECTOR_HEX_LEN);
        assert!(sel.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
