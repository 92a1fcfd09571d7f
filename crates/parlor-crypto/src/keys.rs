use rand::RngCore;

/// Content keys are 128-bit, rendered as 32 lowercase hex characters.
pub const CONTENT_KEY_LEN: usize = 16;

/// Generate a fresh random content key for a new conversation.
pub fn generate_content_key() -> String {
    let mut key = [0u8; CONTENT_KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    hex::encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_hex_and_distinct() {
        let a = generate_content_key();
        let b = generate_content_key();
        assert_eq!(a.len(), CONTENT_KEY_LEN * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex::decode(&a).unwrap().len(), CONTENT_KEY_LEN);
        assert_ne!(a, b);
    }
}
