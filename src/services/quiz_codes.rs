use rand::Rng;
use sha2::{Digest, Sha256};

// No 0/O or 1/I so codes survive being read aloud.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const DRAFT_TOKEN_LENGTH: usize = 24;

pub(crate) fn generate_join_code() -> String {
    generate_suffix(CODE_LENGTH)
}

pub(crate) fn generate_draft_token() -> String {
    generate_suffix(DRAFT_TOKEN_LENGTH)
}

/// Drafts are stored under the hash so the raw token never lands in redis.
pub(crate) fn hash_draft_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut output = String::with_capacity(len);
    for _ in 0..len {
        let index = rng.gen_range(0..ALPHABET.len());
        output.push(ALPHABET[index] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_codes_use_the_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_join_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|byte| ALPHABET.contains(&byte)));
        }
    }

    #[test]
    fn draft_token_hash_is_stable_and_hex() {
        let token = "ABCDEF";
        let first = hash_draft_token(token);
        let second = hash_draft_token(token);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.bytes().all(|byte| byte.is_ascii_hexdigit()));
    }
}
