use presence::crypto::aes::{self, SealedPayload, NONCE_SIZE, TAG_SIZE};
use presence::crypto::secret::SessionSecret;
use presence::error::CipherError;
use presence::models::token::TokenPayload;

fn secret(value: &str) -> SessionSecret {
    SessionSecret::new(value.to_string(), 3600)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_under_same_secret() {
        let key = aes::derive_key(&secret("k3y-material-that-is-long-enough-for-aes"));
        let payload = TokenPayload {
            lesson_id: 42,
            issued_at: 1_700_000_000,
        };

        let sealed = aes::encrypt_json(&key, &payload).unwrap();
        let reopened = SealedPayload::decode(&sealed.encode()).unwrap();
        let decoded: TokenPayload = aes::decrypt_json(&key, &reopened).unwrap();

        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let key = aes::derive_key(&SessionSecret::generate(60));

        let a = aes::encrypt(&key, b"same plaintext").unwrap();
        let b = aes::encrypt(&key, b"same plaintext").unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_any_single_byte_tamper_fails() {
        let key = aes::derive_key(&SessionSecret::generate(60));
        let sealed = aes::encrypt(&key, br#"{"schedule_id":7,"timestamp":1700000000}"#).unwrap();
        let bytes = sealed.to_bytes();

        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let tampered = SealedPayload::from_bytes(&tampered).unwrap();

            assert_eq!(
                aes::decrypt(&key, &tampered),
                Err(CipherError::Open),
                "flipping byte {} went unnoticed",
                i
            );
        }
    }

    #[test]
    fn test_wrong_secret_fails() {
        let right = aes::derive_key(&SessionSecret::generate(60));
        let wrong = aes::derive_key(&SessionSecret::generate(60));

        let sealed = aes::encrypt(&right, b"payload").unwrap();
        assert_eq!(aes::decrypt(&wrong, &sealed), Err(CipherError::Open));
    }

    #[test]
    fn test_blob_layout_is_nonce_ciphertext_tag() {
        let key = aes::derive_key(&SessionSecret::generate(60));
        let sealed = aes::encrypt(&key, b"12345").unwrap();

        assert_eq!(sealed.to_bytes().len(), NONCE_SIZE + 5 + TAG_SIZE);
    }

    #[test]
    fn test_invalid_base64_is_an_encoding_error() {
        assert!(matches!(
            SealedPayload::decode("not base64 at all!!"),
            Err(CipherError::Encoding(_))
        ));
    }
}
