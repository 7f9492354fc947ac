// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::block_padding::ZeroPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use tracing::debug;

use crate::constants::{IV_LEN, KEY_LEN};
use crate::error::{HubError, Result};

type TdesCbcEnc = cbc::Encryptor<des::TdesEde3>;
type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;

/// Payload envelope shared with the gateway firmware.
///
/// Triple-DES (EDE3) in CBC mode with zero padding, base64-encoded on the
/// wire. The IV is the first 8 bytes of the key, so identical plaintexts
/// produce identical ciphertexts. Deployed gateways expect exactly this, so
/// it cannot change without a firmware update on their side.
///
/// Zero padding cannot be told apart from plaintext that ends in `0x00`:
/// such trailing bytes are stripped by [`Envelope::decrypt`]. JSON payloads
/// never end in a NUL byte.
#[derive(Clone)]
pub struct Envelope {
    key: [u8; KEY_LEN],
}

impl Envelope {
    /// Create an envelope from a 24-byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| HubError::InvalidKey {
            expected: KEY_LEN,
            actual: key.len(),
        })?;
        Ok(Self { key })
    }

    fn iv(&self) -> &[u8] {
        &self.key[..IV_LEN]
    }

    /// Encrypt `plain` and return the base64 text as bytes.
    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
        let cipher = TdesCbcEnc::new_from_slices(&self.key, self.iv()).map_err(|e| {
            HubError::Encryption { reason: e.to_string() }
        })?;
        let encrypted = cipher.encrypt_padded_vec_mut::<ZeroPadding>(plain);
        debug!("Encrypted {} bytes into {} cipher bytes", plain.len(), encrypted.len());
        Ok(BASE64.encode(encrypted).into_bytes())
    }

    /// Decode base64 `cipher_text` and decrypt it.
    pub fn decrypt(&self, cipher_text: &[u8]) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(trim_ascii_whitespace(cipher_text))
            .map_err(|e| HubError::Decryption { reason: format!("invalid base64: {e}") })?;

        if raw.len() % IV_LEN != 0 {
            return Err(HubError::Decryption {
                reason: format!("cipher length {} is not a multiple of {IV_LEN}", raw.len()),
            });
        }

        let cipher = TdesCbcDec::new_from_slices(&self.key, self.iv()).map_err(|e| {
            HubError::Decryption { reason: e.to_string() }
        })?;
        cipher
            .decrypt_padded_vec_mut::<ZeroPadding>(&raw)
            .map_err(|e| HubError::Decryption { reason: e.to_string() })
    }
}

// Brokers and shell tools sometimes append a newline to text payloads.
fn trim_ascii_whitespace(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |p| p + 1);
    &data[start..end]
}

/// Wrap `plain` when an envelope is configured, pass it through otherwise.
pub fn seal(envelope: Option<&Envelope>, plain: Vec<u8>) -> Result<Vec<u8>> {
    match envelope {
        Some(envelope) => envelope.encrypt(&plain),
        None => Ok(plain),
    }
}

/// Unwrap `payload` when an envelope is configured, pass it through otherwise.
pub fn open(envelope: Option<&Envelope>, payload: &[u8]) -> Result<Vec<u8>> {
    match envelope {
        Some(envelope) => envelope.decrypt(payload),
        None => Ok(payload.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdefghijklmn";

    fn envelope() -> Envelope {
        Envelope::new(KEY).unwrap()
    }

    #[test]
    fn test_key_length_enforced() {
        assert!(Envelope::new(b"too short").is_err());
        assert!(Envelope::new(b"0123456789abcdefghijklmnop").is_err());
        assert!(Envelope::new(KEY).is_ok());
    }

    #[test]
    fn test_roundtrip_various_lengths() {
        let envelope = envelope();
        // Lengths around the 8-byte block boundary
        for len in [1usize, 7, 8, 9, 15, 16, 17, 100] {
            let plain: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
            let sealed = envelope.encrypt(&plain).unwrap();
            assert_eq!(envelope.decrypt(&sealed).unwrap(), plain, "len {len}");
        }
    }

    #[test]
    fn test_ciphertext_is_base64_of_whole_blocks() {
        let sealed = envelope().encrypt(b"{\"command\":\"read_status\"}").unwrap();
        let raw = BASE64.decode(&sealed).unwrap();
        assert_eq!(raw.len() % 8, 0);
        // 25 bytes of plaintext pad to 32
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn test_known_ciphertext() {
        // Matches `openssl enc -des-ede3-cbc -nopad` over the zero-padded input
        // with the first 8 key bytes as IV, which is what deployed gateways use.
        let sealed = envelope().encrypt(br#"{"command":"read_status"}"#).unwrap();
        assert_eq!(sealed, b"wXA9BVuhMS4kNvVlsioha5/pcn1nEE3aLl37tjHVPfw=".to_vec());
        assert_eq!(
            envelope().decrypt(b"wXA9BVuhMS4kNvVlsioha5/pcn1nEE3aLl37tjHVPfw=").unwrap(),
            br#"{"command":"read_status"}"#.to_vec()
        );
    }

    #[test]
    fn test_block_aligned_plaintext_gets_no_extra_block() {
        let raw = BASE64.decode(envelope().encrypt(b"12345678").unwrap()).unwrap();
        assert_eq!(raw.len(), 8);
    }

    #[test]
    fn test_deterministic_iv() {
        let envelope = envelope();
        assert_eq!(envelope.encrypt(b"same").unwrap(), envelope.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_trailing_zero_bytes_are_stripped() {
        let envelope = envelope();
        let sealed = envelope.encrypt(b"abc\0").unwrap();
        assert_eq!(envelope.decrypt(&sealed).unwrap(), b"abc");
    }

    #[test]
    fn test_decrypt_rejects_bad_base64() {
        let err = envelope().decrypt(b"!!not base64!!").unwrap_err();
        assert!(matches!(err, HubError::Decryption { .. }));
    }

    #[test]
    fn test_decrypt_rejects_partial_block() {
        // 5 raw bytes: valid base64, invalid cipher length
        let sealed = BASE64.encode([1u8, 2, 3, 4, 5]);
        let err = envelope().decrypt(sealed.as_bytes()).unwrap_err();
        assert!(matches!(err, HubError::Decryption { .. }));
    }

    #[test]
    fn test_decrypt_tolerates_trailing_newline() {
        let envelope = envelope();
        let mut sealed = envelope.encrypt(b"hello").unwrap();
        sealed.push(b'\n');
        assert_eq!(envelope.decrypt(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn test_wrong_key_does_not_roundtrip() {
        let sealed = envelope().encrypt(b"{\"device_no\":\"g1\"}").unwrap();
        let other = Envelope::new(b"nmlkjihgfedcba9876543210").unwrap();
        let opened = other.decrypt(&sealed).unwrap_or_default();
        assert_ne!(opened, b"{\"device_no\":\"g1\"}");
    }

    #[test]
    fn test_seal_open_passthrough_when_disabled() {
        let plain = b"{\"a\":1}".to_vec();
        assert_eq!(seal(None, plain.clone()).unwrap(), plain);
        assert_eq!(open(None, &plain).unwrap(), plain);
    }

    #[test]
    fn test_seal_open_with_envelope() {
        let envelope = envelope();
        let sealed = seal(Some(&envelope), b"payload".to_vec()).unwrap();
        assert_ne!(sealed, b"payload");
        assert_eq!(open(Some(&envelope), &sealed).unwrap(), b"payload");
    }
}
