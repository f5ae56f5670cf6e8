//! Encrypted message envelope exchanged with the platform.
//!
//! Plaintext layout before padding and encryption:
//!
//! ```text
//! random(16) || len(4, big-endian) || payload(len) || app_id
//! ```
//!
//! The layout is padded to a multiple of 32 bytes (see [`padding`]) and
//! encrypted with AES-256-CBC using the first 16 key bytes as the IV.

use crate::ChannelError;
use crate::channel::padding;
use crate::channel::signature;
use crate::channel::time_utils::current_millis;
use aes::Aes256;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::warn;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const RANDOM_PREFIX_LEN: usize = 16;
const LENGTH_FIELD_LEN: usize = 4;
const HEADER_LEN: usize = RANDOM_PREFIX_LEN + LENGTH_FIELD_LEN;
const AES_BLOCK_LEN: usize = 16;
const NONCE_UPPER_BOUND: u64 = 100_000_000_000;

/// Standard alphabet that tolerates non-zero trailing bits, which the
/// platform's 43-character keys routinely carry.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The symmetric key and IV derived from the platform's encoding key.
#[derive(Clone)]
pub struct KeyMaterial {
    key: [u8; 32],
    iv: [u8; 16],
}

impl KeyMaterial {
    /// Derives key material from the 43-character base64 key string.
    ///
    /// # Returns
    ///
    /// * `Ok(KeyMaterial)` - The key decoded to exactly 32 bytes
    /// * `Err(ChannelError::CryptoFailure)` - The key is not valid base64 or has the wrong length
    pub fn from_encoding_key(encoding_aes_key: &str) -> Result<Self, ChannelError> {
        let decoded = LENIENT_BASE64
            .decode(format!("{encoding_aes_key}="))
            .map_err(|e| ChannelError::CryptoFailure(format!("Invalid encoding key: {e}")))?;

        let key: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
            ChannelError::CryptoFailure(format!(
                "Encoding key must decode to 32 bytes, got {}",
                decoded.len()
            ))
        })?;

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&key[..16]);
        Ok(Self { key, iv })
    }

    /// The 32-byte AES key.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// The IV, always the first 16 bytes of the key.
    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// An inbound push as delivered by the platform.
///
/// Only `Encrypt` is needed for decryption; the signature, timestamp and
/// nonce travel as query parameters. Deserialize it with whatever JSON or
/// XML library the caller already uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// The platform id of the receiver, when present.
    #[serde(rename = "ToUserName", default, skip_serializing_if = "Option::is_none")]
    pub to_user_name: Option<String>,

    /// The app id field some push types carry instead of `ToUserName`.
    #[serde(rename = "AppId", default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Base64 ciphertext.
    #[serde(rename = "Encrypt")]
    pub encrypt: String,
}

/// A signed, encrypted reply ready to be sent back to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedReply {
    /// Base64 ciphertext.
    #[serde(rename = "Encrypt")]
    pub encrypt: String,

    /// Protocol-level nonce.
    #[serde(rename = "Nonce")]
    pub nonce: u64,

    /// Epoch milliseconds.
    #[serde(rename = "TimeStamp")]
    pub timestamp: i64,

    /// Lowercase hex SHA-1 over token, timestamp, nonce and ciphertext.
    #[serde(rename = "MsgSignature")]
    pub msg_signature: String,
}

impl EncryptedReply {
    /// Renders the reply in the platform's XML form.
    ///
    /// None of the fields can contain markup characters (base64, digits and
    /// hex), so no escaping is needed.
    pub fn to_xml(&self) -> String {
        format!(
            "<xml>\n <Encrypt>{}</Encrypt>\n <Nonce>{}</Nonce>\n <TimeStamp>{}</TimeStamp>\n <MsgSignature>{}</MsgSignature>\n</xml>",
            self.encrypt, self.nonce, self.timestamp, self.msg_signature
        )
    }
}

/// Encrypts and decrypts platform messages for one integration.
///
/// # Example
///
/// ```rust
/// use open_platform_channel::MessageCrypto;
///
/// # fn example() -> Result<(), open_platform_channel::ChannelError> {
/// let crypto = MessageCrypto::new(
///     "wx_test",
///     "signing_token",
///     "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG",
/// )?;
///
/// let reply = crypto.encrypt_message("<xml><Content>hello</Content></xml>", None, None)?;
/// let payload = crypto.decrypt_message(
///     &reply.msg_signature,
///     &reply.timestamp.to_string(),
///     &reply.nonce.to_string(),
///     &reply.encrypt,
/// )?;
/// assert_eq!(payload, "<xml><Content>hello</Content></xml>");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MessageCrypto {
    app_id: String,
    token: String,
    keys: KeyMaterial,
}

impl MessageCrypto {
    /// Creates a codec for the given platform id, signing token and
    /// 43-character encoding key.
    pub fn new(app_id: &str, token: &str, encoding_aes_key: &str) -> Result<Self, ChannelError> {
        Ok(Self {
            app_id: app_id.to_string(),
            token: token.to_string(),
            keys: KeyMaterial::from_encoding_key(encoding_aes_key)?,
        })
    }

    /// The platform identifier appended to every message.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Computes the signature for the given timestamp, nonce and ciphertext.
    pub fn signature(&self, timestamp: &str, nonce: &str, encrypt: &str) -> String {
        signature::sign(&self.token, timestamp, nonce, encrypt)
    }

    /// Verifies the signature of an inbound push, then decrypts it.
    ///
    /// # Returns
    ///
    /// The plaintext payload (usually an XML document), or
    /// `SignatureMismatch`, `IdentifierMismatch` or `CryptoFailure`.
    pub fn decrypt_message(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        encrypt: &str,
    ) -> Result<String, ChannelError> {
        if let Err(e) = signature::verify(msg_signature, &self.token, timestamp, nonce, encrypt) {
            warn!(
                app_id = %self.app_id,
                timestamp = %timestamp,
                nonce = %nonce,
                "Rejected message with mismatched signature"
            );
            return Err(e);
        }
        self.decrypt(encrypt)
    }

    /// Same as [`decrypt_message`](Self::decrypt_message) for a deserialized envelope.
    pub fn decrypt_envelope(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        envelope: &InboundEnvelope,
    ) -> Result<String, ChannelError> {
        self.decrypt_message(msg_signature, timestamp, nonce, &envelope.encrypt)
    }

    /// Decrypts a base64 ciphertext without checking any signature.
    pub fn decrypt(&self, encrypt: &str) -> Result<String, ChannelError> {
        let ciphertext = LENIENT_BASE64
            .decode(encrypt.trim())
            .map_err(|e| ChannelError::CryptoFailure(format!("Invalid base64 ciphertext: {e}")))?;

        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LEN != 0 {
            return Err(ChannelError::CryptoFailure(format!(
                "Ciphertext length {} is not a positive multiple of {AES_BLOCK_LEN}",
                ciphertext.len()
            )));
        }

        let decrypted = Aes256CbcDec::new_from_slices(&self.keys.key, &self.keys.iv)
            .map_err(|e| ChannelError::CryptoFailure(format!("Cipher init failed: {e}")))?
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|e| ChannelError::CryptoFailure(format!("Decryption failed: {e}")))?;

        let plain = padding::unpad(&decrypted);
        if plain.len() < HEADER_LEN {
            return Err(ChannelError::CryptoFailure(format!(
                "Decrypted message too short: {} bytes",
                plain.len()
            )));
        }

        let mut length_field = [0u8; LENGTH_FIELD_LEN];
        length_field.copy_from_slice(&plain[RANDOM_PREFIX_LEN..HEADER_LEN]);
        let msg_len = u32::from_be_bytes(length_field) as usize;

        let body = &plain[HEADER_LEN..];
        if msg_len > body.len() {
            return Err(ChannelError::CryptoFailure(format!(
                "Declared payload length {msg_len} exceeds available {} bytes",
                body.len()
            )));
        }
        let (payload, trailer) = body.split_at(msg_len);

        if trailer != self.app_id.as_bytes() {
            let actual = String::from_utf8_lossy(trailer).into_owned();
            warn!(
                expected = %self.app_id,
                actual = %actual,
                "Rejected message for another platform identifier"
            );
            return Err(ChannelError::IdentifierMismatch {
                expected: self.app_id.clone(),
                actual,
            });
        }

        String::from_utf8(payload.to_vec())
            .map_err(|e| ChannelError::CryptoFailure(format!("Payload is not UTF-8: {e}")))
    }

    /// Encrypts a plaintext payload and returns the base64 ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, ChannelError> {
        let payload = plaintext.as_bytes();
        let msg_len = u32::try_from(payload.len()).map_err(|_| {
            ChannelError::CryptoFailure(format!("Payload too large: {} bytes", payload.len()))
        })?;

        let mut random = [0u8; RANDOM_PREFIX_LEN];
        OsRng.fill_bytes(&mut random);

        let mut raw = Vec::with_capacity(HEADER_LEN + payload.len() + self.app_id.len());
        raw.extend_from_slice(&random);
        raw.extend_from_slice(&msg_len.to_be_bytes());
        raw.extend_from_slice(payload);
        raw.extend_from_slice(self.app_id.as_bytes());

        let padded = padding::pad(&raw);
        let ciphertext = Aes256CbcEnc::new_from_slices(&self.keys.key, &self.keys.iv)
            .map_err(|e| ChannelError::CryptoFailure(format!("Cipher init failed: {e}")))?
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        Ok(base64::engine::general_purpose::STANDARD.encode(ciphertext))
    }

    /// Encrypts and signs a reply.
    ///
    /// # Arguments
    ///
    /// * `plaintext` - The reply payload
    /// * `nonce` - Protocol nonce; a random value in `[0, 10^11)` when `None`
    /// * `timestamp` - Epoch milliseconds; the current time when `None`
    pub fn encrypt_message(
        &self,
        plaintext: &str,
        nonce: Option<u64>,
        timestamp: Option<i64>,
    ) -> Result<EncryptedReply, ChannelError> {
        let encrypt = self.encrypt(plaintext)?;
        let nonce = nonce.unwrap_or_else(|| rand::thread_rng().gen_range(0..NONCE_UPPER_BOUND));
        let timestamp = match timestamp {
            Some(ts) => ts,
            None => current_millis()?,
        };
        let msg_signature = self.signature(&timestamp.to_string(), &nonce.to_string(), &encrypt);

        Ok(EncryptedReply {
            encrypt,
            nonce,
            timestamp,
            msg_signature,
        })
    }

    /// Encrypts, signs and renders a reply in the platform's XML form.
    pub fn build_reply(
        &self,
        plaintext: &str,
        nonce: Option<u64>,
        timestamp: Option<i64>,
    ) -> Result<String, ChannelError> {
        Ok(self.encrypt_message(plaintext, nonce, timestamp)?.to_xml())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const APP_ID: &str = "wx_test";
    const TOKEN: &str = "test_token";

    fn crypto() -> MessageCrypto {
        MessageCrypto::new(APP_ID, TOKEN, KEY).unwrap()
    }

    #[test]
    fn test_key_material_derivation() {
        let keys = KeyMaterial::from_encoding_key(KEY).unwrap();
        assert_eq!(keys.key().len(), 32);
        assert_eq!(keys.iv(), &keys.key()[..16]);
    }

    #[test]
    fn test_key_material_rejects_wrong_length() {
        let result = KeyMaterial::from_encoding_key("c2hvcnQ");
        assert!(matches!(result, Err(ChannelError::CryptoFailure(_))));

        let result = KeyMaterial::from_encoding_key("not base64 at all!");
        assert!(matches!(result, Err(ChannelError::CryptoFailure(_))));
    }

    #[test]
    fn test_example_vector_roundtrip() {
        let crypto = crypto();
        let plaintext = "<xml><Content>hello</Content></xml>";
        let encrypted = crypto.encrypt(plaintext).unwrap();
        assert_eq!(crypto.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_ciphertext_is_block_aligned_and_randomized() {
        let crypto = crypto();
        let first = crypto.encrypt("same input").unwrap();
        let second = crypto.encrypt("same input").unwrap();
        assert_ne!(first, second);

        let raw = base64::engine::general_purpose::STANDARD
            .decode(&first)
            .unwrap();
        assert_eq!(raw.len() % padding::BLOCK_SIZE, 0);
    }

    #[test]
    fn test_roundtrip_multibyte_and_empty() {
        let crypto = crypto();
        let long = "x".repeat(4096);
        for text in ["", "你好，世界", "émoji 🚀 payload", long.as_str()] {
            let encrypted = crypto.encrypt(text).unwrap();
            assert_eq!(crypto.decrypt(&encrypted).unwrap(), text);
        }
    }

    #[test]
    fn test_identifier_mismatch() {
        let sender = MessageCrypto::new("wx_other", TOKEN, KEY).unwrap();
        let encrypted = sender.encrypt("payload").unwrap();

        let result = crypto().decrypt(&encrypted);
        match result {
            Err(ChannelError::IdentifierMismatch { expected, actual }) => {
                assert_eq!(expected, APP_ID);
                assert_eq!(actual, "wx_other");
            }
            other => panic!("expected identifier mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_decrypt_rejects_malformed_input() {
        let crypto = crypto();
        assert!(matches!(
            crypto.decrypt("%%%not-base64%%%"),
            Err(ChannelError::CryptoFailure(_))
        ));
        // 10 bytes, not block aligned
        assert!(matches!(
            crypto.decrypt("AAAAAAAAAAAAAA=="),
            Err(ChannelError::CryptoFailure(_))
        ));
        assert!(matches!(crypto.decrypt(""), Err(ChannelError::CryptoFailure(_))));
    }

    #[test]
    fn test_encrypt_message_signature_verifies() {
        let crypto = crypto();
        let reply = crypto
            .encrypt_message("reply body", Some(1_234_567), Some(1_700_000_000_000))
            .unwrap();
        assert_eq!(reply.nonce, 1_234_567);
        assert_eq!(reply.timestamp, 1_700_000_000_000);
        assert_eq!(
            reply.msg_signature,
            signature::sign(TOKEN, "1700000000000", "1234567", &reply.encrypt)
        );

        let payload = crypto
            .decrypt_message(&reply.msg_signature, "1700000000000", "1234567", &reply.encrypt)
            .unwrap();
        assert_eq!(payload, "reply body");
    }

    #[test]
    fn test_encrypt_message_defaults() {
        let reply = crypto().encrypt_message("body", None, None).unwrap();
        assert!(reply.nonce < NONCE_UPPER_BOUND);
        assert!(reply.timestamp > 1_577_836_800_000);
    }

    #[test]
    fn test_decrypt_message_rejects_bad_signature() {
        let crypto = crypto();
        let reply = crypto.encrypt_message("body", Some(1), Some(2)).unwrap();
        let result = crypto.decrypt_message(&reply.msg_signature, "3", "1", &reply.encrypt);
        assert!(matches!(result, Err(ChannelError::SignatureMismatch)));
    }

    #[test]
    fn test_build_reply_xml_shape() {
        let crypto = crypto();
        let xml = crypto
            .build_reply("<xml/>", Some(42), Some(1_700_000_000_000))
            .unwrap();
        assert!(xml.starts_with("<xml>\n <Encrypt>"));
        assert!(xml.contains(" <Nonce>42</Nonce>\n"));
        assert!(xml.contains(" <TimeStamp>1700000000000</TimeStamp>\n"));
        assert!(xml.contains(" <MsgSignature>"));
        assert!(xml.ends_with("</MsgSignature>\n</xml>"));
    }

    #[test]
    fn test_reply_serde_field_names() {
        let reply = EncryptedReply {
            encrypt: "abc".to_string(),
            nonce: 7,
            timestamp: 8,
            msg_signature: "sig".to_string(),
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["Encrypt"], "abc");
        assert_eq!(json["Nonce"], 7);
        assert_eq!(json["TimeStamp"], 8);
        assert_eq!(json["MsgSignature"], "sig");
    }

    #[test]
    fn test_inbound_envelope_deserialize() {
        let envelope: InboundEnvelope =
            serde_json::from_str(r#"{"ToUserName":"gh_123","Encrypt":"abc"}"#).unwrap();
        assert_eq!(envelope.to_user_name.as_deref(), Some("gh_123"));
        assert!(envelope.app_id.is_none());
        assert_eq!(envelope.encrypt, "abc");
    }
}
