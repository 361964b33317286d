//! Ticket 保护器
//!
//! 把 ticket 加密为不透明字符串，并在解密时校验完整性。授权码与 refresh token 总是
//! 使用保护器；access token 与 identity token 在没有配置签名处理器时也会退回到它。
//!
//! ## 示例
//!
//! ```rust
//! use oidcrs::ticket::{AeadTicketProtector, AuthenticationTicket, ClaimsPrincipal, TicketProperties, TicketProtector};
//!
//! let protector = AeadTicketProtector::new(b"master-key-material-of-32-bytes!", "refresh_token").unwrap();
//! let ticket = AuthenticationTicket::new(ClaimsPrincipal::new(), TicketProperties::new(), "OpenIdConnectServer");
//!
//! let protected = protector.protect(&ticket).unwrap();
//! assert_eq!(protector.unprotect(&protected), Some(ticket));
//! assert_eq!(protector.unprotect("tampered"), None);
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use std::fmt;
use tracing::debug;

use crate::crypto::kdf::PurposeKeyDeriver;
use crate::error::{ConfigError, CryptoError, Result, TokenError};
use crate::random::generate_random_bytes;
use crate::ticket::AuthenticationTicket;

/// 主密钥最小长度（字节）
pub const MIN_MASTER_KEY_LENGTH: usize = 32;

const KEY_DERIVATION_SALT: &[u8] = b"oidcrs.ticket-protector.v1";

/// Ticket 保护器接口
///
/// 实现必须是对称且防篡改的（加密加完整性校验，而不仅仅是编码）。
pub trait TicketProtector: Send + Sync {
    /// 加密 ticket
    ///
    /// # Errors
    ///
    /// 序列化或加密失败时返回错误，调用方会原样传播。
    fn protect(&self, ticket: &AuthenticationTicket) -> Result<String>;

    /// 解密 ticket，任何失败都返回 `None`
    fn unprotect(&self, protected: &str) -> Option<AuthenticationTicket>;
}

/// 基于 AES-256-GCM 的保护器
///
/// 加密密钥由主密钥经 HKDF 按 `purpose` 派生，`purpose` 同时作为附加认证数据，
/// 因此不同用途的保护器无法解密彼此的输出。
pub struct AeadTicketProtector {
    key: LessSafeKey,
    purpose: String,
}

impl AeadTicketProtector {
    /// 创建保护器
    ///
    /// # Errors
    ///
    /// 主密钥短于 [`MIN_MASTER_KEY_LENGTH`] 时返回配置错误。
    pub fn new(master_key: &[u8], purpose: impl Into<String>) -> Result<Self> {
        if master_key.len() < MIN_MASTER_KEY_LENGTH {
            return Err(ConfigError::InvalidValue {
                key: "master_key".to_string(),
                message: format!("must be at least {} bytes", MIN_MASTER_KEY_LENGTH),
            }
            .into());
        }

        let purpose = purpose.into();
        let derived = PurposeKeyDeriver::new(KEY_DERIVATION_SALT, master_key)?
            .derive(&purpose, AES_256_GCM.key_len())?;
        let unbound = UnboundKey::new(&AES_256_GCM, &derived)
            .map_err(|_| CryptoError::InvalidKey("derived key rejected by AES-256-GCM".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            purpose,
        })
    }

    /// 保护器用途
    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

impl TicketProtector for AeadTicketProtector {
    fn protect(&self, ticket: &AuthenticationTicket) -> Result<String> {
        let mut in_out = serde_json::to_vec(ticket)
            .map_err(|e| TokenError::EncodingFailed(format!("failed to serialize ticket: {}", e)))?;

        let nonce_bytes = generate_random_bytes(NONCE_LEN)?;
        let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
            .map_err(|_| CryptoError::EncryptionFailed("invalid nonce".to_string()))?;

        self.key
            .seal_in_place_append_tag(nonce, Aad::from(self.purpose.as_bytes()), &mut in_out)
            .map_err(|_| CryptoError::EncryptionFailed("AES-256-GCM seal failed".to_string()))?;

        let mut output = nonce_bytes;
        output.extend_from_slice(&in_out);
        Ok(URL_SAFE_NO_PAD.encode(output))
    }

    fn unprotect(&self, protected: &str) -> Option<AuthenticationTicket> {
        let data = URL_SAFE_NO_PAD.decode(protected).ok()?;
        if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            debug!(purpose = %self.purpose, "protected ticket is too short");
            return None;
        }

        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;
        let mut in_out = sealed.to_vec();

        let plaintext = match self
            .key
            .open_in_place(nonce, Aad::from(self.purpose.as_bytes()), &mut in_out)
        {
            Ok(plaintext) => plaintext,
            Err(_) => {
                debug!(purpose = %self.purpose, "protected ticket failed authentication");
                return None;
            }
        };

        serde_json::from_slice(plaintext).ok()
    }
}

impl fmt::Debug for AeadTicketProtector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadTicketProtector")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::claims::{Claim, ClaimsPrincipal, claim_types};
    use crate::ticket::properties::{TicketProperties, TokenUsage};

    const MASTER_KEY: &[u8] = b"test-master-key-at-least-32-bytes!";

    fn sample_ticket() -> AuthenticationTicket {
        let principal = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "user123"))
            .with_claim(Claim::new("role", "admin").with_destinations(["token"]))
            .with_actor(ClaimsPrincipal::new().with_claim(Claim::new(claim_types::SUBJECT, "svc")));

        let mut properties = TicketProperties::new()
            .with_presenter("c1")
            .with_scope("openid")
            .with_confidential(true);
        properties.set_usage(TokenUsage::RefreshToken).unwrap();
        properties.set_item("custom", "value");

        AuthenticationTicket::new(principal, properties, "OpenIdConnectServer")
    }

    #[test]
    fn test_protect_unprotect() {
        let protector = AeadTicketProtector::new(MASTER_KEY, "refresh_token").unwrap();
        let ticket = sample_ticket();

        let protected = protector.protect(&ticket).unwrap();
        assert_eq!(protector.unprotect(&protected), Some(ticket));
    }

    #[test]
    fn test_output_is_not_plaintext() {
        let protector = AeadTicketProtector::new(MASTER_KEY, "refresh_token").unwrap();
        let protected = protector.protect(&sample_ticket()).unwrap();

        let raw = URL_SAFE_NO_PAD.decode(&protected).unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(!text.contains("user123"));
    }

    #[test]
    fn test_each_protect_uses_fresh_nonce() {
        let protector = AeadTicketProtector::new(MASTER_KEY, "refresh_token").unwrap();
        let ticket = sample_ticket();
        assert_ne!(
            protector.protect(&ticket).unwrap(),
            protector.protect(&ticket).unwrap()
        );
    }

    #[test]
    fn test_tampered_data_is_rejected() {
        let protector = AeadTicketProtector::new(MASTER_KEY, "refresh_token").unwrap();
        let protected = protector.protect(&sample_ticket()).unwrap();

        let mut raw = URL_SAFE_NO_PAD.decode(&protected).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);

        assert_eq!(protector.unprotect(&tampered), None);
        assert_eq!(protector.unprotect("!!not base64!!"), None);
        assert_eq!(protector.unprotect(""), None);
    }

    #[test]
    fn test_purposes_are_isolated() {
        let refresh = AeadTicketProtector::new(MASTER_KEY, "refresh_token").unwrap();
        let code = AeadTicketProtector::new(MASTER_KEY, "authorization_code").unwrap();

        let protected = refresh.protect(&sample_ticket()).unwrap();
        assert_eq!(code.unprotect(&protected), None);
    }

    #[test]
    fn test_different_master_keys_are_isolated() {
        let a = AeadTicketProtector::new(MASTER_KEY, "refresh_token").unwrap();
        let b = AeadTicketProtector::new(b"another-master-key-of-32-bytes!!", "refresh_token").unwrap();

        let protected = a.protect(&sample_ticket()).unwrap();
        assert_eq!(b.unprotect(&protected), None);
    }

    #[test]
    fn test_short_master_key_is_rejected() {
        assert!(AeadTicketProtector::new(b"short", "refresh_token").is_err());
    }
}
