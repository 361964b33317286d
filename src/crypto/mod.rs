//! 密码学工具模块
//!
//! ## 功能
//!
//! - **kdf**: HKDF-SHA256，按用途为每种 token 派生独立的保护密钥
//! - **hash**: `at_hash` / `c_hash` 计算，证书指纹与 `x5t`
//! - **keys**: 签名凭据与 `kid` / `x5t` 解析
//!
//! ## 示例
//!
//! ```rust
//! use oidcrs::crypto::{SigningCredentials, resolve_key_identifiers};
//! use oidcrs::token::JwtAlgorithm;
//! use jsonwebtoken::{Algorithm, Header};
//!
//! let credentials = SigningCredentials::symmetric(
//!     b"my-secret-key-at-least-32-bytes!".to_vec(),
//!     JwtAlgorithm::HS256,
//! )
//! .unwrap()
//! .with_key_id("hmac-1");
//!
//! let mut header = Header::new(Algorithm::HS256);
//! resolve_key_identifiers(&credentials, &mut header);
//! assert_eq!(header.kid.as_deref(), Some("hmac-1"));
//! ```

pub mod hash;
pub mod kdf;
pub mod keys;

pub use hash::{certificate_hash, certificate_thumbprint, token_hash};
pub use kdf::{PurposeKeyDeriver, hkdf_sha256};
pub use keys::{RsaKey, SecurityKey, SigningCredentials, X509Key, resolve_key_identifiers};
