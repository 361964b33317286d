//! Token 绑定哈希与证书指纹

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// 计算 `at_hash` / `c_hash`
///
/// 对 token 的 ASCII 字节做 SHA-256，取左半部分，再做无填充 base64url 编码。
///
/// # Example
///
/// ```rust
/// use oidcrs::crypto::hash::token_hash;
///
/// // OpenID Connect Core 1.0 中的示例
/// let hash = token_hash("jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y");
/// assert_eq!(hash, "77QmUPtjPfzWtF2AnpK9RQ");
/// ```
pub fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// 证书指纹：证书 DER 的 SHA-1，大写十六进制
pub fn certificate_thumbprint(certificate_der: &[u8]) -> String {
    Sha1::digest(certificate_der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect()
}

/// `x5t` 头部值：证书 DER 的 SHA-1，无填充 base64url
pub fn certificate_hash(certificate_der: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha1::digest(certificate_der))
}
