//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成授权码缓存键、加密 nonce 和 ticket 标识。

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 授权码缓存键的字节长度（256 位）
pub const AUTHORIZATION_CODE_KEY_LENGTH: usize = 32;

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use oidcrs::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充）
///
/// # Example
///
/// ```rust
/// use oidcrs::random::generate_random_base64_url;
///
/// let token = generate_random_base64_url(32).unwrap();
/// assert!(!token.contains('+'));
/// assert!(!token.contains('/'));
/// ```
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成授权码
///
/// 授权码本身只是一个 256 位随机缓存键，真正的 ticket 保存在服务端缓存中。
pub fn generate_authorization_code_key() -> Result<String> {
    generate_random_base64_url(AUTHORIZATION_CODE_KEY_LENGTH)
}

/// 生成 ticket 标识（对应 JWT 的 `jti`）
pub fn generate_ticket_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
