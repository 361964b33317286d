//! 按用途派生密钥
//!
//! 使用 HKDF-SHA256（RFC 5869）：主密钥先经过一次 extract 得到伪随机密钥，之后每种
//! token 以各自的用途字符串作为 `info` 做 expand。用途不同，派生出的密钥就不同，
//! 一种 token 的密文无法用另一种 token 的密钥解开。
//!
//! ## 示例
//!
//! ```rust
//! use oidcrs::crypto::kdf::PurposeKeyDeriver;
//!
//! let deriver = PurposeKeyDeriver::new(b"deployment-salt", b"master-key-material-of-32-bytes!").unwrap();
//!
//! let code_key = deriver.derive("authorization_code", 32).unwrap();
//! let refresh_key = deriver.derive("refresh_token", 32).unwrap();
//! assert_ne!(code_key, refresh_key);
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 输出长度
const PRK_LEN: usize = 32;

/// 单次 expand 的最大输出长度（255 个块）
pub const MAX_OUTPUT_LEN: usize = 255 * PRK_LEN;

/// 由同一主密钥为多个用途派生密钥
#[derive(Clone)]
pub struct PurposeKeyDeriver {
    prk: [u8; PRK_LEN],
}

impl PurposeKeyDeriver {
    /// 对主密钥做 extract
    pub fn new(salt: &[u8], master_key: &[u8]) -> Result<Self> {
        Ok(Self {
            prk: extract(salt, master_key)?,
        })
    }

    /// 为指定用途派生 `len` 字节的密钥
    ///
    /// # Errors
    ///
    /// `len` 为 0 或超过 [`MAX_OUTPUT_LEN`] 时返回验证错误。
    pub fn derive(&self, purpose: &str, len: usize) -> Result<Vec<u8>> {
        expand(&self.prk, purpose.as_bytes(), len)
    }
}

impl fmt::Debug for PurposeKeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PurposeKeyDeriver(..)")
    }
}

/// 一次完成 extract 与 expand
///
/// # Errors
///
/// `len` 为 0 或超过 [`MAX_OUTPUT_LEN`] 时返回验证错误。
pub fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> Result<Vec<u8>> {
    expand(&extract(salt, ikm)?, info, len)
}

// 空盐等价于 HashLen 个零字节，HMAC 会自动补零
fn extract(salt: &[u8], ikm: &[u8]) -> Result<[u8; PRK_LEN]> {
    let mut mac = hmac_with(salt)?;
    mac.update(ikm);
    Ok(to_block(&mac.finalize().into_bytes()))
}

fn expand(prk: &[u8; PRK_LEN], info: &[u8], len: usize) -> Result<Vec<u8>> {
    if len == 0 || len > MAX_OUTPUT_LEN {
        return Err(Error::validation(format!(
            "derived key length must be between 1 and {}, got {}",
            MAX_OUTPUT_LEN, len
        )));
    }

    let mut okm = Vec::with_capacity(len);
    let mut previous: Option<[u8; PRK_LEN]> = None;
    // len <= 255 * PRK_LEN，块计数不会超过 u8
    for counter in 1..=len.div_ceil(PRK_LEN) as u8 {
        let mut mac = hmac_with(prk)?;
        if let Some(previous) = &previous {
            mac.update(previous);
        }
        mac.update(info);
        mac.update(&[counter]);
        let block = to_block(&mac.finalize().into_bytes());

        let take = (len - okm.len()).min(PRK_LEN);
        okm.extend_from_slice(&block[..take]);
        previous = Some(block);
    }

    Ok(okm)
}

fn hmac_with(key: &[u8]) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| Error::validation("invalid HMAC key length"))
}

fn to_block(bytes: &[u8]) -> [u8; PRK_LEN] {
    let mut block = [0u8; PRK_LEN];
    block.copy_from_slice(bytes);
    block
}
