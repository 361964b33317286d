//! 签名凭据与密钥标识解析
//!
//! 签名凭据由密钥、算法和可选的显式密钥标识组成。没有显式标识时按以下顺序推导 `kid`：
//!
//! 1. 证书支持的密钥：证书指纹（SHA-1 大写十六进制）
//! 2. RSA 密钥：模数 base64url 编码的前 40 个字符，转为大写
//! 3. 其他：不设置
//!
//! 证书支持的密钥还会设置 `x5t` 头部。

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey, Header};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use std::fmt;

use crate::crypto::hash::{certificate_hash, certificate_thumbprint};
use crate::error::{ConfigError, CryptoError, Result};
use crate::token::jwt::JwtAlgorithm;

/// 由 RSA 模数推导的密钥标识长度
const DERIVED_KEY_ID_LENGTH: usize = 40;

/// RSA 私钥
#[derive(Clone)]
pub struct RsaKey {
    private_key_pem: Vec<u8>,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl RsaKey {
    /// 从 PEM 格式的私钥（PKCS#8 或 PKCS#1）创建
    pub fn from_pem(private_key_pem: &[u8]) -> Result<Self> {
        let pem = std::str::from_utf8(private_key_pem)
            .map_err(|_| CryptoError::InvalidKey("RSA key is not valid UTF-8 PEM".to_string()))?;

        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA private key: {}", e)))?;

        Ok(Self {
            private_key_pem: private_key_pem.to_vec(),
            modulus: key.n().to_bytes_be(),
            exponent: key.e().to_bytes_be(),
        })
    }

    /// 模数（大端字节）
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// 公钥指数（大端字节）
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    /// 由模数推导的密钥标识
    pub fn derived_key_id(&self) -> String {
        URL_SAFE_NO_PAD
            .encode(&self.modulus)
            .chars()
            .take(DERIVED_KEY_ID_LENGTH)
            .collect::<String>()
            .to_uppercase()
    }

    fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_rsa_pem(&self.private_key_pem)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA key: {}", e)).into())
    }

    fn decoding_key(&self) -> Result<DecodingKey> {
        DecodingKey::from_rsa_components(
            &URL_SAFE_NO_PAD.encode(&self.modulus),
            &URL_SAFE_NO_PAD.encode(&self.exponent),
        )
        .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA public key: {}", e)).into())
    }
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("kid", &self.derived_key_id())
            .finish_non_exhaustive()
    }
}

/// 证书支持的 RSA 密钥
#[derive(Clone)]
pub struct X509Key {
    certificate_der: Vec<u8>,
    rsa: RsaKey,
}

impl X509Key {
    /// 由证书（DER）和对应的 RSA 私钥创建
    pub fn new(certificate_der: impl Into<Vec<u8>>, rsa: RsaKey) -> Self {
        Self {
            certificate_der: certificate_der.into(),
            rsa,
        }
    }

    /// 证书 DER 字节
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// RSA 私钥
    pub fn rsa(&self) -> &RsaKey {
        &self.rsa
    }

    /// 证书指纹
    pub fn thumbprint(&self) -> String {
        certificate_thumbprint(&self.certificate_der)
    }

    /// `x5t` 值
    pub fn hash(&self) -> String {
        certificate_hash(&self.certificate_der)
    }
}

impl fmt::Debug for X509Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X509Key")
            .field("thumbprint", &self.thumbprint())
            .finish_non_exhaustive()
    }
}

/// 签名密钥
#[derive(Clone)]
pub enum SecurityKey {
    /// 对称密钥（HMAC）
    Symmetric(Vec<u8>),
    /// RSA 密钥
    Rsa(RsaKey),
    /// 证书支持的 RSA 密钥
    X509(X509Key),
}

impl SecurityKey {
    fn encoding_key(&self) -> Result<EncodingKey> {
        match self {
            SecurityKey::Symmetric(secret) => Ok(EncodingKey::from_secret(secret)),
            SecurityKey::Rsa(key) => key.encoding_key(),
            SecurityKey::X509(key) => key.rsa.encoding_key(),
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey> {
        match self {
            SecurityKey::Symmetric(secret) => Ok(DecodingKey::from_secret(secret)),
            SecurityKey::Rsa(key) => key.decoding_key(),
            SecurityKey::X509(key) => key.rsa.decoding_key(),
        }
    }
}

impl fmt::Debug for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityKey::Symmetric(_) => f.write_str("Symmetric(..)"),
            SecurityKey::Rsa(key) => f.debug_tuple("Rsa").field(key).finish(),
            SecurityKey::X509(key) => f.debug_tuple("X509").field(key).finish(),
        }
    }
}

/// 签名凭据
#[derive(Debug, Clone)]
pub struct SigningCredentials {
    key: SecurityKey,
    algorithm: JwtAlgorithm,
    key_id: Option<String>,
}

impl SigningCredentials {
    /// 创建签名凭据
    ///
    /// # Errors
    ///
    /// 密钥类型与算法不匹配时返回配置错误。
    pub fn new(key: SecurityKey, algorithm: JwtAlgorithm) -> Result<Self> {
        let compatible = match key {
            SecurityKey::Symmetric(_) => algorithm.is_hmac(),
            SecurityKey::Rsa(_) | SecurityKey::X509(_) => algorithm.is_rsa(),
        };
        if !compatible {
            return Err(ConfigError::InvalidValue {
                key: "signing_credentials".to_string(),
                message: format!("algorithm {:?} does not match the key type", algorithm),
            }
            .into());
        }

        Ok(Self {
            key,
            algorithm,
            key_id: None,
        })
    }

    /// HMAC 对称密钥凭据
    pub fn symmetric(secret: impl Into<Vec<u8>>, algorithm: JwtAlgorithm) -> Result<Self> {
        Self::new(SecurityKey::Symmetric(secret.into()), algorithm)
    }

    /// RSA 私钥凭据（PEM）
    pub fn rsa_pem(private_key_pem: &[u8], algorithm: JwtAlgorithm) -> Result<Self> {
        Self::new(SecurityKey::Rsa(RsaKey::from_pem(private_key_pem)?), algorithm)
    }

    /// 证书支持的 RSA 凭据
    pub fn x509(
        certificate_der: impl Into<Vec<u8>>,
        private_key_pem: &[u8],
        algorithm: JwtAlgorithm,
    ) -> Result<Self> {
        let key = X509Key::new(certificate_der, RsaKey::from_pem(private_key_pem)?);
        Self::new(SecurityKey::X509(key), algorithm)
    }

    /// 设置显式密钥标识
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// 密钥
    pub fn key(&self) -> &SecurityKey {
        &self.key
    }

    /// 签名算法
    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    /// 显式密钥标识
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// 解析密钥标识：显式标识、证书指纹、RSA 模数推导，依次尝试
    pub fn key_identifier(&self) -> Option<String> {
        if let Some(key_id) = &self.key_id {
            return Some(key_id.clone());
        }
        match &self.key {
            SecurityKey::X509(key) => Some(key.thumbprint()),
            SecurityKey::Rsa(key) => Some(key.derived_key_id()),
            SecurityKey::Symmetric(_) => None,
        }
    }

    /// 用于签名的 jsonwebtoken 密钥
    pub fn encoding_key(&self) -> Result<EncodingKey> {
        self.key.encoding_key()
    }

    /// 用于验签的 jsonwebtoken 密钥
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        self.key.decoding_key()
    }
}

/// 在 token 头部补全 `kid` 与 `x5t`
///
/// 已经存在的值不会被覆盖，重复调用结果相同。
pub fn resolve_key_identifiers(credentials: &SigningCredentials, header: &mut Header) {
    if header.kid.is_none() {
        header.kid = credentials.key_identifier();
    }

    if let SecurityKey::X509(key) = credentials.key() {
        if header.x5t.is_none() {
            header.x5t = Some(key.hash());
        }
    }
}
