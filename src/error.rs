//! 统一错误类型模块
//!
//! 提供 oidcrs 库中所有操作的错误类型定义。
//!
//! 注意：令牌校验失败（签名无效、类型不匹配、缓存未命中、解密失败）不会以错误的形式
//! 返回给调用方，而是表现为 `Ok(None)`。这里的错误只用于可插拔组件的故障。

use thiserror::Error;

/// oidcrs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// oidcrs 库的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// Token 相关错误
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// 加密错误
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// 验证错误
    #[error("Validation error: {0}")]
    Validation(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// 创建一个存储操作错误
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(StorageError::OperationFailed(msg.into()))
    }
}

/// Token 相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token 格式无效
    #[error("invalid token format: {0}")]
    InvalidFormat(String),
    /// Token 签名无效
    #[error("invalid token signature")]
    InvalidSignature,
    /// Token 编码失败
    #[error("token encoding failed: {0}")]
    EncodingFailed(String),
    /// Token 解码失败
    #[error("token decoding failed: {0}")]
    DecodingFailed(String),
    /// 缺少必需的 claim
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// 无效的 claim 值
    #[error("invalid claim value: {0}")]
    InvalidClaim(String),
    /// 无法解析出唯一的 subject 标识
    #[error("no subject identifier could be resolved from the principal")]
    MissingSubject,
    /// 存在多个不同的 subject 标识
    #[error("the principal carries {0} distinct subject identifiers")]
    AmbiguousSubject(usize),
    /// Ticket 用途与期望不符
    #[error("token usage mismatch: expected {expected}, found {found}")]
    UsageMismatch {
        /// 期望的用途
        expected: String,
        /// 实际的用途
        found: String,
    },
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 缺少必需的配置
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
    /// 无效的配置值
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// 连接失败
    #[error("storage connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作失败
    #[error("storage operation failed: {0}")]
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// 随机数生成失败
    #[error("random number generation failed: {0}")]
    RngFailed(String),
    /// 密钥无效
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// 加密失败
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    /// 解密失败
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}
