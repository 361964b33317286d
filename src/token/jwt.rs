//! JWT (JSON Web Token) 签名处理器
//!
//! 提供签名 token 的创建、写出与验证。access token 和 identity token 在配置了签名
//! 处理器时以 JWT 形式签发。
//!
//! ## 支持的算法
//!
//! - **HS256** / **HS384** / **HS512**: HMAC（对称密钥）
//! - **RS256** / **RS384** / **RS512**: RSA PKCS#1 v1.5（RSA 密钥或证书支持的 RSA 密钥）
//!
//! ## 示例
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use oidcrs::crypto::SigningCredentials;
//! use oidcrs::ticket::{Claim, ClaimsPrincipal};
//! use oidcrs::token::{
//!     JwtAlgorithm, JwtTokenHandler, SecurityTokenHandler, TokenDescriptor,
//!     TokenValidationParameters,
//! };
//!
//! let credentials = SigningCredentials::symmetric(
//!     b"my-secret-key-at-least-32-bytes!".to_vec(),
//!     JwtAlgorithm::HS256,
//! )
//! .unwrap();
//!
//! let handler = JwtTokenHandler::new();
//! let now = Utc::now();
//! let token = handler
//!     .create_token(
//!         TokenDescriptor::new(
//!             ClaimsPrincipal::new().with_claim(Claim::new("sub", "user123")),
//!             credentials.clone(),
//!         )
//!         .with_issuer("https://server.example.com/")
//!         .with_lifetime(now, now + Duration::hours(1)),
//!     )
//!     .unwrap();
//! let jwt = handler.write_token(&token).unwrap();
//!
//! let parameters = TokenValidationParameters::new()
//!     .with_issuer("https://server.example.com/")
//!     .with_signing_credentials(credentials)
//!     .without_audience_validation();
//! let validated = handler.validate_token(&jwt, &parameters).unwrap().unwrap();
//! assert_eq!(validated.principal.get_claim("sub"), Some("user123"));
//! ```

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::crypto::SigningCredentials;
use crate::error::{Error, Result, TokenError};
use crate::ticket::claims::{Claim, ClaimsPrincipal, claim_types};

/// JWT 注册 claim 名称
pub mod registered_claims {
    /// 签发者
    pub const ISSUER: &str = "iss";
    /// 接收者
    pub const AUDIENCE: &str = "aud";
    /// 过期时间
    pub const EXPIRES_AT: &str = "exp";
    /// 生效时间
    pub const NOT_BEFORE: &str = "nbf";
    /// 签发时间
    pub const ISSUED_AT: &str = "iat";
    /// JWT ID
    pub const JWT_ID: &str = "jti";
    /// 授权方
    pub const AUTHORIZED_PARTY: &str = "azp";
    /// nonce
    pub const NONCE: &str = "nonce";
    /// access token 哈希
    pub const ACCESS_TOKEN_HASH: &str = "at_hash";
    /// 授权码哈希
    pub const CODE_HASH: &str = "c_hash";
    /// 授权范围
    pub const SCOPE: &str = "scope";
    /// token 用途
    pub const TOKEN_USAGE: &str = "token_usage";
    /// 机密客户端标记
    pub const CONFIDENTIAL: &str = "confidential";
}

/// JWT 签名算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JwtAlgorithm {
    /// HMAC-SHA256
    HS256,
    /// HMAC-SHA384
    HS384,
    /// HMAC-SHA512
    HS512,
    /// RSA-SHA256（默认）
    #[default]
    RS256,
    /// RSA-SHA384
    RS384,
    /// RSA-SHA512
    RS512,
}

impl JwtAlgorithm {
    /// 是否为 HMAC 算法
    pub fn is_hmac(&self) -> bool {
        matches!(self, JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512)
    }

    /// 是否为 RSA 算法
    pub fn is_rsa(&self) -> bool {
        matches!(self, JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512)
    }
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
            JwtAlgorithm::RS256 => Algorithm::RS256,
            JwtAlgorithm::RS384 => Algorithm::RS384,
            JwtAlgorithm::RS512 => Algorithm::RS512,
        }
    }
}

// ============================================================================
// Token 结构
// ============================================================================

/// 签名 token 的创建参数
#[derive(Debug, Clone)]
pub struct TokenDescriptor {
    /// 身份主体，所有 claims 都会写入 payload
    pub subject: ClaimsPrincipal,
    /// 签发者
    pub issuer: Option<String>,
    /// 签名凭据
    pub signing_credentials: SigningCredentials,
    /// 签发时间
    pub issued_at: Option<DateTime<Utc>>,
    /// 生效时间
    pub not_before: Option<DateTime<Utc>>,
    /// 过期时间
    pub expires: Option<DateTime<Utc>>,
}

impl TokenDescriptor {
    /// 创建描述符
    pub fn new(subject: ClaimsPrincipal, signing_credentials: SigningCredentials) -> Self {
        Self {
            subject,
            issuer: None,
            signing_credentials,
            issued_at: None,
            not_before: None,
            expires: None,
        }
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// 设置有效期，生效时间等于签发时间
    pub fn with_lifetime(mut self, issued_at: DateTime<Utc>, expires: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self.not_before = Some(issued_at);
        self.expires = Some(expires);
        self
    }
}

/// 尚未写出的签名 token
#[derive(Debug, Clone)]
pub struct JwtSecurityToken {
    /// JOSE 头部
    pub header: Header,
    /// Payload
    pub payload: Map<String, Value>,
    /// 签名凭据（验证得到的 token 为验签所用凭据）
    pub signing_credentials: SigningCredentials,
}

impl JwtSecurityToken {
    /// 读取 payload 中的值
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// 读取字符串值
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// 设置 payload 中的值，已存在时覆盖
    pub fn set_claim(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(name.into(), value.into());
    }

    /// 以秒级时间戳读取时间
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.payload
            .get(name)
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// 验证参数
#[derive(Debug, Clone)]
pub struct TokenValidationParameters {
    /// 期望的签发者，`None` 表示不检查
    pub valid_issuer: Option<String>,
    /// 可用于验签的凭据
    pub signing_credentials: Vec<SigningCredentials>,
    /// 是否验证接收者
    pub validate_audience: bool,
    /// 允许的接收者
    pub valid_audiences: Vec<String>,
    /// 是否验证 `exp` / `nbf`
    pub validate_lifetime: bool,
    /// 时钟偏差容忍度（秒）
    pub clock_skew: u64,
}

impl Default for TokenValidationParameters {
    fn default() -> Self {
        Self {
            valid_issuer: None,
            signing_credentials: Vec::new(),
            validate_audience: true,
            valid_audiences: Vec::new(),
            validate_lifetime: true,
            clock_skew: 0,
        }
    }
}

impl TokenValidationParameters {
    /// 创建默认参数（验证接收者与有效期）
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置期望的签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.valid_issuer = Some(issuer.into());
        self
    }

    /// 添加验签凭据
    pub fn with_signing_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.signing_credentials.push(credentials);
        self
    }

    /// 添加允许的接收者
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.valid_audiences.push(audience.into());
        self
    }

    /// 设置时钟偏差容忍度
    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew = seconds;
        self
    }

    /// 禁用接收者验证
    pub fn without_audience_validation(mut self) -> Self {
        self.validate_audience = false;
        self
    }

    /// 禁用有效期验证
    pub fn without_lifetime_validation(mut self) -> Self {
        self.validate_lifetime = false;
        self
    }
}

/// 验证通过的 token
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    /// 由 payload 还原的身份主体（包含注册 claims）
    pub principal: ClaimsPrincipal,
    /// 解码后的 token
    pub token: JwtSecurityToken,
}

// ============================================================================
// 处理器接口
// ============================================================================

/// 签名 token 处理器
///
/// `validate_token` 对无效 token 返回 `Ok(None)`，`Err` 只用于处理器自身的故障
/// （例如配置了无法使用的密钥）。
pub trait SecurityTokenHandler: Send + Sync {
    /// 根据描述符创建 token
    fn create_token(&self, descriptor: TokenDescriptor) -> Result<JwtSecurityToken>;

    /// 签名并写出紧凑序列化形式
    fn write_token(&self, token: &JwtSecurityToken) -> Result<String>;

    /// 字符串是否看起来是此处理器能读取的 token
    fn can_read_token(&self, token: &str) -> bool;

    /// 验证 token
    fn validate_token(
        &self,
        token: &str,
        parameters: &TokenValidationParameters,
    ) -> Result<Option<ValidatedToken>>;
}

/// 基于 `jsonwebtoken` 的处理器
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtTokenHandler;

impl JwtTokenHandler {
    /// 创建处理器
    pub fn new() -> Self {
        Self
    }

    fn build_validation(
        credentials: &SigningCredentials,
        parameters: &TokenValidationParameters,
    ) -> Validation {
        let mut validation = Validation::new(credentials.algorithm().into());
        validation.required_spec_claims = HashSet::new();
        validation.leeway = parameters.clock_skew;
        validation.validate_exp = parameters.validate_lifetime;
        validation.validate_nbf = parameters.validate_lifetime;
        if parameters.validate_lifetime {
            validation.required_spec_claims.insert("exp".to_string());
        }

        if !parameters.validate_audience {
            validation.validate_aud = false;
        } else if !parameters.valid_audiences.is_empty() {
            validation.set_audience(&parameters.valid_audiences);
        }

        if let Some(issuer) = &parameters.valid_issuer {
            validation.set_issuer(&[issuer]);
        }

        validation
    }
}

impl SecurityTokenHandler for JwtTokenHandler {
    fn create_token(&self, descriptor: TokenDescriptor) -> Result<JwtSecurityToken> {
        let mut payload = principal_to_payload(&descriptor.subject);

        if let Some(issuer) = descriptor.issuer {
            payload.insert(registered_claims::ISSUER.to_string(), Value::from(issuer));
        }
        for (name, time) in [
            (registered_claims::ISSUED_AT, descriptor.issued_at),
            (registered_claims::NOT_BEFORE, descriptor.not_before),
            (registered_claims::EXPIRES_AT, descriptor.expires),
        ] {
            if let Some(time) = time {
                payload.insert(name.to_string(), Value::from(time.timestamp()));
            }
        }

        Ok(JwtSecurityToken {
            header: Header::new(descriptor.signing_credentials.algorithm().into()),
            payload,
            signing_credentials: descriptor.signing_credentials,
        })
    }

    fn write_token(&self, token: &JwtSecurityToken) -> Result<String> {
        let key = token.signing_credentials.encoding_key()?;
        encode(&token.header, &token.payload, &key).map_err(|e| {
            Error::Token(TokenError::EncodingFailed(format!(
                "failed to encode JWT: {}",
                e
            )))
        })
    }

    fn can_read_token(&self, token: &str) -> bool {
        token.split('.').count() == 3 && decode_header(token).is_ok()
    }

    fn validate_token(
        &self,
        token: &str,
        parameters: &TokenValidationParameters,
    ) -> Result<Option<ValidatedToken>> {
        let header = match decode_header(token) {
            Ok(header) => header,
            Err(e) => {
                debug!(error = %e, "JWT header could not be decoded");
                return Ok(None);
            }
        };

        for credentials in candidate_credentials(&header, &parameters.signing_credentials) {
            let key = credentials.decoding_key()?;
            let validation = Self::build_validation(credentials, parameters);

            match decode::<Map<String, Value>>(token, &key, &validation) {
                Ok(data) => {
                    let principal = payload_to_principal(&data.claims);
                    return Ok(Some(ValidatedToken {
                        principal,
                        token: JwtSecurityToken {
                            header: data.header,
                            payload: data.claims,
                            signing_credentials: credentials.clone(),
                        },
                    }));
                }
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
                Err(e) => {
                    debug!(error = %e, "JWT rejected");
                    return Ok(None);
                }
            }
        }

        debug!(kid = ?header.kid, "no signing key validated the JWT");
        Ok(None)
    }
}

/// 按头部的 `alg` 和 `kid` 挑选验签凭据
///
/// `kid` 能匹配到凭据时只使用匹配的凭据，否则尝试所有算法相同的凭据。
fn candidate_credentials<'a>(
    header: &Header,
    credentials: &'a [SigningCredentials],
) -> Vec<&'a SigningCredentials> {
    let same_algorithm: Vec<_> = credentials
        .iter()
        .filter(|c| Algorithm::from(c.algorithm()) == header.alg)
        .collect();

    if let Some(kid) = &header.kid {
        let matching: Vec<_> = same_algorithm
            .iter()
            .copied()
            .filter(|c| c.key_identifier().as_deref() == Some(kid.as_str()))
            .collect();
        if !matching.is_empty() {
            return matching;
        }
    }

    same_algorithm
}

// ============================================================================
// Claims 与 payload 的映射
// ============================================================================

/// 把身份主体写成 JWT payload
///
/// 同类型的 claims 按首次出现的顺序分组：单个值写为标量，多个值写为数组。
/// actor 写为嵌套的 `act` 对象。
pub fn principal_to_payload(principal: &ClaimsPrincipal) -> Map<String, Value> {
    let mut groups: Vec<(&str, Vec<Value>)> = Vec::new();
    for claim in principal.claims() {
        match groups.iter_mut().find(|(name, _)| *name == claim.claim_type) {
            Some((_, values)) => values.push(claim.to_json()),
            None => groups.push((&claim.claim_type, vec![claim.to_json()])),
        }
    }

    let mut payload = Map::new();
    for (name, mut values) in groups {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        payload.insert(name.to_string(), value);
    }

    if let Some(actor) = principal.actor() {
        payload.insert(
            claim_types::ACTOR.to_string(),
            Value::Object(principal_to_payload(actor)),
        );
    }

    payload
}

/// 从 JWT payload 还原身份主体
pub fn payload_to_principal(payload: &Map<String, Value>) -> ClaimsPrincipal {
    let mut principal = ClaimsPrincipal::new();

    for (name, value) in payload {
        if name == claim_types::ACTOR {
            if let Value::Object(actor) = value {
                principal.set_actor(Some(payload_to_principal(actor)));
                continue;
            }
        }
        for claim in Claim::from_json(name, value) {
            principal.add_claim(claim);
        }
    }

    principal
}
