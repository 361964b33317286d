//! 序列化器配置

use chrono::Duration;
use std::fmt;
use std::sync::Arc;

use crate::cache::{InMemoryTicketCache, TicketCache};
use crate::clock::{Clock, SystemClock};
use crate::crypto::SigningCredentials;
use crate::error::{ConfigError, Result};
use crate::serializer::events::{DefaultTokenEvents, TokenEvents};
use crate::ticket::{AeadTicketProtector, TicketProtector, TokenUsage};
use crate::token::{JwtTokenHandler, SecurityTokenHandler};

/// 默认认证方案名称
pub const DEFAULT_AUTHENTICATION_SCHEME: &str = "OpenIdConnectServer";

/// Token 输出格式
///
/// 每次调用只选择一次：不透明加密 ticket，或者签名 JWT。
#[derive(Clone)]
pub enum TokenFormat {
    /// 由 ticket 保护器加密的不透明字符串
    Opaque(Arc<dyn TicketProtector>),
    /// 由签名处理器生成的 JWT
    Signed(Arc<dyn SecurityTokenHandler>),
}

impl fmt::Debug for TokenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenFormat::Opaque(_) => f.write_str("Opaque(..)"),
            TokenFormat::Signed(_) => f.write_str("Signed(..)"),
        }
    }
}

/// 序列化器配置
///
/// 每种 token 都有独立的有效期和保护器。access token 与 identity token 在配置了
/// 签名处理器时签发为 JWT，否则退回到各自的保护器。
#[derive(Clone)]
pub struct TokenSerializerOptions {
    /// 签发者（写入 JWT 的 `iss`，验证时作为期望的签发者）
    pub issuer: Option<String>,

    /// 认证方案名称
    pub authentication_scheme: String,

    /// 授权码有效期
    pub authorization_code_lifetime: Duration,

    /// access token 有效期
    pub access_token_lifetime: Duration,

    /// identity token 有效期
    pub identity_token_lifetime: Duration,

    /// refresh token 有效期
    pub refresh_token_lifetime: Duration,

    /// 授权码保护器
    pub authorization_code_protector: Arc<dyn TicketProtector>,

    /// access token 保护器
    pub access_token_protector: Arc<dyn TicketProtector>,

    /// identity token 保护器
    pub identity_token_protector: Arc<dyn TicketProtector>,

    /// refresh token 保护器
    pub refresh_token_protector: Arc<dyn TicketProtector>,

    /// access token 签名处理器，`None` 表示签发不透明 access token
    pub access_token_handler: Option<Arc<dyn SecurityTokenHandler>>,

    /// identity token 签名处理器
    pub identity_token_handler: Option<Arc<dyn SecurityTokenHandler>>,

    /// 签名凭据：第一个用于签名，全部用于验签
    pub signing_credentials: Vec<SigningCredentials>,

    /// 授权码缓存
    pub cache: Arc<dyn TicketCache>,

    /// 时间源
    pub clock: Arc<dyn Clock>,

    /// 扩展点
    pub events: Arc<dyn TokenEvents>,
}

impl TokenSerializerOptions {
    /// 使用主密钥创建默认配置
    ///
    /// 四种 token 的保护器都由同一个主密钥按用途派生。
    ///
    /// # Errors
    ///
    /// 主密钥短于 32 字节时返回配置错误。
    pub fn new(master_key: &[u8]) -> Result<Self> {
        let protector = |usage: TokenUsage| -> Result<Arc<dyn TicketProtector>> {
            Ok(Arc::new(AeadTicketProtector::new(master_key, usage.purpose())?))
        };

        Ok(Self {
            issuer: None,
            authentication_scheme: DEFAULT_AUTHENTICATION_SCHEME.to_string(),
            authorization_code_lifetime: Duration::minutes(5),
            access_token_lifetime: Duration::hours(1),
            identity_token_lifetime: Duration::minutes(20),
            refresh_token_lifetime: Duration::days(14),
            authorization_code_protector: protector(TokenUsage::AuthorizationCode)?,
            access_token_protector: protector(TokenUsage::AccessToken)?,
            identity_token_protector: protector(TokenUsage::IdentityToken)?,
            refresh_token_protector: protector(TokenUsage::RefreshToken)?,
            access_token_handler: None,
            identity_token_handler: Some(Arc::new(JwtTokenHandler::new())),
            signing_credentials: Vec::new(),
            cache: Arc::new(InMemoryTicketCache::new()),
            clock: Arc::new(SystemClock),
            events: Arc::new(DefaultTokenEvents),
        })
    }

    /// 高安全性配置（更短的有效期）
    pub fn high_security(master_key: &[u8]) -> Result<Self> {
        let mut options = Self::new(master_key)?;
        options.authorization_code_lifetime = Duration::minutes(1);
        options.access_token_lifetime = Duration::minutes(15);
        options.identity_token_lifetime = Duration::minutes(5);
        options.refresh_token_lifetime = Duration::days(1);
        Ok(options)
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// 设置认证方案名称
    pub fn with_authentication_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.authentication_scheme = scheme.into();
        self
    }

    /// 设置某种 token 的有效期
    pub fn with_lifetime(mut self, usage: TokenUsage, lifetime: Duration) -> Self {
        match usage {
            TokenUsage::AuthorizationCode => self.authorization_code_lifetime = lifetime,
            TokenUsage::AccessToken => self.access_token_lifetime = lifetime,
            TokenUsage::IdentityToken => self.identity_token_lifetime = lifetime,
            TokenUsage::RefreshToken => self.refresh_token_lifetime = lifetime,
        }
        self
    }

    /// 添加签名凭据
    pub fn with_signing_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.signing_credentials.push(credentials);
        self
    }

    /// 设置 access token 签名处理器
    pub fn with_access_token_handler(mut self, handler: Arc<dyn SecurityTokenHandler>) -> Self {
        self.access_token_handler = Some(handler);
        self
    }

    /// 使用默认 JWT 处理器签发 access token
    pub fn with_jwt_access_tokens(self) -> Self {
        self.with_access_token_handler(Arc::new(JwtTokenHandler::new()))
    }

    /// 设置 identity token 签名处理器，`None` 表示签发不透明 identity token
    pub fn with_identity_token_handler(
        mut self,
        handler: Option<Arc<dyn SecurityTokenHandler>>,
    ) -> Self {
        self.identity_token_handler = handler;
        self
    }

    /// 设置缓存
    pub fn with_cache(mut self, cache: Arc<dyn TicketCache>) -> Self {
        self.cache = cache;
        self
    }

    /// 设置时间源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 设置扩展点
    pub fn with_events(mut self, events: Arc<dyn TokenEvents>) -> Self {
        self.events = events;
        self
    }

    /// 某种 token 的有效期
    pub fn lifetime(&self, usage: TokenUsage) -> Duration {
        match usage {
            TokenUsage::AuthorizationCode => self.authorization_code_lifetime,
            TokenUsage::AccessToken => self.access_token_lifetime,
            TokenUsage::IdentityToken => self.identity_token_lifetime,
            TokenUsage::RefreshToken => self.refresh_token_lifetime,
        }
    }

    /// 某种 token 的保护器
    pub fn protector(&self, usage: TokenUsage) -> Arc<dyn TicketProtector> {
        match usage {
            TokenUsage::AuthorizationCode => self.authorization_code_protector.clone(),
            TokenUsage::AccessToken => self.access_token_protector.clone(),
            TokenUsage::IdentityToken => self.identity_token_protector.clone(),
            TokenUsage::RefreshToken => self.refresh_token_protector.clone(),
        }
    }

    /// 某种 token 的输出格式：有签名处理器时签名，否则加密
    pub fn format(&self, usage: TokenUsage) -> TokenFormat {
        let handler = match usage {
            TokenUsage::AccessToken => self.access_token_handler.clone(),
            TokenUsage::IdentityToken => self.identity_token_handler.clone(),
            TokenUsage::AuthorizationCode | TokenUsage::RefreshToken => None,
        };
        match handler {
            Some(handler) => TokenFormat::Signed(handler),
            None => TokenFormat::Opaque(self.protector(usage)),
        }
    }

    /// 验证配置
    ///
    /// # Errors
    ///
    /// 任一有效期不为正数时返回配置错误。
    pub fn validate(&self) -> Result<()> {
        for usage in TokenUsage::ALL {
            if self.lifetime(usage) <= Duration::zero() {
                return Err(ConfigError::InvalidValue {
                    key: format!("{}_lifetime", usage.purpose()),
                    message: "must be positive".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TokenSerializerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSerializerOptions")
            .field("issuer", &self.issuer)
            .field("authentication_scheme", &self.authentication_scheme)
            .field("authorization_code_lifetime", &self.authorization_code_lifetime)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("identity_token_lifetime", &self.identity_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("signed_access_tokens", &self.access_token_handler.is_some())
            .field("signed_identity_tokens", &self.identity_token_handler.is_some())
            .field("signing_credentials", &self.signing_credentials)
            .finish_non_exhaustive()
    }
}
