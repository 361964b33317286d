//! Ticket 元数据
//!
//! 签发/过期时间、用途、受众、出示方、授权范围、机密标记以及扩展项。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result, TokenError};
use crate::ticket::claims::destinations;

/// 扩展项的常用键
pub mod items {
    /// 授权请求中的 redirect_uri
    pub const REDIRECT_URI: &str = ".redirect_uri";
    /// PKCE code_challenge
    pub const CODE_CHALLENGE: &str = ".code_challenge";
    /// PKCE code_challenge_method
    pub const CODE_CHALLENGE_METHOD: &str = ".code_challenge_method";
}

/// Token 用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenUsage {
    /// 授权码
    #[serde(rename = "code")]
    AuthorizationCode,
    /// Access Token
    #[serde(rename = "access_token")]
    AccessToken,
    /// Identity Token
    #[serde(rename = "id_token")]
    IdentityToken,
    /// Refresh Token
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl TokenUsage {
    /// 所有用途
    pub const ALL: [TokenUsage; 4] = [
        TokenUsage::AuthorizationCode,
        TokenUsage::AccessToken,
        TokenUsage::IdentityToken,
        TokenUsage::RefreshToken,
    ];

    /// 协议中的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUsage::AuthorizationCode => "code",
            TokenUsage::AccessToken => "access_token",
            TokenUsage::IdentityToken => "id_token",
            TokenUsage::RefreshToken => "refresh_token",
        }
    }

    /// 保护器用途，也用作配置项名称的前缀
    pub fn purpose(&self) -> &'static str {
        match self {
            TokenUsage::AuthorizationCode => "authorization_code",
            TokenUsage::AccessToken => "access_token",
            TokenUsage::IdentityToken => "identity_token",
            TokenUsage::RefreshToken => "refresh_token",
        }
    }

    /// claim 投影使用的 destination
    ///
    /// 授权码和 refresh token 不做投影，返回 `None`。
    pub fn destination(&self) -> Option<&'static str> {
        match self {
            TokenUsage::AccessToken => Some(destinations::ACCESS_TOKEN),
            TokenUsage::IdentityToken => Some(destinations::IDENTITY_TOKEN),
            TokenUsage::AuthorizationCode | TokenUsage::RefreshToken => None,
        }
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "code" => Ok(TokenUsage::AuthorizationCode),
            "access_token" => Ok(TokenUsage::AccessToken),
            "id_token" => Ok(TokenUsage::IdentityToken),
            "refresh_token" => Ok(TokenUsage::RefreshToken),
            other => Err(TokenError::InvalidClaim(format!("unknown token usage '{}'", other)).into()),
        }
    }
}

/// Ticket 元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketProperties {
    /// Ticket 标识
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,

    /// 签发时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,

    /// 过期时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<TokenUsage>,

    /// 受众（有序，不重复）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,

    /// 出示方，通常是被授权出示此 token 的客户端 ID（有序，不重复）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presenters: Vec<String>,

    /// 授权范围
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,

    /// 是否签发给机密客户端
    #[serde(default)]
    pub confidential: bool,

    /// 授权请求中的 nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// 扩展项
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, String>,
}

impl TicketProperties {
    /// 创建空元数据
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前用途
    pub fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    /// 设置用途
    ///
    /// 用途只能设置一次；重复设置为相同的值没有影响。
    ///
    /// # Errors
    ///
    /// 已经设置为其他用途时返回 [`TokenError::UsageMismatch`]。
    pub fn set_usage(&mut self, usage: TokenUsage) -> Result<()> {
        match self.usage {
            Some(current) if current != usage => Err(TokenError::UsageMismatch {
                expected: usage.to_string(),
                found: current.to_string(),
            }
            .into()),
            _ => {
                self.usage = Some(usage);
                Ok(())
            }
        }
    }

    /// 检查用途是否为期望的值
    ///
    /// # Errors
    ///
    /// 用途不同或未设置时返回 [`TokenError::UsageMismatch`]。
    pub fn ensure_usage(&self, expected: TokenUsage) -> Result<()> {
        match self.usage {
            Some(usage) if usage == expected => Ok(()),
            other => Err(TokenError::UsageMismatch {
                expected: expected.to_string(),
                found: other.map_or_else(|| "none".to_string(), |u| u.to_string()),
            }
            .into()),
        }
    }

    /// 复制元数据用于签发新 ticket，清除用途
    ///
    /// 来自已签发 ticket 的元数据（用途已设置）同时清除 ticket 标识、签发时间和过期时间，
    /// 新 ticket 使用自己的标识和有效期。调用方新建的元数据保留显式设置的时间。
    pub fn fork(&self) -> Self {
        let mut forked = self.clone();
        if forked.usage.take().is_some() {
            forked.ticket_id = None;
            forked.issued_at = None;
            forked.expires_at = None;
        }
        forked
    }

    /// 为新建的元数据标记用途
    pub(crate) fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// 补全签发与过期时间
    ///
    /// 签发时间未设置时取 `now`；过期时间未设置时取签发时间加上 `lifetime`。
    pub fn stamp_lifetime(&mut self, now: DateTime<Utc>, lifetime: Duration) {
        let issued_at = *self.issued_at.get_or_insert(now);
        self.expires_at.get_or_insert(issued_at + lifetime);
    }

    /// 添加受众
    pub fn add_audience(&mut self, audience: impl Into<String>) {
        push_unique(&mut self.audiences, audience.into());
    }

    /// 添加出示方
    pub fn add_presenter(&mut self, presenter: impl Into<String>) {
        push_unique(&mut self.presenters, presenter.into());
    }

    /// 添加授权范围
    pub fn add_scope(&mut self, scope: impl Into<String>) {
        self.scopes.insert(scope.into());
    }

    /// 是否包含指定的授权范围
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// 设置扩展项
    pub fn set_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    /// 获取扩展项
    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// 设置受众（构建器形式）
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.add_audience(audience);
        self
    }

    /// 设置出示方（构建器形式）
    pub fn with_presenter(mut self, presenter: impl Into<String>) -> Self {
        self.add_presenter(presenter);
        self
    }

    /// 设置授权范围（构建器形式）
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.add_scope(scope);
        self
    }

    /// 设置机密标记（构建器形式）
    pub fn with_confidential(mut self, confidential: bool) -> Self {
        self.confidential = confidential;
        self
    }

    /// 设置签发时间（构建器形式）
    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// 设置过期时间（构建器形式）
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
