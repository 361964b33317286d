//! OpenID Connect 协议消息
//!
//! 端点层已经解析好的请求与正在构建的响应。序列化器只读取它们：
//! 请求提供客户端 ID、nonce 和授权请求参数，响应提供已经生成的授权码与 access token
//! （用于计算 `c_hash` / `at_hash`）。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 授权类型
pub mod grant_types {
    /// 授权码
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    /// 刷新令牌
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// 客户端凭证
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    /// 资源所有者密码
    pub const PASSWORD: &str = "password";
}

/// OpenID Connect 请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConnectRequest {
    /// 客户端 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// 授权类型（仅 token 请求）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,

    /// 授权码（仅 `authorization_code` 授权）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// nonce（仅授权请求）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// 重定向 URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// 请求的授权范围（空格分隔）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// PKCE code challenge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge 方法
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// 其他参数
    #[serde(flatten)]
    pub parameters: BTreeMap<String, String>,
}

impl OpenIdConnectRequest {
    /// 创建空请求
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置客户端 ID
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// 设置授权类型
    pub fn with_grant_type(mut self, grant_type: impl Into<String>) -> Self {
        self.grant_type = Some(grant_type.into());
        self
    }

    /// 设置授权码
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// 设置 nonce
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// 设置重定向 URI
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// 设置授权范围
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// 设置 PKCE 参数
    pub fn with_code_challenge(
        mut self,
        code_challenge: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.code_challenge = Some(code_challenge.into());
        self.code_challenge_method = Some(method.into());
        self
    }

    /// 设置其他参数
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// 获取其他参数
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// 是否为 `authorization_code` 授权
    pub fn is_authorization_code_grant_type(&self) -> bool {
        self.grant_type.as_deref() == Some(grant_types::AUTHORIZATION_CODE)
    }

    /// 是否为 `refresh_token` 授权
    pub fn is_refresh_token_grant_type(&self) -> bool {
        self.grant_type.as_deref() == Some(grant_types::REFRESH_TOKEN)
    }

    /// 请求的授权范围列表
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }
}

/// OpenID Connect 响应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConnectResponse {
    /// 授权码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// 访问令牌
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Token 类型（通常为 "Bearer"）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// access token 过期时间（秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// 身份令牌
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// 刷新令牌
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// 授权范围（空格分隔）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OpenIdConnectResponse {
    /// 创建空响应
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置授权码
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// 设置访问令牌
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self.token_type.get_or_insert_with(|| "Bearer".to_string());
        self
    }

    /// 设置过期时间
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// 设置身份令牌
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    /// 设置刷新令牌
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// 设置授权范围
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}
