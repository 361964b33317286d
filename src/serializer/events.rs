//! 扩展点
//!
//! 八个操作在执行默认逻辑之前都会把草稿交给 [`TokenEvents`]。宿主程序可以：
//!
//! - 原样返回 `Flow::Continue(context)`，由引擎继续默认逻辑；
//! - 修改上下文（替换 ticket、格式或签名凭据，增删受众、出示方、授权范围）后返回
//!   `Flow::Continue`；
//! - 返回 `Flow::Handled(output)` 直接提供最终结果，跳过剩余步骤。
//!
//! 把格式置为 `None` 而又不提供结果时，该 token 不会被签发。
//!
//! ## 示例
//!
//! ```rust
//! use async_trait::async_trait;
//! use oidcrs::error::Result;
//! use oidcrs::message::{OpenIdConnectRequest, OpenIdConnectResponse};
//! use oidcrs::serializer::{Flow, SerializeRefreshTokenContext, TokenEvents};
//!
//! /// 只给第一方客户端签发 refresh token
//! struct FirstPartyRefreshTokens;
//!
//! #[async_trait]
//! impl TokenEvents for FirstPartyRefreshTokens {
//!     async fn serialize_refresh_token(
//!         &self,
//!         request: &OpenIdConnectRequest,
//!         _response: &OpenIdConnectResponse,
//!         mut context: SerializeRefreshTokenContext,
//!     ) -> Result<Flow<SerializeRefreshTokenContext, String>> {
//!         if request.client_id.as_deref() != Some("first-party") {
//!             context.data_format = None;
//!         }
//!         Ok(Flow::Continue(context))
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::crypto::SigningCredentials;
use crate::error::Result;
use crate::message::{OpenIdConnectRequest, OpenIdConnectResponse};
use crate::serializer::options::TokenFormat;
use crate::ticket::{AuthenticationTicket, TicketProtector};
use crate::token::TokenValidationParameters;

/// 扩展点的处理结果
#[derive(Debug)]
pub enum Flow<C, T> {
    /// 继续默认逻辑
    Continue(C),
    /// 已处理，直接使用给出的结果
    Handled(T),
}

// ============================================================================
// 序列化上下文
// ============================================================================

/// 授权码序列化上下文
#[derive(Clone)]
pub struct SerializeAuthorizationCodeContext {
    /// 草稿 ticket
    pub ticket: AuthenticationTicket,
    /// 保护器，`None` 表示不签发
    pub data_format: Option<Arc<dyn TicketProtector>>,
}

/// refresh token 序列化上下文
#[derive(Clone)]
pub struct SerializeRefreshTokenContext {
    /// 草稿 ticket
    pub ticket: AuthenticationTicket,
    /// 保护器，`None` 表示不签发
    pub data_format: Option<Arc<dyn TicketProtector>>,
}

/// access token 序列化上下文
#[derive(Clone)]
pub struct SerializeAccessTokenContext {
    /// 草稿 ticket（principal 已经按 `token` destination 投影）
    pub ticket: AuthenticationTicket,
    /// 输出格式，`None` 表示不签发
    pub format: Option<TokenFormat>,
    /// 签发者
    pub issuer: Option<String>,
    /// 签名凭据，签名格式必需
    pub signing_credentials: Option<SigningCredentials>,
}

/// identity token 序列化上下文
#[derive(Clone)]
pub struct SerializeIdentityTokenContext {
    /// 草稿 ticket（principal 已经按 `id_token` destination 投影）
    pub ticket: AuthenticationTicket,
    /// 输出格式，`None` 表示不签发
    pub format: Option<TokenFormat>,
    /// 签发者
    pub issuer: Option<String>,
    /// 签名凭据，签名格式必需
    pub signing_credentials: Option<SigningCredentials>,
    /// `at_hash`，响应中已有 access token 时计算
    pub access_token_hash: Option<String>,
    /// `c_hash`，响应中已有授权码时计算
    pub authorization_code_hash: Option<String>,
    /// 要写入的 nonce
    pub nonce: Option<String>,
}

// ============================================================================
// 反序列化上下文
// ============================================================================

/// 授权码反序列化上下文
#[derive(Clone)]
pub struct DeserializeAuthorizationCodeContext {
    /// 客户端出示的授权码
    pub code: String,
    /// 保护器，`None` 表示拒绝
    pub data_format: Option<Arc<dyn TicketProtector>>,
}

/// refresh token 反序列化上下文
#[derive(Clone)]
pub struct DeserializeRefreshTokenContext {
    /// 客户端出示的 refresh token
    pub refresh_token: String,
    /// 保护器，`None` 表示拒绝
    pub data_format: Option<Arc<dyn TicketProtector>>,
}

/// access token 反序列化上下文
#[derive(Clone)]
pub struct DeserializeAccessTokenContext {
    /// 客户端出示的 access token
    pub access_token: String,
    /// 输入格式，`None` 表示拒绝
    pub format: Option<TokenFormat>,
    /// 签名格式使用的验证参数
    pub validation_parameters: TokenValidationParameters,
}

/// identity token 反序列化上下文
#[derive(Clone)]
pub struct DeserializeIdentityTokenContext {
    /// 客户端出示的 identity token
    pub identity_token: String,
    /// 输入格式，`None` 表示拒绝
    pub format: Option<TokenFormat>,
    /// 签名格式使用的验证参数
    pub validation_parameters: TokenValidationParameters,
}

// ============================================================================
// 扩展点接口
// ============================================================================

/// 序列化 / 反序列化扩展点
///
/// 所有方法默认直接返回 `Flow::Continue`。返回 `Err` 会中止当前操作并原样传播给调用方。
#[async_trait]
pub trait TokenEvents: Send + Sync {
    /// 签发授权码之前
    async fn serialize_authorization_code(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        context: SerializeAuthorizationCodeContext,
    ) -> Result<Flow<SerializeAuthorizationCodeContext, String>> {
        Ok(Flow::Continue(context))
    }

    /// 签发 access token 之前
    async fn serialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        context: SerializeAccessTokenContext,
    ) -> Result<Flow<SerializeAccessTokenContext, String>> {
        Ok(Flow::Continue(context))
    }

    /// 签发 identity token 之前
    async fn serialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        context: SerializeIdentityTokenContext,
    ) -> Result<Flow<SerializeIdentityTokenContext, String>> {
        Ok(Flow::Continue(context))
    }

    /// 签发 refresh token 之前
    async fn serialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        context: SerializeRefreshTokenContext,
    ) -> Result<Flow<SerializeRefreshTokenContext, String>> {
        Ok(Flow::Continue(context))
    }

    /// 解析授权码之前
    async fn deserialize_authorization_code(
        &self,
        _request: &OpenIdConnectRequest,
        context: DeserializeAuthorizationCodeContext,
    ) -> Result<Flow<DeserializeAuthorizationCodeContext, AuthenticationTicket>> {
        Ok(Flow::Continue(context))
    }

    /// 解析 access token 之前
    async fn deserialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        context: DeserializeAccessTokenContext,
    ) -> Result<Flow<DeserializeAccessTokenContext, AuthenticationTicket>> {
        Ok(Flow::Continue(context))
    }

    /// 解析 identity token 之前
    async fn deserialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        context: DeserializeIdentityTokenContext,
    ) -> Result<Flow<DeserializeIdentityTokenContext, AuthenticationTicket>> {
        Ok(Flow::Continue(context))
    }

    /// 解析 refresh token 之前
    async fn deserialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        context: DeserializeRefreshTokenContext,
    ) -> Result<Flow<DeserializeRefreshTokenContext, AuthenticationTicket>> {
        Ok(Flow::Continue(context))
    }
}

/// 不做任何处理的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTokenEvents;

#[async_trait]
impl TokenEvents for DefaultTokenEvents {}
