//! Token 序列化器
//!
//! 把经过认证的身份主体与请求上下文转换为授权码、access token、identity token 和
//! refresh token，并把客户端出示的 token 还原为 ticket。
//!
//! ## 子模块
//!
//! - **options**: 有效期、保护器、签名处理器、缓存等配置
//! - **events**: 每个操作的上下文与扩展点接口
//!
//! ## 失败语义
//!
//! - 序列化返回 `Ok(None)`：该 token 不应出现在响应中（缺少 subject、没有可用格式等）
//! - 反序列化返回 `Ok(None)`：token 无效（签名错误、类型不符、授权码已使用、解密失败），
//!   调用方应当转换为 `invalid_grant` 一类的协议错误
//! - `Err`：可插拔组件（扩展点、保护器、签名处理器、缓存写入）自身的故障
//!
//! ## 示例
//!
//! ```rust
//! use oidcrs::message::{OpenIdConnectRequest, OpenIdConnectResponse};
//! use oidcrs::serializer::{TokenSerializer, TokenSerializerOptions};
//! use oidcrs::ticket::{Claim, ClaimsPrincipal, TicketProperties, TokenUsage};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> oidcrs::Result<()> {
//! let options = TokenSerializerOptions::new(b"master-key-material-of-32-bytes!")?;
//! let serializer = TokenSerializer::new(options)?;
//!
//! let principal = ClaimsPrincipal::new().with_claim(Claim::new("sub", "u1"));
//! let request = OpenIdConnectRequest::new().with_client_id("c1");
//!
//! let code = serializer
//!     .serialize_authorization_code(&principal, &TicketProperties::new(), &request, &OpenIdConnectResponse::new())
//!     .await?
//!     .expect("code should be issued");
//!
//! let ticket = serializer
//!     .deserialize_authorization_code(&code, &request)
//!     .await?
//!     .expect("first redemption should succeed");
//! assert_eq!(ticket.usage(), Some(TokenUsage::AuthorizationCode));
//! assert_eq!(ticket.properties.presenters, vec!["c1".to_string()]);
//!
//! // 授权码只能使用一次
//! assert!(serializer.deserialize_authorization_code(&code, &request).await?.is_none());
//! # Ok(())
//! # }
//! ```

mod deserialize;
pub mod events;
pub mod options;
mod serialize;

pub use events::{
    DefaultTokenEvents, DeserializeAccessTokenContext, DeserializeAuthorizationCodeContext,
    DeserializeIdentityTokenContext, DeserializeRefreshTokenContext, Flow,
    SerializeAccessTokenContext, SerializeAuthorizationCodeContext, SerializeIdentityTokenContext,
    SerializeRefreshTokenContext, TokenEvents,
};
pub use options::{DEFAULT_AUTHENTICATION_SCHEME, TokenFormat, TokenSerializerOptions};

use tracing::{debug, error};

use crate::error::Result;
use crate::ticket::{AuthenticationTicket, TokenUsage};

/// Token 序列化器
///
/// 不持有跨调用的可变状态，可以在多个并发请求之间共享（例如放在 `Arc` 中）。
#[derive(Debug, Clone)]
pub struct TokenSerializer {
    options: TokenSerializerOptions,
}

impl TokenSerializer {
    /// 创建序列化器
    ///
    /// # Errors
    ///
    /// 配置无效时返回配置错误。
    pub fn new(options: TokenSerializerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// 配置
    pub fn options(&self) -> &TokenSerializerOptions {
        &self.options
    }
}

/// 扩展点执行之后重新确认 ticket 的用途
///
/// 扩展点可能把 ticket 换成了另一种用途的 ticket，这种情况下不签发。
fn restamp_usage(ticket: &mut AuthenticationTicket, usage: TokenUsage) -> bool {
    match ticket.properties.set_usage(usage) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "ticket was replaced with one of a different usage");
            false
        }
    }
}

/// 检查还原出的 ticket 是否为期望的用途
fn ensure_usage(ticket: AuthenticationTicket, usage: TokenUsage) -> Option<AuthenticationTicket> {
    match ticket.properties.ensure_usage(usage) {
        Ok(()) => Some(ticket),
        Err(e) => {
            debug!(error = %e, "token rejected");
            None
        }
    }
}
