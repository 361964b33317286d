//! # oidcrs
//!
//! OAuth 2.0 / OpenID Connect 授权服务器的 token 签发与验证引擎。
//!
//! ## 功能特性
//!
//! - **Ticket 模型**: 身份主体（claims 加一级委托方）与元数据
//! - **Ticket 保护器**: HKDF 派生的 AES-256-GCM 加密，按用途隔离
//! - **授权码缓存**: 服务端保存授权码内容，授权码只能兑换一次
//! - **签名密钥解析**: `kid` / `x5t` 推导（显式标识、证书指纹、RSA 模数）
//! - **Token 序列化器**: 授权码、access token、identity token、refresh token 的签发与解析
//! - **扩展点**: 每个操作都可以被宿主程序检查、修改或直接接管
//!
//! 端点控制器、HTTP 集成、客户端存储和登录界面不在本库范围内：调用方传入已经解析的
//! 协议消息和已经认证的身份主体，得到 token 字符串或验证后的 ticket。
//!
//! ## 授权码流程示例
//!
//! ```rust
//! use oidcrs::crypto::SigningCredentials;
//! use oidcrs::message::{OpenIdConnectRequest, OpenIdConnectResponse, grant_types};
//! use oidcrs::serializer::{TokenSerializer, TokenSerializerOptions};
//! use oidcrs::ticket::claims::destinations;
//! use oidcrs::ticket::{Claim, ClaimsPrincipal, TicketProperties};
//! use oidcrs::token::JwtAlgorithm;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> oidcrs::Result<()> {
//! let credentials = SigningCredentials::symmetric(
//!     b"signing-key-at-least-32-bytes-long!".to_vec(),
//!     JwtAlgorithm::HS256,
//! )?;
//! let options = TokenSerializerOptions::new(b"master-key-material-of-32-bytes!")?
//!     .with_issuer("https://server.example.com/")
//!     .with_signing_credentials(credentials);
//! let serializer = TokenSerializer::new(options)?;
//!
//! // 授权端点：签发授权码
//! let principal = ClaimsPrincipal::new()
//!     .with_claim(Claim::new("sub", "alice"))
//!     .with_claim(Claim::new("email", "alice@example.com").with_destinations([destinations::IDENTITY_TOKEN]));
//! let authorize = OpenIdConnectRequest::new().with_client_id("web").with_nonce("n-0S6_WzA2Mj");
//! let code = serializer
//!     .serialize_authorization_code(&principal, &TicketProperties::new().with_scope("openid"), &authorize, &OpenIdConnectResponse::new())
//!     .await?
//!     .expect("code should be issued");
//!
//! // token 端点：兑换授权码，签发 access token 与 identity token
//! let token_request = OpenIdConnectRequest::new()
//!     .with_client_id("web")
//!     .with_grant_type(grant_types::AUTHORIZATION_CODE)
//!     .with_code(code.clone());
//! let ticket = serializer
//!     .deserialize_authorization_code(&code, &token_request)
//!     .await?
//!     .expect("code should be redeemable once");
//!
//! let mut response = OpenIdConnectResponse::new();
//! if let Some(access_token) = serializer
//!     .serialize_access_token(&ticket.principal, &ticket.properties, &token_request, &response)
//!     .await?
//! {
//!     response = response.with_access_token(access_token);
//! }
//! let id_token = serializer
//!     .serialize_identity_token(&ticket.principal, &ticket.properties, &token_request, &response)
//!     .await?
//!     .expect("identity token should be issued");
//!
//! let identity = serializer
//!     .deserialize_identity_token(&id_token, &token_request)
//!     .await?
//!     .expect("identity token should validate");
//! assert_eq!(identity.properties.nonce.as_deref(), Some("n-0S6_WzA2Mj"));
//! assert_eq!(identity.principal.get_claim("email"), Some("alice@example.com"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod message;
pub mod random;
pub mod serializer;
pub mod ticket;
pub mod token;

pub use error::{Error, Result};

// ============================================================================
// Ticket 相关导出
// ============================================================================

pub use ticket::{
    AeadTicketProtector, AuthenticationTicket, Claim, ClaimValueType, ClaimsPrincipal,
    TicketProperties, TicketProtector, TokenUsage,
};

// ============================================================================
// 序列化器相关导出
// ============================================================================

pub use serializer::{Flow, TokenEvents, TokenFormat, TokenSerializer, TokenSerializerOptions};

// ============================================================================
// 基础设施导出
// ============================================================================

pub use cache::{InMemoryTicketCache, TicketCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use crypto::{SigningCredentials, resolve_key_identifiers};
pub use message::{OpenIdConnectRequest, OpenIdConnectResponse};
pub use token::{JwtAlgorithm, JwtTokenHandler, SecurityTokenHandler};
