//! Ticket 模块
//!
//! Ticket 是"经过认证的内容"在内存中的表示：身份主体加上元数据，与它的传输编码无关。
//!
//! ## 子模块
//!
//! - **claims**: claim、身份主体与 destination 投影规则
//! - **properties**: ticket 元数据与用途
//! - **protector**: ticket 与不透明字符串之间的加解密
//!
//! ## 示例
//!
//! ```rust
//! use oidcrs::ticket::{AuthenticationTicket, Claim, ClaimsPrincipal, TicketProperties};
//! use oidcrs::ticket::claims::{claim_types, destinations};
//!
//! let principal = ClaimsPrincipal::new()
//!     .with_claim(Claim::new(claim_types::SUBJECT, "user123"))
//!     .with_claim(Claim::new("role", "admin").with_destinations([destinations::ACCESS_TOKEN]));
//!
//! let ticket = AuthenticationTicket::new(
//!     principal,
//!     TicketProperties::new().with_scope("openid"),
//!     "OpenIdConnectServer",
//! );
//! assert_eq!(ticket.principal.get_claim("sub"), Some("user123"));
//! ```

pub mod claims;
pub mod properties;
pub mod protector;

use serde::{Deserialize, Serialize};

pub use claims::{Claim, ClaimValueType, ClaimsPrincipal};
pub use properties::{TicketProperties, TokenUsage};
pub use protector::{AeadTicketProtector, TicketProtector};

/// 认证 ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationTicket {
    /// 身份主体
    pub principal: ClaimsPrincipal,

    /// 元数据
    pub properties: TicketProperties,

    /// 签发此 ticket 的认证方案
    pub authentication_scheme: String,
}

impl AuthenticationTicket {
    /// 创建新的 ticket
    pub fn new(
        principal: ClaimsPrincipal,
        properties: TicketProperties,
        authentication_scheme: impl Into<String>,
    ) -> Self {
        Self {
            principal,
            properties,
            authentication_scheme: authentication_scheme.into(),
        }
    }

    /// 当前用途
    pub fn usage(&self) -> Option<TokenUsage> {
        self.properties.usage()
    }
}
