//! 集成测试：扩展点
//!
//! 测试宿主程序通过 [`TokenEvents`] 检查、修改或接管序列化与反序列化。

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{fixed_options, hmac_credentials, jwt_payload};
use oidcrs::error::{Error, Result};
use oidcrs::message::{OpenIdConnectRequest, OpenIdConnectResponse};
use oidcrs::serializer::{
    DeserializeAccessTokenContext, DeserializeAuthorizationCodeContext,
    DeserializeIdentityTokenContext, DeserializeRefreshTokenContext, Flow,
    SerializeAccessTokenContext, SerializeAuthorizationCodeContext, SerializeIdentityTokenContext,
    SerializeRefreshTokenContext, TokenEvents, TokenSerializer,
};
use oidcrs::ticket::{AuthenticationTicket, Claim, ClaimsPrincipal, TicketProperties, TokenUsage};

fn principal() -> ClaimsPrincipal {
    ClaimsPrincipal::new().with_claim(Claim::new("sub", "u1"))
}

fn request() -> OpenIdConnectRequest {
    OpenIdConnectRequest::new().with_client_id("c1")
}

fn serializer_with(events: Arc<dyn TokenEvents>) -> TokenSerializer {
    common::init_tracing();
    TokenSerializer::new(
        fixed_options()
            .with_jwt_access_tokens()
            .with_signing_credentials(hmac_credentials())
            .with_events(events),
    )
    .expect("serializer should be valid")
}

fn ticket_of(usage: TokenUsage, subject: &str) -> AuthenticationTicket {
    let mut properties = TicketProperties::new();
    properties.set_usage(usage).expect("usage should be settable");
    AuthenticationTicket::new(
        ClaimsPrincipal::new().with_claim(Claim::new("sub", subject)),
        properties,
        "OpenIdConnectServer",
    )
}

// ============================================================================
// 接管
// ============================================================================

/// 所有签发操作都返回固定字符串
struct HandleEverything {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenEvents for HandleEverything {
    async fn serialize_authorization_code(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        _context: SerializeAuthorizationCodeContext,
    ) -> Result<Flow<SerializeAuthorizationCodeContext, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled("custom-code".to_string()))
    }

    async fn serialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        _context: SerializeAccessTokenContext,
    ) -> Result<Flow<SerializeAccessTokenContext, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled("custom-access-token".to_string()))
    }

    async fn serialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        _context: SerializeIdentityTokenContext,
    ) -> Result<Flow<SerializeIdentityTokenContext, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled("custom-id-token".to_string()))
    }

    async fn serialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        _context: SerializeRefreshTokenContext,
    ) -> Result<Flow<SerializeRefreshTokenContext, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled("custom-refresh-token".to_string()))
    }

    async fn deserialize_authorization_code(
        &self,
        _request: &OpenIdConnectRequest,
        _context: DeserializeAuthorizationCodeContext,
    ) -> Result<Flow<DeserializeAuthorizationCodeContext, AuthenticationTicket>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled(ticket_of(TokenUsage::AuthorizationCode, "from-hook")))
    }

    async fn deserialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        _context: DeserializeAccessTokenContext,
    ) -> Result<Flow<DeserializeAccessTokenContext, AuthenticationTicket>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled(ticket_of(TokenUsage::AccessToken, "from-hook")))
    }

    async fn deserialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        _context: DeserializeIdentityTokenContext,
    ) -> Result<Flow<DeserializeIdentityTokenContext, AuthenticationTicket>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled(ticket_of(TokenUsage::IdentityToken, "from-hook")))
    }

    async fn deserialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        _context: DeserializeRefreshTokenContext,
    ) -> Result<Flow<DeserializeRefreshTokenContext, AuthenticationTicket>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Handled(ticket_of(TokenUsage::RefreshToken, "from-hook")))
    }
}

/// 测试签发操作被扩展点接管
#[tokio::test]
async fn test_handled_serialization_short_circuits() {
    let events = Arc::new(HandleEverything {
        calls: AtomicUsize::new(0),
    });
    let serializer = serializer_with(events.clone());
    let properties = TicketProperties::new();
    let response = OpenIdConnectResponse::new();
    // 没有 subject 的主体也会被接管，默认逻辑中的检查不会执行
    let anonymous = ClaimsPrincipal::new();

    let code = serializer
        .serialize_authorization_code(&anonymous, &properties, &request(), &response)
        .await
        .expect("code serialization should succeed");
    let access_token = serializer
        .serialize_access_token(&anonymous, &properties, &request(), &response)
        .await
        .expect("access token serialization should succeed");
    let id_token = serializer
        .serialize_identity_token(&anonymous, &properties, &request(), &response)
        .await
        .expect("identity token serialization should succeed");
    let refresh_token = serializer
        .serialize_refresh_token(&anonymous, &properties, &request(), &response)
        .await
        .expect("refresh token serialization should succeed");

    assert_eq!(code.as_deref(), Some("custom-code"));
    assert_eq!(access_token.as_deref(), Some("custom-access-token"));
    assert_eq!(id_token.as_deref(), Some("custom-id-token"));
    assert_eq!(refresh_token.as_deref(), Some("custom-refresh-token"));
    assert_eq!(events.calls.load(Ordering::SeqCst), 4);

    // 授权码被接管时不会写入缓存
    assert!(
        serializer
            .options()
            .cache
            .get("custom-code")
            .await
            .expect("cache read should succeed")
            .is_none()
    );
}

/// 测试解析操作被扩展点接管，即使输入不是有效的 token
#[tokio::test]
async fn test_handled_deserialization_returns_hook_ticket() {
    let events = Arc::new(HandleEverything {
        calls: AtomicUsize::new(0),
    });
    let serializer = serializer_with(events.clone());

    let code = serializer
        .deserialize_authorization_code("garbage", &request())
        .await
        .expect("code deserialization should succeed")
        .expect("hook should provide a ticket");
    let access = serializer
        .deserialize_access_token("garbage", &request())
        .await
        .expect("access token deserialization should succeed")
        .expect("hook should provide a ticket");
    let identity = serializer
        .deserialize_identity_token("garbage", &request())
        .await
        .expect("identity token deserialization should succeed")
        .expect("hook should provide a ticket");
    let refresh = serializer
        .deserialize_refresh_token("garbage", &request())
        .await
        .expect("refresh token deserialization should succeed")
        .expect("hook should provide a ticket");

    for ticket in [&code, &access, &identity, &refresh] {
        assert_eq!(ticket.principal.get_claim("sub"), Some("from-hook"));
    }
    assert_eq!(code.usage(), Some(TokenUsage::AuthorizationCode));
    assert_eq!(refresh.usage(), Some(TokenUsage::RefreshToken));
    assert_eq!(events.calls.load(Ordering::SeqCst), 4);
}

// ============================================================================
// 修改上下文
// ============================================================================

/// 补充受众、出示方与授权范围，并替换授权码
struct Enrich;

#[async_trait]
impl TokenEvents for Enrich {
    async fn serialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        mut context: SerializeAccessTokenContext,
    ) -> Result<Flow<SerializeAccessTokenContext, String>> {
        context.ticket.properties.add_audience("resource-server");
        context.ticket.properties.add_presenter("gateway");
        context.ticket.properties.add_scope("hooked");
        context.issuer = Some("https://hooked.example.com/".to_string());
        Ok(Flow::Continue(context))
    }

    async fn serialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        mut context: SerializeIdentityTokenContext,
    ) -> Result<Flow<SerializeIdentityTokenContext, String>> {
        context.nonce = Some("hooked-nonce".to_string());
        context.access_token_hash = None;
        Ok(Flow::Continue(context))
    }

    async fn deserialize_authorization_code(
        &self,
        _request: &OpenIdConnectRequest,
        mut context: DeserializeAuthorizationCodeContext,
    ) -> Result<Flow<DeserializeAuthorizationCodeContext, AuthenticationTicket>> {
        // 客户端出示 "alias:<code>"
        if let Some(code) = context.code.strip_prefix("alias:") {
            context.code = code.to_string();
        }
        Ok(Flow::Continue(context))
    }
}

/// 测试扩展点修改 access token 的元数据与签发者
#[tokio::test]
async fn test_hook_enriches_access_token() {
    let serializer = serializer_with(Arc::new(Enrich));

    let token = serializer
        .serialize_access_token(&principal(), &TicketProperties::new(), &request(), &OpenIdConnectResponse::new())
        .await
        .expect("access token serialization should succeed")
        .expect("access token should be issued");

    let payload = jwt_payload(&token);
    assert_eq!(payload["aud"], "resource-server");
    // 客户端在扩展点之前已经是第一个出示方
    assert_eq!(payload["azp"], "c1");
    assert_eq!(payload["scope"], "hooked");
    assert_eq!(payload["iss"], "https://hooked.example.com/");

    // 签发者被替换，本服务不再接受该 token
    let ticket = serializer
        .deserialize_access_token(&token, &request())
        .await
        .expect("access token deserialization should succeed");
    assert!(ticket.is_none());
}

/// 测试扩展点替换 nonce 与哈希
#[tokio::test]
async fn test_hook_overrides_identity_token_values() {
    let serializer = serializer_with(Arc::new(Enrich));
    let response = OpenIdConnectResponse::new().with_access_token("at");

    let token = serializer
        .serialize_identity_token(&principal(), &TicketProperties::new(), &request().with_nonce("original"), &response)
        .await
        .expect("identity token serialization should succeed")
        .expect("identity token should be issued");

    let payload = jwt_payload(&token);
    assert_eq!(payload["nonce"], "hooked-nonce");
    assert!(!payload.contains_key("at_hash"));
}

/// 测试扩展点改写客户端出示的授权码
#[tokio::test]
async fn test_hook_rewrites_presented_code() {
    let serializer = serializer_with(Arc::new(Enrich));

    let code = serializer
        .serialize_authorization_code(&principal(), &TicketProperties::new(), &request(), &OpenIdConnectResponse::new())
        .await
        .expect("code serialization should succeed")
        .expect("code should be issued");

    let ticket = serializer
        .deserialize_authorization_code(&format!("alias:{code}"), &request())
        .await
        .expect("code deserialization should succeed");
    assert!(ticket.is_some());
}

// ============================================================================
// 拒绝
// ============================================================================

/// 把所有格式置空，不提供结果
struct NoFormats;

#[async_trait]
impl TokenEvents for NoFormats {
    async fn serialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        mut context: SerializeAccessTokenContext,
    ) -> Result<Flow<SerializeAccessTokenContext, String>> {
        context.format = None;
        Ok(Flow::Continue(context))
    }

    async fn serialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        mut context: SerializeRefreshTokenContext,
    ) -> Result<Flow<SerializeRefreshTokenContext, String>> {
        context.data_format = None;
        Ok(Flow::Continue(context))
    }

    async fn deserialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        mut context: DeserializeIdentityTokenContext,
    ) -> Result<Flow<DeserializeIdentityTokenContext, AuthenticationTicket>> {
        context.format = None;
        Ok(Flow::Continue(context))
    }
}

/// 测试格式被置空时不签发，也不解析
#[tokio::test]
async fn test_hook_can_suppress_tokens() {
    let serializer = serializer_with(Arc::new(NoFormats));
    let response = OpenIdConnectResponse::new();

    let access_token = serializer
        .serialize_access_token(&principal(), &TicketProperties::new(), &request(), &response)
        .await
        .expect("access token serialization should succeed");
    assert!(access_token.is_none());

    let refresh_token = serializer
        .serialize_refresh_token(&principal(), &TicketProperties::new(), &request(), &response)
        .await
        .expect("refresh token serialization should succeed");
    assert!(refresh_token.is_none());

    let id_token = serializer
        .serialize_identity_token(&principal(), &TicketProperties::new(), &request(), &response)
        .await
        .expect("identity token serialization should succeed")
        .expect("identity token should be issued");
    let ticket = serializer
        .deserialize_identity_token(&id_token, &request())
        .await
        .expect("identity token deserialization should succeed");
    assert!(ticket.is_none());
}

/// 把 ticket 换成其他用途或移除 subject
struct SwapTickets;

#[async_trait]
impl TokenEvents for SwapTickets {
    async fn serialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        mut context: SerializeRefreshTokenContext,
    ) -> Result<Flow<SerializeRefreshTokenContext, String>> {
        context.ticket = ticket_of(TokenUsage::AccessToken, "u1");
        Ok(Flow::Continue(context))
    }

    async fn serialize_identity_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        mut context: SerializeIdentityTokenContext,
    ) -> Result<Flow<SerializeIdentityTokenContext, String>> {
        context.ticket.principal.remove_claims("sub");
        Ok(Flow::Continue(context))
    }
}

/// 测试扩展点替换的 ticket 仍然受到用途与 subject 检查
#[tokio::test]
async fn test_swapped_tickets_are_checked() {
    let serializer = serializer_with(Arc::new(SwapTickets));
    let response = OpenIdConnectResponse::new();

    let refresh_token = serializer
        .serialize_refresh_token(&principal(), &TicketProperties::new(), &request(), &response)
        .await
        .expect("refresh token serialization should succeed");
    assert!(refresh_token.is_none(), "a ticket of another usage must not be issued");

    let id_token = serializer
        .serialize_identity_token(&principal(), &TicketProperties::new(), &request(), &response)
        .await
        .expect("identity token serialization should succeed");
    assert!(id_token.is_none(), "the subject is checked after the hook");
}

// ============================================================================
// 错误传播
// ============================================================================

/// 扩展点自身失败
struct Failing;

#[async_trait]
impl TokenEvents for Failing {
    async fn serialize_access_token(
        &self,
        _request: &OpenIdConnectRequest,
        _response: &OpenIdConnectResponse,
        _context: SerializeAccessTokenContext,
    ) -> Result<Flow<SerializeAccessTokenContext, String>> {
        Err(Error::storage("policy store unavailable"))
    }

    async fn deserialize_refresh_token(
        &self,
        _request: &OpenIdConnectRequest,
        _context: DeserializeRefreshTokenContext,
    ) -> Result<Flow<DeserializeRefreshTokenContext, AuthenticationTicket>> {
        Err(Error::storage("revocation list unavailable"))
    }
}

/// 测试扩展点的错误原样传播给调用方
#[tokio::test]
async fn test_hook_errors_propagate() {
    let serializer = serializer_with(Arc::new(Failing));

    let result = serializer
        .serialize_access_token(&principal(), &TicketProperties::new(), &request(), &OpenIdConnectResponse::new())
        .await;
    assert!(matches!(result, Err(Error::Storage(_))));

    let result = serializer.deserialize_refresh_token("anything", &request()).await;
    assert!(matches!(result, Err(Error::Storage(_))));

    // 没有覆盖的扩展点保持默认行为
    let refresh_token = serializer
        .serialize_refresh_token(&principal(), &TicketProperties::new(), &request(), &OpenIdConnectResponse::new())
        .await
        .expect("refresh token serialization should succeed");
    assert!(refresh_token.is_some());
}
