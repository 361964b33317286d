//! 解析：授权码、access token、identity token、refresh token

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::events::{
    DeserializeAccessTokenContext, DeserializeAuthorizationCodeContext,
    DeserializeIdentityTokenContext, DeserializeRefreshTokenContext, Flow,
};
use super::options::TokenFormat;
use super::{TokenSerializer, ensure_usage};
use crate::error::Result;
use crate::message::OpenIdConnectRequest;
use crate::ticket::claims::claim_types;
use crate::ticket::{AuthenticationTicket, Claim, TicketProperties, TokenUsage};
use crate::token::{
    JwtSecurityToken, SecurityTokenHandler, TokenValidationParameters, ValidatedToken,
    registered_claims,
};

/// 还原元数据之后需要从 principal 中移除的协议 claims
const PROTOCOL_CLAIMS: &[&str] = &[
    registered_claims::ISSUER,
    registered_claims::AUDIENCE,
    registered_claims::EXPIRES_AT,
    registered_claims::NOT_BEFORE,
    registered_claims::ISSUED_AT,
    registered_claims::JWT_ID,
    registered_claims::AUTHORIZED_PARTY,
    registered_claims::NONCE,
    registered_claims::ACCESS_TOKEN_HASH,
    registered_claims::CODE_HASH,
    registered_claims::SCOPE,
    registered_claims::TOKEN_USAGE,
    registered_claims::CONFIDENTIAL,
];

impl TokenSerializer {
    /// 兑换授权码
    ///
    /// 缓存命中后立即删除条目再解密，同一个授权码第二次兑换返回 `None`。
    pub async fn deserialize_authorization_code(
        &self,
        code: &str,
        request: &OpenIdConnectRequest,
    ) -> Result<Option<AuthenticationTicket>> {
        let usage = TokenUsage::AuthorizationCode;
        let context = DeserializeAuthorizationCodeContext {
            code: code.to_string(),
            data_format: Some(self.options.protector(usage)),
        };
        let DeserializeAuthorizationCodeContext { code, data_format } = match self
            .options
            .events
            .deserialize_authorization_code(request, context)
            .await?
        {
            Flow::Handled(ticket) => return Ok(Some(ticket)),
            Flow::Continue(context) => context,
        };

        let Some(protector) = data_format else {
            debug!("no data format available, authorization code rejected");
            return Ok(None);
        };

        let payload = match self.options.cache.take(&code).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("authorization code not found in cache");
                return Ok(None);
            }
            Err(e) => {
                debug!(error = %e, "authorization code cache lookup failed");
                return Ok(None);
            }
        };

        let Ok(protected) = String::from_utf8(payload) else {
            debug!("cached authorization code payload is not valid UTF-8");
            return Ok(None);
        };
        let Some(ticket) = protector.unprotect(&protected) else {
            debug!("authorization code payload could not be decrypted");
            return Ok(None);
        };

        Ok(ensure_usage(ticket, usage))
    }

    /// 解析 access token
    pub async fn deserialize_access_token(
        &self,
        access_token: &str,
        request: &OpenIdConnectRequest,
    ) -> Result<Option<AuthenticationTicket>> {
        let usage = TokenUsage::AccessToken;
        let context = DeserializeAccessTokenContext {
            access_token: access_token.to_string(),
            format: Some(self.options.format(usage)),
            validation_parameters: self.validation_parameters(),
        };
        let DeserializeAccessTokenContext {
            access_token,
            format,
            validation_parameters,
        } = match self
            .options
            .events
            .deserialize_access_token(request, context)
            .await?
        {
            Flow::Handled(ticket) => return Ok(Some(ticket)),
            Flow::Continue(context) => context,
        };

        let ticket = self.read(&access_token, format, &validation_parameters)?;
        Ok(ticket.and_then(|ticket| ensure_usage(ticket, usage)))
    }

    /// 解析 identity token
    pub async fn deserialize_identity_token(
        &self,
        identity_token: &str,
        request: &OpenIdConnectRequest,
    ) -> Result<Option<AuthenticationTicket>> {
        let usage = TokenUsage::IdentityToken;
        let context = DeserializeIdentityTokenContext {
            identity_token: identity_token.to_string(),
            format: Some(self.options.format(usage)),
            validation_parameters: self.validation_parameters(),
        };
        let DeserializeIdentityTokenContext {
            identity_token,
            format,
            validation_parameters,
        } = match self
            .options
            .events
            .deserialize_identity_token(request, context)
            .await?
        {
            Flow::Handled(ticket) => return Ok(Some(ticket)),
            Flow::Continue(context) => context,
        };

        let ticket = self.read(&identity_token, format, &validation_parameters)?;
        Ok(ticket.and_then(|ticket| ensure_usage(ticket, usage)))
    }

    /// 解析 refresh token
    pub async fn deserialize_refresh_token(
        &self,
        refresh_token: &str,
        request: &OpenIdConnectRequest,
    ) -> Result<Option<AuthenticationTicket>> {
        let usage = TokenUsage::RefreshToken;
        let context = DeserializeRefreshTokenContext {
            refresh_token: refresh_token.to_string(),
            data_format: Some(self.options.protector(usage)),
        };
        let DeserializeRefreshTokenContext {
            refresh_token,
            data_format,
        } = match self
            .options
            .events
            .deserialize_refresh_token(request, context)
            .await?
        {
            Flow::Handled(ticket) => return Ok(Some(ticket)),
            Flow::Continue(context) => context,
        };

        let Some(protector) = data_format else {
            debug!("no data format available, refresh token rejected");
            return Ok(None);
        };
        let Some(ticket) = protector.unprotect(&refresh_token) else {
            debug!("refresh token could not be decrypted");
            return Ok(None);
        };

        Ok(ensure_usage(ticket, usage))
    }

    /// 验签参数：检查签发者与签名，不检查接收者与有效期
    fn validation_parameters(&self) -> TokenValidationParameters {
        TokenValidationParameters {
            valid_issuer: self.options.issuer.clone(),
            signing_credentials: self.options.signing_credentials.clone(),
            ..TokenValidationParameters::default()
        }
        .without_audience_validation()
        .without_lifetime_validation()
    }

    fn read(
        &self,
        token: &str,
        format: Option<TokenFormat>,
        parameters: &TokenValidationParameters,
    ) -> Result<Option<AuthenticationTicket>> {
        match format {
            None => {
                debug!("no token format available, token rejected");
                Ok(None)
            }
            Some(TokenFormat::Opaque(protector)) => {
                let ticket = protector.unprotect(token);
                if ticket.is_none() {
                    debug!("token could not be decrypted");
                }
                Ok(ticket)
            }
            Some(TokenFormat::Signed(handler)) => self.read_signed(&handler, token, parameters),
        }
    }

    fn read_signed(
        &self,
        handler: &Arc<dyn SecurityTokenHandler>,
        token: &str,
        parameters: &TokenValidationParameters,
    ) -> Result<Option<AuthenticationTicket>> {
        if !handler.can_read_token(token) {
            debug!("token is not a readable JWT");
            return Ok(None);
        }
        let Some(ValidatedToken {
            mut principal,
            token,
        }) = handler.validate_token(token, parameters)?
        else {
            return Ok(None);
        };

        for name in PROTOCOL_CLAIMS {
            principal.remove_claims(name);
        }
        // `scope` 同时还原为元数据和 principal 的 claims，每个授权范围一个 claim
        for scope in scope_values(&token) {
            principal.add_claim(Claim::new(claim_types::SCOPE, scope));
        }

        Ok(Some(AuthenticationTicket::new(
            principal,
            properties_from_token(&token),
            self.options.authentication_scheme.clone(),
        )))
    }
}

/// 由 JWT 的协议 claims 还原 ticket 元数据
fn properties_from_token(token: &JwtSecurityToken) -> TicketProperties {
    let mut properties = TicketProperties::new();
    properties.issued_at = token.timestamp(registered_claims::ISSUED_AT);
    properties.expires_at = token.timestamp(registered_claims::EXPIRES_AT);
    properties.ticket_id = token.claim_str(registered_claims::JWT_ID).map(str::to_string);
    properties.nonce = token.claim_str(registered_claims::NONCE).map(str::to_string);

    for audience in strings(token.claim(registered_claims::AUDIENCE)) {
        properties.add_audience(audience);
    }
    if let Some(presenter) = token.claim_str(registered_claims::AUTHORIZED_PARTY) {
        properties.add_presenter(presenter);
    }
    for scope in scope_values(token) {
        properties.add_scope(scope);
    }

    properties.confidential = match token.claim(registered_claims::CONFIDENTIAL) {
        Some(Value::Bool(confidential)) => *confidential,
        Some(Value::String(confidential)) => confidential.eq_ignore_ascii_case("true"),
        _ => false,
    };

    // 无法识别的用途保持未设置，随后的用途检查会拒绝该 token
    match token
        .claim_str(registered_claims::TOKEN_USAGE)
        .and_then(|usage| usage.parse::<TokenUsage>().ok())
    {
        Some(usage) => properties.with_usage(usage),
        None => properties,
    }
}

/// `scope` claim 中的授权范围，按出现顺序去重
fn scope_values(token: &JwtSecurityToken) -> Vec<&str> {
    let mut scopes: Vec<&str> = Vec::new();
    for scope in strings(token.claim(registered_claims::SCOPE))
        .into_iter()
        .flat_map(str::split_whitespace)
    {
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    scopes
}

/// 字符串或字符串数组
fn strings(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}
