//! 签发：授权码、access token、identity token、refresh token

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::events::{
    Flow, SerializeAccessTokenContext, SerializeAuthorizationCodeContext,
    SerializeIdentityTokenContext, SerializeRefreshTokenContext,
};
use super::options::TokenFormat;
use super::{TokenSerializer, restamp_usage};
use crate::crypto::{SigningCredentials, resolve_key_identifiers, token_hash};
use crate::error::Result;
use crate::message::{OpenIdConnectRequest, OpenIdConnectResponse};
use crate::random::{generate_authorization_code_key, generate_ticket_id};
use crate::ticket::claims::claim_types;
use crate::ticket::properties::items;
use crate::ticket::{AuthenticationTicket, ClaimsPrincipal, TicketProperties, TokenUsage};
use crate::token::{JwtSecurityToken, SecurityTokenHandler, TokenDescriptor, registered_claims};

impl TokenSerializer {
    /// 签发授权码
    ///
    /// 加密后的 ticket 存入缓存，返回的授权码只是随机缓存键。principal 不做投影。
    /// 授权请求中的 nonce、redirect_uri 与 PKCE 参数会保存在 ticket 中。
    pub async fn serialize_authorization_code(
        &self,
        principal: &ClaimsPrincipal,
        properties: &TicketProperties,
        request: &OpenIdConnectRequest,
        response: &OpenIdConnectResponse,
    ) -> Result<Option<String>> {
        let usage = TokenUsage::AuthorizationCode;
        let mut ticket = self.prepare_ticket(principal.clone(), properties, usage, request);

        if let Some(nonce) = &request.nonce {
            ticket.properties.nonce = Some(nonce.clone());
        }
        for (key, value) in [
            (items::REDIRECT_URI, &request.redirect_uri),
            (items::CODE_CHALLENGE, &request.code_challenge),
            (items::CODE_CHALLENGE_METHOD, &request.code_challenge_method),
        ] {
            if let Some(value) = value {
                ticket.properties.set_item(key, value.clone());
            }
        }

        let context = SerializeAuthorizationCodeContext {
            ticket,
            data_format: Some(self.options.protector(usage)),
        };
        let context = match self
            .options
            .events
            .serialize_authorization_code(request, response, context)
            .await?
        {
            Flow::Handled(code) => return Ok(Some(code)),
            Flow::Continue(context) => context,
        };

        let SerializeAuthorizationCodeContext {
            mut ticket,
            data_format,
        } = context;
        if !restamp_usage(&mut ticket, usage) {
            return Ok(None);
        }
        let Some(protector) = data_format else {
            debug!("no data format available, authorization code not issued");
            return Ok(None);
        };

        let protected = protector.protect(&ticket)?;
        let key = generate_authorization_code_key()?;
        let expires_at = ticket
            .properties
            .expires_at
            .unwrap_or_else(|| self.options.clock.now() + self.options.lifetime(usage));
        self.options
            .cache
            .set(&key, protected.into_bytes(), expires_at)
            .await?;

        debug!(
            ticket_id = ?ticket.properties.ticket_id,
            expires_at = %expires_at,
            "authorization code issued"
        );
        Ok(Some(key))
    }

    /// 签发 access token
    ///
    /// principal 按 `token` destination 投影。配置了签名处理器时签发 JWT，否则加密。
    pub async fn serialize_access_token(
        &self,
        principal: &ClaimsPrincipal,
        properties: &TicketProperties,
        request: &OpenIdConnectRequest,
        response: &OpenIdConnectResponse,
    ) -> Result<Option<String>> {
        let usage = TokenUsage::AccessToken;
        let ticket = self.prepare_ticket(project(principal, usage), properties, usage, request);

        let context = SerializeAccessTokenContext {
            ticket,
            format: Some(self.options.format(usage)),
            issuer: self.options.issuer.clone(),
            signing_credentials: self.options.signing_credentials.first().cloned(),
        };
        let context = match self
            .options
            .events
            .serialize_access_token(request, response, context)
            .await?
        {
            Flow::Handled(token) => return Ok(Some(token)),
            Flow::Continue(context) => context,
        };

        let SerializeAccessTokenContext {
            mut ticket,
            format,
            issuer,
            signing_credentials,
        } = context;
        if !restamp_usage(&mut ticket, usage) {
            return Ok(None);
        }

        match format {
            None => {
                debug!("no token format available, access token not issued");
                Ok(None)
            }
            Some(TokenFormat::Opaque(protector)) => protector.protect(&ticket).map(Some),
            Some(TokenFormat::Signed(handler)) => {
                let Some(credentials) = signing_credentials else {
                    error!("signed access tokens require signing credentials");
                    return Ok(None);
                };
                let mut token = create_signed_token(&handler, &ticket, issuer, &credentials)?;
                let scopes = granted_scopes(&ticket);
                if !scopes.is_empty() {
                    token.set_claim(registered_claims::SCOPE, scopes.join(" "));
                }
                write_signed_token(&handler, token, &credentials).map(Some)
            }
        }
    }

    /// 签发 identity token
    ///
    /// principal 按 `id_token` destination 投影，并且必须能解析出唯一的 subject。
    /// 响应中已有授权码或 access token 时写入 `c_hash` / `at_hash`。
    pub async fn serialize_identity_token(
        &self,
        principal: &ClaimsPrincipal,
        properties: &TicketProperties,
        request: &OpenIdConnectRequest,
        response: &OpenIdConnectResponse,
    ) -> Result<Option<String>> {
        let usage = TokenUsage::IdentityToken;
        let mut ticket = self.prepare_ticket(project(principal, usage), properties, usage, request);

        // 兑换授权码时沿用授权请求的 nonce，其他情况下只使用当前请求的 nonce
        let nonce = if request.is_authorization_code_grant_type() {
            ticket.properties.nonce.clone()
        } else {
            request.nonce.clone()
        };
        ticket.properties.nonce = nonce.clone();

        let context = SerializeIdentityTokenContext {
            ticket,
            format: Some(self.options.format(usage)),
            issuer: self.options.issuer.clone(),
            signing_credentials: self.options.signing_credentials.first().cloned(),
            access_token_hash: response.access_token.as_deref().map(token_hash),
            authorization_code_hash: response.code.as_deref().map(token_hash),
            nonce,
        };
        let context = match self
            .options
            .events
            .serialize_identity_token(request, response, context)
            .await?
        {
            Flow::Handled(token) => return Ok(Some(token)),
            Flow::Continue(context) => context,
        };

        let SerializeIdentityTokenContext {
            mut ticket,
            format,
            issuer,
            signing_credentials,
            access_token_hash,
            authorization_code_hash,
            nonce,
        } = context;
        if !restamp_usage(&mut ticket, usage) {
            return Ok(None);
        }
        if let Err(e) = ticket.principal.resolve_subject() {
            error!(error = %e, "identity token not issued");
            return Ok(None);
        }
        ticket.properties.nonce = nonce;

        match format {
            None => {
                debug!("no token format available, identity token not issued");
                Ok(None)
            }
            Some(TokenFormat::Opaque(protector)) => protector.protect(&ticket).map(Some),
            Some(TokenFormat::Signed(handler)) => {
                let Some(credentials) = signing_credentials else {
                    error!("signed identity tokens require signing credentials");
                    return Ok(None);
                };
                let mut token = create_signed_token(&handler, &ticket, issuer, &credentials)?;
                for (name, value) in [
                    (registered_claims::NONCE, &ticket.properties.nonce),
                    (registered_claims::ACCESS_TOKEN_HASH, &access_token_hash),
                    (registered_claims::CODE_HASH, &authorization_code_hash),
                ] {
                    if let Some(value) = value {
                        token.set_claim(name, value.clone());
                    }
                }
                write_signed_token(&handler, token, &credentials).map(Some)
            }
        }
    }

    /// 签发 refresh token
    ///
    /// principal 不做投影，输出总是加密的不透明字符串。
    pub async fn serialize_refresh_token(
        &self,
        principal: &ClaimsPrincipal,
        properties: &TicketProperties,
        request: &OpenIdConnectRequest,
        response: &OpenIdConnectResponse,
    ) -> Result<Option<String>> {
        let usage = TokenUsage::RefreshToken;
        let ticket = self.prepare_ticket(principal.clone(), properties, usage, request);

        let context = SerializeRefreshTokenContext {
            ticket,
            data_format: Some(self.options.protector(usage)),
        };
        let context = match self
            .options
            .events
            .serialize_refresh_token(request, response, context)
            .await?
        {
            Flow::Handled(token) => return Ok(Some(token)),
            Flow::Continue(context) => context,
        };

        let SerializeRefreshTokenContext {
            mut ticket,
            data_format,
        } = context;
        if !restamp_usage(&mut ticket, usage) {
            return Ok(None);
        }
        let Some(protector) = data_format else {
            debug!("no data format available, refresh token not issued");
            return Ok(None);
        };

        protector.protect(&ticket).map(Some)
    }

    /// 构建新的 ticket：补全有效期与 ticket 标识，标记用途，添加默认出示方
    fn prepare_ticket(
        &self,
        principal: ClaimsPrincipal,
        properties: &TicketProperties,
        usage: TokenUsage,
        request: &OpenIdConnectRequest,
    ) -> AuthenticationTicket {
        let mut properties = properties.fork().with_usage(usage);
        properties.stamp_lifetime(self.options.clock.now(), self.options.lifetime(usage));
        properties.ticket_id.get_or_insert_with(generate_ticket_id);

        let mut ticket = AuthenticationTicket::new(
            principal,
            properties,
            self.options.authentication_scheme.clone(),
        );

        if let Some(client_id) = &request.client_id {
            if usage == TokenUsage::IdentityToken {
                ticket.properties.add_audience(client_id.clone());
            }
            ticket.properties.add_presenter(client_id.clone());
        }

        ticket
    }
}

/// 按用途投影 principal，并把名称标识规范化为 `sub`
fn project(principal: &ClaimsPrincipal, usage: TokenUsage) -> ClaimsPrincipal {
    let mut projected = match usage.destination() {
        Some(destination) => principal.project(destination),
        None => principal.clone(),
    };
    projected.promote_name_identifier();
    projected
}

/// JWT 中唯一的 `scope` claim：principal 的 `scope` claims 在前，其余 ticket 授权范围在后
fn granted_scopes(ticket: &AuthenticationTicket) -> Vec<&str> {
    let mut scopes: Vec<&str> = Vec::new();
    let claimed = ticket
        .principal
        .find_all(claim_types::SCOPE)
        .flat_map(|claim| claim.value.split_whitespace());
    for scope in claimed.chain(ticket.properties.scopes.iter().map(String::as_str)) {
        if !scopes.contains(&scope) {
            scopes.push(scope);
        }
    }
    scopes
}

/// 创建签名 token 并写入 access token 与 identity token 共有的 claims
fn create_signed_token(
    handler: &Arc<dyn SecurityTokenHandler>,
    ticket: &AuthenticationTicket,
    issuer: Option<String>,
    credentials: &SigningCredentials,
) -> Result<JwtSecurityToken> {
    let properties = &ticket.properties;
    let descriptor = TokenDescriptor {
        subject: ticket.principal.clone(),
        issuer,
        signing_credentials: credentials.clone(),
        issued_at: properties.issued_at,
        not_before: properties.issued_at,
        expires: properties.expires_at,
    };
    let mut token = handler.create_token(descriptor)?;

    if let Some(usage) = properties.usage() {
        token.set_claim(registered_claims::TOKEN_USAGE, usage.as_str());
    }
    if let Some(ticket_id) = &properties.ticket_id {
        token.set_claim(registered_claims::JWT_ID, ticket_id.clone());
    }
    if properties.confidential {
        token.set_claim(registered_claims::CONFIDENTIAL, true);
    }

    match properties.audiences.as_slice() {
        [] => {}
        [audience] => token.set_claim(registered_claims::AUDIENCE, audience.clone()),
        audiences => token.set_claim(
            registered_claims::AUDIENCE,
            Value::from(audiences.to_vec()),
        ),
    }

    // JWT 只能携带一个 azp
    if let Some(presenter) = properties.presenters.first() {
        if properties.presenters.len() > 1 {
            warn!(
                presenters = properties.presenters.len(),
                kept = %presenter,
                "multiple presenters associated with the ticket, only the first one is kept"
            );
        }
        token.set_claim(registered_claims::AUTHORIZED_PARTY, presenter.clone());
    }

    Ok(token)
}

fn write_signed_token(
    handler: &Arc<dyn SecurityTokenHandler>,
    mut token: JwtSecurityToken,
    credentials: &SigningCredentials,
) -> Result<String> {
    resolve_key_identifiers(credentials, &mut token.header);
    handler.write_token(&token)
}
