//! 集成测试共用的配置与工具

#![allow(dead_code)]

use std::sync::Arc;

use oidcrs::crypto::SigningCredentials;
use oidcrs::serializer::{TokenSerializer, TokenSerializerOptions};
use oidcrs::token::JwtAlgorithm;
use oidcrs::{Clock, FixedClock, InMemoryTicketCache};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

pub const MASTER_KEY: &[u8] = b"integration-master-key-32-bytes!!";
pub const HMAC_SECRET: &[u8] = b"integration-hmac-secret-32-bytes!";
pub const ISSUER: &str = "https://server.example.com/";
pub const RSA_PEM: &[u8] = include_bytes!("../fixtures/rsa-2048.pem");
pub const CERT_DER: &[u8] = include_bytes!("../fixtures/cert.der");

/// 2023-11-14T22:13:20Z
pub const NOW: i64 = 1_700_000_000;

/// 安装日志输出，`RUST_LOG=oidcrs=debug` 时可以看到引擎日志
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn hmac_credentials() -> SigningCredentials {
    SigningCredentials::symmetric(HMAC_SECRET.to_vec(), JwtAlgorithm::HS256)
        .expect("HMAC credentials should be valid")
}

pub fn rsa_credentials() -> SigningCredentials {
    SigningCredentials::rsa_pem(RSA_PEM, JwtAlgorithm::RS256).expect("RSA credentials should be valid")
}

pub fn x509_credentials() -> SigningCredentials {
    SigningCredentials::x509(CERT_DER.to_vec(), RSA_PEM, JwtAlgorithm::RS256)
        .expect("X.509 credentials should be valid")
}

/// 固定时钟，缓存与序列化器共用
pub fn fixed_options() -> TokenSerializerOptions {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::from_timestamp(NOW));
    TokenSerializerOptions::new(MASTER_KEY)
        .expect("options should be valid")
        .with_issuer(ISSUER)
        .with_clock(clock.clone())
        .with_cache(Arc::new(InMemoryTicketCache::with_clock(clock)))
}

/// 默认配置：不透明 access token，HMAC 签名的 identity token
pub fn serializer() -> TokenSerializer {
    init_tracing();
    TokenSerializer::new(fixed_options().with_signing_credentials(hmac_credentials()))
        .expect("serializer should be valid")
}

/// access token 与 identity token 都签发为 JWT
pub fn jwt_serializer(credentials: SigningCredentials) -> TokenSerializer {
    init_tracing();
    TokenSerializer::new(
        fixed_options()
            .with_jwt_access_tokens()
            .with_signing_credentials(credentials),
    )
    .expect("serializer should be valid")
}

/// 不验签解码 JWT payload
pub fn jwt_payload(token: &str) -> Map<String, Value> {
    jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token)
        .expect("token should be a JWT")
        .claims
}

/// 解码 JWT 头部
pub fn jwt_header(token: &str) -> jsonwebtoken::Header {
    jsonwebtoken::decode_header(token).expect("token should be a JWT")
}
