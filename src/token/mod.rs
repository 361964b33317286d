//! Token 模块
//!
//! 签名 token 的处理器接口与基于 `jsonwebtoken` 的默认实现。
//!
//! ## 子模块
//!
//! - **jwt**: `SecurityTokenHandler` 接口、`JwtTokenHandler`、验证参数以及
//!   claims 与 JWT payload 之间的映射

pub mod jwt;

pub use jwt::{
    JwtAlgorithm, JwtSecurityToken, JwtTokenHandler, SecurityTokenHandler, TokenDescriptor,
    TokenValidationParameters, ValidatedToken, registered_claims,
};
