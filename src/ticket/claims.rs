//! Claim 与身份主体
//!
//! 主体的 claims 是一个有序序列 `(type, value, value_type)`，同一类型可以出现多次，
//! 因此不能用 map 表示。每个 claim 可以带有 destination 标注，决定它能出现在哪种
//! token 里（见 [`ClaimsPrincipal::project`]）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TokenError};

/// 常用 claim 类型
pub mod claim_types {
    /// subject 标识
    pub const SUBJECT: &str = "sub";
    /// 名称标识，在没有 `sub` 时作为 subject 标识
    pub const NAME_IDENTIFIER: &str = "nameid";
    /// 显示名称
    pub const NAME: &str = "name";
    /// 邮箱
    pub const EMAIL: &str = "email";
    /// 角色
    pub const ROLE: &str = "role";
    /// 授权范围
    pub const SCOPE: &str = "scope";
    /// 委托方（actor）
    pub const ACTOR: &str = "act";
}

/// claim destination 标注
pub mod destinations {
    /// 允许出现在 access token 中
    pub const ACCESS_TOKEN: &str = "token";
    /// 允许出现在 identity token 中
    pub const IDENTITY_TOKEN: &str = "id_token";
}

/// claim 值的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimValueType {
    /// 字符串（默认）
    #[default]
    String,
    /// 整数
    Integer,
    /// 浮点数
    Double,
    /// 布尔值
    Boolean,
    /// JSON 对象或数组
    Json,
}

/// 一条 claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// claim 类型
    #[serde(rename = "type")]
    pub claim_type: String,

    /// claim 值（原始字符串形式）
    pub value: String,

    /// 值类型
    #[serde(default)]
    pub value_type: ClaimValueType,

    /// 允许携带此 claim 的 token 类型
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,
}

impl Claim {
    /// 创建字符串类型的 claim
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::typed(claim_type, value, ClaimValueType::String)
    }

    /// 创建指定值类型的 claim
    pub fn typed(
        claim_type: impl Into<String>,
        value: impl Into<String>,
        value_type: ClaimValueType,
    ) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            value_type,
            destinations: Vec::new(),
        }
    }

    /// 设置 destinations
    pub fn with_destinations<I, S>(mut self, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for destination in destinations {
            self.add_destination(destination);
        }
        self
    }

    /// 添加一个 destination（重复添加无效）
    pub fn add_destination(&mut self, destination: impl Into<String>) {
        let destination = destination.into();
        if !self.has_destination(&destination) {
            self.destinations.push(destination);
        }
    }

    /// 是否带有指定的 destination
    pub fn has_destination(&self, destination: &str) -> bool {
        self.destinations.iter().any(|d| d == destination)
    }

    /// 是否为 subject 标识 claim（`sub` 或名称标识）
    pub fn is_subject_identifier(&self) -> bool {
        self.claim_type == claim_types::SUBJECT || self.claim_type == claim_types::NAME_IDENTIFIER
    }

    /// 转换为 JSON 值，无法按声明类型解析时退化为字符串
    pub fn to_json(&self) -> Value {
        match self.value_type {
            ClaimValueType::String => Value::String(self.value.clone()),
            ClaimValueType::Integer => self
                .value
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(self.value.clone())),
            ClaimValueType::Double => self
                .value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(self.value.clone())),
            ClaimValueType::Boolean => match self.value.as_str() {
                "true" | "True" => Value::Bool(true),
                "false" | "False" => Value::Bool(false),
                _ => Value::String(self.value.clone()),
            },
            ClaimValueType::Json => serde_json::from_str(&self.value)
                .unwrap_or_else(|_| Value::String(self.value.clone())),
        }
    }

    /// 从 JSON 值还原 claims
    ///
    /// 数组会展开为多条同类型 claim，`null` 不产生 claim。
    pub fn from_json(claim_type: &str, value: &Value) -> Vec<Claim> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .flat_map(|item| match item {
                    Value::Array(_) => vec![Claim::typed(
                        claim_type,
                        item.to_string(),
                        ClaimValueType::Json,
                    )],
                    _ => Claim::from_json(claim_type, item),
                })
                .collect(),
            Value::String(s) => vec![Claim::new(claim_type, s.clone())],
            Value::Bool(b) => vec![Claim::typed(
                claim_type,
                b.to_string(),
                ClaimValueType::Boolean,
            )],
            Value::Number(n) if n.is_i64() || n.is_u64() => vec![Claim::typed(
                claim_type,
                n.to_string(),
                ClaimValueType::Integer,
            )],
            Value::Number(n) => vec![Claim::typed(
                claim_type,
                n.to_string(),
                ClaimValueType::Double,
            )],
            Value::Object(_) => vec![Claim::typed(
                claim_type,
                value.to_string(),
                ClaimValueType::Json,
            )],
        }
    }
}

/// 身份主体
///
/// 有序的 claims 序列，以及可选的一级委托方（actor）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    claims: Vec<Claim>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<Box<ClaimsPrincipal>>,
}

impl ClaimsPrincipal {
    /// 创建空主体
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 claims 创建主体
    pub fn from_claims(claims: impl IntoIterator<Item = Claim>) -> Self {
        Self {
            claims: claims.into_iter().collect(),
            actor: None,
        }
    }

    /// 添加 claim（构建器形式）
    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    /// 设置委托方（构建器形式）
    pub fn with_actor(mut self, actor: ClaimsPrincipal) -> Self {
        self.set_actor(Some(actor));
        self
    }

    /// 添加 claim
    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// 所有 claims
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// 委托方
    pub fn actor(&self) -> Option<&ClaimsPrincipal> {
        self.actor.as_deref()
    }

    /// 设置委托方，只保留一级委托
    pub fn set_actor(&mut self, actor: Option<ClaimsPrincipal>) {
        self.actor = actor.map(|mut actor| {
            actor.actor = None;
            Box::new(actor)
        });
    }

    /// 查找指定类型的所有 claims
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |c| c.claim_type == claim_type)
    }

    /// 查找指定类型的第一条 claim
    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    /// 获取指定类型第一条 claim 的值
    pub fn get_claim(&self, claim_type: &str) -> Option<&str> {
        self.find_first(claim_type).map(|c| c.value.as_str())
    }

    /// 是否包含指定类型的 claim
    pub fn has_claim(&self, claim_type: &str) -> bool {
        self.find_first(claim_type).is_some()
    }

    /// 删除指定类型的所有 claims，返回删除的数量
    pub fn remove_claims(&mut self, claim_type: &str) -> usize {
        let before = self.claims.len();
        self.claims.retain(|c| c.claim_type != claim_type);
        before - self.claims.len()
    }

    /// 按条件复制主体，委托方同样按条件过滤
    pub fn filter<F>(&self, predicate: F) -> ClaimsPrincipal
    where
        F: Fn(&Claim) -> bool,
    {
        self.filter_with(&predicate)
    }

    fn filter_with(&self, predicate: &dyn Fn(&Claim) -> bool) -> ClaimsPrincipal {
        ClaimsPrincipal {
            claims: self.claims.iter().filter(|&c| predicate(c)).cloned().collect(),
            actor: self
                .actor
                .as_ref()
                .map(|actor| Box::new(actor.filter_with(predicate))),
        }
    }

    /// 按 destination 投影
    ///
    /// claim 被保留当且仅当它是 subject 标识，或者带有指定的 destination。
    /// 返回新的主体，不修改原主体。
    pub fn project(&self, destination: &str) -> ClaimsPrincipal {
        self.filter(|claim| claim.is_subject_identifier() || claim.has_destination(destination))
    }

    /// 在缺少 `sub` 时把名称标识提升为 `sub`，并移除所有名称标识 claim
    pub fn promote_name_identifier(&mut self) {
        if !self.has_claim(claim_types::SUBJECT) {
            if let Some(name_identifier) = self.find_first(claim_types::NAME_IDENTIFIER).cloned() {
                let mut subject = Claim::new(claim_types::SUBJECT, name_identifier.value);
                subject.destinations = name_identifier.destinations;
                self.claims.insert(0, subject);
            }
        }
        self.remove_claims(claim_types::NAME_IDENTIFIER);
    }

    /// 解析唯一的 subject 标识
    ///
    /// # Errors
    ///
    /// - 没有 `sub` 也没有名称标识时返回 [`TokenError::MissingSubject`]
    /// - 存在多个不同的 `sub` 值时返回 [`TokenError::AmbiguousSubject`]
    pub fn resolve_subject(&self) -> Result<&str> {
        let mut subjects: Vec<&str> = Vec::new();
        for claim in self.find_all(claim_types::SUBJECT) {
            if !subjects.contains(&claim.value.as_str()) {
                subjects.push(claim.value.as_str());
            }
        }

        match subjects.as_slice() {
            [] => self
                .get_claim(claim_types::NAME_IDENTIFIER)
                .ok_or_else(|| TokenError::MissingSubject.into()),
            [subject] => Ok(*subject),
            many => Err(TokenError::AmbiguousSubject(many.len()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample_principal() -> ClaimsPrincipal {
        ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "u1"))
            .with_claim(Claim::new(claim_types::NAME, "Alice").with_destinations([
                destinations::ACCESS_TOKEN,
                destinations::IDENTITY_TOKEN,
            ]))
            .with_claim(
                Claim::new(claim_types::EMAIL, "alice@example.com")
                    .with_destinations([destinations::IDENTITY_TOKEN]),
            )
            .with_claim(
                Claim::new(claim_types::ROLE, "admin").with_destinations([destinations::ACCESS_TOKEN]),
            )
            .with_claim(Claim::new("internal", "secret"))
    }

    fn types(principal: &ClaimsPrincipal) -> Vec<&str> {
        principal
            .claims()
            .iter()
            .map(|c| c.claim_type.as_str())
            .collect()
    }

    #[test]
    fn test_project_access_token() {
        let projected = sample_principal().project(destinations::ACCESS_TOKEN);
        assert_eq!(types(&projected), vec!["sub", "name", "role"]);
    }

    #[test]
    fn test_project_identity_token() {
        let projected = sample_principal().project(destinations::IDENTITY_TOKEN);
        assert_eq!(types(&projected), vec!["sub", "name", "email"]);
    }

    #[test]
    fn test_project_does_not_mutate_source() {
        let principal = sample_principal();
        let _ = principal.project(destinations::ACCESS_TOKEN);
        assert_eq!(principal.claims().len(), 5);
    }

    #[test]
    fn test_project_applies_to_actor() {
        let actor = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "service"))
            .with_claim(Claim::new("client", "c1").with_destinations([destinations::ACCESS_TOKEN]))
            .with_claim(Claim::new("hidden", "x"));
        let principal = sample_principal().with_actor(actor);

        let projected = principal.project(destinations::ACCESS_TOKEN);
        let actor = projected.actor().unwrap();
        assert_eq!(types(actor), vec!["sub", "client"]);
    }

    #[test]
    fn test_actor_is_single_level() {
        let inner = ClaimsPrincipal::new().with_claim(Claim::new(claim_types::SUBJECT, "inner"));
        let actor = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "outer"))
            .with_actor(inner);
        let principal = ClaimsPrincipal::new().with_actor(actor);

        assert!(principal.actor().unwrap().actor().is_none());
    }

    #[test]
    fn test_name_identifier_survives_projection() {
        let principal = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::NAME_IDENTIFIER, "u1"))
            .with_claim(Claim::new("other", "x"));
        let projected = principal.project(destinations::IDENTITY_TOKEN);
        assert_eq!(types(&projected), vec!["nameid"]);
    }

    #[test]
    fn test_promote_name_identifier() {
        let mut principal = ClaimsPrincipal::new()
            .with_claim(Claim::new("name", "Alice"))
            .with_claim(Claim::new(claim_types::NAME_IDENTIFIER, "u1"));
        principal.promote_name_identifier();

        assert_eq!(principal.get_claim(claim_types::SUBJECT), Some("u1"));
        assert!(!principal.has_claim(claim_types::NAME_IDENTIFIER));
    }

    #[test]
    fn test_promote_keeps_existing_subject() {
        let mut principal = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "u1"))
            .with_claim(Claim::new(claim_types::NAME_IDENTIFIER, "other"));
        principal.promote_name_identifier();

        assert_eq!(principal.find_all(claim_types::SUBJECT).count(), 1);
        assert_eq!(principal.get_claim(claim_types::SUBJECT), Some("u1"));
        assert!(!principal.has_claim(claim_types::NAME_IDENTIFIER));
    }

    #[test]
    fn test_resolve_subject() {
        assert_eq!(sample_principal().resolve_subject().unwrap(), "u1");

        let missing = ClaimsPrincipal::new().with_claim(Claim::new("name", "Alice"));
        assert!(matches!(
            missing.resolve_subject(),
            Err(Error::Token(TokenError::MissingSubject))
        ));

        let ambiguous = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "a"))
            .with_claim(Claim::new(claim_types::SUBJECT, "b"));
        assert!(matches!(
            ambiguous.resolve_subject(),
            Err(Error::Token(TokenError::AmbiguousSubject(2)))
        ));

        // 重复但相同的值不算歧义
        let duplicated = ClaimsPrincipal::new()
            .with_claim(Claim::new(claim_types::SUBJECT, "a"))
            .with_claim(Claim::new(claim_types::SUBJECT, "a"));
        assert_eq!(duplicated.resolve_subject().unwrap(), "a");
    }

    #[test]
    fn test_claim_json_conversion() {
        let age = Claim::typed("age", "42", ClaimValueType::Integer);
        assert_eq!(age.to_json(), serde_json::json!(42));

        let verified = Claim::typed("email_verified", "true", ClaimValueType::Boolean);
        assert_eq!(verified.to_json(), serde_json::json!(true));

        let address = Claim::typed("address", r#"{"country":"NL"}"#, ClaimValueType::Json);
        assert_eq!(address.to_json(), serde_json::json!({"country": "NL"}));

        let broken = Claim::typed("age", "not-a-number", ClaimValueType::Integer);
        assert_eq!(broken.to_json(), serde_json::json!("not-a-number"));
    }

    #[test]
    fn test_claims_from_json() {
        let claims = Claim::from_json("role", &serde_json::json!(["admin", "user"]));
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[1].value, "user");

        let claims = Claim::from_json("age", &serde_json::json!(42));
        assert_eq!(claims[0].value_type, ClaimValueType::Integer);

        let claims = Claim::from_json("address", &serde_json::json!({"country": "NL"}));
        assert_eq!(claims[0].value_type, ClaimValueType::Json);
        assert_eq!(claims[0].to_json(), serde_json::json!({"country": "NL"}));

        assert!(Claim::from_json("nothing", &serde_json::Value::Null).is_empty());
    }
}
