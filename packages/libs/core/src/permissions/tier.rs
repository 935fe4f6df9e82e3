//! 가시성 Tier와 operation 규칙
//!
//! 각 리소스는 Public / Authed / Private 세 tier 블록을 독립적으로
//! 선언합니다. Tier는 상속 관계가 아니며, 머지는 tier별 규칙의
//! 합집합입니다 (충돌은 컴파일 에러 — `table` 모듈 참조).

use serde::{Deserialize, Serialize};

use super::clause::Clause;

/// CRUD 작업 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// 생성
    Post,
    /// 단건 조회
    Get,
    /// 목록 조회
    List,
    /// 부분 수정
    Patch,
    /// 전체 교체
    Put,
    /// 삭제
    Delete,
}

/// 표준 operation 집합 (리소스별 exclusion 적용 전)
pub const CANONICAL_OPERATIONS: [Operation; 6] = [
    Operation::Post,
    Operation::Get,
    Operation::List,
    Operation::Patch,
    Operation::Put,
    Operation::Delete,
];

impl Operation {
    /// 문자열에서 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "post" => Some(Operation::Post),
            "get" => Some(Operation::Get),
            "list" => Some(Operation::List),
            "patch" => Some(Operation::Patch),
            "put" => Some(Operation::Put),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Post => "post",
            Operation::Get => "get",
            Operation::List => "list",
            Operation::Patch => "patch",
            Operation::Put => "put",
            Operation::Delete => "delete",
        }
    }

    /// 쓰기 계열 여부
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Post | Operation::Patch | Operation::Put)
    }
}

/// 가시성 tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Authed,
    Private,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Authed => "authed",
            Tier::Private => "private",
        }
    }
}

/// 하나의 operation에 대한 tier 규칙
///
/// - `roles`가 비어 있으면 이 tier에서 해당 operation은 노출되지 않습니다
///   ("allow none"과 다름 — 항상 false인 절과 혼동 금지).
/// - `clause`가 없으면 role 매칭만으로 무조건 허용됩니다
///   (Public tier라면 인증 없이도 허용).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationRule {
    /// 허용 role 목록 (`*` = 전체 전개)
    #[serde(default)]
    pub roles: Vec<String>,

    /// 추가 조건 절
    ///
    /// YAML에서는 `checked: { ... }` 같은 단일 키 맵으로 선언합니다
    /// (serde_yaml의 `!tag` 표기가 아니라).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub clause: Option<Clause>,
}

impl OperationRule {
    /// 이 규칙이 operation을 노출하는지
    pub fn is_exposed(&self) -> bool {
        !self.roles.is_empty()
    }
}

/// Tier 하나의 operation → 규칙 매핑
pub type TierRules = std::collections::BTreeMap<Operation, OperationRule>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_round_trip() {
        for op in CANONICAL_OPERATIONS {
            assert_eq!(Operation::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operation::parse("head"), None);
    }

    #[test]
    fn test_empty_rule_not_exposed() {
        let rule = OperationRule::default();
        assert!(!rule.is_exposed());

        let rule = OperationRule {
            roles: vec!["*".to_string()],
            clause: None,
        };
        assert!(rule.is_exposed());
    }

    #[test]
    fn test_tier_rules_deserialization() {
        let yaml = r#"
get:
  roles: [Owner]
  clause:
    checked: { column: owner, attr: actor_id }
list:
  roles: ["*"]
"#;
        let rules: TierRules = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[&Operation::Get].clause.is_some());
        assert!(rules[&Operation::List].clause.is_none());
    }
}
