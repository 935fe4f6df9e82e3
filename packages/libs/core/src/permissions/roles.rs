//! 시스템 Role 레지스트리
//!
//! 내장 role에 배포별 선언 role을 합친 검증된 집합입니다. 스키마가
//! 이 집합 밖의 role을 참조하면 컴파일이 중단됩니다.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 와일드카드 role
///
/// "설정된 모든 role"로 머지 시점에 전개되며, per-role 테이블에 문자
/// 그대로 저장되지 않습니다.
pub const WILDCARD: &str = "*";

/// 내장 시스템 role
pub const BUILTIN_ROLES: [&str; 4] = ["Admin", "Owner", "Manager", "Staff"];

/// 검증된 시스템 role 집합
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSet {
    roles: BTreeSet<String>,
}

impl Default for RoleSet {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl RoleSet {
    /// 내장 role + 선언 role로 집합 생성
    ///
    /// 선언 role은 title-case로 정규화됩니다 (`vet` → `Vet`).
    pub fn new(declared: &[String]) -> Self {
        let mut roles: BTreeSet<String> =
            BUILTIN_ROLES.iter().map(|r| r.to_string()).collect();
        for role in declared {
            roles.insert(title_case(role));
        }
        Self { roles }
    }

    /// role 존재 여부 (와일드카드는 항상 유효)
    pub fn contains(&self, role: &str) -> bool {
        role == WILDCARD || self.roles.contains(role)
    }

    /// 단일 role 검증
    pub fn validate(&self, role: &str, location: &str) -> Result<()> {
        if self.contains(role) {
            Ok(())
        } else {
            Err(Error::UnknownRole {
                role: role.to_string(),
                location: location.to_string(),
            })
        }
    }

    /// role 목록 검증
    pub fn validate_many<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a String>,
        location: &str,
    ) -> Result<()> {
        for role in roles {
            self.validate(role, location)?;
        }
        Ok(())
    }

    /// 모든 구체 role (와일드카드 제외)
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|s| s.as_str())
    }

    /// role 목록을 구체 role 집합으로 전개
    ///
    /// 와일드카드가 포함되어 있으면 전체 집합을 반환합니다.
    pub fn expand<'a>(&self, roles: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for role in roles {
            if role == WILDCARD {
                return self.roles.clone();
            }
            out.insert(role.clone());
        }
        out
    }
}

fn title_case(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roles_present() {
        let roles = RoleSet::default();
        assert!(roles.contains("Admin"));
        assert!(roles.contains("Owner"));
        assert!(roles.contains(WILDCARD));
        assert!(!roles.contains("Vet"));
    }

    #[test]
    fn test_declared_roles_title_cased() {
        let roles = RoleSet::new(&["vet".to_string(), "Assistant".to_string()]);
        assert!(roles.contains("Vet"));
        assert!(roles.contains("Assistant"));
        assert!(!roles.contains("vet"));
    }

    #[test]
    fn test_validate_unknown_role() {
        let roles = RoleSet::default();
        let err = roles.validate("Intruder", "clinic.private.get").unwrap_err();
        assert!(matches!(err, Error::UnknownRole { .. }));
    }

    #[test]
    fn test_wildcard_expansion() {
        let roles = RoleSet::new(&["Vet".to_string()]);
        let expanded = roles.expand(&vec![WILDCARD.to_string()]);
        assert!(expanded.contains("Admin"));
        assert!(expanded.contains("Vet"));

        let narrow = roles.expand(&vec!["Owner".to_string()]);
        assert_eq!(narrow.len(), 1);
    }
}
