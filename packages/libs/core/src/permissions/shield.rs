//! Shield: 2차 인증 요구
//!
//! (operation, role) 조합에 1차 권한 평가에 *추가로* 요구되는 2차
//! 인증 방식을 선언합니다. Shield는 권한 테이블을 대체하지 않으며,
//! 저변 mutation 실행 전에 반드시 검사되어야 합니다.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::roles::RoleSet;
use super::tier::Operation;
use crate::error::{Error, Result};

/// 2차 인증 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldMethod {
    /// 일회용 코드
    Otp,

    /// 대역 외 메시지 (SMS)
    Sms,
}

impl ShieldMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShieldMethod::Otp => "otp",
            ShieldMethod::Sms => "sms",
        }
    }
}

/// Shield 선언 (YAML 원형)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldRuleDecl {
    pub roles: Vec<String>,
    pub method: ShieldMethod,
}

/// 컴파일된 shield 규칙
#[derive(Debug, Clone)]
pub struct ShieldRule {
    /// 이 규칙이 적용되는 role 집합 (와일드카드 전개 완료)
    pub roles: BTreeSet<String>,

    /// 요구되는 2차 인증 방식
    pub method: ShieldMethod,
}

/// 리소스의 shield 테이블
#[derive(Debug, Clone, Default)]
pub struct Shield {
    rules: BTreeMap<Operation, ShieldRule>,
}

impl Shield {
    /// 선언에서 shield 테이블 생성
    ///
    /// 선언 키는 operation 이름 외에 집합 단축형 `update`(patch+put),
    /// `read`(get+list)를 허용합니다. 전개 후 중복 선언과 미지의 role은
    /// 컴파일 에러입니다.
    pub fn build(
        resource: &str,
        decls: &BTreeMap<String, ShieldRuleDecl>,
        roles: &RoleSet,
    ) -> Result<Self> {
        let mut rules: BTreeMap<Operation, ShieldRule> = BTreeMap::new();

        for (key, decl) in decls {
            let ops = expand_shield_key(key).ok_or_else(|| Error::InvalidShield {
                resource: resource.to_string(),
                operation: key.clone(),
                message: format!("unknown operation '{}'", key),
            })?;

            roles.validate_many(&decl.roles, &format!("{}.shield.{}", resource, key))?;
            let expanded = roles.expand(&decl.roles);

            for op in ops {
                if rules.contains_key(&op) {
                    return Err(Error::InvalidShield {
                        resource: resource.to_string(),
                        operation: op.as_str().to_string(),
                        message: "operation shielded more than once".to_string(),
                    });
                }
                rules.insert(
                    op,
                    ShieldRule {
                        roles: expanded.clone(),
                        method: decl.method,
                    },
                );
            }
        }

        Ok(Self { rules })
    }

    /// 세션 role에 대해 요구되는 2차 인증 방식
    pub fn requirement_for(&self, op: Operation, session_roles: &[String]) -> Option<ShieldMethod> {
        let rule = self.rules.get(&op)?;
        if session_roles.iter().any(|r| rule.roles.contains(r)) {
            Some(rule.method)
        } else {
            None
        }
    }

    /// 선언된 (operation, rule) 쌍 (transport가 사전 고지에 사용)
    pub fn rules(&self) -> impl Iterator<Item = (Operation, &ShieldRule)> {
        self.rules.iter().map(|(op, rule)| (*op, rule))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// shield 키 전개: `update` → patch+put, `read` → get+list
fn expand_shield_key(key: &str) -> Option<Vec<Operation>> {
    match key {
        "update" => Some(vec![Operation::Patch, Operation::Put]),
        "read" => Some(vec![Operation::Get, Operation::List]),
        other => Operation::parse(other).map(|op| vec![op]),
    }
}
