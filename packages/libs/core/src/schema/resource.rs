//! 리소스 정의
//!
//! 하나의 리소스 선언은 필드 목록과 세 tier 블록, shield, 보조 라우트를
//! 담습니다. 선언 그대로의 형태이며, 컴파일 결과물은 `views` 모듈의
//! `HandlerSet`입니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::field::Field;
use crate::permissions::{Operation, ShieldRuleDecl, TierRules, CANONICAL_OPERATIONS};

/// 리소스 선언
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// 리소스 이름 (parser가 맵 키에서 채움)
    #[serde(skip)]
    pub name: String,

    /// 스토리지 테이블 이름 (생략 시 리소스 이름)
    #[serde(default)]
    pub table: Option<String>,

    /// 라우트 베이스 (생략 시 리소스 이름)
    #[serde(default)]
    pub route_base: Option<String>,

    /// 표준 operation 집합에서 제외할 항목
    #[serde(default)]
    pub excluded_ops: Vec<Operation>,

    /// 필드 목록 (선언 순서 유지)
    pub fields: Vec<Field>,

    /// Public tier 규칙
    #[serde(default)]
    pub public: Option<TierRules>,

    /// Authed tier 규칙
    #[serde(default)]
    pub authed: Option<TierRules>,

    /// Private tier 규칙
    #[serde(default)]
    pub private: Option<TierRules>,

    /// 2차 인증 선언
    #[serde(default)]
    pub shield: BTreeMap<String, ShieldRuleDecl>,

    /// 보조 라우트: 경로 → operation 규칙
    #[serde(default)]
    pub aux_routes: BTreeMap<String, TierRules>,
}

impl Resource {
    /// 스토리지 테이블 이름
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    /// 라우트 베이스
    pub fn route_base(&self) -> &str {
        self.route_base.as_deref().unwrap_or(&self.name)
    }

    /// 이름으로 필드 조회
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 기본 키 필드 이름
    ///
    /// `primary_key: true`로 표시된 필드, 없으면 `id`입니다.
    pub fn primary_key(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .unwrap_or("id")
    }

    /// 이 리소스에 남는 operation (표준 집합 - 제외 목록)
    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        CANONICAL_OPERATIONS
            .into_iter()
            .filter(|op| !self.excluded_ops.contains(op))
    }
}
