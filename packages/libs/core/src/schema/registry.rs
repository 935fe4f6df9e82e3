//! 리소스 레지스트리와 컴파일 파이프라인
//!
//! 레지스트리는 선언 전체(역할, 연쇄 정책, 리소스 목록)를 담고,
//! `compile()` 하나로 검증 → 관계 해석 → view 합성 → 문서 생성을
//! 순서대로 수행합니다. 어느 단계든 불일치는 설정 에러로 즉시
//! 중단합니다 — 일관성 없는 권한 모델로는 프로세스가 뜨지 않습니다.
//!
//! 컴파일은 프로세스 시작 시 단일 스레드로 한 번 실행되고, 결과
//! `CompiledApi`는 불변으로 핸들러들에 공유됩니다.

use std::collections::BTreeMap;

use crate::apidoc::ApiSpec;
use crate::error::Result;
use crate::permissions::RoleSet;
use crate::relations::{resolve_all, CascadeGraph, CascadePolicy, JoinPlan};
use crate::views::{synthesize, HandlerSet};

use super::resource::Resource;

/// 선언 레지스트리 (파싱 직후, 컴파일 전)
#[derive(Debug, Clone)]
pub struct Registry {
    pub version: u32,

    /// 배포별 선언 role (내장 role에 합쳐짐)
    pub roles: Vec<String>,

    /// 연쇄 의무 처리 정책
    pub cascade_policy: CascadePolicy,

    pub resources: BTreeMap<String, Resource>,
}

/// 컴파일 결과 — 요청 처리에 필요한 모든 파생 구조
///
/// 불변이며 잠금 없이 동시 읽기 가능합니다.
#[derive(Debug, Clone)]
pub struct CompiledApi {
    pub version: u32,
    pub roles: RoleSet,
    pub cascade_policy: CascadePolicy,
    pub resources: BTreeMap<String, Resource>,

    /// 리소스별 조인 계획
    pub plans: BTreeMap<String, JoinPlan>,

    /// 전역 삭제 연쇄 그래프
    pub graph: CascadeGraph,

    /// 리소스별 디스패치 단위
    pub handler_sets: BTreeMap<String, HandlerSet>,

    /// API 기술 문서 (필터 전 전체본)
    pub spec: ApiSpec,
}

impl Registry {
    /// 검증과 파생 구조 생성 전부
    pub fn compile(self) -> Result<CompiledApi> {
        let roles = RoleSet::new(&self.roles);

        let resolved = resolve_all(&self.resources)?;

        let mut handler_sets = BTreeMap::new();
        for (name, resource) in &self.resources {
            handler_sets.insert(name.clone(), synthesize(resource, &roles)?);
        }

        let spec = ApiSpec::build(self.version, &self.resources, &handler_sets);

        Ok(CompiledApi {
            version: self.version,
            roles,
            cascade_policy: self.cascade_policy,
            resources: self.resources,
            plans: resolved.plans,
            graph: resolved.graph,
            handler_sets,
            spec,
        })
    }
}

impl CompiledApi {
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn handler_set(&self, name: &str) -> Option<&HandlerSet> {
        self.handler_sets.get(name)
    }

    pub fn plan(&self, name: &str) -> Option<&JoinPlan> {
        self.plans.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::permissions::{Operation, Session};
    use crate::schema::SchemaParser;

    const VALID: &str = r#"
version: 1
roles: [Vet]
cascade_policy: reject
resources:
  species:
    fields:
      - { name: id, type: integer, primary_key: true }
  clinic:
    fields:
      - { name: id, type: integer, read_only: true, primary_key: true }
      - { name: owner, type: integer, required: true }
      - { name: species, type: reference, target: species }
    public:
      list: { roles: ["*"] }
    private:
      get:
        roles: [Owner]
        clause:
          checked: { column: owner, attr: actor_id }
"#;

    #[test]
    fn test_compile_valid_declaration() {
        let api = SchemaParser::parse_yaml(VALID).unwrap().compile().unwrap();

        assert_eq!(api.cascade_policy, crate::relations::CascadePolicy::Reject);
        assert!(api.roles.contains("Vet"));
        assert!(api.handler_set("clinic").is_some());
        assert!(api.plan("clinic").unwrap().join("species").is_some());
        assert_eq!(api.graph.obligations_for("species").len(), 1);
        assert!(api.spec.paths.contains_key("/clinic/list/"));

        let table = &api.handler_set("clinic").unwrap().table;
        assert!(table.authorize(Operation::List, &Session::anonymous()).is_ok());
    }

    #[test]
    fn test_compile_fails_fast_on_unknown_role() {
        let yaml = r#"
resources:
  clinic:
    fields:
      - { name: id, type: integer, primary_key: true }
    authed:
      get: { roles: [Ghost] }
"#;
        let err = SchemaParser::parse_yaml(yaml).unwrap().compile().unwrap_err();
        assert!(matches!(err, Error::UnknownRole { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_compile_fails_fast_on_bad_reference() {
        let yaml = r#"
resources:
  clinic:
    fields:
      - { name: id, type: integer, primary_key: true }
      - { name: species, type: reference, target: nowhere }
"#;
        let err = SchemaParser::parse_yaml(yaml).unwrap().compile().unwrap_err();
        assert!(matches!(err, Error::UnknownTarget { .. }));
    }
}
