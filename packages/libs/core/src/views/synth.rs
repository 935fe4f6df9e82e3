//! 라우트 합성
//!
//! 리소스 선언 하나를 디스패치 가능한 `HandlerSet`으로 컴파일합니다.
//! 합성은 컴파일 시 한 번이며, 요청 디스패치는 (리소스, operation)
//! 키의 테이블 조회입니다 — 런타임 타입 합성은 없습니다.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::permissions::{AuthorizationTable, Operation, RoleSet, Shield, Tier, TierRules};
use crate::schema::Resource;

/// 합성된 라우트의 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// `/{base}/` — HTTP 메서드가 operation으로 매핑되는 본 라우트
    Collection,

    /// `/{base}/get/` — POST 바디로 셀렉터를 받는 단건 조회
    /// (권한과 결과는 get과 동일)
    BodylessGet,

    /// `/{base}/list/` — GET 목록 별칭
    ListAlias,

    /// 보조 라우트 (정규화된 상대 경로)
    Aux(String),
}

/// 합성된 라우트 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    /// 절대 경로 (항상 `/`로 끝남)
    pub path: String,
    pub kind: RouteKind,
}

/// 리소스 하나의 디스패치 단위
#[derive(Debug, Clone)]
pub struct HandlerSet {
    pub resource: String,
    pub route_base: String,
    pub routes: Vec<RouteSpec>,

    /// tier 머지 결과 권한 테이블
    pub table: AuthorizationTable,

    /// 2차 인증 테이블
    pub shield: Shield,

    /// 보조 라우트별 권한 테이블
    pub aux_tables: BTreeMap<String, AuthorizationTable>,
}

/// 리소스 하나를 합성
pub fn synthesize(resource: &Resource, roles: &RoleSet) -> Result<HandlerSet> {
    // 제외된 operation에 tier 규칙이 있으면 의도 충돌로 본다
    for (tier, rules) in [
        (Tier::Public, resource.public.as_ref()),
        (Tier::Authed, resource.authed.as_ref()),
        (Tier::Private, resource.private.as_ref()),
    ] {
        let Some(rules) = rules else { continue };
        for op in rules.keys() {
            if resource.excluded_ops.contains(op) {
                return Err(Error::ExcludedOperationRule {
                    resource: resource.name.clone(),
                    operation: op.as_str().to_string(),
                    tier: tier.as_str().to_string(),
                });
            }
        }
    }

    let table = AuthorizationTable::build(
        &resource.name,
        [
            (Tier::Public, resource.public.as_ref()),
            (Tier::Authed, resource.authed.as_ref()),
            (Tier::Private, resource.private.as_ref()),
        ],
        roles,
    )?;

    let shield = Shield::build(&resource.name, &resource.shield, roles)?;

    // 제외된 operation 전용 라우트는 아예 합성하지 않는다
    let base = resource.route_base();
    let mut routes = vec![RouteSpec {
        path: format!("/{}/", base),
        kind: RouteKind::Collection,
    }];
    if !resource.excluded_ops.contains(&Operation::List) {
        routes.push(RouteSpec {
            path: format!("/{}/list/", base),
            kind: RouteKind::ListAlias,
        });
    }
    if !resource.excluded_ops.contains(&Operation::Get) {
        routes.push(RouteSpec {
            path: format!("/{}/get/", base),
            kind: RouteKind::BodylessGet,
        });
    }

    let mut aux_tables = BTreeMap::new();
    for (raw, rules) in &resource.aux_routes {
        let normalized = normalize_aux_route(&resource.name, raw)?;
        aux_tables.insert(
            normalized.clone(),
            build_aux_table(&resource.name, &normalized, rules, roles)?,
        );
        routes.push(RouteSpec {
            path: format!("/{}/{}", base, normalized),
            kind: RouteKind::Aux(normalized),
        });
    }

    Ok(HandlerSet {
        resource: resource.name.clone(),
        route_base: base.to_string(),
        routes,
        table,
        shield,
        aux_tables,
    })
}

/// 보조 라우트 경로 정규화
///
/// 선행 `/` 제거, 끝에 `/` 보장. 합성 라우트와 충돌하는 예약 접미사
/// (`list/`, `get/`)는 설정 에러입니다.
fn normalize_aux_route(resource: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim_start_matches('/');
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    if normalized.is_empty() || normalized == "/" {
        return Err(Error::AuxRouteName {
            resource: resource.to_string(),
            route: raw.to_string(),
            message: "route name is empty".to_string(),
        });
    }

    for reserved in ["list/", "get/"] {
        if normalized == reserved || normalized.ends_with(&format!("/{}", reserved)) {
            return Err(Error::AuxRouteName {
                resource: resource.to_string(),
                route: raw.to_string(),
                message: format!("route may not end with reserved suffix '{}'", reserved),
            });
        }
    }

    Ok(normalized)
}

/// 보조 라우트의 권한 테이블
///
/// 보조 라우트는 tier 블록 없이 operation 규칙만 선언하므로 Authed
/// tier 하나로 머지합니다.
fn build_aux_table(
    resource: &str,
    route: &str,
    rules: &TierRules,
    roles: &RoleSet,
) -> Result<AuthorizationTable> {
    AuthorizationTable::build(
        &format!("{}/{}", resource, route),
        [
            (Tier::Public, None),
            (Tier::Authed, Some(rules)),
            (Tier::Private, None),
        ],
        roles,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Session;

    fn resource(yaml: &str) -> Resource {
        let mut resource: Resource = serde_yaml::from_str(yaml).unwrap();
        resource.name = "clinic".to_string();
        resource
    }

    #[test]
    fn test_canonical_routes_synthesized() {
        let set = synthesize(
            &resource(
                r#"
fields:
  - { name: id, type: integer, primary_key: true }
authed:
  get: { roles: [Staff] }
"#,
            ),
            &RoleSet::default(),
        )
        .unwrap();

        let paths: Vec<&str> = set.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/clinic/", "/clinic/list/", "/clinic/get/"]);
        assert!(paths.iter().all(|p| p.ends_with('/')));
    }

    #[test]
    fn test_route_base_override() {
        let set = synthesize(
            &resource(
                r#"
route_base: clinics
fields:
  - { name: id, type: integer, primary_key: true }
"#,
            ),
            &RoleSet::default(),
        )
        .unwrap();
        assert_eq!(set.routes[0].path, "/clinics/");
    }

    #[test]
    fn test_aux_route_normalized_and_authorized() {
        let set = synthesize(
            &resource(
                r#"
fields:
  - { name: id, type: integer, primary_key: true }
aux_routes:
  /stats:
    get: { roles: [Admin] }
"#,
            ),
            &RoleSet::default(),
        )
        .unwrap();

        let aux = set
            .routes
            .iter()
            .find(|r| matches!(r.kind, RouteKind::Aux(_)))
            .unwrap();
        assert_eq!(aux.path, "/clinic/stats/");

        let table = &set.aux_tables["stats/"];
        assert!(table
            .authorize(Operation::Get, &Session::actor("1", vec!["Admin".to_string()]))
            .is_ok());
        assert!(table
            .authorize(Operation::Get, &Session::actor("1", vec!["Staff".to_string()]))
            .is_err());
    }

    #[test]
    fn test_aux_route_reserved_suffix_rejected() {
        for bad in ["list", "list/", "nested/list/", "get/"] {
            let err = synthesize(
                &resource(&format!(
                    "fields:\n  - {{ name: id, type: integer, primary_key: true }}\naux_routes:\n  {}:\n    get: {{ roles: [Admin] }}",
                    bad
                )),
                &RoleSet::default(),
            )
            .unwrap_err();
            assert!(matches!(err, Error::AuxRouteName { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_excluded_read_ops_drop_their_routes() {
        let set = synthesize(
            &resource(
                r#"
excluded_ops: [list, get]
fields:
  - { name: id, type: integer, primary_key: true }
authed:
  post: { roles: [Staff] }
"#,
            ),
            &RoleSet::default(),
        )
        .unwrap();

        let paths: Vec<&str> = set.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/clinic/"]);
    }

    #[test]
    fn test_excluded_op_rule_rejected() {
        let err = synthesize(
            &resource(
                r#"
excluded_ops: [put]
fields:
  - { name: id, type: integer, primary_key: true }
authed:
  put: { roles: [Staff] }
"#,
            ),
            &RoleSet::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ExcludedOperationRule { .. }));
    }
}
