//! 권한 테이블
//!
//! 리소스의 세 tier 블록을 operation별 role → 절 매핑 하나로 머지한
//! 결과입니다. 컴파일 시 한 번 만들어지고 이후 불변으로 공유됩니다
//! (steady state에서 잠금 불필요).
//!
//! 요청별 평가는 상태 기계를 따릅니다:
//!
//! ```text
//! Unauthenticated → RoleResolved → TierMatched → ClauseEvaluated → {Permitted, Denied}
//! ```
//!
//! `Denied`는 종결 상태이며 어떤 스토리지 접근보다 먼저 단락됩니다.
//! `Permitted`는 해석된 절(있다면)을 스토리지 호출로 넘깁니다.

use std::collections::BTreeMap;

use serde_json::Value;

use super::clause::Clause;
use super::context::{Row, Session};
use super::roles::{RoleSet, WILDCARD};
use super::tier::{Operation, Tier, TierRules};
use crate::error::{Error, Result};

/// 하나의 (operation, role)에 대한 허용
#[derive(Debug, Clone)]
pub struct Grant {
    /// 이 허용을 선언한 tier
    pub tier: Tier,

    /// 추가 조건 절 (None = 무조건 허용)
    pub clause: Option<Clause>,
}

/// 하나의 operation에 대한 허용 집합
#[derive(Debug, Clone, Default)]
pub struct OpGrants {
    /// role별 허용
    pub by_role: BTreeMap<String, Grant>,

    /// 익명 허용 (Public tier의 `*` 규칙에서만 생성)
    pub anonymous: Option<Grant>,
}

/// 리소스의 권한 테이블
#[derive(Debug, Clone, Default)]
pub struct AuthorizationTable {
    resource: String,
    ops: BTreeMap<Operation, OpGrants>,
}

/// 허용 결과: 해석된 절을 스토리지 단계로 운반
#[derive(Debug, Clone)]
pub struct Permit {
    clause: Option<Clause>,
}

/// 거부 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// operation이 어느 tier에도 노출되지 않음
    NotExposed,

    /// 세션 role에 해당하는 허용 없음
    NotPermitted,

    /// 절 평가가 false
    ClauseFailed,
}

impl Denial {
    pub fn reason(&self) -> &'static str {
        match self {
            Denial::NotExposed => "operation not exposed",
            Denial::NotPermitted => "no matching permission grant",
            Denial::ClauseFailed => "permission clause evaluated to false",
        }
    }
}

impl From<Denial> for Error {
    fn from(denial: Denial) -> Self {
        Error::AccessDenied {
            reason: denial.reason().to_string(),
        }
    }
}

impl AuthorizationTable {
    /// 세 tier를 합집합 머지하여 테이블 생성
    ///
    /// 서로 다른 tier가 같은 (operation, role)을 선언하면 설정 충돌로
    /// 즉시 실패합니다 — 어느 한 tier를 조용히 우선하지 않습니다.
    pub fn build(
        resource: &str,
        tiers: [(Tier, Option<&TierRules>); 3],
        roles: &RoleSet,
    ) -> Result<Self> {
        let mut ops: BTreeMap<Operation, OpGrants> = BTreeMap::new();

        for (tier, rules) in tiers {
            let Some(rules) = rules else { continue };

            for (op, rule) in rules {
                // role이 비어 있으면 이 tier에서는 노출되지 않는 operation
                if !rule.is_exposed() {
                    continue;
                }

                let location = format!("{}.{}.{}", resource, tier.as_str(), op.as_str());
                roles.validate_many(&rule.roles, &location)?;

                if let Some(clause) = &rule.clause {
                    clause.validate()?;
                }

                let grants = ops.entry(*op).or_default();

                let wildcard = rule.roles.iter().any(|r| r == WILDCARD);
                if wildcard && tier == Tier::Public {
                    if grants.anonymous.is_some() {
                        return Err(Error::DuplicateRule {
                            resource: resource.to_string(),
                            operation: op.as_str().to_string(),
                            role: WILDCARD.to_string(),
                        });
                    }
                    grants.anonymous = Some(Grant {
                        tier,
                        clause: rule.clause.clone(),
                    });
                }

                for role in roles.expand(&rule.roles) {
                    if grants.by_role.contains_key(&role) {
                        return Err(Error::DuplicateRule {
                            resource: resource.to_string(),
                            operation: op.as_str().to_string(),
                            role,
                        });
                    }
                    grants.by_role.insert(
                        role,
                        Grant {
                            tier,
                            clause: rule.clause.clone(),
                        },
                    );
                }
            }
        }

        Ok(Self {
            resource: resource.to_string(),
            ops,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// 노출된 operation 목록
    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.ops.keys().copied()
    }

    /// operation의 허용 집합 (spec filter가 소비)
    pub fn grants(&self, op: Operation) -> Option<&OpGrants> {
        self.ops.get(&op)
    }

    /// 요청 권한 평가
    ///
    /// Role 해석과 tier 매칭까지 수행하고, 절이 남으면 `Permit`에 실어
    /// 반환합니다. row가 손에 있는 시점에는 `Permit::check_row`로,
    /// list 계열에서는 `Permit::filter`로 마저 평가합니다.
    pub fn authorize(&self, op: Operation, session: &Session) -> std::result::Result<Permit, Denial> {
        // TierMatched: operation이 노출되어 있는가
        let Some(grants) = self.ops.get(&op) else {
            return Err(Denial::NotExposed);
        };

        // RoleResolved: 세션 role에 해당하는 허용 수집
        let mut matched: Vec<&Grant> = Vec::new();
        if let Some(grant) = &grants.anonymous {
            matched.push(grant);
        }
        for role in &session.roles {
            if let Some(grant) = grants.by_role.get(role) {
                matched.push(grant);
            }
        }

        if matched.is_empty() {
            return Err(Denial::NotPermitted);
        }

        // 무조건 허용이 하나라도 있으면 절 없이 통과
        if matched.iter().any(|g| g.clause.is_none()) {
            return Ok(Permit { clause: None });
        }

        // ClauseEvaluated 단계로 넘길 절: 매칭된 허용들의 OR
        let mut combined: Option<Clause> = None;
        for clause in matched.iter().filter_map(|g| g.clause.clone()) {
            combined = Some(match combined {
                None => clause,
                Some(acc) => acc.or(clause),
            });
        }

        Ok(Permit { clause: combined })
    }
}

impl Permit {
    /// 무조건 허용 여부
    pub fn is_unconditional(&self) -> bool {
        self.clause.is_none()
    }

    pub fn clause(&self) -> Option<&Clause> {
        self.clause.as_ref()
    }

    /// row 단위 절 평가 (단건 조회/수정/삭제 경로)
    pub fn check_row(&self, session: &Session, row: &Row) -> std::result::Result<(), Denial> {
        match &self.clause {
            None => Ok(()),
            Some(clause) if clause.evaluate(session, row) => Ok(()),
            Some(_) => Err(Denial::ClauseFailed),
        }
    }

    /// list 계열을 위한 필터 조각 생성
    pub fn filter(&self, session: &Session) -> Result<Option<(String, Vec<Value>)>> {
        match &self.clause {
            None => Ok(None),
            Some(clause) => {
                let mut params = Vec::new();
                let fragment = clause.to_filter(session, &mut params)?;
                Ok(Some((fragment, params)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::clause::CompareOp;
    use crate::permissions::context::SessionAttr;
    use crate::permissions::tier::OperationRule;
    use serde_json::json;

    fn rules(yaml: &str) -> TierRules {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn build(
        public: Option<&str>,
        authed: Option<&str>,
        private: Option<&str>,
    ) -> Result<AuthorizationTable> {
        let public = public.map(rules);
        let authed = authed.map(rules);
        let private = private.map(rules);
        AuthorizationTable::build(
            "clinic",
            [
                (Tier::Public, public.as_ref()),
                (Tier::Authed, authed.as_ref()),
                (Tier::Private, private.as_ref()),
            ],
            &RoleSet::default(),
        )
    }

    #[test]
    fn test_tier_union_disjoint_roles() {
        // Authed가 Staff에, Private가 Owner에 같은 operation을 주면 둘 다 유지
        let table = build(
            None,
            Some("patch: { roles: [Staff] }"),
            Some("patch: { roles: [Owner] }"),
        )
        .unwrap();

        let staff = Session::actor("1", vec!["Staff".to_string()]);
        let owner = Session::actor("2", vec!["Owner".to_string()]);
        let manager = Session::actor("3", vec!["Manager".to_string()]);

        assert!(table.authorize(Operation::Patch, &staff).is_ok());
        assert!(table.authorize(Operation::Patch, &owner).is_ok());
        assert_eq!(
            table.authorize(Operation::Patch, &manager).unwrap_err(),
            Denial::NotPermitted
        );
    }

    #[test]
    fn test_overlapping_tiers_rejected() {
        let err = build(
            None,
            Some("patch: { roles: [Staff] }"),
            Some("patch: { roles: [Staff] }"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateRule { .. }));
    }

    #[test]
    fn test_wildcard_overlap_rejected() {
        // Authed의 '*'는 모든 role로 전개되므로 Private의 Owner와 충돌
        let err = build(
            None,
            Some("get: { roles: ['*'] }"),
            Some("get: { roles: [Owner] }"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateRule { .. }));
    }

    #[test]
    fn test_public_wildcard_allows_anonymous() {
        let table = build(Some("list: { roles: ['*'] }"), None, None).unwrap();

        let permit = table.authorize(Operation::List, &Session::anonymous()).unwrap();
        assert!(permit.is_unconditional());
    }

    #[test]
    fn test_authed_wildcard_denies_anonymous() {
        let table = build(None, Some("list: { roles: ['*'] }"), None).unwrap();

        assert_eq!(
            table.authorize(Operation::List, &Session::anonymous()).unwrap_err(),
            Denial::NotPermitted
        );
        assert!(table
            .authorize(Operation::List, &Session::actor("1", vec!["Staff".to_string()]))
            .is_ok());
    }

    #[test]
    fn test_not_exposed_vs_denied() {
        // 빈 role 목록은 "노출 안 됨" — 항상 false 절과 다르다
        let table = build(Some("get: { roles: [] }"), None, None).unwrap();
        assert_eq!(
            table
                .authorize(Operation::Get, &Session::actor("1", vec!["Admin".to_string()]))
                .unwrap_err(),
            Denial::NotExposed
        );
    }

    #[test]
    fn test_clinic_owner_scenario() {
        // Private get: Checked(owner == session.actor_id)
        let table = build(
            None,
            None,
            Some(
                "get:\n  roles: [Owner]\n  clause:\n    checked: { column: owner, attr: actor_id }",
            ),
        )
        .unwrap();

        let session = Session::actor("42", vec!["Owner".to_string()]);
        let permit = table.authorize(Operation::Get, &session).unwrap();

        let mine = json!({ "owner": 42 });
        let theirs = json!({ "owner": 7 });
        assert!(permit.check_row(&session, mine.as_object().unwrap()).is_ok());
        assert_eq!(
            permit.check_row(&session, theirs.as_object().unwrap()).unwrap_err(),
            Denial::ClauseFailed
        );
    }

    #[test]
    fn test_multiple_role_grants_or_their_clauses() {
        let mut private = TierRules::new();
        private.insert(
            Operation::Get,
            OperationRule {
                roles: vec!["Owner".to_string()],
                clause: Some(Clause::checked("owner", SessionAttr::ActorId)),
            },
        );
        let mut authed = TierRules::new();
        authed.insert(
            Operation::Get,
            OperationRule {
                roles: vec!["Staff".to_string()],
                clause: Some(Clause::open("public_flag", CompareOp::Eq, json!(true))),
            },
        );

        let table = AuthorizationTable::build(
            "clinic",
            [
                (Tier::Public, None),
                (Tier::Authed, Some(&authed)),
                (Tier::Private, Some(&private)),
            ],
            &RoleSet::default(),
        )
        .unwrap();

        // 두 role을 모두 가진 세션은 두 절의 OR로 평가된다
        let session = Session::actor("42", vec!["Owner".to_string(), "Staff".to_string()]);
        let permit = table.authorize(Operation::Get, &session).unwrap();

        let by_flag = json!({ "owner": 7, "public_flag": true });
        let by_owner = json!({ "owner": 42, "public_flag": false });
        let neither = json!({ "owner": 7, "public_flag": false });

        assert!(permit.check_row(&session, by_flag.as_object().unwrap()).is_ok());
        assert!(permit.check_row(&session, by_owner.as_object().unwrap()).is_ok());
        assert!(permit.check_row(&session, neither.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_permit_filter_fragment() {
        let table = build(
            None,
            None,
            Some(
                "list:\n  roles: [Owner]\n  clause:\n    checked: { column: owner, attr: actor_id }",
            ),
        )
        .unwrap();

        let session = Session::actor("42", vec!["Owner".to_string()]);
        let permit = table.authorize(Operation::List, &session).unwrap();
        let (fragment, params) = permit.filter(&session).unwrap().unwrap();

        assert_eq!(fragment, "owner = $1");
        assert_eq!(params, vec![json!("42")]);
    }

    #[test]
    fn test_unknown_role_in_tier_rejected() {
        let err = build(None, Some("get: { roles: [Ghost] }"), None).unwrap_err();
        assert!(matches!(err, Error::UnknownRole { .. }));
    }
}
