//! 참조 관계 해석
//!
//! 리소스 필드의 참조 선언을 조인 계획과 연쇄 그래프로 컴파일합니다.
//! 해석은 컴파일 단계에서 한 번만 수행되며, 대상 부재 / 경유 필드
//! 불량 / 암시 참조 순환은 모두 설정 에러로 즉시 중단합니다.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::{FieldKind, Resource};

use super::cascade::{CascadeGraph, CascadeObligation, CherryPick};

/// 조인 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKind {
    /// 단일 참조: 등호 조인
    Single,

    /// 다중 참조: 집합 포함 조인 (`?&`)
    Multi,

    /// 암시 참조: 경유 필드 체인을 통한 전이 조인
    Implied {
        /// 원 리소스에서 최종 대상까지의 필드 경로
        via: Vec<String>,
    },
}

/// 해석된 조인 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// 원 리소스의 필드 이름
    pub field: String,

    /// 대상 리소스 이름
    pub target_resource: String,

    /// 대상 리소스의 조인 필드 (보통 pk)
    pub target_field: String,

    pub kind: JoinKind,

    /// 쿼리 구성에 쓰이는 술어 템플릿 (`{field}` 자리표시)
    pub predicate: String,
}

/// 리소스 하나의 조인 계획
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    pub resource: String,
    joins: BTreeMap<String, Join>,
}

impl JoinPlan {
    /// 필드 이름으로 조인 조회
    pub fn join(&self, field: &str) -> Option<&Join> {
        self.joins.get(field)
    }

    pub fn joins(&self) -> impl Iterator<Item = &Join> {
        self.joins.values()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

/// 해석 결과 전체
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    /// 리소스별 조인 계획
    pub plans: BTreeMap<String, JoinPlan>,

    /// 전역 연쇄 그래프
    pub graph: CascadeGraph,
}

/// 레지스트리 전체의 참조 관계 해석
pub fn resolve_all(resources: &BTreeMap<String, Resource>) -> Result<Resolved> {
    let mut resolved = Resolved::default();

    for (name, resource) in resources {
        let mut plan = JoinPlan {
            resource: name.clone(),
            joins: BTreeMap::new(),
        };

        for field in &resource.fields {
            match &field.kind {
                FieldKind::Reference { target } => {
                    let (target_res, target_field) =
                        lookup_target(resources, resource, &field.name, target)?;

                    plan.joins.insert(
                        field.name.clone(),
                        Join {
                            field: field.name.clone(),
                            target_resource: target_res.name.clone(),
                            target_field: target_field.clone(),
                            kind: JoinKind::Single,
                            predicate: format!(
                                "{}.{} = {{{}}}",
                                target_res.table(),
                                target_field,
                                field.name
                            ),
                        },
                    );

                    // 대상 row 삭제 시 이 참조를 정리할 의무
                    resolved.graph.register_obligation(
                        &target_res.name,
                        CascadeObligation {
                            resource: name.clone(),
                            field: field.name.clone(),
                            pk: resource.primary_key().to_string(),
                            target: target_res.name.clone(),
                            unique: field.unique,
                        },
                    );

                    // 일대일은 참조 보유 쪽 삭제에도 대상 쪽 점검 의무 등록
                    if field.unique {
                        resolved.graph.register_obligation(
                            name,
                            CascadeObligation {
                                resource: name.clone(),
                                field: field.name.clone(),
                                pk: resource.primary_key().to_string(),
                                target: target_res.name.clone(),
                                unique: true,
                            },
                        );
                    }
                }

                FieldKind::MultiReference { target } => {
                    let (target_res, target_field) =
                        lookup_target(resources, resource, &field.name, target)?;

                    plan.joins.insert(
                        field.name.clone(),
                        Join {
                            field: field.name.clone(),
                            target_resource: target_res.name.clone(),
                            target_field,
                            kind: JoinKind::Multi,
                            predicate: format!("{} ?& {{{}}}", field.name, field.name),
                        },
                    );

                    // 링크된 리소스 삭제 시 집합 필드에서 키 제거
                    resolved.graph.register_cherry_pick(
                        &target_res.name,
                        CherryPick {
                            resource: name.clone(),
                            field: field.name.clone(),
                        },
                    );
                }

                FieldKind::ImpliedReference { via, foreign_field } => {
                    let walk = walk_implied(resources, resource, &field.name, via, foreign_field)?;

                    plan.joins.insert(
                        field.name.clone(),
                        Join {
                            field: field.name.clone(),
                            predicate: format!(
                                "{}.{} = {{{}}}",
                                walk.target_table,
                                walk.target_field,
                                walk.via.join(".")
                            ),
                            target_resource: walk.target_resource,
                            target_field: walk.target_field,
                            kind: JoinKind::Implied { via: walk.via },
                        },
                    );
                }

                _ => {}
            }
        }

        if !plan.is_empty() {
            resolved.plans.insert(name.clone(), plan);
        }
    }

    Ok(resolved)
}

/// `target` 선언(`resource` 또는 `resource.field`)을 대상 리소스와
/// 조인 필드로 해석
fn lookup_target<'a>(
    resources: &'a BTreeMap<String, Resource>,
    source: &Resource,
    field: &str,
    target: &str,
) -> Result<(&'a Resource, String)> {
    let (res_name, field_name) = match target.split_once('.') {
        Some((r, f)) => (r, Some(f)),
        None => (target, None),
    };

    let target_res = resources.get(res_name).ok_or_else(|| Error::UnknownTarget {
        resource: source.name.clone(),
        field: field.to_string(),
        target: target.to_string(),
    })?;

    let join_field = field_name.unwrap_or_else(|| target_res.primary_key());
    if target_res.field(join_field).is_none() && join_field != target_res.primary_key() {
        return Err(Error::UnknownTarget {
            resource: source.name.clone(),
            field: field.to_string(),
            target: target.to_string(),
        });
    }

    Ok((target_res, join_field.to_string()))
}

struct ImpliedWalk {
    target_resource: String,
    target_table: String,
    target_field: String,
    via: Vec<String>,
}

/// 암시 참조의 전이 해석
///
/// 경유 필드를 따라 참조 체인을 걷습니다. 방문 집합은 (리소스, 필드)
/// 쌍으로, 재방문은 순환으로 판정합니다 — 런타임 무한 루프는 구조적으로
/// 불가능합니다.
fn walk_implied(
    resources: &BTreeMap<String, Resource>,
    origin: &Resource,
    origin_field: &str,
    via: &str,
    foreign_field: &str,
) -> Result<ImpliedWalk> {
    let mut visited: BTreeSet<(String, String)> = BTreeSet::new();
    visited.insert((origin.name.clone(), origin_field.to_string()));

    let mut chain: Vec<String> = Vec::new();
    let mut current = origin;
    let mut current_via = via.to_string();
    let mut current_foreign = foreign_field.to_string();

    loop {
        let via_field = current.field(&current_via).ok_or_else(|| {
            Error::UnresolvedImplication {
                resource: origin.name.clone(),
                field: origin_field.to_string(),
                message: format!(
                    "intermediate field '{}' not found on '{}'",
                    current_via, current.name
                ),
            }
        })?;

        let intermediate_target = match &via_field.kind {
            FieldKind::Reference { target } | FieldKind::MultiReference { target } => {
                lookup_target(resources, current, &via_field.name, target)?.0
            }
            _ => {
                return Err(Error::UnresolvedImplication {
                    resource: origin.name.clone(),
                    field: origin_field.to_string(),
                    message: format!(
                        "intermediate field '{}' on '{}' is not a reference",
                        current_via, current.name
                    ),
                });
            }
        };

        chain.push(current_via.clone());

        let foreign = intermediate_target.field(&current_foreign).ok_or_else(|| {
            Error::UnresolvedImplication {
                resource: origin.name.clone(),
                field: origin_field.to_string(),
                message: format!(
                    "foreign field '{}' not found on '{}'",
                    current_foreign, intermediate_target.name
                ),
            }
        })?;

        match &foreign.kind {
            FieldKind::Reference { target } | FieldKind::MultiReference { target } => {
                let (final_res, final_field) =
                    lookup_target(resources, intermediate_target, &foreign.name, target)?;
                chain.push(current_foreign.clone());
                return Ok(ImpliedWalk {
                    target_resource: final_res.name.clone(),
                    target_table: final_res.table().to_string(),
                    target_field: final_field,
                    via: chain,
                });
            }

            FieldKind::ImpliedReference {
                via: next_via,
                foreign_field: next_foreign,
            } => {
                let key = (intermediate_target.name.clone(), current_foreign.clone());
                if !visited.insert(key) {
                    return Err(Error::CyclicImplication {
                        resource: origin.name.clone(),
                        field: origin_field.to_string(),
                    });
                }
                current = intermediate_target;
                current_via = next_via.clone();
                current_foreign = next_foreign.clone();
            }

            _ => {
                return Err(Error::UnresolvedImplication {
                    resource: origin.name.clone(),
                    field: origin_field.to_string(),
                    message: format!(
                        "foreign field '{}' on '{}' is not a reference",
                        current_foreign, intermediate_target.name
                    ),
                });
            }
        }
    }
}
