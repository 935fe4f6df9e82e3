//! 스토리지 추상화와 참조 구현
//!
//! gateway는 스토리지를 `Storage` 트레이트 너머로만 만집니다. 실제
//! SQL 백엔드는 외부 협력자이며 (`Permit::filter` 조각을 내릴 수
//! 있음), 기본 탑재되는 `MemoryStorage`는 테스트와 개발용 참조
//! 구현입니다.
//!
//! 삭제는 연쇄 처리까지 하나의 원자 단위입니다: 의무 처리 도중
//! 실패하면 삭제 전체가 없던 일이 됩니다.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use gk_core::permissions::{Permit, Row, Session};
use gk_core::relations::{CascadeGraph, CascadePolicy};
use gk_core::schema::CompiledApi;
use gk_core::Error;

/// 셀렉터에 더해 적용할 권한 술어 (permit과 그 평가 세션)
pub type AuthScope<'a> = Option<(&'a Permit, &'a Session)>;

/// 스토리지 인터페이스
pub trait Storage: Send + Sync {
    /// row 삽입 (pk 자동 부여 포함), 저장된 row 반환
    fn insert(&self, resource: &str, row: Row) -> gk_core::Result<Row>;

    /// 셀렉터와 일치하는 row 전부
    ///
    /// `auth`가 주어지면 권한 술어를 통과하는 row만 반환합니다. SQL
    /// 백엔드는 `Permit::filter` 조각을 쿼리에 덧붙이고, 참조 구현은
    /// row별로 평가합니다.
    fn find(&self, resource: &str, selector: &Row, auth: AuthScope) -> gk_core::Result<Vec<Row>>;

    /// 셀렉터와 일치하는 row 수정, 수정된 row 반환
    ///
    /// `replace`면 pk 외 전체 교체(put), 아니면 병합(patch)입니다.
    fn update(
        &self,
        resource: &str,
        selector: &Row,
        changes: &Row,
        replace: bool,
    ) -> gk_core::Result<Vec<Row>>;

    /// 셀렉터와 일치하는 row 삭제 + 연쇄 처리, 삭제 건수 반환
    fn delete(&self, resource: &str, selector: &Row) -> gk_core::Result<u64>;
}

/// 인메모리 참조 스토리지
pub struct MemoryStorage {
    graph: CascadeGraph,
    policy: CascadePolicy,

    /// 리소스 → pk 필드 이름
    pk_fields: BTreeMap<String, String>,

    /// 리소스 → unique 필드 목록
    unique_fields: BTreeMap<String, Vec<String>>,

    /// 리소스 → row 목록 (연쇄 포함 모든 변경이 이 잠금 아래서 일어남)
    tables: Mutex<BTreeMap<String, Vec<Row>>>,

    next_id: Mutex<i64>,
}

impl MemoryStorage {
    pub fn new(api: &CompiledApi, policy: CascadePolicy) -> Self {
        let pk_fields = api
            .resources
            .iter()
            .map(|(name, res)| (name.clone(), res.primary_key().to_string()))
            .collect();

        let unique_fields = api
            .resources
            .iter()
            .map(|(name, res)| {
                let fields = res
                    .fields
                    .iter()
                    .filter(|f| f.unique)
                    .map(|f| f.name.clone())
                    .collect();
                (name.clone(), fields)
            })
            .collect();

        Self {
            graph: api.graph.clone(),
            policy,
            pk_fields,
            unique_fields,
            tables: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(1),
        }
    }

    fn pk_field(&self, resource: &str) -> &str {
        self.pk_fields
            .get(resource)
            .map(String::as_str)
            .unwrap_or("id")
    }

    /// unique 필드 충돌 점검
    ///
    /// `candidate`의 unique 필드 값이 `exempt`를 제외한 기존 row와
    /// 겹치면 필드별 검증 에러를 냅니다.
    fn check_unique(
        &self,
        resource: &str,
        rows: &[Row],
        candidate: &Row,
        exempt: impl Fn(&Row) -> bool,
    ) -> gk_core::Result<()> {
        let Some(fields) = self.unique_fields.get(resource) else {
            return Ok(());
        };
        for field in fields {
            let Some(value) = candidate.get(field) else { continue };
            if value.is_null() {
                continue;
            }
            let taken = rows.iter().any(|row| {
                !exempt(row) && row.get(field).map(|v| loose_eq(v, value)).unwrap_or(false)
            });
            if taken {
                return Err(Error::validation(
                    field,
                    format!("value for unique field '{}' already exists", field),
                ));
            }
        }
        Ok(())
    }
}

/// 스칼라 느슨한 비교 (42 == "42")
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    let repr = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    matches!((repr(a), repr(b)), (Some(x), Some(y)) if x == y)
}

fn matches_selector(row: &Row, selector: &Row) -> bool {
    selector
        .iter()
        .all(|(field, expected)| row.get(field).map(|v| loose_eq(v, expected)).unwrap_or(false))
}

impl Storage for MemoryStorage {
    fn insert(&self, resource: &str, mut row: Row) -> gk_core::Result<Row> {
        let pk = self.pk_field(resource).to_string();
        if !row.contains_key(&pk) {
            let mut next = self.next_id.lock().map_err(poisoned)?;
            row.insert(pk, Value::from(*next));
            *next += 1;
        }

        let mut tables = self.tables.lock().map_err(poisoned)?;
        let rows = tables.entry(resource.to_string()).or_default();
        self.check_unique(resource, rows, &row, |_| false)?;
        rows.push(row.clone());
        Ok(row)
    }

    fn find(&self, resource: &str, selector: &Row, auth: AuthScope) -> gk_core::Result<Vec<Row>> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables
            .get(resource)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_selector(row, selector))
                    .filter(|row| match auth {
                        Some((permit, session)) => permit.check_row(session, row).is_ok(),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn update(
        &self,
        resource: &str,
        selector: &Row,
        changes: &Row,
        replace: bool,
    ) -> gk_core::Result<Vec<Row>> {
        let pk = self.pk_field(resource).to_string();
        let mut tables = self.tables.lock().map_err(poisoned)?;
        let mut updated = Vec::new();

        if let Some(rows) = tables.get_mut(resource) {
            // 수정 대상 밖의 row와 unique 값이 겹치면 거부
            self.check_unique(resource, rows, changes, |row| {
                matches_selector(row, selector)
            })?;

            for row in rows.iter_mut().filter(|row| matches_selector(row, selector)) {
                if replace {
                    let pk_value = row.get(&pk).cloned();
                    row.clear();
                    if let Some(value) = pk_value {
                        row.insert(pk.clone(), value);
                    }
                }
                for (field, value) in changes {
                    row.insert(field.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    fn delete(&self, resource: &str, selector: &Row) -> gk_core::Result<u64> {
        let mut tables = self.tables.lock().map_err(poisoned)?;

        // 작업 사본에서 전부 수행하고 성공 시에만 반영한다
        let mut working = tables.clone();

        let deleted_keys: Vec<Value> = {
            let pk = self.pk_field(resource);
            working
                .get(resource)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| matches_selector(row, selector))
                        .filter_map(|row| row.get(pk).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };
        if deleted_keys.is_empty() {
            return Ok(0);
        }

        // 단일 참조 의무 처리
        for obligation in self.graph.obligations_for(resource) {
            if obligation.unique && obligation.resource == resource {
                // 일대일의 거울 항목: 삭제되는 쪽이 참조 보유자이므로
                // 반대편 짝 row를 점검한다
                let held_keys: Vec<Value> = working
                    .get(resource)
                    .map(|rows| {
                        rows.iter()
                            .filter(|row| matches_selector(row, selector))
                            .filter_map(|row| row.get(&obligation.field).cloned())
                            .filter(|v| !v.is_null())
                            .collect()
                    })
                    .unwrap_or_default();
                if held_keys.is_empty() {
                    continue;
                }

                let target_pk = self.pk_field(&obligation.target).to_string();
                let partner_linked = working
                    .get(&obligation.target)
                    .map(|rows| {
                        rows.iter().any(|row| {
                            row.get(&target_pk)
                                .map(|pk| held_keys.iter().any(|k| loose_eq(pk, k)))
                                .unwrap_or(false)
                        })
                    })
                    .unwrap_or(false);

                if partner_linked && self.policy == CascadePolicy::Reject {
                    return Err(Error::CascadeConflict {
                        message: format!(
                            "'{}' row still pairs with '{}' via '{}'",
                            resource, obligation.target, obligation.field
                        ),
                    });
                }
                // SetNull: 링크는 삭제되는 row와 함께 소멸한다
                continue;
            }

            let Some(rows) = working.get_mut(&obligation.resource) else { continue };
            for row in rows.iter_mut() {
                if obligation.resource == resource && matches_selector(row, selector) {
                    continue;
                }
                let held = row.get(&obligation.field);
                let hit = held
                    .map(|v| deleted_keys.iter().any(|k| loose_eq(v, k)))
                    .unwrap_or(false);
                if !hit {
                    continue;
                }
                match self.policy {
                    CascadePolicy::Reject => {
                        return Err(Error::CascadeConflict {
                            message: format!(
                                "'{}' row is still referenced by '{}.{}'",
                                resource, obligation.resource, obligation.field
                            ),
                        });
                    }
                    CascadePolicy::SetNull => {
                        row.insert(obligation.field.clone(), Value::Null);
                    }
                }
            }
        }

        // 다중 참조 집합에서 키 제거
        for pick in self.graph.cherry_picks_for(resource) {
            let Some(rows) = working.get_mut(&pick.resource) else { continue };
            for row in rows.iter_mut() {
                if let Some(Value::Array(items)) = row.get_mut(&pick.field) {
                    items.retain(|item| !deleted_keys.iter().any(|k| loose_eq(item, k)));
                }
            }
        }

        let removed = match working.get_mut(resource) {
            Some(rows) => {
                let before = rows.len();
                rows.retain(|row| !matches_selector(row, selector));
                (before - rows.len()) as u64
            }
            None => 0,
        };

        *tables = working;
        Ok(removed)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Storage {
        message: "storage lock poisoned".to_string(),
    }
}
