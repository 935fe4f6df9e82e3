//! 요청 디스패치
//!
//! 합성된 라우트 전부가 이 하나의 핸들러로 들어옵니다. 라우트에 묶인
//! `RouteTarget`이 (리소스, 라우트 종류)를 알려주고, 여기서 operation
//! 결정 → 세션 → shield → payload 검증 → 권한 평가 → 스토리지 순서로
//! 진행합니다. 거부는 어떤 스토리지 접근보다도 먼저 끝납니다.
//!
//! 셀렉터 규약:
//!
//! - `POST /{base}/`: 본문 = 새 row
//! - `GET /{base}/?field=v`: 쿼리 = 셀렉터 (단건 조회)
//! - `PATCH|PUT /{base}/?field=v`: 쿼리 = 셀렉터, 본문 = 변경분
//! - `DELETE /{base}/?field=v`: 쿼리 = 셀렉터
//! - `POST /{base}/get/`: 본문 = 셀렉터 (본 라우트 get의 별칭)
//! - `GET /{base}/list/?field=v`: 쿼리 = 셀렉터

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, Method},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use gk_core::permissions::{Operation, Permit, Row, Session};
use gk_core::validation::validate_payload;
use gk_core::views::RouteKind;

use crate::error::{GatewayError, Result};
use crate::session;
use crate::state::AppState;

/// 라우트에 묶이는 디스패치 대상
#[derive(Debug, Clone)]
pub struct RouteTarget {
    pub resource: String,
    pub kind: RouteKind,
}

/// 응답 본문
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub data: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ApiMeta>,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Extension(target): Extension<RouteTarget>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Option<Json<Value>>,
) -> Result<Json<ApiResponse>> {
    let set = state
        .api
        .handler_set(&target.resource)
        .ok_or_else(|| GatewayError::NotFound {
            message: format!("unknown resource '{}'", target.resource),
        })?;

    let op = resolve_operation(&target.kind, &method)?;
    let session = session::from_headers(&headers);

    // Shield는 1차 권한 평가에 추가로 요구된다
    if let Some(required) = set.shield.requirement_for(op, &session.roles) {
        if session.shield_passed != Some(required) {
            return Err(gk_core::Error::ShieldRequired {
                method: required.as_str().to_string(),
            }
            .into());
        }
    }

    // 보조 라우트는 자체 테이블로 권한만 평가한다 (본문 의미는 호스트 몫)
    if let RouteKind::Aux(aux) = &target.kind {
        let table = set.aux_tables.get(aux).ok_or_else(|| GatewayError::NotFound {
            message: format!("unknown auxiliary route '{}'", aux),
        })?;
        table
            .authorize(op, &session)
            .map_err(gk_core::Error::from)?;
        return Ok(Json(ApiResponse {
            data: Value::Null,
            meta: None,
        }));
    }

    let body = body.map(|Json(value)| value);
    let payload = body_object(body)?;
    let query_selector = query_to_row(&query);

    let resource = state
        .api
        .resource(&target.resource)
        .ok_or_else(|| GatewayError::NotFound {
            message: format!("unknown resource '{}'", target.resource),
        })?;

    if op.is_write() {
        let payload = payload.as_ref().ok_or_else(|| GatewayError::BadRequest {
            message: "request body is required".to_string(),
        })?;
        validate_payload(resource, op, payload)?;
    }

    let permit = set.table.authorize(op, &session).map_err(gk_core::Error::from)?;

    match op {
        Operation::Post => {
            let payload = payload.unwrap_or_default();
            // 생성 절은 제출된 row 자체에 대해 평가한다
            check_row(&permit, &session, &payload)?;
            let saved = state.storage.insert(&target.resource, payload)?;
            Ok(Json(ApiResponse {
                data: Value::Object(saved),
                meta: None,
            }))
        }

        Operation::Get => {
            let selector = payload.unwrap_or(query_selector);
            let row = fetch_one(&state, &target.resource, &selector)?;
            check_row(&permit, &session, &row)?;
            Ok(Json(ApiResponse {
                data: Value::Object(row),
                meta: None,
            }))
        }

        Operation::List => {
            // 권한 술어는 스토리지까지 내려간다
            let rows = state.storage.find(
                &target.resource,
                &query_selector,
                Some((&permit, &session)),
            )?;
            let count = rows.len() as u64;
            Ok(Json(ApiResponse {
                data: Value::Array(rows.into_iter().map(Value::Object).collect()),
                meta: Some(ApiMeta { count: Some(count) }),
            }))
        }

        Operation::Patch | Operation::Put => {
            let changes = payload.unwrap_or_default();
            let matched = state.storage.find(&target.resource, &query_selector, None)?;
            if matched.is_empty() {
                return Err(not_found(&target.resource));
            }
            for row in &matched {
                check_row(&permit, &session, row)?;
            }
            let updated = state.storage.update(
                &target.resource,
                &query_selector,
                &changes,
                op == Operation::Put,
            )?;
            Ok(Json(ApiResponse {
                data: Value::Array(updated.into_iter().map(Value::Object).collect()),
                meta: None,
            }))
        }

        Operation::Delete => {
            let matched = state.storage.find(&target.resource, &query_selector, None)?;
            if matched.is_empty() {
                return Err(not_found(&target.resource));
            }
            for row in &matched {
                check_row(&permit, &session, row)?;
            }
            let removed = state.storage.delete(&target.resource, &query_selector)?;
            Ok(Json(ApiResponse {
                data: Value::Null,
                meta: Some(ApiMeta {
                    count: Some(removed),
                }),
            }))
        }
    }
}

/// (라우트 종류, HTTP 메서드) → operation
fn resolve_operation(kind: &RouteKind, method: &Method) -> Result<Operation> {
    let op = match kind {
        RouteKind::Collection => match *method {
            Method::POST => Some(Operation::Post),
            Method::GET => Some(Operation::Get),
            Method::PATCH => Some(Operation::Patch),
            Method::PUT => Some(Operation::Put),
            Method::DELETE => Some(Operation::Delete),
            _ => None,
        },
        RouteKind::BodylessGet => (*method == Method::POST).then_some(Operation::Get),
        RouteKind::ListAlias => (*method == Method::GET).then_some(Operation::List),
        RouteKind::Aux(_) => Operation::parse(method.as_str()),
    };

    op.ok_or_else(|| GatewayError::BadRequest {
        message: format!("method {} not supported on this route", method),
    })
}

fn body_object(body: Option<Value>) -> Result<Option<Row>> {
    match body {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(GatewayError::BadRequest {
            message: "request body must be a JSON object".to_string(),
        }),
    }
}

fn query_to_row(query: &HashMap<String, String>) -> Row {
    query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

// 단건 조회는 권한 술어 없이 찾은 뒤 명시적으로 거부한다 (404가 아니라 403)
fn fetch_one(state: &AppState, resource: &str, selector: &Row) -> Result<Row> {
    let rows = state.storage.find(resource, selector, None)?;
    rows.into_iter().next().ok_or_else(|| not_found(resource))
}

fn check_row(permit: &Permit, session: &Session, row: &Row) -> Result<()> {
    permit
        .check_row(session, row)
        .map_err(gk_core::Error::from)?;
    Ok(())
}

fn not_found(resource: &str) -> GatewayError {
    GatewayError::NotFound {
        message: format!("no matching '{}' row", resource),
    }
}
