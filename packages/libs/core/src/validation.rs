//! Payload 필드 검증
//!
//! 쓰기 payload를 리소스 선언과 대조합니다. 검증 실패는 필드별 메시지
//! 목록으로 수집되며, 권한 거부와는 구분되는 에러입니다. 읽기 전용
//! 필드는 조용히 제거하지 않고 제출 자체를 에러로 봅니다.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::permissions::{Operation, Row};
use crate::schema::{FieldKind, Resource};

/// 쓰기 payload 검증
///
/// post는 필수 필드 누락을 검사하고, patch/put은 제출된 필드만
/// 검사합니다.
pub fn validate_payload(resource: &Resource, op: Operation, payload: &Row) -> Result<()> {
    let mut errors: std::collections::BTreeMap<String, Vec<String>> =
        std::collections::BTreeMap::new();
    let mut push = |field: &str, message: String| {
        errors.entry(field.to_string()).or_default().push(message);
    };

    for (name, value) in payload {
        let Some(field) = resource.field(name) else {
            push(name, "unknown field".to_string());
            continue;
        };

        if field.read_only {
            push(name, "field is read-only".to_string());
            continue;
        }
        if matches!(field.kind, FieldKind::ImpliedReference { .. }) {
            push(name, "field is derived and cannot be written".to_string());
            continue;
        }

        if value.is_null() {
            continue;
        }
        if let Some(message) = type_error(&field.kind, value) {
            push(name, message);
        }
    }

    if op == Operation::Post {
        for field in &resource.fields {
            if field.required && !payload.contains_key(&field.name) {
                push(&field.name, "field is required".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

/// 값이 타입과 맞지 않으면 메시지 반환
fn type_error(kind: &FieldKind, value: &Value) -> Option<String> {
    let ok = match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Integer => value.as_i64().is_some(),
        FieldKind::Float => value.is_number(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::Json => true,
        FieldKind::List => value.is_array(),

        // 정밀도 보존을 위해 문자열로 받는다
        FieldKind::Bigint => value
            .as_str()
            .map(|s| s.parse::<i64>().is_ok())
            .unwrap_or(false),

        FieldKind::Date => value
            .as_str()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .unwrap_or(false),

        FieldKind::Timestamp => value
            .as_str()
            .map(|s| DateTime::parse_from_rfc3339(s).is_ok())
            .unwrap_or(false),

        FieldKind::Reference { .. } => value.is_string() || value.as_i64().is_some(),
        FieldKind::MultiReference { .. } => value
            .as_array()
            .map(|items| items.iter().all(|v| v.is_string() || v.as_i64().is_some()))
            .unwrap_or(false),

        // payload 루프에서 먼저 걸러진다
        FieldKind::ImpliedReference { .. } => false,
    };

    if ok {
        None
    } else {
        Some(format!("expected {}", kind.expected_json_type()))
    }
}
