//! 공통 에러 타입
//!
//! Gatekit 전체에서 사용되는 에러 타입을 정의합니다.
//!
//! 에러는 두 부류로 나뉩니다:
//!
//! - **설정 에러** (startup-time, fatal): 스키마 컴파일을 중단시킵니다.
//!   일관성 없는 권한 모델로는 프로세스가 시작되지 않습니다.
//! - **요청 에러** (per-request, recoverable): 구조화된 결과로 transport에
//!   반환됩니다. 호출자는 네 가지 종류(AccessDenied / Validation /
//!   CascadeConflict / Storage)를 구분할 수 있어야 합니다.

use std::collections::BTreeMap;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Gatekit 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Configuration Errors (컴파일 중단)
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("schema parse error: {message}")]
    SchemaParse { message: String },

    #[error("duplicate resource name: {name}")]
    DuplicateResource { name: String },

    #[error("unknown role '{role}' referenced by {location}")]
    UnknownRole { role: String, location: String },

    #[error(
        "duplicate permission rule: operation '{operation}' on resource '{resource}' \
         grants role '{role}' in more than one tier"
    )]
    DuplicateRule {
        resource: String,
        operation: String,
        role: String,
    },

    #[error("invalid reference: resource '{resource}' field '{field}' references unknown '{target}'")]
    UnknownTarget {
        resource: String,
        field: String,
        target: String,
    },

    #[error("implied reference at '{resource}.{field}' cannot be resolved: {message}")]
    UnresolvedImplication {
        resource: String,
        field: String,
        message: String,
    },

    #[error("cyclic implied-reference chain detected at '{resource}.{field}'")]
    CyclicImplication { resource: String, field: String },

    #[error("auxiliary route '{route}' on resource '{resource}' is invalid: {message}")]
    AuxRouteName {
        resource: String,
        route: String,
        message: String,
    },

    #[error("shield at '{resource}.{operation}' is invalid: {message}")]
    InvalidShield {
        resource: String,
        operation: String,
        message: String,
    },

    #[error("operation '{operation}' on resource '{resource}' is excluded but declares a rule in tier '{tier}'")]
    ExcludedOperationRule {
        resource: String,
        operation: String,
        tier: String,
    },

    // ─────────────────────────────────────────────────────────────────────────────
    // Clause / Expression Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("expression error: {message}")]
    Expression { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-request Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("shield verification required ({method})")]
    ShieldRequired { method: String },

    #[error("payload validation failed")]
    Validation { errors: BTreeMap<String, Vec<String>> },

    #[error("cascade conflict: {message}")]
    CascadeConflict { message: String },

    #[error("storage failure: {message}")]
    Storage { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // IO/Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 필드별 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.into()]);
        Error::Validation { errors }
    }

    /// 설정 에러 여부 (컴파일을 중단시키는 부류)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::SchemaParse { .. }
                | Error::DuplicateResource { .. }
                | Error::UnknownRole { .. }
                | Error::DuplicateRule { .. }
                | Error::UnknownTarget { .. }
                | Error::UnresolvedImplication { .. }
                | Error::CyclicImplication { .. }
                | Error::AuxRouteName { .. }
                | Error::InvalidShield { .. }
                | Error::ExcludedOperationRule { .. }
                | Error::Yaml(_)
        )
    }

    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::SchemaParse { .. }
            | Error::Expression { .. }
            | Error::Yaml(_)
            | Error::Json(_) => 400,

            // 401 Unauthorized (2차 인증 필요)
            Error::ShieldRequired { .. } => 401,

            // 403 Forbidden
            Error::AccessDenied { .. } => 403,

            // 409 Conflict
            Error::CascadeConflict { .. } => 409,

            // 422 Unprocessable Entity
            Error::Validation { .. } => 422,

            // 500 Internal Server Error
            _ => 500,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::SchemaParse { .. } => "SCHEMA_PARSE_ERROR",
            Error::DuplicateResource { .. } => "DUPLICATE_RESOURCE",
            Error::UnknownRole { .. } => "UNKNOWN_ROLE",
            Error::DuplicateRule { .. } => "DUPLICATE_RULE",
            Error::UnknownTarget { .. } => "UNKNOWN_TARGET",
            Error::UnresolvedImplication { .. } => "UNRESOLVED_IMPLICATION",
            Error::CyclicImplication { .. } => "CYCLIC_IMPLICATION",
            Error::AuxRouteName { .. } => "AUX_ROUTE_NAME",
            Error::InvalidShield { .. } => "INVALID_SHIELD",
            Error::ExcludedOperationRule { .. } => "EXCLUDED_OPERATION_RULE",
            Error::Expression { .. } => "EXPRESSION_ERROR",
            Error::AccessDenied { .. } => "ACCESS_DENIED",
            Error::ShieldRequired { .. } => "SHIELD_REQUIRED",
            Error::Validation { .. } => "VALIDATION_FAILED",
            Error::CascadeConflict { .. } => "CASCADE_CONFLICT",
            Error::Storage { .. } => "STORAGE_FAILURE",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}
