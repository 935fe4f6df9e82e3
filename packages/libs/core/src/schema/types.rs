//! 논리적 필드 타입 정의
//!
//! Gatekit은 스토리지 엔진에 독립적인 논리적 타입을 사용합니다.
//! 관계 타입(reference 계열)은 타입인 동시에 관계 선언입니다 —
//! resolver가 이를 조인 계획으로 컴파일합니다.

use serde::{Deserialize, Serialize};

/// 논리적 필드 타입
///
/// # JSON 직렬화
///
/// - `bigint`는 정밀도 보장을 위해 JSON에서 문자열로 전송됩니다.
/// - `date`, `timestamp`는 ISO 8601 문자열로 전송됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// 문자열
    String,

    /// 32비트 정수
    Integer,

    /// 64비트 정수 (JSON: string)
    Bigint,

    /// 64비트 부동소수점
    Float,

    /// 불리언
    Boolean,

    /// 날짜 (JSON: "YYYY-MM-DD")
    Date,

    /// 타임스탬프 (JSON: ISO 8601 string)
    Timestamp,

    /// 자유형 JSON
    Json,

    /// 스칼라 목록
    List,

    /// 단일 참조: 대상 리소스의 pk 하나를 담습니다
    Reference {
        /// 대상 리소스 이름
        target: String,
    },

    /// 다중 참조: 대상 리소스의 pk 목록을 담습니다
    MultiReference {
        /// 대상 리소스 이름
        target: String,
    },

    /// 암시 참조: 같은 리소스의 다른 참조 필드를 경유해 도달합니다
    ImpliedReference {
        /// 경유할 로컬 참조 필드 이름
        via: String,

        /// 경유 대상 리소스에서 최종 대상을 가리키는 필드 이름
        foreign_field: String,
    },
}

impl FieldKind {
    /// 관계 타입 여부
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            FieldKind::Reference { .. }
                | FieldKind::MultiReference { .. }
                | FieldKind::ImpliedReference { .. }
        )
    }

    /// JSON 값 검증을 위한 예상 타입 이름
    pub fn expected_json_type(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::Bigint => "string",
            FieldKind::Integer | FieldKind::Float => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "string (YYYY-MM-DD)",
            FieldKind::Timestamp => "string (ISO 8601)",
            FieldKind::Json => "any",
            FieldKind::List | FieldKind::MultiReference { .. } => "array",
            FieldKind::Reference { .. } => "string or number",
            FieldKind::ImpliedReference { .. } => "none (derived)",
        }
    }
}
