//! 필드 정의
//!
//! 리소스의 필드 메타데이터를 정의합니다.

use serde::{Deserialize, Serialize};

use super::types::FieldKind;

/// 필드 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// 필드 이름
    pub name: String,

    /// 필드 타입
    #[serde(flatten)]
    pub kind: FieldKind,

    /// 생성 시 필수 여부
    #[serde(default)]
    pub required: bool,

    /// 유니크 제약
    #[serde(default)]
    pub unique: bool,

    /// 읽기 전용 (payload에 등장하면 검증 에러)
    #[serde(default)]
    pub read_only: bool,

    /// 기본 키 여부
    #[serde(default)]
    pub primary_key: bool,
}

impl Field {
    /// 쓰기 payload에 허용되는 필드인지
    ///
    /// 읽기 전용 필드와 암시 참조는 항상 서버가 파생합니다.
    pub fn allows_write(&self) -> bool {
        !self.read_only && !matches!(self.kind, FieldKind::ImpliedReference { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_deserialization_defaults() {
        let field: Field =
            serde_yaml::from_str("name: email\ntype: string\nrequired: true").unwrap();
        assert_eq!(field.name, "email");
        assert_eq!(field.kind, FieldKind::String);
        assert!(field.required);
        assert!(!field.unique);
        assert!(!field.read_only);
        assert!(!field.primary_key);
        assert!(field.allows_write());
    }

    #[test]
    fn test_read_only_and_implied_block_writes() {
        let field: Field =
            serde_yaml::from_str("name: created_at\ntype: timestamp\nread_only: true").unwrap();
        assert!(!field.allows_write());

        let field: Field = serde_yaml::from_str(
            "name: org\ntype: implied_reference\nvia: clinic\nforeign_field: org",
        )
        .unwrap();
        assert!(!field.allows_write());
    }
}
