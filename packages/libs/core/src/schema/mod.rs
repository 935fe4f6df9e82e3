//! 선언 스키마(YAML) 파싱 및 레지스트리
//!
//! # 개요
//!
//! Gatekit의 API는 선언 문서 하나로 정의됩니다. 이 모듈은 YAML을
//! 파싱하여 `Registry`를 만들고, `Registry::compile`이 권한 테이블과
//! 조인 계획, 라우트, 문서까지 모든 파생 구조를 생성합니다.
//!
//! # 모듈 구조
//!
//! - `types`: 논리적 필드 타입 정의 (string, integer, reference, ...)
//! - `field`: 필드 정의
//! - `resource`: 리소스 정의 (필드 + tier + shield + 보조 라우트)
//! - `registry`: 레지스트리와 컴파일 파이프라인
//! - `parser`: YAML 파싱 로직

mod field;
mod parser;
mod registry;
mod resource;
mod types;

pub use field::Field;
pub use parser::SchemaParser;
pub use registry::{CompiledApi, Registry};
pub use resource::Resource;
pub use types::FieldKind;
