//! gk-core: Gatekit 컴파일 코어
//!
//! 선언 스키마를 파싱해 권한 테이블, 조인 계획, 라우트, API 문서까지
//! 모든 파생 구조를 만드는 순수 라이브러리입니다. I/O와 전송 계층은
//! gateway 서비스가 담당합니다.
//!
//! # 모듈 구조
//!
//! - `schema`: 선언 스키마(YAML) 파싱 및 레지스트리 컴파일
//! - `permissions`: 절 대수, role/tier, 권한 테이블, shield
//! - `relations`: 참조 관계 해석 (조인 계획, 삭제 연쇄)
//! - `views`: 라우트 합성
//! - `apidoc`: API 기술 문서와 role별 필터
//! - `validation`: payload 필드 검증
//! - `error`: 공통 에러 타입

pub mod apidoc;
pub mod error;
pub mod permissions;
pub mod relations;
pub mod schema;
pub mod validation;
pub mod views;

pub use error::{Error, Result};
