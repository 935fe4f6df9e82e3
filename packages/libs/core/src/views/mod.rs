//! View 합성
//!
//! # 개요
//!
//! 리소스 선언을 라우트 목록 + 권한 테이블 + shield를 묶은
//! `HandlerSet`으로 컴파일합니다. 구조적으로 비슷하지만 규칙이 서로
//! 다른 엔드포인트 집합을 안전하게 찍어내는 단계입니다.

mod synth;

pub use synth::{synthesize, HandlerSet, RouteKind, RouteSpec};
