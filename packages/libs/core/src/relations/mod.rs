//! 참조 관계 해석
//!
//! # 개요
//!
//! 스키마의 참조 필드(단일/다중/암시)를 조인 계획과 삭제 연쇄 그래프로
//! 컴파일합니다. 해석은 레지스트리 컴파일의 한 단계로 실행되며, 결과는
//! 불변입니다.
//!
//! # 모듈 구조
//!
//! - `resolver`: 참조 해석과 조인 계획 생성
//! - `cascade`: 연쇄 의무 / cherry-pick 장부와 처리 정책

mod cascade;
mod resolver;

pub use cascade::{CascadeGraph, CascadeObligation, CascadePolicy, CherryPick};
pub use resolver::{resolve_all, Join, JoinKind, JoinPlan, Resolved};
