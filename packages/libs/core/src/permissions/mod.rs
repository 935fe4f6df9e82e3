//! 권한 엔진
//!
//! # 개요
//!
//! 스키마 선언의 tier 블록을 컴파일해 리소스별 권한 테이블을 만들고,
//! 요청마다 세션 role과 조건 절을 평가합니다. 동적 조건은
//! CEL(Common Expression Language) 식으로도 쓸 수 있습니다.
//!
//! # 모듈 구조
//!
//! - `clause`: 조건 절 대수 (open / checked / expr / and / or)
//! - `context`: 세션과 평가 컨텍스트
//! - `roles`: 시스템 role 레지스트리
//! - `tier`: Public/Authed/Private tier와 operation 규칙
//! - `table`: tier 머지 결과인 권한 테이블과 요청 평가
//! - `shield`: 2차 인증 요구

mod clause;
mod context;
mod roles;
mod shield;
mod table;
mod tier;

pub use clause::{CheckedClause, Clause, CompareOp, OpenClause};
pub use context::{Row, Session, SessionAttr};
pub use roles::{RoleSet, BUILTIN_ROLES, WILDCARD};
pub use shield::{Shield, ShieldMethod, ShieldRule, ShieldRuleDecl};
pub use table::{AuthorizationTable, Denial, Grant, OpGrants, Permit};
pub use tier::{Operation, OperationRule, Tier, TierRules, CANONICAL_OPERATIONS};
