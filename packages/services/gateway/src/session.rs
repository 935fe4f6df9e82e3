//! 세션 추출
//!
//! 개발용 헤더 세션입니다. 실제 토큰 검증/발급은 외부 협력자의 몫이며,
//! gateway는 검증이 끝난 신원을 헤더로 전달받는다고 가정합니다.
//!
//! - `x-gatekit-actor`: actor id
//! - `x-gatekit-roles`: 쉼표 구분 role 목록
//! - `x-gatekit-workspace`: workspace id
//! - `x-gatekit-shield`: 통과한 2차 인증 방식 (`otp` | `sms`)

use axum::http::HeaderMap;

use gk_core::permissions::{Session, ShieldMethod};

pub const ACTOR_HEADER: &str = "x-gatekit-actor";
pub const ROLES_HEADER: &str = "x-gatekit-roles";
pub const WORKSPACE_HEADER: &str = "x-gatekit-workspace";
pub const SHIELD_HEADER: &str = "x-gatekit-shield";

/// 요청 헤더에서 세션 구성
///
/// actor 헤더가 없으면 익명 세션입니다.
pub fn from_headers(headers: &HeaderMap) -> Session {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let Some(actor) = header(ACTOR_HEADER) else {
        return Session::anonymous();
    };

    let roles: Vec<String> = header(ROLES_HEADER)
        .map(|raw| {
            raw.split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut session = Session::actor(actor, roles);

    if let Some(workspace) = header(WORKSPACE_HEADER) {
        session = session.with_workspace(workspace);
    }

    match header(SHIELD_HEADER) {
        Some("otp") => session = session.with_shield(ShieldMethod::Otp),
        Some("sms") => session = session.with_shield(ShieldMethod::Sms),
        _ => {}
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_missing_actor_is_anonymous() {
        let session = from_headers(&headers(&[(ROLES_HEADER, "Admin")]));
        assert!(!session.is_authenticated());
        assert!(session.roles.is_empty());
    }

    #[test]
    fn test_full_session_parsed() {
        let session = from_headers(&headers(&[
            (ACTOR_HEADER, "42"),
            (ROLES_HEADER, "Owner, Staff"),
            (WORKSPACE_HEADER, "ws-1"),
            (SHIELD_HEADER, "otp"),
        ]));
        assert!(session.is_authenticated());
        assert_eq!(session.actor_id.as_deref(), Some("42"));
        assert_eq!(session.roles, vec!["Owner", "Staff"]);
        assert_eq!(session.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(session.shield_passed, Some(ShieldMethod::Otp));
    }
}
