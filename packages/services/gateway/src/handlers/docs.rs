//! API 문서 엔드포인트
//!
//! - `GET /doc/`: 전체 문서 (Admin 전용)
//! - `GET /doc/spec.json`: 요청자 role로 필터된 문서
//! - `GET /doc/meta/`: 문서 해시와 인증 상태

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use gk_core::apidoc::ApiSpec;

use crate::error::{GatewayError, Result};
use crate::session;
use crate::state::AppState;

pub async fn full_spec(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiSpec>> {
    let session = session::from_headers(&headers);
    if !session.has_role("Admin") {
        return Err(GatewayError::Forbidden {
            message: "full specification is restricted to Admin".to_string(),
        });
    }
    Ok(Json(state.spec_cache.full().as_ref().clone()))
}

pub async fn filtered_spec(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ApiSpec> {
    let session = session::from_headers(&headers);
    let roles: BTreeSet<String> = session.roles.iter().cloned().collect();
    Json(state.spec_cache.for_roles(&roles).as_ref().clone())
}

pub async fn meta(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<Value> {
    let session = session::from_headers(&headers);
    Json(json!({
        "spec_hashsum": state.spec_cache.hashsum(),
        "authed": session.is_authenticated(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use gk_core::schema::SchemaParser;

    fn app_state() -> Arc<AppState> {
        let yaml = r#"
resources:
  clinic:
    fields:
      - { name: id, type: integer, primary_key: true }
    public:
      list: { roles: ["*"] }
    private:
      delete: { roles: [Manager] }
"#;
        let api = SchemaParser::parse_yaml(yaml).unwrap().compile().unwrap();
        let config = Config {
            port: 0,
            schema_path: String::new(),
            cascade_policy: None,
        };
        Arc::new(AppState::new(&config, api))
    }

    fn headers(actor: &str, roles: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-gatekit-actor", actor.parse().unwrap());
        headers.insert("x-gatekit-roles", roles.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_full_spec_admin_only() {
        let state = app_state();

        let err = full_spec(State(Arc::clone(&state)), headers("1", "Staff"))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden { .. }));

        let Json(spec) = full_spec(State(Arc::clone(&state)), headers("1", "Admin"))
            .await
            .unwrap();
        assert!(spec.paths.contains_key("/clinic/"));

        // 응답 본문은 직렬화 가능해야 한다
        assert!(serde_json::to_value(&spec).is_ok());
    }

    #[tokio::test]
    async fn test_filtered_spec_follows_requester_roles() {
        let state = app_state();

        let Json(anon) = filtered_spec(State(Arc::clone(&state)), HeaderMap::new()).await;
        assert!(anon.paths.contains_key("/clinic/list/"));
        assert!(!anon.paths.contains_key("/clinic/"));

        let Json(manager) = filtered_spec(State(state), headers("1", "Manager")).await;
        assert!(manager.paths["/clinic/"].contains_key("delete"));
    }
}
