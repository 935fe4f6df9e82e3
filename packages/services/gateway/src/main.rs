//! Gatekit Gateway
//!
//! 시작 시 선언 스키마를 컴파일하고, 합성된 라우트로 REST API를
//! 서비스합니다. 컴파일이 실패하면 프로세스는 뜨지 않습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    middleware::from_fn,
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gk_core::schema::SchemaParser;
use gk_core::views::RouteKind;

mod config;
mod error;
mod handlers;
mod middleware;
mod session;
mod state;
mod storage;

use config::Config;
use handlers::dispatch::{dispatch, RouteTarget};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "gk_gateway=debug,tower_http=debug,axum=trace".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("Starting gateway with config: {:?}", config);

    // 스키마 컴파일 (실패 시 중단)
    let yaml = std::fs::read_to_string(&config.schema_path)?;
    let api = match SchemaParser::parse_yaml(&yaml).and_then(|registry| registry.compile()) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!("schema compilation failed: {}", e);
            anyhow::bail!("schema compilation failed: {e}");
        }
    };
    tracing::info!(
        "compiled {} resources ({} dispatch units)",
        api.resources.len(),
        api.handler_sets.len()
    );

    // 앱 상태 초기화
    let state = Arc::new(AppState::new(&config, api));

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Gateway listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
///
/// 합성된 라우트마다 `RouteTarget`을 확장으로 묶어 단일 디스패치
/// 핸들러로 보냅니다.
fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Documentation
        .route("/doc/", get(handlers::docs::full_spec))
        .route("/doc/spec.json", get(handlers::docs::filtered_spec))
        .route("/doc/meta/", get(handlers::docs::meta))
        // Health check
        .route("/health", get(handlers::health::health_check));

    for set in state.api.handler_sets.values() {
        for route in &set.routes {
            let target = RouteTarget {
                resource: set.resource.clone(),
                kind: route.kind.clone(),
            };
            let method_router = match &route.kind {
                RouteKind::Collection => post(dispatch)
                    .get(dispatch)
                    .patch(dispatch)
                    .put(dispatch)
                    .delete(dispatch),
                RouteKind::BodylessGet => post(dispatch),
                RouteKind::ListAlias => get(dispatch),
                RouteKind::Aux(_) => any(dispatch),
            };
            router = router.route(&route.path, method_router.layer(Extension(target)));
        }
    }

    router
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(from_fn(middleware::request_id))
        // State
        .with_state(state)
}
