//! Gateway 앱 상태

use std::sync::Arc;

use gk_core::apidoc::SpecCache;
use gk_core::schema::CompiledApi;

use crate::config::Config;
use crate::storage::{MemoryStorage, Storage};

/// 앱 상태
///
/// 모든 핸들러에서 공유하는 상태입니다. 컴파일 결과는 불변이므로
/// 잠금 없이 읽습니다.
pub struct AppState {
    /// 설정
    pub config: Config,

    /// 컴파일된 API
    pub api: Arc<CompiledApi>,

    /// 스토리지
    pub storage: Arc<dyn Storage>,

    /// role별 문서 캐시
    pub spec_cache: SpecCache,
}

impl AppState {
    /// 새 상태 생성
    pub fn new(config: &Config, api: CompiledApi) -> Self {
        let policy = config.cascade_policy.unwrap_or(api.cascade_policy);
        let api = Arc::new(api);
        let storage = Arc::new(MemoryStorage::new(&api, policy));
        let spec_cache = SpecCache::new(api.spec.clone());

        Self {
            config: config.clone(),
            api,
            storage,
            spec_cache,
        }
    }
}
