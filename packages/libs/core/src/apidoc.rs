//! API 기술 문서와 role별 필터
//!
//! 합성된 view에서 경로 → 메서드 → operation 설명을 만들고, 요청자의
//! role 집합이 볼 수 있는 부분만 남기는 필터를 제공합니다. 필터 결과는
//! 항상 재유도와 동일하며, role 집합별로 메모이즈됩니다.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::permissions::Operation;
use crate::schema::Resource;
use crate::views::{HandlerSet, RouteKind};

/// operation 하나의 문서
#[derive(Debug, Clone, Serialize)]
pub struct OperationDoc {
    pub operation: Operation,

    /// 허용 role (전개 완료)
    pub roles: BTreeSet<String>,

    /// 익명 접근 가능 여부
    pub public: bool,

    /// 요청 payload 필드
    pub request: Vec<String>,

    /// 응답 필드
    pub response: Vec<String>,
}

/// 경로 하나의 문서: HTTP 메서드 → operation 문서
pub type PathDoc = BTreeMap<String, OperationDoc>;

/// API 기술 문서 전체
#[derive(Debug, Clone, Serialize)]
pub struct ApiSpec {
    pub version: u32,
    pub paths: BTreeMap<String, PathDoc>,
}

impl ApiSpec {
    /// 합성 결과에서 문서 생성
    pub fn build(
        version: u32,
        resources: &BTreeMap<String, Resource>,
        sets: &BTreeMap<String, HandlerSet>,
    ) -> Self {
        let mut paths: BTreeMap<String, PathDoc> = BTreeMap::new();

        for (name, set) in sets {
            let Some(resource) = resources.get(name) else { continue };

            for route in &set.routes {
                let mut doc = PathDoc::new();

                match &route.kind {
                    RouteKind::Collection => {
                        for (method, op) in [
                            ("post", Operation::Post),
                            ("get", Operation::Get),
                            ("patch", Operation::Patch),
                            ("put", Operation::Put),
                            ("delete", Operation::Delete),
                        ] {
                            if let Some(entry) = operation_doc(resource, set, op) {
                                doc.insert(method.to_string(), entry);
                            }
                        }
                    }
                    RouteKind::BodylessGet => {
                        if let Some(entry) = operation_doc(resource, set, Operation::Get) {
                            doc.insert("post".to_string(), entry);
                        }
                    }
                    RouteKind::ListAlias => {
                        if let Some(entry) = operation_doc(resource, set, Operation::List) {
                            doc.insert("get".to_string(), entry);
                        }
                    }
                    RouteKind::Aux(aux) => {
                        let Some(table) = set.aux_tables.get(aux) else { continue };
                        for op in table.operations() {
                            if let Some(grants) = table.grants(op) {
                                doc.insert(
                                    http_method(op).to_string(),
                                    OperationDoc {
                                        operation: op,
                                        roles: grants.by_role.keys().cloned().collect(),
                                        public: grants.anonymous.is_some(),
                                        request: Vec::new(),
                                        response: Vec::new(),
                                    },
                                );
                            }
                        }
                    }
                }

                if !doc.is_empty() {
                    paths.insert(route.path.clone(), doc);
                }
            }
        }

        Self { version, paths }
    }

    /// 요청자 role 집합이 볼 수 있는 부분만 남김
    ///
    /// operation은 익명 공개이거나, 요청자가 Admin이거나, role 집합이
    /// 교차할 때 유지됩니다. 결정적이며 재유도와 동일합니다.
    pub fn filter_for(&self, roles: &BTreeSet<String>) -> ApiSpec {
        if roles.contains("Admin") {
            return self.clone();
        }

        let mut paths: BTreeMap<String, PathDoc> = BTreeMap::new();
        for (path, doc) in &self.paths {
            let kept: PathDoc = doc
                .iter()
                .filter(|(_, op)| op.public || op.roles.iter().any(|r| roles.contains(r)))
                .map(|(m, op)| (m.clone(), op.clone()))
                .collect();
            if !kept.is_empty() {
                paths.insert(path.clone(), kept);
            }
        }

        ApiSpec {
            version: self.version,
            paths,
        }
    }

    /// 정본 JSON의 sha256 hex
    ///
    /// 경로와 메서드가 모두 정렬 맵이므로 직렬화는 결정적입니다.
    pub fn hashsum(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

fn operation_doc(resource: &Resource, set: &HandlerSet, op: Operation) -> Option<OperationDoc> {
    if resource.excluded_ops.contains(&op) {
        return None;
    }
    let grants = set.table.grants(op)?;

    let response: Vec<String> = resource.fields.iter().map(|f| f.name.clone()).collect();
    let request: Vec<String> = if op.is_write() {
        resource
            .fields
            .iter()
            .filter(|f| f.allows_write())
            .map(|f| f.name.clone())
            .collect()
    } else {
        response.clone()
    };

    Some(OperationDoc {
        operation: op,
        roles: grants.by_role.keys().cloned().collect(),
        public: grants.anonymous.is_some(),
        request,
        response,
    })
}

fn http_method(op: Operation) -> &'static str {
    match op {
        Operation::Post => "post",
        Operation::Get | Operation::List => "get",
        Operation::Patch => "patch",
        Operation::Put => "put",
        Operation::Delete => "delete",
    }
}

/// role 집합별 필터 결과 캐시
///
/// 채움은 지연·동시 가능이며 같은 role 집합의 중복 계산은 무해합니다
/// (결과가 결정적이므로 마지막 쓰기가 이겨도 동일).
#[derive(Debug)]
pub struct SpecCache {
    full: Arc<ApiSpec>,
    hash: String,
    by_roles: RwLock<HashMap<BTreeSet<String>, Arc<ApiSpec>>>,
}

impl SpecCache {
    pub fn new(full: ApiSpec) -> Self {
        let hash = full.hashsum();
        Self {
            full: Arc::new(full),
            hash,
            by_roles: RwLock::new(HashMap::new()),
        }
    }

    /// 전체 문서 (Admin 전용 노출)
    pub fn full(&self) -> Arc<ApiSpec> {
        Arc::clone(&self.full)
    }

    /// 전체 문서의 내용 해시
    pub fn hashsum(&self) -> &str {
        &self.hash
    }

    /// role 집합에 대한 필터 결과 (캐시 조회, 없으면 계산 후 저장)
    pub fn for_roles(&self, roles: &BTreeSet<String>) -> Arc<ApiSpec> {
        if let Ok(cache) = self.by_roles.read() {
            if let Some(hit) = cache.get(roles) {
                return Arc::clone(hit);
            }
        }

        let computed = Arc::new(self.full.filter_for(roles));
        if let Ok(mut cache) = self.by_roles.write() {
            cache.insert(roles.clone(), Arc::clone(&computed));
        }
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::RoleSet;
    use crate::views::synthesize;

    fn compiled() -> (BTreeMap<String, Resource>, BTreeMap<String, HandlerSet>) {
        let yaml = r#"
clinic:
  fields:
    - { name: id, type: integer, read_only: true, primary_key: true }
    - { name: name, type: string, required: true }
  public:
    list: { roles: ["*"] }
  private:
    get: { roles: [Owner] }
    delete: { roles: [Manager] }
"#;
        let mut resources: BTreeMap<String, Resource> = serde_yaml::from_str(yaml).unwrap();
        for (name, res) in resources.iter_mut() {
            res.name = name.clone();
        }
        let roles = RoleSet::default();
        let sets = resources
            .iter()
            .map(|(name, res)| (name.clone(), synthesize(res, &roles).unwrap()))
            .collect();
        (resources, sets)
    }

    fn roles(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_paths_and_methods() {
        let (resources, sets) = compiled();
        let spec = ApiSpec::build(1, &resources, &sets);

        assert!(spec.paths.contains_key("/clinic/"));
        assert!(spec.paths["/clinic/list/"].contains_key("get"));
        assert!(spec.paths["/clinic/get/"].contains_key("post"));
        assert!(spec.paths["/clinic/"].contains_key("delete"));
        // post에 대한 규칙이 없으므로 문서에도 없다
        assert!(!spec.paths["/clinic/"].contains_key("post"));
    }

    #[test]
    fn test_read_only_excluded_from_request_fields() {
        let (resources, sets) = compiled();
        let spec = ApiSpec::build(1, &resources, &sets);
        let delete = &spec.paths["/clinic/"]["delete"];
        assert!(delete.response.contains(&"id".to_string()));

        let get = &spec.paths["/clinic/get/"]["post"];
        assert_eq!(get.operation, Operation::Get);
    }

    #[test]
    fn test_filter_keeps_public_and_matching_roles() {
        let (resources, sets) = compiled();
        let spec = ApiSpec::build(1, &resources, &sets);

        let anon = spec.filter_for(&roles(&[]));
        assert!(anon.paths.contains_key("/clinic/list/"));
        assert!(!anon.paths.contains_key("/clinic/get/"));

        let owner = spec.filter_for(&roles(&["Owner"]));
        assert!(owner.paths.contains_key("/clinic/get/"));
        // 본 라우트에서 get은 남고 Manager 전용 delete는 사라진다
        assert!(owner.paths["/clinic/"].contains_key("get"));
        assert!(!owner.paths["/clinic/"].contains_key("delete"));
    }

    #[test]
    fn test_admin_sees_everything() {
        let (resources, sets) = compiled();
        let spec = ApiSpec::build(1, &resources, &sets);
        let admin = spec.filter_for(&roles(&["Admin"]));
        assert_eq!(admin.paths.len(), spec.paths.len());
    }

    #[test]
    fn test_filter_equals_rederivation_and_cache() {
        let (resources, sets) = compiled();
        let cache = SpecCache::new(ApiSpec::build(1, &resources, &sets));

        let owner = roles(&["Owner"]);
        let first = cache.for_roles(&owner);
        let second = cache.for_roles(&owner);
        let fresh = cache.full().filter_for(&owner);

        assert_eq!(first.hashsum(), second.hashsum());
        assert_eq!(first.hashsum(), fresh.hashsum());
    }

    #[test]
    fn test_hashsum_stable_and_content_sensitive() {
        let (resources, sets) = compiled();
        let spec = ApiSpec::build(1, &resources, &sets);
        assert_eq!(spec.hashsum(), spec.clone().hashsum());
        assert_eq!(spec.hashsum().len(), 64);

        let filtered = spec.filter_for(&roles(&[]));
        assert_ne!(spec.hashsum(), filtered.hashsum());
    }
}
