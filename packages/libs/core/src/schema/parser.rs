//! 선언 YAML 파서
//!
//! 선언 문서를 파싱하여 `Registry`로 변환합니다. 구조 오류는 여기서,
//! 의미 오류(role, 참조, tier 충돌)는 `Registry::compile`에서 걸립니다.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::relations::CascadePolicy;

use super::registry::Registry;
use super::resource::Resource;

/// 선언 파서
pub struct SchemaParser;

impl SchemaParser {
    /// 단일 YAML 문서 파싱
    pub fn parse_yaml(yaml: &str) -> Result<Registry> {
        let raw: RawDeclaration = serde_yaml::from_str(yaml)?;
        Ok(Self::convert(raw))
    }

    /// 여러 YAML 문서를 하나의 레지스트리로 병합
    ///
    /// role은 합집합, 정책과 버전은 첫 문서를 따릅니다. 문서 간 리소스
    /// 이름 중복은 에러입니다 (단일 문서 내 중복은 YAML 파서가 거부).
    pub fn parse_multiple(yamls: &[&str]) -> Result<Registry> {
        let mut merged: Option<Registry> = None;

        for yaml in yamls {
            let registry = Self::parse_yaml(yaml)?;
            match &mut merged {
                None => merged = Some(registry),
                Some(base) => {
                    for role in registry.roles {
                        if !base.roles.contains(&role) {
                            base.roles.push(role);
                        }
                    }
                    for (name, resource) in registry.resources {
                        if base.resources.contains_key(&name) {
                            return Err(Error::DuplicateResource { name });
                        }
                        base.resources.insert(name, resource);
                    }
                }
            }
        }

        Ok(merged.unwrap_or_else(|| Registry {
            version: default_version(),
            roles: Vec::new(),
            cascade_policy: CascadePolicy::default(),
            resources: BTreeMap::new(),
        }))
    }

    fn convert(raw: RawDeclaration) -> Registry {
        let resources = raw
            .resources
            .into_iter()
            .map(|(name, mut resource)| {
                resource.name = name.clone();
                (name, resource)
            })
            .collect();

        Registry {
            version: raw.version,
            roles: raw.roles,
            cascade_policy: raw.cascade_policy,
            resources,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw YAML 구조체 (serde 역직렬화용)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawDeclaration {
    #[serde(default = "default_version")]
    version: u32,

    #[serde(default)]
    roles: Vec<String>,

    #[serde(default)]
    cascade_policy: CascadePolicy,

    #[serde(default)]
    resources: BTreeMap<String, Resource>,
}

fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    #[test]
    fn test_parse_minimal_declaration() {
        let yaml = r#"
version: 1
roles: [vet]
resources:
  clinic:
    fields:
      - { name: id, type: integer, primary_key: true }
      - { name: name, type: string, required: true }
"#;
        let registry = SchemaParser::parse_yaml(yaml).unwrap();
        assert_eq!(registry.version, 1);
        assert_eq!(registry.roles, vec!["vet"]);

        let clinic = &registry.resources["clinic"];
        assert_eq!(clinic.name, "clinic");
        assert_eq!(clinic.fields.len(), 2);
        assert_eq!(clinic.fields[1].kind, FieldKind::String);
    }

    #[test]
    fn test_parse_defaults() {
        let registry = SchemaParser::parse_yaml("resources: {}").unwrap();
        assert_eq!(registry.version, 1);
        assert!(registry.roles.is_empty());
        assert_eq!(registry.cascade_policy, CascadePolicy::SetNull);
    }

    #[test]
    fn test_parse_multiple_merges_roles_and_resources() {
        let a = r#"
roles: [Vet]
resources:
  clinic:
    fields:
      - { name: id, type: integer, primary_key: true }
"#;
        let b = r#"
roles: [Vet, Assistant]
resources:
  species:
    fields:
      - { name: id, type: integer, primary_key: true }
"#;
        let registry = SchemaParser::parse_multiple(&[a, b]).unwrap();
        assert_eq!(registry.roles, vec!["Vet", "Assistant"]);
        assert_eq!(registry.resources.len(), 2);
    }

    #[test]
    fn test_duplicate_resource_across_documents() {
        let doc = r#"
resources:
  clinic:
    fields:
      - { name: id, type: integer, primary_key: true }
"#;
        let err = SchemaParser::parse_multiple(&[doc, doc]).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource { .. }));
    }

    #[test]
    fn test_structural_error_reported() {
        assert!(SchemaParser::parse_yaml("resources: [not, a, map]").is_err());
    }
}
