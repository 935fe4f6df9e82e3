//! Gateway 설정

use std::env;

use gk_core::relations::CascadePolicy;

/// Gateway 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 포트
    pub port: u16,

    /// 선언 스키마 파일 경로
    pub schema_path: String,

    /// 연쇄 정책 재정의 (미설정 시 스키마 선언을 따름)
    pub cascade_policy: Option<CascadePolicy>,
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: env::var("GK_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,

            schema_path: env::var("GK_SCHEMA_PATH")
                .unwrap_or_else(|_| "schema.yaml".to_string()),

            cascade_policy: match env::var("GK_CASCADE_POLICY").ok().as_deref() {
                None | Some("") => None,
                Some("set_null") => Some(CascadePolicy::SetNull),
                Some("reject") => Some(CascadePolicy::Reject),
                Some(other) => anyhow::bail!("unknown GK_CASCADE_POLICY value: {other}"),
            },
        })
    }
}
