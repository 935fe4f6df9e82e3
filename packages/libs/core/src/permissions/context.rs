//! 요청 세션 컨텍스트
//!
//! 권한 평가에 필요한 세션 정보를 담습니다. transport 레이어가 인증을
//! 마친 뒤 순수 값으로 전달하며, 평가 중에는 절대 변경되지 않습니다.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::shield::ShieldMethod;

/// Row 데이터 (스토리지에서 읽은 한 건)
pub type Row = serde_json::Map<String, Value>;

/// Checked 절이 참조할 수 있는 세션 속성
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAttr {
    /// 행위자 ID
    ActorId,

    /// 워크스페이스(테넌트) ID
    WorkspaceId,
}

impl SessionAttr {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAttr::ActorId => "actor_id",
            SessionAttr::WorkspaceId => "workspace_id",
        }
    }
}

/// 인증 세션
///
/// # Expr 절에서 사용 가능한 변수
///
/// - `request.auth.sub`: 행위자 ID
/// - `request.auth.roles`: Role 목록
/// - `request.auth.workspace`: 워크스페이스 ID
/// - `resource`: 현재 평가 대상 Row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// 행위자 ID (미인증 시 None)
    pub actor_id: Option<String>,

    /// Role 목록
    #[serde(default)]
    pub roles: Vec<String>,

    /// 워크스페이스 ID
    pub workspace_id: Option<String>,

    /// transport가 수행한 2차 인증 (Shield) 방식
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shield_passed: Option<ShieldMethod>,
}

impl Session {
    /// 익명 세션
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// 인증된 세션 생성
    pub fn actor(actor_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
            roles,
            workspace_id: None,
            shield_passed: None,
        }
    }

    /// 워크스페이스 설정
    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// 2차 인증 마커 설정
    pub fn with_shield(mut self, method: ShieldMethod) -> Self {
        self.shield_passed = Some(method);
        self
    }

    /// 인증되었는지 확인
    pub fn is_authenticated(&self) -> bool {
        self.actor_id.is_some()
    }

    /// 특정 role을 가지고 있는지 확인
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Checked 절이 참조하는 세션 속성 값
    pub fn attr(&self, attr: SessionAttr) -> Option<Value> {
        match attr {
            SessionAttr::ActorId => self.actor_id.clone().map(Value::String),
            SessionAttr::WorkspaceId => self.workspace_id.clone().map(Value::String),
        }
    }

    /// CEL 평가를 위한 변수 맵 생성
    pub fn to_cel_variables(&self, row: Option<&Row>) -> HashMap<String, Value> {
        let mut vars = HashMap::new();

        let mut auth_obj = serde_json::Map::new();
        if let Some(sub) = &self.actor_id {
            auth_obj.insert("sub".to_string(), Value::String(sub.clone()));
        }
        auth_obj.insert(
            "roles".to_string(),
            Value::Array(self.roles.iter().map(|r| Value::String(r.clone())).collect()),
        );
        if let Some(workspace) = &self.workspace_id {
            auth_obj.insert("workspace".to_string(), Value::String(workspace.clone()));
        }

        let mut request_obj = serde_json::Map::new();
        request_obj.insert("auth".to_string(), Value::Object(auth_obj));
        vars.insert("request".to_string(), Value::Object(request_obj));

        if let Some(row) = row {
            vars.insert("resource".to_string(), Value::Object(row.clone()));
        }

        vars
    }
}
