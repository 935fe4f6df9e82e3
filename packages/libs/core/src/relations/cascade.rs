//! 삭제 연쇄 장부
//!
//! 참조 관계 해석 결과 중 삭제 시점에 소비되는 부분입니다. 리소스의
//! row가 삭제될 때 (a) 그 row를 가리키는 단일 참조를 정리할 의무와
//! (b) 다중 참조 집합 필드에서 키를 뽑아낼 cherry-pick 목록을
//! 삭제 대상 리소스 이름으로 조회합니다.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 연쇄 의무 처리 정책 (배포 설정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// 참조 필드를 NULL로 정리하고 삭제 진행 (기본값)
    #[default]
    SetNull,

    /// 참조가 남아 있으면 삭제 거부
    Reject,
}

/// 단일 참조의 연쇄 의무
///
/// (참조 보유 리소스, 참조 필드, 참조 대상 리소스)로 기록됩니다.
/// 대상 row 삭제 전에 모든 의무가 처리(정리 또는 거부)되어야 합니다.
/// 일대일 참조는 참조 보유 리소스 쪽에도 같은 의무가 등록되어,
/// 어느 쪽을 삭제해도 반대편 점검이 수행됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeObligation {
    /// 참조를 보유한 리소스
    pub resource: String,

    /// 삭제 대상을 가리키는 필드
    pub field: String,

    /// 보유 리소스의 기본 키 필드
    pub pk: String,

    /// 참조가 가리키는 리소스
    pub target: String,

    /// 일대일 관계 여부 (양쪽 모두에 의무가 등록됨)
    pub unique: bool,
}

/// 다중 참조의 cherry-pick 항목
///
/// 링크된 리소스의 row가 삭제되면 `resource.field` 집합에서 해당 키를
/// 제거해야 합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CherryPick {
    /// 집합 필드를 보유한 리소스
    pub resource: String,

    /// 키 집합 필드
    pub field: String,
}

/// 전역 연쇄 그래프
///
/// 컴파일 시 한 번 만들어지고 이후 불변입니다. 키는 삭제 대상 리소스
/// 이름입니다.
#[derive(Debug, Clone, Default)]
pub struct CascadeGraph {
    obligations: BTreeMap<String, Vec<CascadeObligation>>,
    cherry_picks: BTreeMap<String, Vec<CherryPick>>,
}

impl CascadeGraph {
    pub(crate) fn register_obligation(&mut self, deleted: &str, obligation: CascadeObligation) {
        self.obligations
            .entry(deleted.to_string())
            .or_default()
            .push(obligation);
    }

    pub(crate) fn register_cherry_pick(&mut self, deleted: &str, pick: CherryPick) {
        self.cherry_picks
            .entry(deleted.to_string())
            .or_default()
            .push(pick);
    }

    /// `deleted` 리소스의 row 삭제 시 처리할 의무 목록
    pub fn obligations_for(&self, deleted: &str) -> &[CascadeObligation] {
        self.obligations.get(deleted).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `deleted` 리소스의 row 삭제 시 수행할 cherry-pick 목록
    pub fn cherry_picks_for(&self, deleted: &str) -> &[CherryPick] {
        self.cherry_picks
            .get(deleted)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
