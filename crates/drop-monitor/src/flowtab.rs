//! 그룹당 플로우 테이블
//!
//! `flow` 그룹핑 모드에서 그룹(목적지 MAC) 하나가 보유하는 플로우 단위
//! 카운터입니다. 플로우는 정확 일치로 중복 제거되며 테이블은 고정 용량을
//! 가집니다. 용량 초과와 할당 실패는 샘플 손실로 이어지지만 사이클
//! 리포트에 진단 플래그로 드러납니다.

use dropsight_core::types::FlowKey;

/// 그룹 하나가 추적하는 최대 플로우 수
pub const MAX_FLOW_ENTRIES: usize = 25;

/// 유휴 엔트리가 버티는 사이클 수
pub(crate) const AGING_CREDITS: u8 = 3;

/// 플로우 엔트리 하나
#[derive(Debug, Clone)]
pub struct FlowEntry {
    /// 정규화 플로우 키
    pub flow: FlowKey,
    /// 현재 사이클 히트 수
    pub hits: u64,
    /// 남은 에이징 크레딧
    pub aging: u8,
}

/// 고정 용량 플로우 테이블
///
/// 엔트리 순서는 도착 순서이며 조회는 선형 탐색입니다. 용량이 작아
/// (25 엔트리) 탐색 비용은 상수에 가깝습니다.
#[derive(Debug, Clone, Default)]
pub struct FlowBucket {
    entries: Vec<FlowEntry>,
    /// 이번 사이클에 용량 초과로 버린 샘플이 있었는지
    pub overflow: bool,
    /// 이번 사이클에 할당 실패로 버린 샘플이 있었는지
    pub failures: bool,
}

impl FlowBucket {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 엔트리 수.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 테이블이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 엔트리 순회 (도착 순서).
    pub fn iter(&self) -> impl Iterator<Item = &FlowEntry> {
        self.entries.iter()
    }

    /// 플로우 히트를 기록합니다. 샘플이 반영됐으면 true를 반환합니다.
    ///
    /// 동일 플로우가 이미 있으면 히트만 증가합니다. 새 플로우는 용량이
    /// 남아 있을 때만 추가되며, 가득 찬 테이블에서는 `overflow` 플래그를
    /// 세우고 샘플을 버립니다. 기존 엔트리 히트는 용량과 무관하게 항상
    /// 기록됩니다.
    pub fn record_hit(&mut self, flow: &FlowKey) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.flow == *flow) {
            entry.hits += 1;
            return true;
        }

        if self.entries.len() >= MAX_FLOW_ENTRIES {
            self.overflow = true;
            return false;
        }

        if self.entries.try_reserve(1).is_err() {
            self.failures = true;
            return false;
        }
        self.entries.push(FlowEntry {
            flow: flow.clone(),
            hits: 1,
            aging: AGING_CREDITS,
        });
        true
    }

    /// 사이클 종료 처리: 에이징 적용, 히트 리셋, 진단 플래그 클리어.
    ///
    /// 이번 사이클에 히트가 있던 엔트리는 크레딧이 최대치로 돌아가고,
    /// 유휴 엔트리는 크레딧이 1 줄어 0이 되면 제거됩니다.
    pub fn sweep(&mut self) {
        self.entries.retain_mut(|entry| {
            let keep = if entry.hits > 0 {
                entry.aging = AGING_CREDITS;
                true
            } else {
                entry.aging -= 1;
                entry.aging > 0
            };
            entry.hits = 0;
            keep
        });
        self.overflow = false;
        self.failures = false;
    }
}
