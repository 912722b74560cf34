#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//! - [`store`]: KeyedStore — u64 키 정렬 스토어 (그룹/위치 테이블 공용)
//! - [`classify`]: 프로토콜 클래스 버킷과 분류 규칙
//! - [`flowtab`]: 그룹당 플로우 테이블 (정확 일치 중복 제거)
//! - [`parse`]: 이더넷 프레임 → FlowKey 파서
//! - [`ingest`]: 링 버퍼 레코드 디코딩
//! - [`monitor`]: DropMonitor — 이벤트 소비와 집계
//! - [`report`]: 주기 리포트 렌더링
//!
//! # 공유 타입
//! 커널/유저스페이스 공유 레이아웃은 [`dropsight_drop_common`] 크레이트에
//! 정의되어 있습니다.

pub mod classify;
pub mod flowtab;
pub mod ingest;
pub mod monitor;
pub mod parse;
mod report;
pub mod store;

// --- 주요 타입 re-export ---

// 엔진
pub use monitor::{DropMonitor, DropMonitorBuilder};

// 분류
pub use classify::{Bucket, BucketCounts};

// 플로우 테이블
pub use flowtab::{FlowBucket, MAX_FLOW_ENTRIES};

// 파서/디코더
pub use ingest::decode_event;
pub use parse::EtherFlowParser;

// 스토어
pub use store::KeyedStore;

// 공유 타입 (커널/유저스페이스 공통)
pub use dropsight_drop_common;
