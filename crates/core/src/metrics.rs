//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dropsight_`
//! - 모듈명: `monitor_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(dropsight_core::metrics::MONITOR_DROPS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 히스토그램 버킷 레이블 키 (LLDP, ARP, TCP syn, ...)
pub const LABEL_BUCKET: &str = "bucket";

// ─── Monitor 메트릭 ─────────────────────────────────────────────────

/// Monitor: 관측된 전체 드롭 수 (counter)
pub const MONITOR_DROPS_TOTAL: &str = "dropsight_monitor_drops_total";

/// Monitor: 집계 전에 필터링된 드롭 수 (counter)
pub const MONITOR_DROPS_SKIPPED_TOTAL: &str = "dropsight_monitor_drops_skipped_total";

/// Monitor: 패킷 파싱 실패 수 (counter)
pub const MONITOR_PARSE_ERRORS_TOTAL: &str = "dropsight_monitor_parse_errors_total";

/// Monitor: 버킷별 분류 수 (counter, label: bucket)
pub const MONITOR_BUCKET_HITS_TOTAL: &str = "dropsight_monitor_bucket_hits_total";

/// Monitor: 플로우 테이블 용량 초과 수 (counter)
pub const MONITOR_FLOW_OVERFLOWS_TOTAL: &str = "dropsight_monitor_flow_overflows_total";

/// Monitor: 현재 히스토그램 그룹 수 (gauge)
pub const MONITOR_GROUPS_ACTIVE: &str = "dropsight_monitor_groups_active";

/// Monitor: 현재 드롭 위치 엔트리 수 (gauge)
pub const MONITOR_LOCATIONS_ACTIVE: &str = "dropsight_monitor_locations_active";

/// Monitor: 에이징으로 제거된 그룹 수 (counter)
pub const MONITOR_GROUPS_EXPIRED_TOTAL: &str = "dropsight_monitor_groups_expired_total";

/// Monitor: 네임스페이스 소멸 통지 수 (counter)
pub const MONITOR_NETNS_EXITS_TOTAL: &str = "dropsight_monitor_netns_exits_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "dropsight_daemon_uptime_seconds";

/// Daemon: 링 버퍼에서 수신한 이벤트 수 (counter)
pub const DAEMON_EVENTS_RECEIVED_TOTAL: &str = "dropsight_daemon_events_received_total";

/// Daemon: 디코딩 불가로 버린 이벤트 수 (counter)
pub const DAEMON_EVENTS_MALFORMED_TOTAL: &str = "dropsight_daemon_events_malformed_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `dropsight-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Monitor
    describe_counter!(
        MONITOR_DROPS_TOTAL,
        "Total number of packet drop events observed"
    );
    describe_counter!(
        MONITOR_DROPS_SKIPPED_TOTAL,
        "Drop events filtered out before aggregation (upcall, unix, tcp paths)"
    );
    describe_counter!(
        MONITOR_PARSE_ERRORS_TOTAL,
        "Captured packets that could not be parsed into a flow"
    );
    describe_counter!(
        MONITOR_BUCKET_HITS_TOTAL,
        "Histogram bucket increments per protocol class"
    );
    describe_counter!(
        MONITOR_FLOW_OVERFLOWS_TOTAL,
        "Flow samples discarded because the per-group flow table was full"
    );
    describe_gauge!(
        MONITOR_GROUPS_ACTIVE,
        "Current number of histogram groups being tracked"
    );
    describe_gauge!(
        MONITOR_LOCATIONS_ACTIVE,
        "Current number of distinct kernel drop locations"
    );
    describe_counter!(
        MONITOR_GROUPS_EXPIRED_TOTAL,
        "Histogram groups removed by idle aging or namespace exit"
    );
    describe_counter!(
        MONITOR_NETNS_EXITS_TOTAL,
        "Network namespace exit notifications received"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_counter!(
        DAEMON_EVENTS_RECEIVED_TOTAL,
        "Raw events received from the kernel ring buffer"
    );
    describe_counter!(
        DAEMON_EVENTS_MALFORMED_TOTAL,
        "Ring buffer records dropped because they were too short to decode"
    );
}
