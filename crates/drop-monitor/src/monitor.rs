//! DropMonitor — 드롭 이벤트 분류/집계 엔진
//!
//! 단일 스레드 동기 엔진입니다. 제어 루프(데몬)가 이벤트를 하나씩 넘기고,
//! 배치 사이마다 [`DropMonitor::maybe_report_and_age`]로 리포트 주기를
//! 확인합니다. 엔진 내부에는 스레드도 락도 없습니다.

use std::io;
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use tracing::{debug, warn};

use dropsight_core::error::{ConfigError, DropsightError};
use dropsight_core::event::{DropSample, MonitorEvent, NetnsExit};
use dropsight_core::metrics as metric_names;
use dropsight_core::pipeline::{PacketParser, SymbolResolver};
use dropsight_core::types::{format_mac, FlowKey, FlowPayload, GroupBy, Symbol};
use dropsight_drop_common::PKT_TYPE_MASK;

use crate::classify::BucketCounts;
use crate::flowtab::{FlowBucket, AGING_CREDITS};
use crate::store::KeyedStore;

/// 드롭 위치 엔트리 (커널 코드 주소 단위)
#[derive(Debug)]
pub(crate) struct DropLocation {
    pub(crate) name: String,
    pub(crate) total_drops: u64,
    pub(crate) aging: u8,
    pub(crate) dead: bool,
}

impl DropLocation {
    fn new(name: String) -> Self {
        Self {
            name,
            total_drops: 0,
            aging: AGING_CREDITS,
            dead: false,
        }
    }
}

/// 그룹 payload: 버킷 카운터 또는 플로우 테이블, 생성 시 한 번 결정
#[derive(Debug)]
pub(crate) enum GroupData {
    Buckets(BucketCounts),
    Flows(FlowBucket),
}

/// 히스토그램 그룹 엔트리
#[derive(Debug)]
pub(crate) struct HistGroup {
    pub(crate) label: String,
    pub(crate) total_drops: u64,
    pub(crate) aging: u8,
    pub(crate) dead: bool,
    pub(crate) data: GroupData,
}

impl HistGroup {
    fn new(label: String, data: GroupData) -> Self {
        Self {
            label,
            total_drops: 0,
            aging: AGING_CREDITS,
            dead: false,
            data,
        }
    }
}

/// 드롭 분류/집계 엔진
///
/// 심볼 해석과 패킷 파싱은 trait으로 주입받습니다. 생성은
/// [`DropMonitorBuilder`]를 사용합니다.
pub struct DropMonitor<R, P> {
    pub(crate) group_by: GroupBy,
    pub(crate) threshold: u64,
    interval: Duration,
    upcall_symbol: String,
    skip_upcalls: bool,
    skip_unix: bool,
    skip_tcp: bool,
    resolver: R,
    parser: P,
    pub(crate) groups: KeyedStore<HistGroup>,
    pub(crate) locations: KeyedStore<DropLocation>,
    pub(crate) total_drops: u64,
    pub(crate) total_drops_unix: u64,
    pub(crate) drops_by_type: [u64; 8],
    netns_seq: u32,
    last_report: Instant,
}

impl<R, P> DropMonitor<R, P>
where
    R: SymbolResolver,
    P: PacketParser,
{
    /// 빌더를 생성합니다.
    pub fn builder(resolver: R, parser: P) -> DropMonitorBuilder<R, P> {
        DropMonitorBuilder::new(resolver, parser)
    }

    /// 활성 그룹핑 모드.
    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// 전송 계층에서 받은 이벤트 하나를 처리합니다.
    pub fn handle_event(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Drop(sample) => self.handle_sample(&sample),
            MonitorEvent::Exit(exit) => self.handle_exit(exit),
        }
    }

    /// 드롭 샘플 하나를 집계에 반영합니다.
    ///
    /// 파싱 실패와 용량 초과는 샘플 단위로 흡수됩니다. 어떤 경로로도
    /// 스토어가 손상되지 않습니다.
    pub fn handle_sample(&mut self, sample: &DropSample) {
        let sym = self.resolver.resolve(sample.location);

        // 스킵 필터는 어떤 카운터보다 먼저 적용된다
        if self.should_skip(&sym) {
            counter!(metric_names::MONITOR_DROPS_SKIPPED_TOTAL).increment(1);
            return;
        }

        self.total_drops += 1;
        self.drops_by_type[(sample.packet_type & PKT_TYPE_MASK) as usize] += 1;
        counter!(metric_names::MONITOR_DROPS_TOTAL).increment(1);

        let location = sample.location;
        let loc = self.locations.find_or_create_with(location, || {
            DropLocation::new(match &sym {
                Some(sym) => sym.name.clone(),
                None => format!("{location:#x}"),
            })
        });
        loc.total_drops += 1;

        // 유닉스 소켓 드롭은 전역 카운터까지만 반영
        if sym.as_ref().is_some_and(|s| s.is_unix_socket) {
            self.total_drops_unix += 1;
            return;
        }

        if self.group_by == GroupBy::None {
            return;
        }

        let flow = match self
            .parser
            .parse(sample.link_proto, &sample.data, sample.vlan_tci)
        {
            Ok(flow) => flow,
            Err(err) => {
                debug!(error = %err, location = sample.location, "failed to parse captured packet");
                counter!(metric_names::MONITOR_PARSE_ERRORS_TOTAL).increment(1);
                return;
            }
        };

        let Some(key) = self.group_key(sample, &flow) else {
            // 그룹핑 키가 이 패킷에 적용되지 않는 경우 (비-IPv4 등)
            return;
        };

        if self.groups.find(key).is_none() {
            let label = self.group_label(key);
            let data = match self.group_by {
                GroupBy::Flow => GroupData::Flows(FlowBucket::new()),
                _ => GroupData::Buckets(BucketCounts::new()),
            };
            if let Err(err) = self.groups.insert(key, HistGroup::new(label, data)) {
                warn!(error = %err, "group table inconsistency");
                return;
            }
        }

        let Some(group) = self.groups.find_mut(key) else {
            return;
        };
        group.total_drops += 1;

        match &mut group.data {
            GroupData::Flows(table) => {
                if !table.record_hit(&flow) {
                    counter!(metric_names::MONITOR_FLOW_OVERFLOWS_TOTAL).increment(1);
                }
            }
            GroupData::Buckets(counts) => {
                counts.accumulate(&flow);
                counter!(
                    metric_names::MONITOR_BUCKET_HITS_TOTAL,
                    metric_names::LABEL_BUCKET => class_label(&flow)
                )
                .increment(1);
            }
        }
    }

    /// 네임스페이스 소멸 통지를 처리합니다.
    ///
    /// 해당 그룹은 즉시 dead로 표시되고 다음 스윕에서 제거됩니다.
    /// 남은 사이클 동안의 드롭은 계속 집계됩니다.
    pub fn handle_exit(&mut self, exit: NetnsExit) {
        counter!(metric_names::MONITOR_NETNS_EXITS_TOTAL).increment(1);
        if let Some(group) = self.groups.find_mut(exit.netns) {
            debug!(netns = exit.netns, name = %group.label, "namespace exited, marking group dead");
            group.dead = true;
        }
    }

    /// 리포트 주기가 지났으면 리포트를 쓰고 스윕을 실행합니다.
    ///
    /// 주기는 생성 시점부터 측정되므로 첫 리포트는 한 주기 뒤에 나옵니다.
    /// 사이클이 실행됐으면 `Ok(true)`를 반환합니다. 마지막 리포트 시각은
    /// 렌더링이 성공한 경우에만 갱신됩니다.
    pub fn maybe_report_and_age(
        &mut self,
        now: Instant,
        out: &mut impl io::Write,
    ) -> io::Result<bool> {
        if now.duration_since(self.last_report) < self.interval {
            return Ok(false);
        }

        self.render_report(out)?;
        self.last_report = now;
        self.sweep();
        Ok(true)
    }

    /// 렌더링 직후의 에이징/제거 패스.
    ///
    /// 순서: 크레딧 조정 → 사이클 카운터 0으로 → dead 엔트리 일괄 제거.
    /// dead 플래그는 크레딧 리셋으로 되살아나지 않습니다 (소멸 통지 우선).
    fn sweep(&mut self) {
        self.total_drops = 0;
        self.total_drops_unix = 0;
        self.drops_by_type = [0; 8];

        for (_, loc) in self.locations.iter_mut() {
            if loc.total_drops > 0 {
                loc.aging = AGING_CREDITS;
            } else {
                loc.aging -= 1;
                if loc.aging == 0 {
                    loc.dead = true;
                }
            }
            loc.total_drops = 0;
        }

        for (_, group) in self.groups.iter_mut() {
            if group.total_drops > 0 {
                group.aging = AGING_CREDITS;
            } else {
                group.aging -= 1;
                if group.aging == 0 {
                    group.dead = true;
                }
            }
            group.total_drops = 0;
            match &mut group.data {
                GroupData::Buckets(counts) => counts.reset(),
                GroupData::Flows(table) => table.sweep(),
            }
        }

        let before = self.groups.len() + self.locations.len();
        self.locations.retain(|_, loc| !loc.dead);
        self.groups.retain(|_, group| !group.dead);
        let removed = before - self.groups.len() - self.locations.len();
        if removed > 0 {
            counter!(metric_names::MONITOR_GROUPS_EXPIRED_TOTAL).increment(removed as u64);
        }

        gauge!(metric_names::MONITOR_GROUPS_ACTIVE).set(self.groups.len() as f64);
        gauge!(metric_names::MONITOR_LOCATIONS_ACTIVE).set(self.locations.len() as f64);
    }

    fn should_skip(&self, sym: &Option<Symbol>) -> bool {
        let Some(sym) = sym else {
            return false;
        };
        (self.skip_upcalls && sym.name == self.upcall_symbol)
            || (self.skip_unix && sym.is_unix_socket)
            || (self.skip_tcp && sym.is_tcp)
    }

    /// 그룹핑 키를 유도합니다. 이 패킷에 키가 없으면 None입니다.
    fn group_key(&self, sample: &DropSample, flow: &FlowKey) -> Option<u64> {
        match self.group_by {
            GroupBy::None => None,
            GroupBy::Netns => Some(sample.netns),
            GroupBy::DstMac | GroupBy::Flow => Some(pack_mac(&flow.dst_mac)),
            GroupBy::SrcMac => Some(pack_mac(&flow.src_mac)),
            GroupBy::DstIp => match &flow.payload {
                FlowPayload::Ipv4 { dst, .. } => Some(u64::from(u32::from(*dst))),
                _ => None,
            },
            GroupBy::SrcIp => match &flow.payload {
                FlowPayload::Ipv4 { src, .. } => Some(u64::from(u32::from(*src))),
                _ => None,
            },
        }
    }

    /// 신규 그룹의 표시 이름을 만듭니다.
    fn group_label(&mut self, key: u64) -> String {
        match self.group_by {
            GroupBy::Netns => {
                if key == 0 {
                    "<unknown>".to_owned()
                } else if let Some(sym) = self.resolver.resolve(key) {
                    sym.name
                } else {
                    // 해석 불가능한 네임스페이스는 시퀀스 라벨을 합성한다
                    let label = format!("netns-{}", self.netns_seq);
                    self.netns_seq += 1;
                    label
                }
            }
            GroupBy::DstMac | GroupBy::SrcMac | GroupBy::Flow => format_mac(&unpack_mac(key)),
            GroupBy::DstIp | GroupBy::SrcIp => {
                std::net::Ipv4Addr::from(key as u32).to_string()
            }
            GroupBy::None => String::new(),
        }
    }
}

/// MAC 6바이트를 u64 키로 패킹합니다 (mac[0]이 최상위 바이트).
///
/// 키 오름차순 순회가 MAC 사전순이 되도록 하는 배치입니다.
fn pack_mac(mac: &[u8; 6]) -> u64 {
    mac.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn unpack_mac(key: u64) -> [u8; 6] {
    let bytes = key.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

/// 메트릭 레이블용 최상위 프로토콜 클래스.
fn class_label(flow: &FlowKey) -> &'static str {
    match &flow.payload {
        FlowPayload::Lldp => "LLDP",
        FlowPayload::Arp { .. } => "ARP",
        FlowPayload::Ipv4 { .. } => "IPv4",
        FlowPayload::Ipv6 { .. } => "IPv6",
        FlowPayload::Other { .. } => "other",
    }
}

/// [`DropMonitor`] 빌더
pub struct DropMonitorBuilder<R, P> {
    group_by: GroupBy,
    threshold: u64,
    interval: Duration,
    upcall_symbol: String,
    skip_upcalls: bool,
    skip_unix: bool,
    skip_tcp: bool,
    resolver: R,
    parser: P,
}

impl<R, P> DropMonitorBuilder<R, P>
where
    R: SymbolResolver,
    P: PacketParser,
{
    /// 협력자와 기본 설정으로 빌더를 생성합니다.
    pub fn new(resolver: R, parser: P) -> Self {
        Self {
            group_by: GroupBy::None,
            threshold: 1,
            interval: Duration::from_secs(10),
            upcall_symbol: "queue_userspace_packet".to_owned(),
            skip_upcalls: false,
            skip_unix: false,
            skip_tcp: false,
            resolver,
            parser,
        }
    }

    /// 그룹핑 모드를 설정합니다.
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    /// 리포트 표시 최소 드롭 수를 설정합니다.
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// 리포트 주기를 설정합니다.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 업콜 경로로 간주할 심볼 이름을 설정합니다.
    pub fn upcall_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.upcall_symbol = symbol.into();
        self
    }

    /// OVS 업콜 드롭을 무시합니다.
    pub fn skip_upcalls(mut self, skip: bool) -> Self {
        self.skip_upcalls = skip;
        self
    }

    /// 유닉스 소켓 드롭을 무시합니다.
    pub fn skip_unix(mut self, skip: bool) -> Self {
        self.skip_unix = skip;
        self
    }

    /// TCP 경로 드롭을 무시합니다.
    pub fn skip_tcp(mut self, skip: bool) -> Self {
        self.skip_tcp = skip;
        self
    }

    /// 엔진을 생성합니다.
    pub fn build(self) -> Result<DropMonitor<R, P>, DropsightError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_secs".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }
        if self.threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.threshold".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        Ok(DropMonitor {
            group_by: self.group_by,
            threshold: self.threshold,
            interval: self.interval,
            upcall_symbol: self.upcall_symbol,
            skip_upcalls: self.skip_upcalls,
            skip_unix: self.skip_unix,
            skip_tcp: self.skip_tcp,
            resolver: self.resolver,
            parser: self.parser,
            groups: KeyedStore::new(),
            locations: KeyedStore::new(),
            total_drops: 0,
            total_drops_unix: 0,
            drops_by_type: [0; 8],
            netns_seq: 0,
            // 첫 리포트가 시작 직후가 아니라 한 주기 뒤에 나오도록 무장한다
            last_report: Instant::now(),
        })
    }
}
