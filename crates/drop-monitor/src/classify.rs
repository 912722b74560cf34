//! 프로토콜 클래스 버킷과 분류 규칙
//!
//! 드롭된 패킷 하나는 계층별로 여러 버킷을 동시에 증가시킵니다.
//! 예를 들어 IPv4 TCP SYN 드롭은 `Ipv4`, `Tcp`, `TcpSyn` 세 버킷에
//! 반영됩니다. TCP 플래그는 FIN > RST > SYN 우선순위로 정확히 하나의
//! 플래그 버킷만 증가합니다.

use dropsight_core::types::{FlowKey, FlowPayload, FlowTransport, GroupBy};
use dropsight_drop_common::{ARPOP_REPLY, ARPOP_REQUEST};

/// 히스토그램 버킷 (리포트 컬럼 순서 그대로)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Bucket {
    Lldp,
    Arp,
    ArpReq,
    ArpReply,
    ArpOther,
    Ipv4,
    Ipv6,
    Tcp,
    TcpSyn,
    TcpRst,
    TcpFin,
    Udp,
    Vrrp,
    Other,
}

impl Bucket {
    /// 버킷 수
    pub const COUNT: usize = 14;

    /// 리포트 컬럼 순서의 전체 버킷
    pub const ALL: [Bucket; Bucket::COUNT] = [
        Bucket::Lldp,
        Bucket::Arp,
        Bucket::ArpReq,
        Bucket::ArpReply,
        Bucket::ArpOther,
        Bucket::Ipv4,
        Bucket::Ipv6,
        Bucket::Tcp,
        Bucket::TcpSyn,
        Bucket::TcpRst,
        Bucket::TcpFin,
        Bucket::Udp,
        Bucket::Vrrp,
        Bucket::Other,
    ];

    /// 리포트 컬럼 헤더 라벨
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Lldp => "LLDP",
            Bucket::Arp => "ARP",
            Bucket::ArpReq => "ARP req",
            Bucket::ArpReply => "ARP reply",
            Bucket::ArpOther => "ARP other",
            Bucket::Ipv4 => "IPv4",
            Bucket::Ipv6 => "IPv6",
            Bucket::Tcp => "TCP",
            Bucket::TcpSyn => "TCP syn",
            Bucket::TcpRst => "TCP reset",
            Bucket::TcpFin => "TCP fin",
            Bucket::Udp => "UDP",
            Bucket::Vrrp => "VRRP",
            Bucket::Other => "other",
        }
    }

    /// IPv4 주소 그룹핑에서 숨길 버킷인지 확인합니다.
    ///
    /// dip/sip 모드는 IPv4 패킷만 그룹에 도달하므로 비-IPv4 컬럼은
    /// 항상 0이 되어 출력에서 제외합니다.
    pub fn hidden_for(&self, group_by: GroupBy) -> bool {
        if !matches!(group_by, GroupBy::DstIp | GroupBy::SrcIp) {
            return false;
        }
        matches!(
            self,
            Bucket::Lldp
                | Bucket::Arp
                | Bucket::ArpReq
                | Bucket::ArpReply
                | Bucket::ArpOther
                | Bucket::Ipv6
        )
    }
}

/// 그룹 하나의 버킷 카운터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketCounts {
    counts: [u64; Bucket::COUNT],
}

impl BucketCounts {
    /// 0으로 초기화된 카운터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 버킷 하나를 증가시킵니다.
    pub fn bump(&mut self, bucket: Bucket) {
        self.counts[bucket as usize] += 1;
    }

    /// 버킷 값을 조회합니다.
    pub fn get(&self, bucket: Bucket) -> u64 {
        self.counts[bucket as usize]
    }

    /// 모든 버킷을 0으로 되돌립니다. 리포트 사이클 종료 시 호출됩니다.
    pub fn reset(&mut self) {
        self.counts = [0; Bucket::COUNT];
    }

    /// 플로우를 분류해서 해당하는 버킷들을 증가시킵니다.
    pub fn accumulate(&mut self, flow: &FlowKey) {
        match &flow.payload {
            FlowPayload::Lldp => self.bump(Bucket::Lldp),
            FlowPayload::Arp { op, .. } => {
                self.bump(Bucket::Arp);
                match *op {
                    ARPOP_REQUEST => self.bump(Bucket::ArpReq),
                    ARPOP_REPLY => self.bump(Bucket::ArpReply),
                    _ => self.bump(Bucket::ArpOther),
                }
            }
            FlowPayload::Ipv4 { transport, .. } => {
                self.bump(Bucket::Ipv4);
                self.accumulate_transport(transport);
            }
            FlowPayload::Ipv6 { transport, .. } => {
                self.bump(Bucket::Ipv6);
                self.accumulate_transport(transport);
            }
            FlowPayload::Other { .. } => self.bump(Bucket::Other),
        }
    }

    fn accumulate_transport(&mut self, transport: &FlowTransport) {
        match transport {
            FlowTransport::Tcp { fin, rst, syn, .. } => {
                self.bump(Bucket::Tcp);
                // 플래그 버킷은 FIN > RST > SYN 우선순위로 하나만
                if *fin {
                    self.bump(Bucket::TcpFin);
                } else if *rst {
                    self.bump(Bucket::TcpRst);
                } else if *syn {
                    self.bump(Bucket::TcpSyn);
                }
            }
            FlowTransport::Udp { .. } => self.bump(Bucket::Udp),
            FlowTransport::Vrrp => self.bump(Bucket::Vrrp),
            FlowTransport::Other { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ipv4_flow(transport: FlowTransport) -> FlowKey {
        FlowKey {
            dst_mac: [0; 6],
            src_mac: [0; 6],
            vlan_tci: None,
            payload: FlowPayload::Ipv4 {
                src: Ipv4Addr::new(192, 168, 0, 1),
                dst: Ipv4Addr::new(192, 168, 0, 2),
                transport,
            },
        }
    }

    fn tcp(fin: bool, rst: bool, syn: bool) -> FlowTransport {
        FlowTransport::Tcp {
            src_port: 1,
            dst_port: 2,
            fin,
            rst,
            syn,
        }
    }

    #[test]
    fn ipv4_tcp_syn_bumps_three_buckets() {
        let mut counts = BucketCounts::new();
        counts.accumulate(&ipv4_flow(tcp(false, false, true)));
        assert_eq!(counts.get(Bucket::Ipv4), 1);
        assert_eq!(counts.get(Bucket::Tcp), 1);
        assert_eq!(counts.get(Bucket::TcpSyn), 1);
        assert_eq!(counts.get(Bucket::TcpFin), 0);
    }

    #[test]
    fn tcp_flag_precedence_is_fin_rst_syn() {
        // FIN+RST+SYN 동시 설정이면 FIN 버킷만
        let mut counts = BucketCounts::new();
        counts.accumulate(&ipv4_flow(tcp(true, true, true)));
        assert_eq!(counts.get(Bucket::TcpFin), 1);
        assert_eq!(counts.get(Bucket::TcpRst), 0);
        assert_eq!(counts.get(Bucket::TcpSyn), 0);

        // RST+SYN이면 RST 버킷만
        let mut counts = BucketCounts::new();
        counts.accumulate(&ipv4_flow(tcp(false, true, true)));
        assert_eq!(counts.get(Bucket::TcpRst), 1);
        assert_eq!(counts.get(Bucket::TcpSyn), 0);
    }

    #[test]
    fn plain_tcp_bumps_no_flag_bucket() {
        let mut counts = BucketCounts::new();
        counts.accumulate(&ipv4_flow(tcp(false, false, false)));
        assert_eq!(counts.get(Bucket::Tcp), 1);
        assert_eq!(counts.get(Bucket::TcpFin), 0);
        assert_eq!(counts.get(Bucket::TcpRst), 0);
        assert_eq!(counts.get(Bucket::TcpSyn), 0);
    }

    #[test]
    fn arp_ops_split_into_sub_buckets() {
        let arp = |op| FlowKey {
            dst_mac: [0; 6],
            src_mac: [0; 6],
            vlan_tci: None,
            payload: FlowPayload::Arp {
                op,
                sender: Ipv4Addr::UNSPECIFIED,
                target: Ipv4Addr::UNSPECIFIED,
            },
        };
        let mut counts = BucketCounts::new();
        counts.accumulate(&arp(ARPOP_REQUEST));
        counts.accumulate(&arp(ARPOP_REPLY));
        counts.accumulate(&arp(9));
        assert_eq!(counts.get(Bucket::Arp), 3);
        assert_eq!(counts.get(Bucket::ArpReq), 1);
        assert_eq!(counts.get(Bucket::ArpReply), 1);
        assert_eq!(counts.get(Bucket::ArpOther), 1);
    }

    #[test]
    fn unknown_transport_counts_only_ip_bucket() {
        let mut counts = BucketCounts::new();
        counts.accumulate(&ipv4_flow(FlowTransport::Other { proto: 47 }));
        assert_eq!(counts.get(Bucket::Ipv4), 1);
        assert_eq!(counts.get(Bucket::Other), 0);
    }

    #[test]
    fn reset_zeroes_all_buckets() {
        let mut counts = BucketCounts::new();
        counts.accumulate(&ipv4_flow(tcp(true, false, false)));
        counts.reset();
        for bucket in Bucket::ALL {
            assert_eq!(counts.get(bucket), 0);
        }
    }

    #[test]
    fn ip_grouping_hides_non_ipv4_columns() {
        let hidden: Vec<Bucket> = Bucket::ALL
            .into_iter()
            .filter(|b| b.hidden_for(GroupBy::DstIp))
            .collect();
        assert_eq!(
            hidden,
            vec![
                Bucket::Lldp,
                Bucket::Arp,
                Bucket::ArpReq,
                Bucket::ArpReply,
                Bucket::ArpOther,
                Bucket::Ipv6,
            ]
        );
        // 다른 모드에서는 모든 컬럼이 보인다
        assert!(Bucket::ALL.iter().all(|b| !b.hidden_for(GroupBy::Netns)));
    }
}
