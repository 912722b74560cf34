//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 그룹핑 모드, 커널 심볼, 그리고 파싱된 패킷의 정규화 표현인 [`FlowKey`]를
//! 정의합니다. `FlowKey`는 중복 제거 키로 쓰이므로 구조적 동등성이 곧
//! 정규화 레코드의 바이트 단위 동등성입니다.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// 히스토그램 그룹핑 모드
///
/// 히스토그램 키의 의미를 결정합니다. 런타임 중에는 변경되지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupBy {
    /// 그룹 테이블 없음 — 전역/위치 집계만 수행
    #[default]
    None,
    /// 네트워크 네임스페이스별
    Netns,
    /// 목적지 MAC별
    DstMac,
    /// 출발지 MAC별
    SrcMac,
    /// 목적지 IPv4 주소별
    DstIp,
    /// 출발지 IPv4 주소별
    SrcIp,
    /// 목적지 MAC + 플로우별
    Flow,
}

impl GroupBy {
    /// CLI/설정에서 사용하는 짧은 토큰을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::None => "none",
            GroupBy::Netns => "netns",
            GroupBy::DstMac => "dmac",
            GroupBy::SrcMac => "smac",
            GroupBy::DstIp => "dip",
            GroupBy::SrcIp => "sip",
            GroupBy::Flow => "flow",
        }
    }

    /// 리포트 헤더에 쓰이는 사람이 읽을 수 있는 설명입니다.
    pub fn description(&self) -> &'static str {
        match self {
            GroupBy::None => "nothing",
            GroupBy::Netns => "network namespace",
            GroupBy::DstMac => "destination mac",
            GroupBy::SrcMac => "source mac",
            GroupBy::DstIp => "destination ip",
            GroupBy::SrcIp => "source ip",
            GroupBy::Flow => "dmac and flow",
        }
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(GroupBy::None),
            "netns" => Ok(GroupBy::Netns),
            "dmac" => Ok(GroupBy::DstMac),
            "smac" => Ok(GroupBy::SrcMac),
            "dip" => Ok(GroupBy::DstIp),
            "sip" => Ok(GroupBy::SrcIp),
            "flow" => Ok(GroupBy::Flow),
            other => Err(format!(
                "invalid grouping mode '{other}', expected one of: none, netns, dmac, smac, dip, sip, flow"
            )),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 해석된 커널 심볼
///
/// [`crate::pipeline::SymbolResolver`]가 드롭 위치 주소를 해석한 결과입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// 심볼 이름 (또는 합성된 라벨)
    pub name: String,
    /// 유닉스 도메인 소켓 드롭 지점 여부
    pub is_unix_socket: bool,
    /// TCP 드롭 지점 여부
    pub is_tcp: bool,
}

impl Symbol {
    /// 플래그 없는 일반 심볼을 생성합니다.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_unix_socket: false,
            is_tcp: false,
        }
    }
}

/// 정규화된 플로우 레코드 — 중복 제거의 정확 일치 키
///
/// 원시 패킷 바이트에서 추출된 주소/포트/프로토콜/플래그 필드의 정규화
/// 표현입니다. 캡처 후 불변이며, 파생된 `PartialEq`/`Hash`가 정확 일치
/// 비교를 제공합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// 목적지 MAC
    pub dst_mac: [u8; 6],
    /// 출발지 MAC
    pub src_mac: [u8; 6],
    /// 외부 802.1Q VLAN TCI (태그가 없으면 None)
    pub vlan_tci: Option<u16>,
    /// 링크 계층 프로토콜별 페이로드
    pub payload: FlowPayload,
}

/// 링크 계층 프로토콜별 플로우 페이로드
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowPayload {
    /// LLDP 프레임
    Lldp,
    /// ARP 프레임
    Arp {
        /// ARP 오퍼레이션 코드
        op: u16,
        /// 송신자 프로토콜 주소
        sender: Ipv4Addr,
        /// 대상 프로토콜 주소
        target: Ipv4Addr,
    },
    /// IPv4 패킷
    Ipv4 {
        src: Ipv4Addr,
        dst: Ipv4Addr,
        transport: FlowTransport,
    },
    /// IPv6 패킷
    Ipv6 {
        src: Ipv6Addr,
        dst: Ipv6Addr,
        transport: FlowTransport,
    },
    /// 그 외 EtherType
    Other {
        /// 원본 EtherType
        ether_type: u16,
    },
}

/// 트랜스포트 계층 분류
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlowTransport {
    /// TCP 세그먼트 (분류에 필요한 플래그만 보존)
    Tcp {
        src_port: u16,
        dst_port: u16,
        fin: bool,
        rst: bool,
        syn: bool,
    },
    /// UDP 데이터그램
    Udp { src_port: u16, dst_port: u16 },
    /// VRRP 광고
    Vrrp,
    /// 그 외 트랜스포트
    Other {
        /// IP 프로토콜 번호
        proto: u8,
    },
}

/// MAC 주소를 `aa:bb:cc:dd:ee:ff` 형태로 포맷합니다.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

impl fmt::Display for FlowTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowTransport::Tcp {
                src_port,
                dst_port,
                fin,
                rst,
                syn,
            } => {
                write!(f, "TCP {src_port} -> {dst_port}")?;
                if *fin {
                    write!(f, " FIN")?;
                }
                if *rst {
                    write!(f, " RST")?;
                }
                if *syn {
                    write!(f, " SYN")?;
                }
                Ok(())
            }
            FlowTransport::Udp { src_port, dst_port } => {
                write!(f, "UDP {src_port} -> {dst_port}")
            }
            FlowTransport::Vrrp => f.write_str("VRRP"),
            FlowTransport::Other { proto } => write!(f, "proto {proto}"),
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tci) = self.vlan_tci {
            // 하위 12비트가 VLAN ID
            write!(f, "vlan {} ", tci & 0x0fff)?;
        }
        match &self.payload {
            FlowPayload::Lldp => f.write_str("LLDP"),
            FlowPayload::Arp { op, sender, target } => {
                write!(f, "ARP op {op} {sender} -> {target}")
            }
            FlowPayload::Ipv4 {
                src,
                dst,
                transport,
            } => write!(f, "{src} -> {dst} {transport}"),
            FlowPayload::Ipv6 {
                src,
                dst,
                transport,
            } => write!(f, "{src} -> {dst} {transport}"),
            FlowPayload::Other { ether_type } => {
                write!(
                    f,
                    "{} -> {} ethertype {ether_type:#06x}",
                    format_mac(&self.src_mac),
                    format_mac(&self.dst_mac)
                )
            }
        }
    }
}
