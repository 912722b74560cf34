//! eBPF 커널/유저스페이스 공유 타입
//!
//! 이 크레이트는 `#![no_std]` 환경에서 사용 가능한 공통 타입을 정의합니다.
//! `skb/kfree_skb` tracepoint에 어태치된 커널 프로그램과 유저스페이스가
//! 동일한 메모리 레이아웃(`#[repr(C)]`)을 사용하도록 보장합니다.
//!
//! # 맵 타입 선택 근거
//! - **RingBuf** (`EVENTS`): 드롭 이벤트 전달 — 단일 링 버퍼를 모든 CPU가
//!   공유하며, PerfEventArray보다 메모리 효율이 높습니다.

#![no_std]

// =============================================================================
// 맵 이름 상수
// =============================================================================

/// 드롭 이벤트 RingBuf 맵 이름
pub const MAP_EVENTS: &str = "EVENTS";

// =============================================================================
// 이벤트 종류
// =============================================================================

/// 패킷 드롭 샘플 이벤트
pub const EVENT_SAMPLE: u8 = 1;
/// 네트워크 네임스페이스 해체 이벤트
pub const EVENT_EXIT: u8 = 2;

// =============================================================================
// 패킷 타입 (sk_buff pkt_type, 하위 3비트만 유효)
// =============================================================================

/// 패킷 타입 마스크 — 상위 비트는 무시합니다
pub const PKT_TYPE_MASK: u8 = 0x7;

/// 이 호스트로 향하는 패킷
pub const PACKET_HOST: u8 = 0;
/// 브로드캐스트 패킷
pub const PACKET_BROADCAST: u8 = 1;
/// 멀티캐스트 패킷
pub const PACKET_MULTICAST: u8 = 2;
/// 다른 호스트로 향하는 패킷
pub const PACKET_OTHERHOST: u8 = 3;
/// 송신 패킷
pub const PACKET_OUTGOING: u8 = 4;
/// 루프백 패킷
pub const PACKET_LOOPBACK: u8 = 5;
/// 유저스페이스로 전달되는 패킷
pub const PACKET_USER: u8 = 6;
/// 커널로 전달되는 패킷
pub const PACKET_KERNEL: u8 = 7;

// =============================================================================
// 링크 계층 프로토콜 (EtherType)
// =============================================================================

/// IPv4
pub const ETH_P_IP: u16 = 0x0800;
/// ARP
pub const ETH_P_ARP: u16 = 0x0806;
/// 802.1Q VLAN 태그
pub const ETH_P_8021Q: u16 = 0x8100;
/// IPv6
pub const ETH_P_IPV6: u16 = 0x86DD;
/// LLDP
pub const ETH_P_LLDP: u16 = 0x88CC;

// =============================================================================
// IP 트랜스포트 프로토콜
// =============================================================================

/// TCP 프로토콜 번호
pub const IPPROTO_TCP: u8 = 6;
/// UDP 프로토콜 번호
pub const IPPROTO_UDP: u8 = 17;
/// VRRP 프로토콜 번호
pub const IPPROTO_VRRP: u8 = 112;

// =============================================================================
// ARP 오퍼레이션 코드
// =============================================================================

/// ARP 요청
pub const ARPOP_REQUEST: u16 = 1;
/// ARP 응답
pub const ARPOP_REPLY: u16 = 2;

// =============================================================================
// TCP 플래그
// =============================================================================

/// FIN 플래그
pub const TCP_FIN: u8 = 0x01;
/// SYN 플래그
pub const TCP_SYN: u8 = 0x02;
/// RST 플래그
pub const TCP_RST: u8 = 0x04;

// =============================================================================
// 공유 데이터 구조
// =============================================================================

/// 패킷 헤더 캡처 길이 (바이트)
pub const MAX_PKT_CAPTURE: usize = 64;

/// 드롭 이벤트 레코드
///
/// `RingBuf`를 통해 커널 → 유저스페이스로 전달됩니다.
/// `event_type`이 [`EVENT_EXIT`]이면 `netns` 외의 필드는 무시됩니다.
///
/// # 메모리 레이아웃 (112 바이트, 8바이트 정렬)
/// ```text
/// offset  field       size
/// 0       time        8
/// 8       location    8
/// 16      netns       8
/// 24      event_type  1
/// 25      pkt_type    1
/// 26      vlan_tci    2
/// 28      protocol    2
/// 30      nr_frags    2
/// 32      ifindex     4
/// 36      pkt_len     4
/// 40      gso_size    4
/// 44      _pad        4
/// 48      pkt_data    64
/// ```
#[repr(C)]
#[derive(Clone, Copy)]
#[cfg_attr(feature = "user", derive(Debug))]
pub struct DropEventData {
    /// 드롭 발생 시각 (ktime, 나노초)
    pub time: u64,
    /// 드롭이 발생한 커널 코드 주소
    pub location: u64,
    /// 네트워크 네임스페이스 식별자
    pub netns: u64,
    /// 이벤트 종류 (EVENT_SAMPLE 또는 EVENT_EXIT)
    pub event_type: u8,
    /// sk_buff 패킷 타입 (하위 3비트만 유효)
    pub pkt_type: u8,
    /// 802.1Q VLAN TCI (0이면 태그 없음)
    pub vlan_tci: u16,
    /// 링크 계층 프로토콜 힌트 (EtherType, 호스트 바이트 오더)
    pub protocol: u16,
    /// skb 프래그먼트 수
    pub nr_frags: u16,
    /// 인터페이스 인덱스
    pub ifindex: u32,
    /// 원본 패킷 길이 (바이트)
    pub pkt_len: u32,
    /// GSO 세그먼트 크기
    pub gso_size: u32,
    /// 8바이트 정렬을 위한 패딩
    pub _pad: u32,
    /// 패킷 헤더 앞부분 캡처
    pub pkt_data: [u8; MAX_PKT_CAPTURE],
}

// SAFETY: DropEventData는 #[repr(C)]이며 모든 필드가 Plain Old Data입니다.
// 패딩도 명시적으로 정의되어 있습니다.
#[cfg(feature = "user")]
unsafe impl aya::Pod for DropEventData {}

impl DropEventData {
    /// 제로 초기화된 이벤트 레코드를 생성합니다.
    pub const fn zeroed() -> Self {
        Self {
            time: 0,
            location: 0,
            netns: 0,
            event_type: 0,
            pkt_type: 0,
            vlan_tci: 0,
            protocol: 0,
            nr_frags: 0,
            ifindex: 0,
            pkt_len: 0,
            gso_size: 0,
            _pad: 0,
            pkt_data: [0; MAX_PKT_CAPTURE],
        }
    }
}
