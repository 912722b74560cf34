//! 이벤트 레코드 — 커널에서 유저스페이스로 전달되는 관측 이벤트
//!
//! 전송 계층(링 버퍼)이 원시 바이트를 디코딩한 뒤 집계 엔진이 소비하는
//! 형태입니다. [`DropSample`]은 드롭 한 건, [`NetnsExit`]는 네트워크
//! 네임스페이스 소멸 통지입니다.

use bytes::Bytes;

/// 커널 드롭 이벤트 한 건
///
/// 필드는 커널이 관측 시점에 캡처한 값이며 이후 불변입니다.
/// `data`는 패킷 선두 바이트의 사본으로, 캡처 한도까지만 담깁니다.
#[derive(Debug, Clone)]
pub struct DropSample {
    /// 커널 단조 시각 (나노초)
    pub time: u64,
    /// 드롭이 발생한 커널 코드 위치 (명령 포인터)
    pub location: u64,
    /// 커널 패킷 타입 코드 (하위 3비트만 유효)
    pub packet_type: u8,
    /// 네트워크 네임스페이스 식별자 (inode 번호)
    pub netns: u64,
    /// 수신 인터페이스 인덱스
    pub ifindex: u32,
    /// 원본 패킷 길이 (캡처 길이와 무관)
    pub pkt_len: u32,
    /// 비선형 프래그먼트 수
    pub nr_frags: u16,
    /// GSO 세그먼트 크기
    pub gso_size: u32,
    /// 링크 계층 프로토콜 (EtherType, 호스트 바이트 오더)
    pub link_proto: u16,
    /// 802.1Q VLAN TCI (태그가 없으면 None)
    pub vlan_tci: Option<u16>,
    /// 캡처된 패킷 선두 바이트
    pub data: Bytes,
}

/// 네트워크 네임스페이스 소멸 통지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetnsExit {
    /// 커널 단조 시각 (나노초)
    pub time: u64,
    /// 소멸된 네임스페이스 식별자
    pub netns: u64,
}

/// 전송 계층이 엔진에 전달하는 이벤트
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// 패킷 드롭 샘플
    Drop(DropSample),
    /// 네임스페이스 소멸
    Exit(NetnsExit),
}
