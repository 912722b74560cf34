//! 링 버퍼 레코드 디코딩
//!
//! 커널이 내보낸 원시 바이트를 [`MonitorEvent`]로 변환합니다. 레코드
//! 레이아웃은 [`dropsight_drop_common::DropEventData`]와 바이트 단위로
//! 일치해야 합니다.

use bytes::Bytes;

use dropsight_core::error::ParseError;
use dropsight_core::event::{DropSample, MonitorEvent, NetnsExit};
use dropsight_drop_common::{DropEventData, EVENT_EXIT, EVENT_SAMPLE, MAX_PKT_CAPTURE};

/// 링 버퍼 레코드 하나를 이벤트로 디코딩합니다.
///
/// 캡처 바이트는 `pkt_len`과 캡처 한도 중 작은 쪽까지만 유효합니다.
pub fn decode_event(record: &[u8]) -> Result<MonitorEvent, ParseError> {
    let need = core::mem::size_of::<DropEventData>();
    if record.len() < need {
        return Err(ParseError::Truncated {
            offset: 0,
            need,
            have: record.len(),
        });
    }

    // SAFETY: 길이를 확인했고 DropEventData는 #[repr(C)] POD이므로
    // 비정렬 읽기로 복사해도 유효한 값입니다.
    let raw = unsafe { core::ptr::read_unaligned(record.as_ptr() as *const DropEventData) };

    match raw.event_type {
        EVENT_SAMPLE => {
            let captured = (raw.pkt_len as usize).min(MAX_PKT_CAPTURE);
            Ok(MonitorEvent::Drop(DropSample {
                time: raw.time,
                location: raw.location,
                packet_type: raw.pkt_type,
                netns: raw.netns,
                ifindex: raw.ifindex,
                pkt_len: raw.pkt_len,
                nr_frags: raw.nr_frags,
                gso_size: raw.gso_size,
                link_proto: raw.protocol,
                vlan_tci: (raw.vlan_tci != 0).then_some(raw.vlan_tci),
                data: Bytes::copy_from_slice(&raw.pkt_data[..captured]),
            }))
        }
        EVENT_EXIT => Ok(MonitorEvent::Exit(NetnsExit {
            time: raw.time,
            netns: raw.netns,
        })),
        other => Err(ParseError::UnknownEvent(other)),
    }
}
