//! 이더넷 프레임 파서
//!
//! 커널이 캡처한 패킷 선두 바이트를 [`FlowKey`]로 정규화합니다. 캡처는
//! 최대 64바이트로 잘리므로 트랜스포트 헤더가 캡처 경계를 넘는 경우가
//! 있습니다. 링크/네트워크 헤더 손실은 에러지만 트랜스포트 헤더 손실은
//! 프로토콜 번호만 담은 플로우로 강등됩니다.

use std::net::{Ipv4Addr, Ipv6Addr};

use dropsight_core::error::ParseError;
use dropsight_core::pipeline::PacketParser;
use dropsight_core::types::{FlowKey, FlowPayload, FlowTransport};
use dropsight_drop_common::{
    ETH_P_8021Q, ETH_P_ARP, ETH_P_IP, ETH_P_IPV6, ETH_P_LLDP, IPPROTO_TCP, IPPROTO_UDP,
    IPPROTO_VRRP, TCP_FIN, TCP_RST, TCP_SYN,
};

const ARP_IPV4_LEN: usize = 28;
const IPV6_HDR_LEN: usize = 40;

/// 이더넷 프레임을 정규화하는 기본 파서
#[derive(Debug, Clone, Copy, Default)]
pub struct EtherFlowParser;

impl EtherFlowParser {
    /// 파서를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl PacketParser for EtherFlowParser {
    fn parse(
        &self,
        link_proto: u16,
        data: &[u8],
        vlan_tci: Option<u16>,
    ) -> Result<FlowKey, ParseError> {
        let mut cursor = Cursor::new(data);

        let dst_mac = cursor.take6()?;
        let src_mac = cursor.take6()?;
        let mut ether_type = cursor.take_u16()?;
        let mut vlan_tci = vlan_tci;

        // 프레임 내 802.1Q 태그는 메타데이터 태그가 없을 때만 채택
        if ether_type == ETH_P_8021Q {
            let tci = cursor.take_u16()?;
            if vlan_tci.is_none() {
                vlan_tci = Some(tci);
            }
            ether_type = cursor.take_u16()?;
        }

        // 일부 드롭 경로는 프레임의 EtherType이 0으로 비어 있어
        // 커널 메타데이터의 프로토콜로 보완합니다.
        if ether_type == 0 {
            ether_type = link_proto;
        }

        let payload = match ether_type {
            ETH_P_LLDP => FlowPayload::Lldp,
            ETH_P_ARP => parse_arp(&mut cursor)?,
            ETH_P_IP => parse_ipv4(&mut cursor)?,
            ETH_P_IPV6 => parse_ipv6(&mut cursor)?,
            other => FlowPayload::Other { ether_type: other },
        };

        Ok(FlowKey {
            dst_mac,
            src_mac,
            vlan_tci,
            payload,
        })
    }
}

fn parse_arp(cursor: &mut Cursor<'_>) -> Result<FlowPayload, ParseError> {
    // IPv4-over-ethernet ARP 본문 (28바이트) 기준 오프셋
    cursor.need(ARP_IPV4_LEN)?;
    cursor.skip(6)?; // htype, ptype, hlen, plen
    let op = cursor.take_u16()?;
    cursor.skip(6)?; // sender MAC
    let sender = Ipv4Addr::from(cursor.take4()?);
    cursor.skip(6)?; // target MAC
    let target = Ipv4Addr::from(cursor.take4()?);
    Ok(FlowPayload::Arp { op, sender, target })
}

fn parse_ipv4(cursor: &mut Cursor<'_>) -> Result<FlowPayload, ParseError> {
    cursor.need(20)?;
    let start = cursor.offset;
    let ver_ihl = cursor.take_u8()?;
    let ihl = ((ver_ihl & 0x0f) as usize) * 4;
    if ver_ihl >> 4 != 4 || ihl < 20 {
        return Err(ParseError::Malformed("bad ipv4 version/ihl"));
    }
    cursor.skip(8)?; // tos, total len, id, frag off
    let proto = cursor.take_u8()?;
    cursor.skip(2)?; // checksum
    let src = Ipv4Addr::from(cursor.take4()?);
    let dst = Ipv4Addr::from(cursor.take4()?);

    // 옵션이 있으면 트랜스포트 헤더까지 건너뛴다
    let consumed = cursor.offset - start;
    if ihl > consumed && cursor.skip(ihl - consumed).is_err() {
        return Ok(FlowPayload::Ipv4 {
            src,
            dst,
            transport: FlowTransport::Other { proto },
        });
    }

    Ok(FlowPayload::Ipv4 {
        src,
        dst,
        transport: parse_transport(cursor, proto),
    })
}

fn parse_ipv6(cursor: &mut Cursor<'_>) -> Result<FlowPayload, ParseError> {
    cursor.need(IPV6_HDR_LEN)?;
    cursor.skip(6)?; // version/class/flow label, payload len
    let next_header = cursor.take_u8()?;
    cursor.skip(1)?; // hop limit
    let src = Ipv6Addr::from(cursor.take16()?);
    let dst = Ipv6Addr::from(cursor.take16()?);

    // 확장 헤더 체인은 따라가지 않고 next header를 그대로 분류한다
    Ok(FlowPayload::Ipv6 {
        src,
        dst,
        transport: parse_transport(cursor, next_header),
    })
}

/// 트랜스포트 헤더를 파싱합니다. 캡처 경계에 잘린 헤더는
/// 프로토콜 번호만 담은 `Other`로 강등됩니다.
fn parse_transport(cursor: &mut Cursor<'_>, proto: u8) -> FlowTransport {
    match proto {
        IPPROTO_TCP => {
            let Ok(src_port) = cursor.take_u16() else {
                return FlowTransport::Other { proto };
            };
            let Ok(dst_port) = cursor.take_u16() else {
                return FlowTransport::Other { proto };
            };
            // 플래그 바이트는 포트 뒤 9바이트 위치
            let Ok(()) = cursor.skip(9) else {
                return FlowTransport::Other { proto };
            };
            let Ok(flags) = cursor.take_u8() else {
                return FlowTransport::Other { proto };
            };
            FlowTransport::Tcp {
                src_port,
                dst_port,
                fin: flags & TCP_FIN != 0,
                rst: flags & TCP_RST != 0,
                syn: flags & TCP_SYN != 0,
            }
        }
        IPPROTO_UDP => {
            let (Ok(src_port), Ok(dst_port)) = (cursor.take_u16(), cursor.take_u16()) else {
                return FlowTransport::Other { proto };
            };
            FlowTransport::Udp { src_port, dst_port }
        }
        IPPROTO_VRRP => FlowTransport::Vrrp,
        other => FlowTransport::Other { proto: other },
    }
}

/// 경계 검사가 달린 바이트 커서
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn need(&self, len: usize) -> Result<(), ParseError> {
        let have = self.data.len().saturating_sub(self.offset);
        if have < len {
            return Err(ParseError::Truncated {
                offset: self.offset,
                need: len,
                have,
            });
        }
        Ok(())
    }

    fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.need(len)?;
        self.offset += len;
        Ok(())
    }

    fn take_u8(&mut self) -> Result<u8, ParseError> {
        self.need(1)?;
        let v = self.data[self.offset];
        self.offset += 1;
        Ok(v)
    }

    fn take_u16(&mut self) -> Result<u16, ParseError> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.data[self.offset], self.data[self.offset + 1]]);
        self.offset += 2;
        Ok(v)
    }

    fn take4(&mut self) -> Result<[u8; 4], ParseError> {
        self.need(4)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.data[self.offset..self.offset + 4]);
        self.offset += 4;
        Ok(out)
    }

    fn take6(&mut self) -> Result<[u8; 6], ParseError> {
        self.need(6)?;
        let mut out = [0u8; 6];
        out.copy_from_slice(&self.data[self.offset..self.offset + 6]);
        self.offset += 6;
        Ok(out)
    }

    fn take16(&mut self) -> Result<[u8; 16], ParseError> {
        self.need(16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.data[self.offset..self.offset + 16]);
        self.offset += 16;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0xaa]); // dst
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0xbb]); // src
        frame.extend_from_slice(&ether_type.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn ipv4_header(proto: u8, src: [u8; 4], dst: [u8; 4]) -> Vec<u8> {
        let mut hdr = vec![0x45, 0, 0, 40, 0, 0, 0, 0, 64, proto, 0, 0];
        hdr.extend_from_slice(&src);
        hdr.extend_from_slice(&dst);
        hdr
    }

    fn tcp_header(src_port: u16, dst_port: u16, flags: u8) -> Vec<u8> {
        let mut hdr = Vec::new();
        hdr.extend_from_slice(&src_port.to_be_bytes());
        hdr.extend_from_slice(&dst_port.to_be_bytes());
        hdr.extend_from_slice(&[0; 9]); // seq, ack, data offset
        hdr.push(flags);
        hdr.extend_from_slice(&[0; 6]); // window, checksum, urgent
        hdr
    }

    #[test]
    fn parses_ipv4_tcp_with_flags() {
        let mut payload = ipv4_header(IPPROTO_TCP, [10, 0, 0, 1], [10, 0, 0, 2]);
        payload.extend_from_slice(&tcp_header(40000, 443, TCP_SYN));
        let frame = eth_frame(ETH_P_IP, &payload);

        let flow = EtherFlowParser::new().parse(ETH_P_IP, &frame, None).unwrap();
        assert_eq!(flow.dst_mac, [0x02, 0, 0, 0, 0, 0xaa]);
        match flow.payload {
            FlowPayload::Ipv4 {
                src,
                dst,
                transport:
                    FlowTransport::Tcp {
                        src_port,
                        dst_port,
                        fin,
                        rst,
                        syn,
                    },
            } => {
                assert_eq!(src, Ipv4Addr::new(10, 0, 0, 1));
                assert_eq!(dst, Ipv4Addr::new(10, 0, 0, 2));
                assert_eq!((src_port, dst_port), (40000, 443));
                assert!(syn && !fin && !rst);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn parses_inner_vlan_tag() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(0xE000u16 | 42).to_be_bytes()); // TCI
        payload.extend_from_slice(&ETH_P_ARP.to_be_bytes());
        // ARP 본문
        payload.extend_from_slice(&[0, 1, 8, 0, 6, 4]); // htype/ptype/hlen/plen
        payload.extend_from_slice(&1u16.to_be_bytes()); // op: request
        payload.extend_from_slice(&[0; 6]);
        payload.extend_from_slice(&[192, 168, 1, 1]);
        payload.extend_from_slice(&[0; 6]);
        payload.extend_from_slice(&[192, 168, 1, 2]);
        let frame = eth_frame(ETH_P_8021Q, &payload);

        let flow = EtherFlowParser::new().parse(ETH_P_8021Q, &frame, None).unwrap();
        assert_eq!(flow.vlan_tci, Some(0xE000 | 42));
        assert!(matches!(
            flow.payload,
            FlowPayload::Arp {
                op: 1,
                sender,
                target,
            } if sender == Ipv4Addr::new(192, 168, 1, 1) && target == Ipv4Addr::new(192, 168, 1, 2)
        ));
    }

    #[test]
    fn metadata_vlan_takes_precedence_over_frame_tag() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&100u16.to_be_bytes());
        payload.extend_from_slice(&ETH_P_LLDP.to_be_bytes());
        let frame = eth_frame(ETH_P_8021Q, &payload);

        let flow = EtherFlowParser::new()
            .parse(ETH_P_8021Q, &frame, Some(200))
            .unwrap();
        assert_eq!(flow.vlan_tci, Some(200));
    }

    #[test]
    fn parses_ipv6_udp() {
        let mut payload = vec![0x60, 0, 0, 0, 0, 16, IPPROTO_UDP, 64];
        payload.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        payload.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        payload.extend_from_slice(&5353u16.to_be_bytes());
        payload.extend_from_slice(&5353u16.to_be_bytes());
        let frame = eth_frame(ETH_P_IPV6, &payload);

        let flow = EtherFlowParser::new().parse(ETH_P_IPV6, &frame, None).unwrap();
        assert!(matches!(
            flow.payload,
            FlowPayload::Ipv6 {
                transport: FlowTransport::Udp {
                    src_port: 5353,
                    dst_port: 5353
                },
                ..
            }
        ));
    }

    #[test]
    fn truncated_transport_degrades_to_proto_only() {
        // IPv4 헤더는 완전하지만 TCP 헤더가 4바이트에서 잘림
        let mut payload = ipv4_header(IPPROTO_TCP, [10, 0, 0, 1], [10, 0, 0, 2]);
        payload.extend_from_slice(&[0x9c, 0x40, 0x01, 0xbb]);
        let frame = eth_frame(ETH_P_IP, &payload);

        let flow = EtherFlowParser::new().parse(ETH_P_IP, &frame, None).unwrap();
        assert!(matches!(
            flow.payload,
            FlowPayload::Ipv4 {
                transport: FlowTransport::Other { proto: IPPROTO_TCP },
                ..
            }
        ));
    }

    #[test]
    fn truncated_ethernet_header_is_an_error() {
        let err = EtherFlowParser::new()
            .parse(ETH_P_IP, &[0x02, 0, 0], None)
            .unwrap_err();
        assert!(matches!(err, ParseError::Truncated { .. }));
    }

    #[test]
    fn empty_frame_ether_type_falls_back_to_metadata() {
        let payload = ipv4_header(IPPROTO_VRRP, [10, 0, 0, 1], [224, 0, 0, 18]);
        let frame = eth_frame(0, &payload);

        let flow = EtherFlowParser::new().parse(ETH_P_IP, &frame, None).unwrap();
        assert!(matches!(
            flow.payload,
            FlowPayload::Ipv4 {
                transport: FlowTransport::Vrrp,
                ..
            }
        ));
    }

    #[test]
    fn unknown_ether_type_is_preserved() {
        let frame = eth_frame(0x9999, &[]);
        let flow = EtherFlowParser::new().parse(0x9999, &frame, None).unwrap();
        assert!(matches!(
            flow.payload,
            FlowPayload::Other { ether_type: 0x9999 }
        ));
    }
}
