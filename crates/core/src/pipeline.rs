//! 협력자 trait — 집계 엔진이 의존하는 외부 기능의 경계
//!
//! 엔진은 심볼 해석과 패킷 파싱을 trait 뒤에 두어 테스트에서 가짜 구현으로
//! 대체할 수 있습니다. 실제 구현(kallsyms, 이더넷 파서)은 상위 크레이트가
//! 제공합니다.

use crate::error::ParseError;
use crate::types::{FlowKey, Symbol};

/// 커널 주소를 심볼로 해석하는 협력자
///
/// 해석 결과는 호출자 소유의 [`Symbol`]로 반환됩니다. 엔진은 이 경계를
/// 읽기 전용으로만 사용합니다 (합성 라벨은 엔진 내부 상태입니다).
pub trait SymbolResolver {
    /// 주소를 포함하는 심볼을 찾습니다. 없으면 `None`입니다.
    fn resolve(&self, addr: u64) -> Option<Symbol>;
}

/// 캡처된 패킷 바이트를 [`FlowKey`]로 정규화하는 협력자
pub trait PacketParser {
    /// 링크 계층 프로토콜과 캡처 바이트에서 플로우 키를 추출합니다.
    ///
    /// `vlan_tci`는 커널이 메타데이터로 전달한 외부 VLAN 태그입니다
    /// (프레임 바이트 안의 태그와 별개).
    fn parse(
        &self,
        link_proto: u16,
        data: &[u8],
        vlan_tci: Option<u16>,
    ) -> Result<FlowKey, ParseError>;
}
