//! 에러 타입 — 도메인별 에러 정의
//!
//! 코어 집계 엔진의 에러는 모두 비치명적입니다 (파싱 실패와 용량 초과는
//! 샘플 단위로 흡수됩니다). 치명적일 수 있는 에러는 데몬 경계의
//! [`TransportError`]뿐입니다.

/// Dropsight 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DropsightError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 집계 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 패킷 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 이벤트 전송 계층 에러
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 집계 스토어 에러
///
/// find-or-create 계약상 정상 동작에서는 발생하지 않아야 하며,
/// 발생한다면 내부 일관성 위반입니다. 스토어 자체는 손상되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 이미 존재하는 키에 대한 삽입 시도
    #[error("duplicate key on insert: {key:#x}")]
    DuplicateKey { key: u64 },
}

/// 패킷 파싱 에러
///
/// 파싱 실패는 샘플 단위로 비치명적입니다. 해당 샘플은 전역/위치 카운터에만
/// 반영되고 히스토그램 분류에서 제외됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 입력이 헤더를 담기에 너무 짧음
    #[error("truncated packet: need {need} bytes at offset {offset}, have {have}")]
    Truncated {
        offset: usize,
        need: usize,
        have: usize,
    },

    /// 지원하지 않는 링크 계층 프로토콜
    #[error("unsupported link protocol: {0:#06x}")]
    UnsupportedProtocol(u16),

    /// 헤더 필드가 프로토콜 규격에 어긋남
    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    /// 알 수 없는 이벤트 타입 코드
    #[error("unknown event type: {0}")]
    UnknownEvent(u8),
}

/// 이벤트 전송 계층 에러 (데몬 전용)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// BPF 오브젝트 로드 실패
    #[error("bpf load failed: {0}")]
    Load(String),

    /// 프로그램 어태치 실패
    #[error("attach failed: {0}")]
    Attach(String),

    /// 링 버퍼 접근 실패
    #[error("ring buffer error: {0}")]
    RingBuffer(String),
}
