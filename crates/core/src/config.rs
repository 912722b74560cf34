//! 설정 관리 — dropsight.toml 파싱 및 런타임 설정
//!
//! [`DropsightConfig`]는 데몬과 모니터 엔진의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DROPSIGHT_MONITOR_GROUP_BY=netns` 형식)
//! 3. 설정 파일 (`dropsight.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dropsight_core::error::DropsightError> {
//! use dropsight_core::config::DropsightConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DropsightConfig::load("dropsight.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DropsightConfig::parse("[monitor]\ngroup_by = \"netns\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DropsightError};
use crate::types::GroupBy;

/// Dropsight 통합 설정
///
/// `dropsight.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropsightConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 드롭 모니터 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DropsightConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DropsightError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DropsightError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DropsightError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DropsightError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DropsightError> {
        toml::from_str(toml_str).map_err(|e| {
            DropsightError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DROPSIGHT_{SECTION}_{FIELD}`
    /// 예: `DROPSIGHT_MONITOR_GROUP_BY=dmac`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DROPSIGHT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DROPSIGHT_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.group_by, "DROPSIGHT_MONITOR_GROUP_BY");
        override_u64(
            &mut self.monitor.interval_secs,
            "DROPSIGHT_MONITOR_INTERVAL_SECS",
        );
        override_u64(&mut self.monitor.threshold, "DROPSIGHT_MONITOR_THRESHOLD");
        override_string(&mut self.monitor.bpf_object, "DROPSIGHT_MONITOR_BPF_OBJECT");
        override_string(
            &mut self.monitor.kallsyms_path,
            "DROPSIGHT_MONITOR_KALLSYMS_PATH",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "DROPSIGHT_METRICS_ENABLED");
        override_string(&mut self.metrics.listen, "DROPSIGHT_METRICS_LISTEN");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DropsightError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // group_by 검증
        if let Err(reason) = self.monitor.group_by.parse::<GroupBy>() {
            return Err(ConfigError::InvalidValue {
                field: "monitor.group_by".to_owned(),
                reason,
            }
            .into());
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_secs".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        if self.monitor.threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.threshold".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        if self.monitor.bpf_object.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "monitor.bpf_object".to_owned(),
                reason: "bpf object path must not be empty".to_owned(),
            }
            .into());
        }

        // 메트릭 리슨 주소 검증
        if self.metrics.enabled && self.metrics.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "metrics.listen".to_owned(),
                reason: "must be a socket address like 127.0.0.1:9435".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 파싱된 그룹핑 모드를 반환합니다.
    ///
    /// [`validate`](Self::validate)를 통과한 설정에서만 호출해야 합니다.
    pub fn group_by(&self) -> Result<GroupBy, DropsightError> {
        self.monitor.group_by.parse::<GroupBy>().map_err(|reason| {
            ConfigError::InvalidValue {
                field: "monitor.group_by".to_owned(),
                reason,
            }
            .into()
        })
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 드롭 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 히스토그램 그룹핑 모드 (none, netns, dmac, smac, dip, sip, flow)
    pub group_by: String,
    /// 리포트 주기 (초)
    pub interval_secs: u64,
    /// 리포트 표시 최소 드롭 수
    pub threshold: u64,
    /// BPF 오브젝트 파일 경로
    pub bpf_object: String,
    /// 커널 심볼 테이블 경로
    pub kallsyms_path: String,
    /// OVS 업콜 경로로 간주할 심볼 이름
    pub upcall_symbol: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            group_by: "none".to_owned(),
            interval_secs: 10,
            threshold: 1,
            bpf_object: "dropmon.o".to_owned(),
            kallsyms_path: "/proc/kallsyms".to_owned(),
            upcall_symbol: "queue_userspace_packet".to_owned(),
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter 활성화 여부
    pub enabled: bool,
    /// exporter 리슨 주소
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:9435".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = DropsightConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.monitor.group_by, "none");
        assert_eq!(config.monitor.interval_secs, 10);
        assert_eq!(config.monitor.threshold, 1);
        assert_eq!(config.monitor.kallsyms_path, "/proc/kallsyms");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = DropsightConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = DropsightConfig::parse("").unwrap();
        assert_eq!(config.monitor.group_by, "none");
        assert_eq!(config.monitor.interval_secs, 10);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[monitor]
group_by = "netns"
threshold = 5
"#;
        let config = DropsightConfig::parse(toml).unwrap();
        assert_eq!(config.monitor.group_by, "netns");
        assert_eq!(config.monitor.threshold, 5);
        // interval은 기본값 유지
        assert_eq!(config.monitor.interval_secs, 10);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"

[monitor]
group_by = "flow"
interval_secs = 30
threshold = 10
bpf_object = "/usr/lib/dropsight/dropmon.o"
kallsyms_path = "/proc/kallsyms"
upcall_symbol = "queue_userspace_packet"

[metrics]
enabled = true
listen = "0.0.0.0:9435"
"#;
        let config = DropsightConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.monitor.group_by, "flow");
        assert_eq!(config.monitor.interval_secs, 30);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let result = DropsightConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DropsightError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = DropsightConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_group_by() {
        let mut config = DropsightConfig::default();
        config.monitor.group_by = "dport".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("group_by"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = DropsightConfig::default();
        config.monitor.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut config = DropsightConfig::default();
        config.monitor.threshold = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn validate_rejects_bad_metrics_listen_when_enabled() {
        let mut config = DropsightConfig::default();
        config.metrics.enabled = true;
        config.metrics.listen = "not-an-addr".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.listen"));
    }

    #[test]
    fn validate_ignores_bad_metrics_listen_when_disabled() {
        let mut config = DropsightConfig::default();
        config.metrics.listen = "not-an-addr".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn group_by_accessor_returns_parsed_mode() {
        let mut config = DropsightConfig::default();
        config.monitor.group_by = "dip".to_owned();
        assert_eq!(config.group_by().unwrap(), GroupBy::DstIp);
    }

    #[test]
    #[serial]
    fn env_override_replaces_group_by() {
        // SAFETY: serial 테스트라 환경변수 조작이 다른 테스트와 겹치지 않습니다.
        unsafe { std::env::set_var("DROPSIGHT_MONITOR_GROUP_BY", "smac") };
        let mut config = DropsightConfig::default();
        config.apply_env_overrides();
        unsafe { std::env::remove_var("DROPSIGHT_MONITOR_GROUP_BY") };
        assert_eq!(config.monitor.group_by, "smac");
    }

    #[test]
    #[serial]
    fn env_override_ignores_unparsable_u64() {
        unsafe { std::env::set_var("DROPSIGHT_MONITOR_INTERVAL_SECS", "soon") };
        let mut config = DropsightConfig::default();
        config.apply_env_overrides();
        unsafe { std::env::remove_var("DROPSIGHT_MONITOR_INTERVAL_SECS") };
        assert_eq!(config.monitor.interval_secs, 10);
    }
}
