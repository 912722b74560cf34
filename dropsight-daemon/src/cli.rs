//! CLI argument definitions for dropsight-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! CLI arguments take precedence over environment variables and the
//! configuration file.

use std::path::PathBuf;

use clap::Parser;

use dropsight_core::config::DropsightConfig;

/// Dropsight kernel packet-drop monitor daemon.
///
/// Loads the kernel-side instrumentation, consumes drop events from the
/// ring buffer and prints periodic aggregate reports.
#[derive(Parser, Debug)]
#[command(name = "dropsight-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to dropsight.toml configuration file.
    #[arg(short, long, default_value = "/etc/dropsight/dropsight.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Group histogram rows by type (none, netns, dmac, smac, dip, sip, flow).
    #[arg(short = 's', long)]
    pub group_by: Option<String>,

    /// Report interval in seconds.
    #[arg(short = 'r', long)]
    pub interval: Option<u64>,

    /// Only display entries with more drops than this per cycle.
    #[arg(short = 't', long)]
    pub threshold: Option<u64>,

    /// BPF object file to load.
    #[arg(short = 'f', long)]
    pub bpf_object: Option<String>,

    /// Kernel symbol table to load.
    #[arg(short = 'k', long)]
    pub kallsyms: Option<String>,

    /// Ignore OVS upcall drops.
    #[arg(short = 'O', long)]
    pub skip_upcalls: bool,

    /// Ignore tcp drops.
    #[arg(short = 'T', long)]
    pub skip_tcp: bool,

    /// Ignore unix socket drops.
    #[arg(short = 'U', long)]
    pub skip_unix: bool,

    /// Ignore kprobe attach errors (older kernels cannot probe fib_net_exit).
    #[arg(short = 'i', long)]
    pub ignore_kprobe_error: bool,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut DropsightConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(group_by) = &self.group_by {
            config.monitor.group_by = group_by.clone();
        }
        if let Some(interval) = self.interval {
            config.monitor.interval_secs = interval;
        }
        if let Some(threshold) = self.threshold {
            config.monitor.threshold = threshold;
        }
        if let Some(object) = &self.bpf_object {
            config.monitor.bpf_object = object.clone();
        }
        if let Some(kallsyms) = &self.kallsyms {
            config.monitor.kallsyms_path = kallsyms.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_config_untouched() {
        let cli = DaemonCli::parse_from(["dropsight-daemon"]);
        let mut config = DropsightConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.monitor.group_by, "none");
        assert_eq!(config.monitor.interval_secs, 10);
        assert!(!cli.skip_upcalls);
        assert!(!cli.validate);
    }

    #[test]
    fn short_flags_override_config() {
        let cli = DaemonCli::parse_from([
            "dropsight-daemon",
            "-s",
            "flow",
            "-r",
            "30",
            "-t",
            "5",
            "-k",
            "/tmp/kallsyms",
            "-O",
            "-T",
            "-U",
        ]);
        let mut config = DropsightConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.monitor.group_by, "flow");
        assert_eq!(config.monitor.interval_secs, 30);
        assert_eq!(config.monitor.threshold, 5);
        assert_eq!(config.monitor.kallsyms_path, "/tmp/kallsyms");
        assert!(cli.skip_upcalls && cli.skip_tcp && cli.skip_unix);
    }

    #[test]
    fn config_path_has_system_default() {
        let cli = DaemonCli::parse_from(["dropsight-daemon"]);
        assert_eq!(
            cli.config,
            PathBuf::from("/etc/dropsight/dropsight.toml")
        );
    }
}
