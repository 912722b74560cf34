use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use dropsight_core::config::DropsightConfig;
use dropsight_core::types::GroupBy;
use dropsight_daemon::cli::DaemonCli;
use dropsight_daemon::logging::init_tracing;
use dropsight_daemon::metrics_server::install_metrics_recorder;
use dropsight_daemon::runtime::run_loop;
use dropsight_daemon::symbols::KallsymsResolver;
use dropsight_daemon::transport::RingBufTransport;
use dropsight_drop_monitor::{DropMonitorBuilder, EtherFlowParser};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드: 파일 -> 환경변수 -> CLI 순으로 덮어쓴다
    let mut config = DropsightConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    cli.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    if cli.validate {
        println!("configuration ok: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!("dropsight-daemon starting");

    if config.metrics.enabled {
        install_metrics_recorder(&config.metrics)?;
    }

    let group_by = config.group_by()?;

    let resolver = KallsymsResolver::load(&config.monitor.kallsyms_path)
        .with_context(|| format!("failed to load {}", config.monitor.kallsyms_path))?;
    if cli.skip_upcalls && resolver.find_by_name(&config.monitor.upcall_symbol).is_none() {
        anyhow::bail!(
            "upcall symbol '{}' not found in {}; is openvswitch loaded?",
            config.monitor.upcall_symbol,
            config.monitor.kallsyms_path
        );
    }

    let monitor = DropMonitorBuilder::new(resolver, EtherFlowParser::new())
        .group_by(group_by)
        .threshold(config.monitor.threshold)
        .interval(std::time::Duration::from_secs(config.monitor.interval_secs))
        .upcall_symbol(&config.monitor.upcall_symbol)
        .skip_upcalls(cli.skip_upcalls)
        .skip_unix(cli.skip_unix)
        .skip_tcp(cli.skip_tcp)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build drop monitor: {}", e))?;

    let track_netns = group_by == GroupBy::Netns;
    let transport = RingBufTransport::load(
        &config.monitor.bpf_object,
        track_netns,
        cli.ignore_kprobe_error,
    )
    .map_err(|e| anyhow::anyhow!("failed to load BPF object: {}", e))?;

    // 종료 시그널은 플래그로 전달하고 루프가 배치 사이에서 확인한다
    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = Arc::clone(&stop);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown signal received");
        stop_signal.store(true, Ordering::Relaxed);
    });

    tracing::info!(
        group_by = %group_by.as_str(),
        interval_secs = config.monitor.interval_secs,
        "dropsight-daemon running"
    );

    // 리포트는 stdout, 로그는 stderr로 분리된다
    let worker = tokio::task::spawn_blocking(move || {
        let mut out = std::io::stdout();
        run_loop(transport, monitor, &stop, &mut out)
    });
    worker
        .await
        .context("monitor loop panicked")?
        .map_err(|e| anyhow::anyhow!("monitor loop failed: {}", e))?;

    tracing::info!("dropsight-daemon shut down");
    Ok(())
}
