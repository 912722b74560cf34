//! Daemon control loop.
//!
//! Drains events from the transport, feeds them into the monitor and
//! triggers the periodic report. The loop runs on a dedicated blocking
//! thread; a shared stop flag requests shutdown between batches.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use metrics::gauge;
use tracing::{debug, info};

use dropsight_core::error::DropsightError;
use dropsight_core::event::MonitorEvent;
use dropsight_core::metrics as metric_names;
use dropsight_core::pipeline::{PacketParser, SymbolResolver};
use dropsight_drop_monitor::DropMonitor;

use crate::transport::EventTransport;

/// Run the monitor loop until `stop` is raised.
///
/// Events are processed in batches; the report fires from the same
/// thread so the monitor state needs no locking. One final report is
/// not forced on shutdown, partial cycles are simply dropped.
pub fn run_loop<T, R, P, W>(
    mut transport: T,
    mut monitor: DropMonitor<R, P>,
    stop: &AtomicBool,
    out: &mut W,
) -> Result<(), DropsightError>
where
    T: EventTransport,
    R: SymbolResolver,
    P: PacketParser,
    W: io::Write,
{
    let started = Instant::now();
    let mut batch: Vec<MonitorEvent> = Vec::new();

    info!("monitor loop started");
    while !stop.load(Ordering::Relaxed) {
        batch.clear();
        transport.poll(&mut batch)?;

        for event in batch.drain(..) {
            monitor.handle_event(event);
        }

        let reported = monitor
            .maybe_report_and_age(Instant::now(), out)
            .map_err(DropsightError::from)?;
        if reported {
            gauge!(metric_names::DAEMON_UPTIME_SECONDS).set(started.elapsed().as_secs_f64());
            debug!("report cycle complete");
        }
    }

    info!("monitor loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use bytes::Bytes;

    use dropsight_core::error::ParseError;
    use dropsight_core::event::DropSample;
    use dropsight_core::types::{FlowKey, GroupBy, Symbol};
    use dropsight_drop_monitor::DropMonitorBuilder;

    struct FixedResolver;

    impl SymbolResolver for FixedResolver {
        fn resolve(&self, _addr: u64) -> Option<Symbol> {
            Some(Symbol::named("kfree_skb"))
        }
    }

    struct NoParse;

    impl PacketParser for NoParse {
        fn parse(
            &self,
            _link_proto: u16,
            _data: &[u8],
            _vlan_tci: Option<u16>,
        ) -> Result<FlowKey, ParseError> {
            Err(ParseError::Malformed("not used"))
        }
    }

    /// Transport that emits a fixed batch on the first poll and raises the
    /// stop flag once the deadline has passed.
    struct TimedTransport<'a> {
        events: Vec<MonitorEvent>,
        deadline: Instant,
        stop: &'a AtomicBool,
    }

    impl EventTransport for TimedTransport<'_> {
        fn poll(&mut self, out: &mut Vec<MonitorEvent>) -> Result<(), DropsightError> {
            out.append(&mut self.events);
            if Instant::now() >= self.deadline {
                self.stop.store(true, Ordering::Relaxed);
            } else {
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(())
        }
    }

    fn sample() -> DropSample {
        DropSample {
            time: 0,
            location: 0xffff_ffff_8100_0000,
            packet_type: 0,
            netns: 0,
            ifindex: 2,
            pkt_len: 64,
            nr_frags: 0,
            gso_size: 0,
            link_proto: 0x0800,
            vlan_tci: None,
            data: Bytes::new(),
        }
    }

    #[test]
    fn loop_processes_batch_and_reports_before_exit() {
        let stop = AtomicBool::new(false);
        // the first report lands one interval after construction, so the
        // transport keeps the loop alive past that point before stopping
        let monitor = DropMonitorBuilder::new(FixedResolver, NoParse)
            .group_by(GroupBy::None)
            .interval(Duration::from_secs(1))
            .build()
            .unwrap();
        let transport = TimedTransport {
            events: vec![
                MonitorEvent::Drop(sample()),
                MonitorEvent::Drop(sample()),
                MonitorEvent::Drop(sample()),
            ],
            deadline: Instant::now() + Duration::from_millis(1200),
            stop: &stop,
        };

        let mut out = Vec::new();
        run_loop(transport, monitor, &stop, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("total drops: 3"));
        assert!(text.contains("kfree_skb"));
    }

    #[test]
    fn stop_flag_raised_before_entry_skips_polling() {
        let stop = AtomicBool::new(true);
        let monitor = DropMonitorBuilder::new(FixedResolver, NoParse).build().unwrap();
        let transport = TimedTransport {
            events: vec![MonitorEvent::Drop(sample())],
            deadline: Instant::now(),
            stop: &stop,
        };

        let mut out = Vec::new();
        run_loop(transport, monitor, &stop, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
