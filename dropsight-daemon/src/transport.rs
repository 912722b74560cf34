//! Kernel event transport.
//!
//! Loads the BPF object file, attaches the `skb/kfree_skb` tracepoint
//! (and optionally the `fib_net_exit` kprobe for namespace-exit
//! notifications) and drains drop events from the kernel ring buffer.
//!
//! The transport owns all blocking: [`EventTransport::poll`] sleeps
//! briefly when the ring buffer is empty so the control loop never
//! busy-spins.

use dropsight_core::error::DropsightError;
use dropsight_core::event::MonitorEvent;

/// Maximum events drained per poll call.
pub const POLL_BATCH: usize = 512;

/// Source of monitor events for the control loop.
pub trait EventTransport {
    /// Drain currently available events into `out`.
    ///
    /// Returns with `out` possibly empty after a short wait when no
    /// events are pending.
    fn poll(&mut self, out: &mut Vec<MonitorEvent>) -> Result<(), DropsightError>;
}

#[cfg(target_os = "linux")]
pub use linux::RingBufTransport;

#[cfg(target_os = "linux")]
mod linux {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use aya::maps::RingBuf;
    use aya::programs::{KProbe, TracePoint};
    use aya::Ebpf;
    use metrics::counter;
    use tracing::{debug, info, warn};

    use dropsight_core::error::{DropsightError, TransportError};
    use dropsight_core::event::MonitorEvent;
    use dropsight_core::metrics as metric_names;
    use dropsight_drop_common::MAP_EVENTS;
    use dropsight_drop_monitor::decode_event;

    use super::{EventTransport, POLL_BATCH};

    /// Program name of the kfree_skb tracepoint in the BPF object.
    const PROG_KFREE_SKB: &str = "kfree_skb";
    /// Program name of the namespace-exit kprobe in the BPF object.
    const PROG_NET_EXIT: &str = "fib_net_exit";

    /// Ring-buffer backed transport over a loaded BPF object.
    pub struct RingBufTransport {
        // 드롭하면 프로그램이 detach되므로 러닝 내내 보유한다
        _ebpf: Ebpf,
        ring: RingBuf<aya::maps::MapData>,
    }

    impl RingBufTransport {
        /// Load the BPF object file and attach its programs.
        ///
        /// `track_netns` additionally attaches the namespace-exit kprobe;
        /// on kernels that cannot probe `fib_net_exit` the error can be
        /// downgraded to a warning with `ignore_kprobe_error`.
        pub fn load(
            object_path: impl AsRef<Path>,
            track_netns: bool,
            ignore_kprobe_error: bool,
        ) -> Result<Self, DropsightError> {
            let object_path = object_path.as_ref();
            let bytes = fs::read(object_path).map_err(|e| {
                TransportError::Load(format!("read {}: {e}", object_path.display()))
            })?;
            let mut ebpf =
                Ebpf::load(&bytes).map_err(|e| TransportError::Load(e.to_string()))?;

            let tracepoint: &mut TracePoint = ebpf
                .program_mut(PROG_KFREE_SKB)
                .ok_or_else(|| {
                    TransportError::Load(format!("program '{PROG_KFREE_SKB}' not found in object"))
                })?
                .try_into()
                .map_err(|e: aya::programs::ProgramError| TransportError::Load(e.to_string()))?;
            tracepoint
                .load()
                .map_err(|e| TransportError::Load(e.to_string()))?;
            tracepoint
                .attach("skb", "kfree_skb")
                .map_err(|e| TransportError::Attach(e.to_string()))?;
            info!("attached tracepoint skb/kfree_skb");

            if track_netns {
                match Self::attach_netns_probe(&mut ebpf) {
                    Ok(()) => info!("attached kprobe fib_net_exit"),
                    Err(err) if ignore_kprobe_error => {
                        warn!(error = %err, "namespace exit probe unavailable, groups will expire by aging only");
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let ring = RingBuf::try_from(ebpf.take_map(MAP_EVENTS).ok_or_else(|| {
                TransportError::RingBuffer(format!("map '{MAP_EVENTS}' not found in object"))
            })?)
            .map_err(|e| TransportError::RingBuffer(e.to_string()))?;

            Ok(Self { _ebpf: ebpf, ring })
        }

        fn attach_netns_probe(ebpf: &mut Ebpf) -> Result<(), TransportError> {
            let kprobe: &mut KProbe = ebpf
                .program_mut(PROG_NET_EXIT)
                .ok_or_else(|| {
                    TransportError::Load(format!("program '{PROG_NET_EXIT}' not found in object"))
                })?
                .try_into()
                .map_err(|e: aya::programs::ProgramError| TransportError::Load(e.to_string()))?;
            kprobe
                .load()
                .map_err(|e| TransportError::Load(e.to_string()))?;
            kprobe
                .attach("fib_net_exit", 0)
                .map_err(|e| TransportError::Attach(e.to_string()))?;
            Ok(())
        }
    }

    impl EventTransport for RingBufTransport {
        fn poll(&mut self, out: &mut Vec<MonitorEvent>) -> Result<(), DropsightError> {
            while out.len() < POLL_BATCH {
                let Some(record) = self.ring.next() else {
                    break;
                };
                counter!(metric_names::DAEMON_EVENTS_RECEIVED_TOTAL).increment(1);
                match decode_event(&record) {
                    Ok(event) => out.push(event),
                    Err(err) => {
                        debug!(error = %err, "discarding malformed ring buffer record");
                        counter!(metric_names::DAEMON_EVENTS_MALFORMED_TOTAL).increment(1);
                    }
                }
            }

            if out.is_empty() {
                // 이벤트가 없으면 여기서만 잠깐 블록한다
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use stub::RingBufTransport;

#[cfg(not(target_os = "linux"))]
mod stub {
    use std::path::Path;

    use dropsight_core::error::{DropsightError, TransportError};
    use dropsight_core::event::MonitorEvent;

    use super::EventTransport;

    /// Placeholder transport for non-Linux builds.
    pub struct RingBufTransport;

    impl RingBufTransport {
        pub fn load(
            _object_path: impl AsRef<Path>,
            _track_netns: bool,
            _ignore_kprobe_error: bool,
        ) -> Result<Self, DropsightError> {
            Err(TransportError::Load("kernel drop monitoring requires Linux".to_owned()).into())
        }
    }

    impl EventTransport for RingBufTransport {
        fn poll(&mut self, _out: &mut Vec<MonitorEvent>) -> Result<(), DropsightError> {
            Ok(())
        }
    }
}
