//! 사이클 리포트 렌더링
//!
//! 스윕이 카운터를 지우기 전의 스냅샷을 사람이 읽는 테이블로 씁니다.
//! 컬럼 폭과 행 구성은 운영 중 스크린 로그와의 호환을 위해 고정입니다.

use std::io;

use chrono::Local;

use dropsight_core::pipeline::{PacketParser, SymbolResolver};
use dropsight_core::types::GroupBy;

use crate::classify::Bucket;
use crate::monitor::{DropMonitor, GroupData};

/// 커널 패킷 타입 코드(0..=7)의 표시 라벨
pub(crate) const PKT_TYPE_LABELS: [&str; 8] = [
    "this-host",
    "broadcast",
    "multicast",
    "other-host",
    "outgoing",
    "loopback",
    "to-user",
    "to-kernel",
];

impl<R, P> DropMonitor<R, P>
where
    R: SymbolResolver,
    P: PacketParser,
{
    /// 현재 사이클의 집계를 리포트로 씁니다. 카운터는 변경하지 않습니다.
    pub(crate) fn render_report(&self, out: &mut impl io::Write) -> io::Result<()> {
        let stamp = Local::now().format("%H:%M:%S");
        writeln!(out)?;
        writeln!(
            out,
            "{stamp}: sort by {}, total drops: {} (unix sockets {}):",
            self.group_by.description(),
            self.total_drops,
            self.total_drops_unix
        )?;

        match self.group_by {
            GroupBy::None => {}
            GroupBy::Flow => self.render_flow_groups(out)?,
            _ => self.render_bucket_groups(out)?,
        }

        write!(out, "\n  drops by packet type: ")?;
        for (label, count) in PKT_TYPE_LABELS.iter().zip(self.drops_by_type) {
            write!(out, "  {label}: {count}")?;
        }
        writeln!(out)?;

        self.render_locations(out)?;
        Ok(())
    }

    /// 버킷 컬럼 헤더와 그룹별 행을 씁니다 (flow 외의 그룹핑 모드).
    fn render_bucket_groups(&self, out: &mut impl io::Write) -> io::Result<()> {
        // 이름 컬럼 폭은 모드에 따라 다르다
        match self.group_by {
            GroupBy::DstMac | GroupBy::SrcMac | GroupBy::DstIp | GroupBy::SrcIp => {
                write!(out, "    {:17}", "")?;
            }
            _ => write!(out, "    {:10}", "")?,
        }
        for bucket in Bucket::ALL {
            if !bucket.hidden_for(self.group_by) {
                write!(out, "  {:>10}", bucket.label())?;
            }
        }
        writeln!(out, "  {:>10}", "total")?;

        for (_, group) in self.groups.iter() {
            if group.total_drops < self.threshold {
                continue;
            }
            write!(out, "  ")?;
            match self.group_by {
                GroupBy::Netns => {
                    write!(out, "{:>10}{}", group.label, if group.dead { '*' } else { ' ' })?;
                }
                _ => write!(out, "{:>17} ", group.label)?,
            }

            let GroupData::Buckets(counts) = &group.data else {
                continue;
            };
            for bucket in Bucket::ALL {
                if !bucket.hidden_for(self.group_by) {
                    write!(out, "  {:>10}", counts.get(bucket))?;
                }
            }
            writeln!(out, "  {:>10}", group.total_drops)?;
        }
        Ok(())
    }

    /// 그룹별 플로우 히트 라인과 용량/할당 진단을 씁니다 (flow 모드).
    fn render_flow_groups(&self, out: &mut impl io::Write) -> io::Result<()> {
        for (_, group) in self.groups.iter() {
            let GroupData::Flows(table) = &group.data else {
                continue;
            };
            let show = group.total_drops >= self.threshold;
            if show {
                for entry in table.iter().filter(|e| e.hits > 0) {
                    writeln!(out, "    hits {:4}:   {}", entry.hits, entry.flow)?;
                }
            }
            if table.overflow {
                writeln!(out, "too many flow entries for bucket")?;
            }
            if table.failures {
                writeln!(out, "failures processing entry")?;
            }
            if show {
                writeln!(out)?;
            }
        }
        Ok(())
    }

    /// 드롭 위치 테이블을 씁니다. 이번 사이클 드롭이 없는 위치는 생략됩니다.
    fn render_locations(&self, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out)?;
        for (_, loc) in self.locations.iter() {
            if loc.total_drops > 0 {
                writeln!(out, "{:>32}: {:>10}", loc.name, loc.total_drops)?;
            }
        }
        Ok(())
    }
}
