use crate::risk::{classify, ClassifyError, RiskTier};
use crate::types::ProbeResult;
use serde::{Deserialize, Serialize};
use std::io::Write;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Final, immutable outcome of one scan run. Safe to hand to multiple
/// export/enrichment consumers concurrently.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub target: String,
    pub ports_scanned: Vec<u16>,
    /// Subset of `ports_scanned` found open, in the same relative order.
    pub open_ports: Vec<u16>,
    pub duration_ms: u64,
    pub risk_tier: RiskTier,
    /// RFC3339 timestamp of scan completion.
    pub timestamp: String,
}

impl ScanReport {
    /// Assemble a report from a finished probe sequence.
    ///
    /// `probe_results` is expected in port order as produced by the scanner;
    /// open ports are filtered out of it order-preserving. The risk tier is
    /// derived from the open/scanned counts, which fails only if
    /// `ports_scanned` is empty (upstream validation rules that out).
    pub fn build(
        target: &str,
        ports_scanned: Vec<u16>,
        probe_results: &[ProbeResult],
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
    ) -> Result<Self, ClassifyError> {
        let elapsed = finished_at - started_at;
        debug_assert!(
            elapsed >= time::Duration::ZERO,
            "finished_at precedes started_at"
        );

        let open_ports: Vec<u16> = probe_results
            .iter()
            .filter(|r| r.open)
            .map(|r| r.port)
            .collect();
        let risk_tier = classify(open_ports.len(), ports_scanned.len())?;

        Ok(Self {
            target: target.to_string(),
            ports_scanned,
            open_ports,
            duration_ms: elapsed.whole_milliseconds().max(0) as u64,
            risk_tier,
            timestamp: finished_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z")),
        })
    }

    /// Serialize the full report as pretty JSON.
    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// Serialize the open ports as CSV, one row per open port.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["target", "port", "risk_tier", "timestamp"])?;
        for port in &self.open_ports {
            let port = port.to_string();
            wtr.write_record([
                self.target.as_str(),
                port.as_str(),
                self.risk_tier.as_str(),
                self.timestamp.as_str(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probes(pairs: &[(u16, bool)]) -> Vec<ProbeResult> {
        pairs
            .iter()
            .map(|&(port, open)| ProbeResult {
                port,
                open,
                elapsed_ms: 1,
            })
            .collect()
    }

    #[test]
    fn open_ports_preserve_scan_order() {
        let results = probes(&[(22, true), (80, false), (443, true), (8080, true)]);
        let now = OffsetDateTime::now_utc();
        let report = ScanReport::build("example.test", vec![22, 80, 443, 8080], &results, now, now)
            .unwrap();
        assert_eq!(report.open_ports, vec![22, 443, 8080]);
        assert_eq!(report.risk_tier, RiskTier::High); // 3 of 4 open
    }

    #[test]
    fn empty_probe_sequence_is_low_risk() {
        let now = OffsetDateTime::now_utc();
        let report =
            ScanReport::build("example.test", vec![1, 2, 3], &probes(&[]), now, now).unwrap();
        assert!(report.open_ports.is_empty());
        assert_eq!(report.risk_tier, RiskTier::Low);
    }

    #[test]
    fn build_rejects_empty_port_set() {
        let now = OffsetDateTime::now_utc();
        let err = ScanReport::build("example.test", Vec::new(), &probes(&[]), now, now);
        assert_eq!(err, Err(ClassifyError::EmptyPortSet));
    }

    #[test]
    fn json_field_names_match_the_data_model() {
        let now = OffsetDateTime::now_utc();
        let report =
            ScanReport::build("example.test", vec![22, 80], &probes(&[(22, true)]), now, now)
                .unwrap();
        let value: serde_json::Value = serde_json::to_value(&report).unwrap();
        for key in [
            "target",
            "ports_scanned",
            "open_ports",
            "duration_ms",
            "risk_tier",
            "timestamp",
        ] {
            assert!(value.get(key).is_some(), "missing field {key}");
        }
        assert_eq!(value["risk_tier"], "high");
    }

    #[test]
    fn csv_has_one_row_per_open_port() {
        let now = OffsetDateTime::now_utc();
        let report = ScanReport::build(
            "example.test",
            vec![22, 80, 443],
            &probes(&[(22, true), (443, true)]),
            now,
            now,
        )
        .unwrap();
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 open ports
        assert_eq!(lines[0], "target,port,risk_tier,timestamp");
        assert!(lines[1].starts_with("example.test,22,high,"));
        assert!(lines[2].starts_with("example.test,443,high,"));
    }

    #[test]
    fn duration_is_wall_time_between_bounds() {
        let started = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let finished = started + time::Duration::milliseconds(1_234);
        let report =
            ScanReport::build("example.test", vec![80], &probes(&[]), started, finished).unwrap();
        assert_eq!(report.duration_ms, 1_234);
        assert!(report.timestamp.starts_with("2023-11-14T"));
    }
}
