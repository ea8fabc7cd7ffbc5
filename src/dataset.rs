//! One complete analysis run and everything it produces.
use crate::capture::PcapReader;
use crate::config::{Config, Inputs};
use crate::egress::{analyze_egress, DeliverTotal, EgressReport, ThroughputSeries};
use crate::error::Result;
use crate::fairness::fairness;
use crate::ingress::{analyze_ingress, FlowReport, IngressReport, SendTotal};
use crate::logs::{AuxLogs, BacklogLog, BbrLog};
use crate::pass::{PassStats, TotalRecord};
use crate::series::Point;
use crate::sync::{aggregate, BbrTotals, SyncPhase};
use log::info;
use serde::Serialize;
use std::fmt;
use std::panic;
use std::thread::{self, ScopedJoinHandle};

/// Jain's index per window for each rate metric.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Fairness {
    pub throughput: Vec<Point>,
    pub sending_rate: Vec<Point>,
}

/// Units: seconds, bits per second, bits, milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub delta_t: f64,
    /// Per-connection measurements before the bottleneck.
    pub flows: Vec<FlowReport>,
    pub sending_totals: Vec<TotalRecord<SendTotal>>,
    /// Per-connection delivered throughput behind the bottleneck.
    pub throughput: Vec<ThroughputSeries>,
    pub throughput_totals: Vec<TotalRecord<DeliverTotal>>,
    pub fairness: Fairness,
    pub bbr: Vec<BbrLog>,
    pub bbr_totals: BbrTotals,
    pub backlog: Vec<BacklogLog>,
    pub sync_phases: Vec<SyncPhase>,
    pub ingress_stats: PassStats,
    pub egress_stats: PassStats,
}

impl Dataset {
    pub fn retransmissions(&self) -> usize {
        self.flows.iter().map(|f| f.retransmissions.len()).sum()
    }

    /// Mean over every RTT sample of every connection, milliseconds.
    pub fn mean_rtt(&self) -> Option<f64> {
        let (sum, n) = self
            .flows
            .iter()
            .flat_map(|f| &f.rtt)
            .fold((0.0, 0usize), |(sum, n), s| (sum + s.rtt, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "window: {}s", self.delta_t)?;
        writeln!(
            f,
            "connections: {} before the bottleneck, {} behind it",
            self.flows.len(),
            self.throughput.len()
        )?;
        for flow in &self.flows {
            writeln!(
                f,
                "  [#{}] {} windows={} rtt_samples={} retransmissions={}",
                flow.index,
                flow.key,
                flow.records.len(),
                flow.rtt.len(),
                flow.retransmissions.len()
            )?;
        }
        match self.mean_rtt() {
            Some(rtt) => writeln!(f, "mean rtt: {:.3}ms", rtt)?,
            None => writeln!(f, "mean rtt: n/a")?,
        }
        writeln!(f, "retransmissions: {}", self.retransmissions())?;
        writeln!(
            f,
            "bbr logs: {}, backlog logs: {}",
            self.bbr.len(),
            self.backlog.len()
        )?;
        write!(f, "sync phases: {}", self.sync_phases.len())?;
        for phase in &self.sync_phases {
            write!(f, "\n  {:.6}s for {:.3}ms", phase.start, phase.duration)?;
        }
        Ok(())
    }
}

/// Runs the full analysis. Every input is checked before any is read.
pub fn analyze(inputs: &Inputs, config: &Config) -> Result<Dataset> {
    config.validate()?;
    inputs.verify()?;
    let delta_t = config.delta_t;

    let (ingress, egress, logs) = thread::scope(|s| {
        let ingress = s.spawn(|| -> Result<IngressReport> {
            info!("ingress pass over {}", inputs.ingress_capture.display());
            let mut source = PcapReader::open(&inputs.ingress_capture)?;
            analyze_ingress(&mut source, delta_t)
        });
        let egress = s.spawn(|| -> Result<EgressReport> {
            info!("egress pass over {}", inputs.egress_capture.display());
            let mut source = PcapReader::open(&inputs.egress_capture)?;
            analyze_egress(&mut source, delta_t)
        });
        let logs = s.spawn(|| AuxLogs::load(&inputs.bbr_logs, &inputs.backlog_logs));
        (join(ingress), join(egress), join(logs))
    });
    let (ingress, egress, mut logs) = (ingress?, egress?, logs?);

    let fairness = Fairness {
        throughput: fairness(&egress.throughput()),
        sending_rate: fairness(&ingress.sending_rate()),
    };

    if let Some(origin) = logs.origin() {
        logs.rebase(origin);
    }
    let bbr: Vec<_> = logs.bbr.iter().map(|l| l.bbr.clone()).collect();
    let sync = aggregate(&bbr);
    info!(
        "{} connections, {} sync phases",
        ingress.flows.len(),
        sync.phases.len()
    );

    Ok(Dataset {
        delta_t,
        flows: ingress.flows,
        sending_totals: ingress.totals,
        throughput: egress.flows,
        throughput_totals: egress.totals,
        fairness,
        bbr: logs.bbr,
        bbr_totals: sync.totals,
        backlog: logs.backlog,
        sync_phases: sync.phases,
        ingress_stats: ingress.stats,
        egress_stats: egress.stats,
    })
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle.join().unwrap_or_else(|e| panic::resume_unwind(e))
}
