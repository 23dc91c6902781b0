//! Per-phase bind statistics

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

/// Bind phases that are timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discover,
    Inspect,
    Reattach,
    Register,
    Bind,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discover => "discover",
            Phase::Inspect => "inspect",
            Phase::Reattach => "reattach",
            Phase::Register => "register",
            Phase::Bind => "bind",
        }
    }
}

/// Running statistics in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseStat {
    pub count: u64,
    pub total: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub mean: f64,
}

impl PhaseStat {
    pub fn record(&mut self, elapsed: Duration) {
        let micros = elapsed.as_micros() as u64;
        self.count += 1;
        self.total += micros;
        self.min = Some(self.min.map_or(micros, |min| min.min(micros)));
        self.max = Some(self.max.map_or(micros, |max| max.max(micros)));
        self.mean = self.total as f64 / self.count as f64;
    }
}

/// Statistics for every phase, recorded only while enabled
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timings {
    #[serde(skip)]
    enabled: bool,
    #[serde(flatten)]
    phases: BTreeMap<Phase, PhaseStat>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        if self.enabled {
            self.phases.entry(phase).or_default().record(elapsed);
        }
    }

    pub fn get(&self, phase: Phase) -> Option<&PhaseStat> {
        self.phases.get(&phase)
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn reset(&mut self) {
        self.phases.clear();
    }

    /// Emit one `info` line per phase
    pub fn log(&self) {
        for (phase, stat) in &self.phases {
            tracing::info!(
                phase = phase.as_str(),
                count = stat.count,
                total_us = stat.total,
                min_us = stat.min.unwrap_or_default(),
                max_us = stat.max.unwrap_or_default(),
                mean_us = stat.mean,
                "bind timings"
            );
        }
    }
}
