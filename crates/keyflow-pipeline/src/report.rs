//! Run reporting

use crate::runner::{Outcome, StageOutcome};
use crate::sink::OutputFiles;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Create,
    Enable,
    Extract,
    Cleanup,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Create => write!(f, "create"),
            StageKind::Enable => write!(f, "enable"),
            StageKind::Extract => write!(f, "extract"),
            StageKind::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// Tally of one stage's outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StageStats {
    pub fn from_outcomes(outcomes: &[StageOutcome]) -> Self {
        let mut stats = Self {
            attempted: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match &outcome.outcome {
                Outcome::Success => stats.succeeded += 1,
                Outcome::Failed(_) => stats.failed += 1,
                Outcome::Skipped => stats.skipped += 1,
            }
        }
        stats
    }
}

/// Final report for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Work items the run started with
    pub attempted: usize,

    /// Per-stage tallies, in execution order
    pub stages: Vec<(StageKind, StageStats)>,

    /// Credentials accumulated in the sink
    pub credentials: usize,

    /// Wall time for the whole run
    pub elapsed: Duration,

    /// Where the credential files were written
    pub outputs: Option<OutputFiles>,
}

impl RunReport {
    pub fn stage(&self, kind: StageKind) -> Option<StageStats> {
        self.stages
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, stats)| *stats)
    }

    /// Fraction of attempted items that yielded a credential.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.credentials as f64 / self.attempted as f64
    }

    /// Credentials per minute of wall time.
    pub fn throughput(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        self.credentials as f64 / minutes
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Run summary")?;
        writeln!(f, "  attempted:   {}", self.attempted)?;
        for (kind, stats) in &self.stages {
            writeln!(
                f,
                "  {:<12} {} ok / {} failed / {} skipped",
                format!("{}:", kind),
                stats.succeeded,
                stats.failed,
                stats.skipped
            )?;
        }
        writeln!(f, "  credentials: {}", self.credentials)?;
        writeln!(
            f,
            "  elapsed:     {:.1}s ({:.1} keys/min)",
            self.elapsed.as_secs_f64(),
            self.throughput()
        )?;
        writeln!(f, "  success:     {:.0}%", self.success_rate() * 100.0)?;
        if let Some(outputs) = &self.outputs {
            writeln!(f, "  outputs:     {}", outputs.line_file.display())?;
            writeln!(f, "               {}", outputs.csv_file.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::WorkItem;
    use crate::retry::ItemFailure;
    use keyflow_cloud::ErrorClass;

    #[test]
    fn test_stage_stats_tally() {
        let outcomes = vec![
            StageOutcome {
                item: WorkItem::new("a"),
                outcome: Outcome::Success,
            },
            StageOutcome {
                item: WorkItem::new("b"),
                outcome: Outcome::Failed(ItemFailure::new(ErrorClass::Transient, "x", 3)),
            },
            StageOutcome {
                item: WorkItem::new("c"),
                outcome: Outcome::Skipped,
            },
        ];

        let stats = StageStats::from_outcomes(&outcomes);
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_report_rates() {
        let report = RunReport {
            attempted: 10,
            credentials: 6,
            elapsed: Duration::from_secs(120),
            ..Default::default()
        };

        assert!((report.success_rate() - 0.6).abs() < f64::EPSILON);
        assert!((report.throughput() - 3.0).abs() < f64::EPSILON);
    }
}
