// stats.rs — Workstream headline numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ws_pipeline::{Candidate, Pursuit, Signal};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkstreamStats {
    /// Record counts keyed by status name.
    pub signals: BTreeMap<String, usize>,
    pub candidates: BTreeMap<String, usize>,
    pub pursuits: BTreeMap<String, usize>,
    pub open_breaches: usize,
    pub ready_to_promote: usize,
    /// Sum of forecast values over open pursuits.
    pub forecast_total: f64,
    /// Sum of forecast × win probability over open pursuits.
    pub weighted_forecast: f64,
}

impl WorkstreamStats {
    pub fn compute(
        signals: &[Signal],
        candidates: &[Candidate],
        pursuits: &[Pursuit],
        open_breaches: usize,
        ready_to_promote: usize,
    ) -> Self {
        let mut stats = WorkstreamStats {
            open_breaches,
            ready_to_promote,
            ..Default::default()
        };
        for s in signals {
            *stats.signals.entry(s.status.to_string()).or_default() += 1;
        }
        for c in candidates {
            *stats.candidates.entry(c.status.to_string()).or_default() += 1;
        }
        for p in pursuits {
            *stats.pursuits.entry(p.stage.to_string()).or_default() += 1;
            if p.is_open() {
                stats.forecast_total += p.forecast_value;
                stats.weighted_forecast +=
                    p.forecast_value * f64::from(p.win_probability) / 100.0;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use ws_pipeline::{
        CandidateStatus, NewCandidate, PromotionRequest, PursuitStage, SignalSource, ValueBand,
    };

    fn pursuit(forecast: f64, win: u8) -> Pursuit {
        let mut c = Candidate::new(
            "org-1",
            NewCandidate {
                title: "c".into(),
                value_band: ValueBand::Medium,
                contact: Default::default(),
                confidence: 50,
            },
        )
        .unwrap();
        c.transition(CandidateStatus::Triaged).unwrap();
        Pursuit::from_promotion(
            &c,
            PromotionRequest {
                title: "p".into(),
                forecast_value: forecast,
                due_date: Utc::now() + Duration::days(10),
                win_probability: Some(win),
                checklist_required: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn forecast_counts_open_pursuits_only() {
        let open = pursuit(100_000.0, 50);
        let mut lost = pursuit(900_000.0, 90);
        lost.transition(PursuitStage::Lost).unwrap();
        let signals = vec![
            Signal::new("org-1", SignalSource::Web, "a", 0.1),
            Signal::new("org-1", SignalSource::Web, "b", 0.1),
        ];

        let stats = WorkstreamStats::compute(&signals, &[], &[open, lost], 2, 1);
        assert_eq!(stats.signals.get("new"), Some(&2));
        assert_eq!(stats.pursuits.get("qual"), Some(&1));
        assert_eq!(stats.pursuits.get("lost"), Some(&1));
        assert_eq!(stats.forecast_total, 100_000.0);
        assert_eq!(stats.weighted_forecast, 50_000.0);
        assert_eq!(stats.open_breaches, 2);
    }
}
