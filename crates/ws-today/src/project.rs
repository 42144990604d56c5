// project.rs — Derive work items from pipeline entities.
//
// The remote collaborator hands out items with score and tier already
// filled in. Against the local store they are derived here:
//
//   signal     score = urgency              tier by urgency
//   candidate  score = 0.6·conf + 0.4·icp   tier by value band
//   pursuit    score = win probability      tier by forecast value
//
// Terminal entities are not projected.

use chrono::{DateTime, Utc};

use ws_pipeline::{Candidate, Lifecycle, Pursuit, Signal, ValueBand};
use ws_sla::{SlaEvaluator, SlaSubject};

use crate::item::{ItemKind, PriorityTier, WorkItem};

fn tier_for_urgency(urgency: f64) -> PriorityTier {
    if urgency >= 0.85 {
        PriorityTier::Critical
    } else if urgency >= 0.6 {
        PriorityTier::High
    } else if urgency >= 0.3 {
        PriorityTier::Medium
    } else {
        PriorityTier::Low
    }
}

fn tier_for_value_band(band: ValueBand) -> PriorityTier {
    match band {
        ValueBand::Enterprise => PriorityTier::Critical,
        ValueBand::Large => PriorityTier::High,
        ValueBand::Medium => PriorityTier::Medium,
        ValueBand::Small => PriorityTier::Low,
    }
}

fn tier_for_forecast(value: f64) -> PriorityTier {
    if value >= 1_000_000.0 {
        PriorityTier::Critical
    } else if value >= 250_000.0 {
        PriorityTier::High
    } else if value >= 50_000.0 {
        PriorityTier::Medium
    } else {
        PriorityTier::Low
    }
}

pub fn candidate_score(candidate: &Candidate) -> f64 {
    let confidence = f64::from(candidate.confidence) / 100.0;
    match &candidate.icp {
        Some(icp) => 0.6 * confidence + 0.4 * (icp.score / 100.0).clamp(0.0, 1.0),
        None => confidence,
    }
}

/// Projects entities onto the panel, stamping SLA badges as of `now`.
pub struct Projector<'a> {
    evaluator: &'a SlaEvaluator,
    now: DateTime<Utc>,
}

impl<'a> Projector<'a> {
    pub fn new(evaluator: &'a SlaEvaluator, now: DateTime<Utc>) -> Self {
        Self { evaluator, now }
    }

    pub fn signal(&self, signal: &Signal) -> Option<WorkItem> {
        if signal.status.is_terminal() {
            return None;
        }
        let mut item = WorkItem::new(ItemKind::Signal, signal.signal_id, signal.snippet.clone())
            .with_score(signal.urgency_score)
            .with_tier(tier_for_urgency(signal.urgency_score));
        item.org_id = signal.org_id.clone();
        item.status = signal.status.to_string();
        item.sla_badge = self.evaluator.assess(&SlaSubject::from(signal), self.now).badge;
        Some(item)
    }

    pub fn candidate(&self, candidate: &Candidate) -> Option<WorkItem> {
        if candidate.status.is_terminal() {
            return None;
        }
        let mut item = WorkItem::new(
            ItemKind::Candidate,
            candidate.candidate_id,
            candidate.title.clone(),
        )
        .with_score(candidate_score(candidate))
        .with_tier(tier_for_value_band(candidate.value_band));
        item.org_id = candidate.org_id.clone();
        item.status = candidate.status.to_string();
        item.icp_band = candidate.icp.as_ref().map(|icp| icp.band);
        item.sla_badge = self
            .evaluator
            .assess(&SlaSubject::from(candidate), self.now)
            .badge;
        Some(item)
    }

    pub fn pursuit(&self, pursuit: &Pursuit) -> Option<WorkItem> {
        if !pursuit.is_open() {
            return None;
        }
        let mut item = WorkItem::new(ItemKind::Pursuit, pursuit.pursuit_id, pursuit.title.clone())
            .with_score(f64::from(pursuit.win_probability) / 100.0)
            .with_tier(tier_for_forecast(pursuit.forecast_value));
        item.org_id = pursuit.org_id.clone();
        item.status = pursuit.stage.to_string();
        item.due_at = Some(pursuit.due_date);
        item.sla_badge = self
            .evaluator
            .assess(&SlaSubject::from(pursuit), self.now)
            .badge;
        Some(item)
    }

    /// Project everything, in signal / candidate / pursuit order.
    pub fn all(
        &self,
        signals: &[Signal],
        candidates: &[Candidate],
        pursuits: &[Pursuit],
    ) -> Vec<WorkItem> {
        signals
            .iter()
            .filter_map(|s| self.signal(s))
            .chain(candidates.iter().filter_map(|c| self.candidate(c)))
            .chain(pursuits.iter().filter_map(|p| self.pursuit(p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ws_pipeline::{
        CandidateStatus, IcpBand, IcpSummary, NewCandidate, PromotionRequest, SignalSource,
        SignalStatus,
    };
    use ws_sla::SlaBadge;

    fn candidate(confidence: u8, band: ValueBand) -> Candidate {
        Candidate::new(
            "org-1",
            NewCandidate {
                title: "c".into(),
                value_band: band,
                contact: Default::default(),
                confidence,
            },
        )
        .unwrap()
    }

    #[test]
    fn signal_tiers_follow_urgency() {
        assert_eq!(tier_for_urgency(0.9), PriorityTier::Critical);
        assert_eq!(tier_for_urgency(0.6), PriorityTier::High);
        assert_eq!(tier_for_urgency(0.3), PriorityTier::Medium);
        assert_eq!(tier_for_urgency(0.29), PriorityTier::Low);
    }

    #[test]
    fn candidate_score_blends_icp() {
        let mut c = candidate(80, ValueBand::Large);
        assert!((candidate_score(&c) - 0.8).abs() < 1e-9);
        c.icp = Some(IcpSummary {
            score: 90.0,
            band: IcpBand::High,
        });
        assert!((candidate_score(&c) - 0.84).abs() < 1e-9);
    }

    #[test]
    fn terminal_entities_are_skipped() {
        let eval = SlaEvaluator::default();
        let projector = Projector::new(&eval, Utc::now());

        let mut s = Signal::new("org-1", SignalSource::Web, "x", 0.5);
        assert!(projector.signal(&s).is_some());
        s.transition(SignalStatus::Ignored).unwrap();
        assert!(projector.signal(&s).is_none());

        let mut c = candidate(50, ValueBand::Small);
        c.transition(CandidateStatus::Archived).unwrap();
        assert!(projector.candidate(&c).is_none());
    }

    #[test]
    fn pursuit_item_carries_due_date_badge() {
        let eval = SlaEvaluator::default();
        let mut c = candidate(50, ValueBand::Enterprise);
        c.transition(CandidateStatus::Triaged).unwrap();
        let p = Pursuit::from_promotion(
            &c,
            PromotionRequest {
                title: "big one".into(),
                forecast_value: 2_000_000.0,
                due_date: Utc::now() + Duration::hours(1),
                win_probability: Some(40),
                checklist_required: true,
            },
        )
        .unwrap();
        let item = Projector::new(&eval, Utc::now()).pursuit(&p).unwrap();
        assert_eq!(item.priority_tier, Some(PriorityTier::Critical));
        assert_eq!(item.sla_badge, Some(SlaBadge::Amber));
        assert_eq!(item.normalized_score(), Some(0.4));
    }
}
