//! Runs the whole pipeline for one gym.
//!
//! Per-member stages (features, classification, churn estimate) run in
//! parallel over the roster. The aggregate stages only start once every
//! member has been scored.

use std::collections::HashMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::churn;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::forecast;
use crate::funnel;
use crate::models::{
    ChurnResult, ContactEvent, Forecast, FunnelBottleneck, Member, MonthlyMetrics, Prioritized,
    RiskClassification, StabilityScore,
};
use crate::recommend;
use crate::risk;
use crate::signals;
use crate::snapshot::GymSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymAnalysis {
    pub gym: String,
    pub as_of: NaiveDate,
    pub members: Vec<ChurnResult>,
    pub forecast: Forecast,
    pub bottleneck: Option<FunnelBottleneck>,
    pub stability: Option<StabilityScore>,
    pub prioritized: Prioritized,
}

#[derive(Debug, Clone, Default)]
pub struct RetentionEngine {
    config: EngineConfig,
}

impl RetentionEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Features, classification and churn estimate for one member.
    pub fn assess_member(
        &self,
        member: &Member,
        contacts: &[ContactEvent],
        now: NaiveDate,
    ) -> Result<ChurnResult> {
        let features = signals::extract_features(member, contacts, now, &self.config.churn)?;
        let classification = risk::classify(&features, &self.config.classifier);
        let estimate = churn::estimate_churn(&features, &classification, &self.config);

        debug!(
            member = %member.id,
            class = classification.engagement_class.as_str(),
            probability = estimate.probability,
            "member assessed"
        );

        Ok(ChurnResult {
            member_name: member.name.clone(),
            classification: RiskClassification {
                member_id: member.id,
                engagement_class: classification.engagement_class,
                risk_tier: classification.risk_tier,
                risk_reasons: classification.risk_reasons,
                churn_probability: estimate.probability,
            },
            features,
            estimate,
        })
    }

    /// Scores every member, preserving roster order. Any invalid member fails
    /// the whole pass.
    pub fn assess_roster(
        &self,
        members: &[Member],
        contacts: &[ContactEvent],
        now: NaiveDate,
    ) -> Result<Vec<ChurnResult>> {
        let mut by_member: HashMap<Uuid, Vec<ContactEvent>> = HashMap::new();
        for event in contacts {
            by_member.entry(event.member_id).or_default().push(event.clone());
        }

        members
            .par_iter()
            .map(|member| {
                let history = by_member.get(&member.id).map(Vec::as_slice).unwrap_or(&[]);
                self.assess_member(member, history, now)
            })
            .collect()
    }

    pub fn forecast(
        &self,
        history: &[MonthlyMetrics],
        results: &[ChurnResult],
        current_mrr: f64,
    ) -> Forecast {
        forecast::forecast(history, results, current_mrr, &self.config.forecast)
    }

    pub fn run(&self, snapshot: &GymSnapshot, now: NaiveDate) -> Result<GymAnalysis> {
        let members = self.assess_roster(&snapshot.members, &snapshot.contacts, now)?;

        let current_mrr = current_mrr(&members, &snapshot.metrics);
        let forecast = self.forecast(&snapshot.metrics, &members, current_mrr);
        let bottleneck = snapshot
            .funnel
            .as_ref()
            .and_then(|counts| funnel::detect_bottleneck(counts, &self.config.funnel));
        let stability = crate::stability::score(&snapshot.metrics, &self.config.stability);
        let prioritized = recommend::prioritize(
            &members,
            &forecast,
            bottleneck.as_ref(),
            stability.as_ref(),
            &self.config,
        );

        info!(
            gym = %snapshot.gym,
            members = members.len(),
            flagged = members
                .iter()
                .filter(|m| m.is_active() && m.classification.engagement_class.is_flagged())
                .count(),
            outlook = forecast.outlook.as_str(),
            recommendations = prioritized.recommendations.len(),
            "gym analysis complete"
        );

        Ok(GymAnalysis {
            gym: snapshot.gym.clone(),
            as_of: now,
            members,
            forecast,
            bottleneck,
            stability,
            prioritized,
        })
    }
}

/// MRR billed by the active roster, or the latest monthly aggregate when the
/// roster has no active members.
pub fn current_mrr(results: &[ChurnResult], history: &[MonthlyMetrics]) -> f64 {
    let roster: f64 = results
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.monthly_rate())
        .sum();
    if roster > 0.0 {
        roster
    } else {
        history.last().map_or(0.0, |m| m.mrr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{
        EngagementClass, FunnelCounts, MemberStatus, Outlook, RiskTier, StabilityTier,
    };
    use chrono::Duration;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn member(name: &str, tenure: i64, attended: Option<i64>, contacted: Option<i64>) -> Member {
        Member {
            id: Uuid::new_v4(),
            name: name.to_string(),
            join_date: now() - Duration::days(tenure),
            cancel_date: None,
            monthly_rate: 80.0,
            status: MemberStatus::Active,
            last_attended_date: attended.map(|d| now() - Duration::days(d)),
            last_contacted_at: contacted.map(|d| now() - Duration::days(d)),
        }
    }

    fn month(m: u32, mrr: f64, active: u32, new: u32) -> MonthlyMetrics {
        MonthlyMetrics {
            month: NaiveDate::from_ymd_opt(2026, m, 1).unwrap(),
            mrr,
            active_members: active,
            new_members: new,
            cancels: 0,
            churn_rate: 0.0,
            rsi: 90.0,
        }
    }

    fn healthy_metrics() -> Vec<MonthlyMetrics> {
        vec![
            month(3, 10_000.0, 100, 2),
            month(4, 10_200.0, 102, 2),
            month(5, 10_400.0, 104, 2),
        ]
    }

    #[test]
    fn healthy_roster_needs_no_focus() {
        let snapshot = GymSnapshot {
            gym: "Northside".to_string(),
            members: vec![
                member("Ana", 200, Some(1), Some(3)),
                member("Ben", 120, Some(4), Some(10)),
            ],
            contacts: Vec::new(),
            metrics: healthy_metrics(),
            funnel: None,
        };

        let analysis = RetentionEngine::default().run(&snapshot, now()).unwrap();
        assert!(analysis
            .members
            .iter()
            .all(|m| m.classification.engagement_class == EngagementClass::Core));
        assert_eq!(analysis.stability.as_ref().map(|s| s.tier), Some(StabilityTier::Stable));
        assert!(analysis.prioritized.focus.is_none());
    }

    #[test]
    fn flat_gym_without_churn_needs_no_focus() {
        let snapshot = GymSnapshot {
            gym: "Westside".to_string(),
            members: vec![member("Ana", 200, Some(1), Some(3))],
            contacts: Vec::new(),
            metrics: vec![
                month(3, 10_000.0, 100, 0),
                month(4, 10_000.0, 100, 0),
                month(5, 10_000.0, 100, 0),
            ],
            // every stage converts above its benchmark
            funnel: Some(FunnelCounts {
                leads: 100,
                booked: 90,
                shows: 85,
                new_members: 60,
            }),
        };

        let analysis = RetentionEngine::default().run(&snapshot, now()).unwrap();
        let stability = analysis.stability.as_ref().unwrap();
        assert!(stability.score >= 80.0);
        assert_eq!(stability.tier, StabilityTier::Stable);
        assert_eq!(analysis.forecast.outlook, Outlook::Flat);
        assert_eq!(
            analysis.bottleneck.as_ref().map(|b| b.below_benchmark),
            Some(false)
        );
        assert!(analysis.prioritized.recommendations.is_empty());
        assert!(analysis.prioritized.focus.is_none());
    }

    #[test]
    fn ghost_member_drives_focus() {
        let ghost = member("Cam", 90, Some(30), Some(40));
        let ghost_id = ghost.id;
        let snapshot = GymSnapshot {
            gym: "Northside".to_string(),
            members: vec![member("Ana", 200, Some(1), Some(3)), ghost],
            contacts: Vec::new(),
            metrics: healthy_metrics(),
            funnel: Some(FunnelCounts {
                leads: 2,
                booked: 1,
                shows: 1,
                new_members: 0,
            }),
        };

        let analysis = RetentionEngine::default().run(&snapshot, now()).unwrap();
        let cam = analysis
            .members
            .iter()
            .find(|m| m.classification.member_id == ghost_id)
            .unwrap();
        assert_eq!(cam.classification.engagement_class, EngagementClass::Ghost);
        assert_eq!(cam.classification.risk_tier, RiskTier::High);
        assert!(cam.classification.churn_probability >= 0.7);
        assert!(analysis.bottleneck.is_none());

        let focus = analysis.prioritized.focus.unwrap();
        assert_eq!(focus.category.key(), "retention:ghost:schedule-change");
        // two joins a month at $100 against Cam's $80 likely cancel
        assert!((analysis.forecast.mrr_delta - 120.0).abs() < 1e-9);
        assert_eq!(analysis.forecast.outlook, Outlook::Growing);
    }

    #[test]
    fn contact_log_feeds_recency() {
        let engine = RetentionEngine::default();
        let m = member("Dee", 90, Some(8), None);
        let contacts = vec![ContactEvent {
            member_id: m.id,
            contacted_at: now() - Duration::days(2),
            note: None,
        }];
        let results = engine.assess_roster(&[m], &contacts, now()).unwrap();
        assert_eq!(results[0].features.days_since_contact, Some(2));
        assert_eq!(
            results[0].classification.engagement_class,
            EngagementClass::Drifter
        );
    }

    #[test]
    fn invalid_member_fails_whole_pass() {
        let mut bad = member("Eve", 30, None, None);
        bad.monthly_rate = -5.0;
        let err = RetentionEngine::default()
            .assess_roster(&[member("Ana", 200, Some(1), Some(3)), bad], &[], now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let snapshot = GymSnapshot {
            gym: "Northside".to_string(),
            members: vec![
                member("Ana", 200, Some(1), Some(3)),
                member("Cam", 90, Some(30), Some(40)),
                member("Dee", 90, Some(8), Some(20)),
            ],
            contacts: Vec::new(),
            metrics: healthy_metrics(),
            funnel: None,
        };
        let engine = RetentionEngine::default();
        assert_eq!(
            engine.run(&snapshot, now()).unwrap(),
            engine.run(&snapshot, now()).unwrap()
        );
    }
}
