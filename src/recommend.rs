//! Intervention candidates and ranking.
//!
//! One place decides what an operator should do next: both the gym-level
//! recommendation list and the per-member action come from here.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EngineConfig, PrioritizerConfig};
use crate::funnel;
use crate::models::{
    ChurnResult, Counterfactual, EngagementClass, Forecast, FunnelBottleneck, FunnelStage,
    Intervention, Prioritized, Priority, Recommendation, RecommendationCategory, RiskTier,
    StabilityComponent, StabilityComponentKind, StabilityScore, StabilityTier,
};

/// Shown when there is nothing to focus on.
pub const MAINTAIN_MOMENTUM: &str =
    "No urgent interventions. Maintain momentum: keep contacting members and tracking attendance.";

const CLUSTERS: [EngagementClass; 3] = [
    EngagementClass::Ghost,
    EngagementClass::AtRisk,
    EngagementClass::Drifter,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAction {
    pub intervention: Intervention,
    pub churn_delta: f64,
    pub execution_checklist: Vec<String>,
}

pub fn prioritize(
    results: &[ChurnResult],
    forecast: &Forecast,
    bottleneck: Option<&FunnelBottleneck>,
    stability: Option<&StabilityScore>,
    config: &EngineConfig,
) -> Prioritized {
    let horizon = config.forecast.horizon_months as f64;
    let mut candidates = retention_candidates(results, horizon, &config.prioritizer);

    // a bottleneck already converting at benchmark is the weakest stage, not a problem
    if let Some(bottleneck) = bottleneck.filter(|b| b.below_benchmark) {
        let member_rate = average_member_rate(results, forecast);
        candidates.push(funnel_candidate(bottleneck, member_rate, horizon, config));
    }

    if let Some(stability) = stability {
        candidates.extend(
            stability
                .components()
                .into_iter()
                .filter(|c| c.score < c.max / 2.0)
                .map(|c| stability_candidate(c, stability.tier, forecast, horizon, &config.prioritizer)),
        );
    }

    rank(&mut candidates);
    debug!(candidates = candidates.len(), "recommendations ranked");

    Prioritized {
        focus: candidates.first().cloned(),
        recommendations: candidates,
    }
}

/// Score descending, then members affected descending, then category key ascending.
pub fn rank(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        b.intervention_score
            .total_cmp(&a.intervention_score)
            .then_with(|| b.members_affected.cmp(&a.members_affected))
            .then_with(|| a.category.key().cmp(&b.category.key()))
    });
}

/// The intervention that lowers this member's churn the most, if any does.
pub fn member_action(result: &ChurnResult) -> Option<MemberAction> {
    if !result.is_active() || result.classification.risk_tier == RiskTier::Low {
        return None;
    }
    let mut best: Option<&Counterfactual> = None;
    for c in result.estimate.counterfactuals.iter().filter(|c| c.churn_delta < 0.0) {
        if best.map_or(true, |b| c.churn_delta < b.churn_delta) {
            best = Some(c);
        }
    }
    best.map(|c| MemberAction {
        intervention: c.intervention,
        churn_delta: c.churn_delta,
        execution_checklist: intervention_checklist(c.intervention),
    })
}

fn retention_candidates(
    results: &[ChurnResult],
    horizon: f64,
    config: &PrioritizerConfig,
) -> Vec<Recommendation> {
    let mut candidates = Vec::new();
    for cluster in CLUSTERS {
        let members: Vec<&ChurnResult> = results
            .iter()
            .filter(|r| {
                r.is_active()
                    && r.classification.engagement_class == cluster
                    && r.classification.risk_tier != RiskTier::Low
            })
            .collect();
        if members.is_empty() {
            continue;
        }

        for intervention in Intervention::ALL {
            let (affected, impact) = members
                .iter()
                .filter_map(|r| {
                    r.counterfactual(intervention)
                        .filter(|c| c.churn_delta < 0.0)
                        .map(|c| -c.churn_delta * r.monthly_rate() * horizon)
                })
                .fold((0u32, 0.0), |(count, total), saved| (count + 1, total + saved));
            if affected == 0 {
                continue;
            }

            let confidence = match intervention {
                Intervention::PersonalCall => config.confidence_personal_call,
                Intervention::GoalReview => config.confidence_goal_review,
                Intervention::ScheduleChange => config.confidence_schedule_change,
            };
            let (urgency, priority) = match cluster {
                EngagementClass::Ghost => (config.urgency_ghost, Priority::Critical),
                EngagementClass::AtRisk => (config.urgency_at_risk, Priority::High),
                _ => (config.urgency_drifter, Priority::Moderate),
            };
            let action = match intervention {
                Intervention::PersonalCall => "Personal calls to",
                Intervention::GoalReview => "Goal reviews with",
                Intervention::ScheduleChange => "Schedule resets for",
            };

            candidates.push(candidate(
                RecommendationCategory::Retention {
                    cluster,
                    intervention,
                },
                format!("{action} {affected} {} members", cluster.as_str()),
                format!(
                    "Expected to protect ${impact:.0} of revenue over {horizon:.0} months"
                ),
                priority,
                impact,
                affected,
                confidence,
                urgency,
                intervention_checklist(intervention),
            ));
        }
    }
    candidates
}

fn funnel_candidate(
    bottleneck: &FunnelBottleneck,
    member_rate: f64,
    horizon: f64,
    config: &EngineConfig,
) -> Recommendation {
    let lift = bottleneck.benchmark - bottleneck.conversion_rate;
    // carry the extra volume through the remaining stages at benchmark rates
    let downstream: f64 = match bottleneck.stage {
        FunnelStage::Set => {
            funnel::benchmark(FunnelStage::Show, &config.funnel)
                * funnel::benchmark(FunnelStage::Close, &config.funnel)
        }
        FunnelStage::Show => funnel::benchmark(FunnelStage::Close, &config.funnel),
        FunnelStage::Close => 1.0,
    };
    let new_members = bottleneck.sample_size as f64 * lift * downstream;
    let impact = new_members * member_rate * horizon;

    let title = match bottleneck.stage {
        FunnelStage::Set => "Book more leads into appointments",
        FunnelStage::Show => "Get more booked appointments to show up",
        FunnelStage::Close => "Convert more visitors into members",
    };

    candidate(
        RecommendationCategory::Funnel {
            stage: bottleneck.stage,
        },
        title.to_string(),
        bottleneck.explanation.clone(),
        Priority::High,
        impact,
        bottleneck.sample_size,
        config.prioritizer.confidence_funnel,
        config.prioritizer.urgency_below_benchmark,
        funnel_checklist(bottleneck.stage),
    )
}

fn stability_candidate(
    component: &StabilityComponent,
    tier: StabilityTier,
    forecast: &Forecast,
    horizon: f64,
    config: &PrioritizerConfig,
) -> Recommendation {
    let shortfall = ((component.max - component.score) / component.max).clamp(0.0, 1.0);
    let impact = forecast.current_mrr * config.stability_mrr_share * shortfall * horizon;
    let (urgency, priority) = match tier {
        StabilityTier::InstabilityRisk => (config.urgency_instability, Priority::Critical),
        StabilityTier::EarlyDrift => (config.urgency_early_drift, Priority::High),
        _ => (1.0, Priority::Moderate),
    };
    let title = match component.kind {
        StabilityComponentKind::RsiTrend => "Reverse the retention stability slide",
        StabilityComponentKind::ChurnAverage => "Bring average churn down",
        StabilityComponentKind::NetGrowth => "Restore net membership growth",
        StabilityComponentKind::RevenueMomentum => "Rebuild revenue momentum",
    };

    candidate(
        RecommendationCategory::Stability {
            component: component.kind,
        },
        title.to_string(),
        format!(
            "{} (scored {:.1} of {:.0})",
            component.detail, component.score, component.max
        ),
        priority,
        impact,
        forecast.current_members,
        config.confidence_stability,
        urgency,
        stability_checklist(component.kind),
    )
}

#[allow(clippy::too_many_arguments)]
fn candidate(
    category: RecommendationCategory,
    title: String,
    rationale: String,
    priority: Priority,
    expected_revenue_impact: f64,
    members_affected: u32,
    confidence_weight: f64,
    urgency_factor: f64,
    execution_checklist: Vec<String>,
) -> Recommendation {
    let expected_revenue_impact = expected_revenue_impact.max(0.0);
    let confidence_weight = confidence_weight.clamp(0.0, 1.0);
    let urgency_factor = urgency_factor.max(0.0);
    Recommendation {
        category,
        title,
        rationale,
        priority,
        intervention_score: expected_revenue_impact * confidence_weight * urgency_factor,
        expected_revenue_impact,
        members_affected,
        confidence_weight,
        urgency_factor,
        execution_checklist,
    }
}

fn average_member_rate(results: &[ChurnResult], forecast: &Forecast) -> f64 {
    let (total, count) = results
        .iter()
        .filter(|r| r.is_active())
        .fold((0.0, 0usize), |(total, count), r| (total + r.monthly_rate(), count + 1));
    if count > 0 {
        total / count as f64
    } else if forecast.current_members > 0 {
        forecast.current_mrr / forecast.current_members as f64
    } else {
        0.0
    }
}

fn steps(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn intervention_checklist(intervention: Intervention) -> Vec<String> {
    match intervention {
        Intervention::PersonalCall => steps(&[
            "Pull the member's last visits and class history",
            "Call within 48 hours and ask what changed in their routine",
            "Offer a specific class or session to come back to",
            "Log the call in the contact log",
        ]),
        Intervention::GoalReview => steps(&[
            "Book a 15-minute goal review with a coach",
            "Revisit the goals set at sign-up and reset targets",
            "Agree on a 30-day plan with weekly check-ins",
            "Log the review in the contact log",
        ]),
        Intervention::ScheduleChange => steps(&[
            "Ask which days and times fit the member now",
            "Suggest concrete classes in those slots",
            "Send a reminder before the first rebooked visit",
            "Check attendance again after two weeks",
        ]),
    }
}

fn funnel_checklist(stage: FunnelStage) -> Vec<String> {
    match stage {
        FunnelStage::Set => steps(&[
            "Reply to new leads within the hour",
            "Offer two specific appointment times in the first reply",
            "Follow up unbooked leads on days 1, 3 and 7",
        ]),
        FunnelStage::Show => steps(&[
            "Send reminders 24 hours and 2 hours before each appointment",
            "Call no-shows the same day to rebook",
            "Spell out the first-visit agenda in the booking message",
        ]),
        FunnelStage::Close => steps(&[
            "Review the tour and trial script with staff",
            "Present membership options at the end of every visit",
            "Follow up with visitors who did not join within 24 hours",
        ]),
    }
}

fn stability_checklist(kind: StabilityComponentKind) -> Vec<String> {
    match kind {
        StabilityComponentKind::RsiTrend => steps(&[
            "Find the member segments behind the RSI decline",
            "Run a check-in campaign for members whose visits are dropping",
        ]),
        StabilityComponentKind::ChurnAverage => steps(&[
            "Audit cancellation reasons from the last three months",
            "Add a freeze option to the cancellation flow",
            "Work through the at-risk member list this week",
        ]),
        StabilityComponentKind::NetGrowth => steps(&[
            "Compare monthly joins against cancels to size the gap",
            "Start a referral push with core members",
        ]),
        StabilityComponentKind::RevenueMomentum => steps(&[
            "Review discounted and legacy plans",
            "Offer upgrades and add-ons to core members",
        ]),
    }
}
