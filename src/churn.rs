//! Churn probability estimation.
//!
//! A class baseline plus a handful of additive terms, clamped to the configured
//! floor and ceiling. Every term is reported as a causal factor, and each
//! candidate intervention is re-scored with its signal neutralized.

use crate::config::EngineConfig;
use crate::models::{
    CausalFactor, ChurnEstimate, Classification, Counterfactual, EngagementClass, FactorKind,
    Features, Intervention,
};
use crate::risk;

pub fn estimate_churn(
    features: &Features,
    classification: &Classification,
    config: &EngineConfig,
) -> ChurnEstimate {
    let terms = churn_terms(features, classification.engagement_class, config);
    let probability = clamp_probability(sum_impacts(&terms), config);

    let counterfactuals = Intervention::ALL
        .iter()
        .map(|&intervention| {
            let projected = counterfactual_probability(features, classification, intervention, config);
            Counterfactual {
                intervention,
                projected_probability: projected.min(probability),
                churn_delta: (projected - probability).min(0.0),
            }
        })
        .collect();

    let mut causal_factors = terms;
    // stable sort keeps evaluation order among equal magnitudes
    causal_factors.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));

    ChurnEstimate {
        probability,
        causal_factors,
        counterfactuals,
    }
}

/// Probability for an already-classified member, without the breakdown.
pub fn churn_probability(
    features: &Features,
    class: EngagementClass,
    config: &EngineConfig,
) -> f64 {
    clamp_probability(sum_impacts(&churn_terms(features, class, config)), config)
}

fn counterfactual_probability(
    features: &Features,
    classification: &Classification,
    intervention: Intervention,
    config: &EngineConfig,
) -> f64 {
    match intervention {
        Intervention::PersonalCall => {
            let mut called = features.clone();
            called.days_since_contact = Some(0);
            called.never_contacted = false;
            let class = risk::classify(&called, &config.classifier).engagement_class;
            churn_probability(&called, class, config)
        }
        Intervention::GoalReview => {
            let terms = churn_terms(features, classification.engagement_class, config);
            let kept: Vec<CausalFactor> = terms
                .into_iter()
                .filter(|t| {
                    !matches!(
                        t.kind,
                        FactorKind::AttendanceOverdue | FactorKind::HighValueNeglect
                    )
                })
                .collect();
            clamp_probability(sum_impacts(&kept), config)
        }
        Intervention::ScheduleChange => {
            let mut rescheduled = features.clone();
            let regular = (config.classifier.drifter_after_days - 1).max(0);
            rescheduled.days_since_attendance = Some(
                features
                    .days_since_attendance
                    .map_or(regular, |days| days.min(regular)),
            );
            let class = risk::classify(&rescheduled, &config.classifier).engagement_class;
            churn_probability(&rescheduled, class, config)
        }
    }
}

/// Additive terms in evaluation order.
fn churn_terms(
    features: &Features,
    class: EngagementClass,
    config: &EngineConfig,
) -> Vec<CausalFactor> {
    let churn = &config.churn;
    let thresholds = &config.classifier;
    let gap = features.days_since_attendance;
    let mut terms = Vec::with_capacity(5);

    let base = match class {
        EngagementClass::Ghost => churn.base_ghost,
        EngagementClass::AtRisk => churn.base_at_risk,
        EngagementClass::Drifter => churn.base_drifter,
        EngagementClass::Core => churn.base_core,
    };
    terms.push(CausalFactor {
        kind: FactorKind::Baseline,
        impact: base,
        evidence: format!("{} baseline", class.as_str()),
    });

    let threshold = match class {
        EngagementClass::Ghost => Some(thresholds.ghost_after_days),
        EngagementClass::AtRisk => Some(thresholds.at_risk_after_days),
        EngagementClass::Drifter => Some(thresholds.drifter_after_days),
        EngagementClass::Core => None,
    };
    if let Some(threshold) = threshold {
        let overdue = match gap {
            Some(days) if days > threshold => {
                let over = days - threshold;
                Some((
                    (over as f64 * churn.per_overdue_day).min(churn.overdue_cap),
                    format!("{over} days past the {threshold}-day mark"),
                ))
            }
            None => Some((churn.overdue_cap, "Never attended".to_string())),
            Some(_) => None,
        };
        if let Some((impact, evidence)) = overdue {
            if impact > 0.0 {
                terms.push(CausalFactor {
                    kind: FactorKind::AttendanceOverdue,
                    impact,
                    evidence,
                });
            }
        }
    }

    if let Some(days) = features.days_since_contact {
        if days <= churn.recent_contact_days {
            terms.push(CausalFactor {
                kind: FactorKind::RecentContact,
                impact: -churn.recent_contact_credit,
                evidence: format!("Contacted {days} days ago"),
            });
        }
    }

    if features.never_contacted && churn.never_contacted_penalty > 0.0 {
        terms.push(CausalFactor {
            kind: FactorKind::NeverContacted,
            impact: churn.never_contacted_penalty,
            evidence: "No contact ever logged".to_string(),
        });
    }

    let neglected = gap.map_or(true, |days| days > churn.high_value_neglect_days);
    if features.is_high_value && neglected && churn.high_value_penalty > 0.0 {
        terms.push(CausalFactor {
            kind: FactorKind::HighValueNeglect,
            impact: churn.high_value_penalty,
            evidence: format!(
                "High-value member (${:.0}/mo) unattended over {} days",
                features.monthly_rate, churn.high_value_neglect_days
            ),
        });
    }

    terms
}

fn sum_impacts(terms: &[CausalFactor]) -> f64 {
    terms.iter().map(|t| t.impact).sum()
}

fn clamp_probability(raw: f64, config: &EngineConfig) -> f64 {
    raw.clamp(config.churn.floor, config.churn.ceiling)
}
