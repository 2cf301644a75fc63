use std::fmt::Write;

use serde::Serialize;

use crate::engine::GymAnalysis;
use crate::models::{ChurnResult, EngagementClass};
use crate::recommend;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    pub engagement_class: EngagementClass,
    pub count: usize,
    pub mrr: f64,
    pub avg_probability: f64,
}

/// Active members grouped by engagement class, worst class first. Classes with
/// no members are omitted.
pub fn summarize_by_class(results: &[ChurnResult]) -> Vec<ClassSummary> {
    EngagementClass::ALL
        .iter()
        .filter_map(|&class| {
            let members: Vec<&ChurnResult> = results
                .iter()
                .filter(|r| r.is_active() && r.classification.engagement_class == class)
                .collect();
            if members.is_empty() {
                return None;
            }
            let count = members.len();
            Some(ClassSummary {
                engagement_class: class,
                count,
                mrr: members.iter().map(|r| r.monthly_rate()).sum(),
                avg_probability: members
                    .iter()
                    .map(|r| r.classification.churn_probability)
                    .sum::<f64>()
                    / count as f64,
            })
        })
        .collect()
}

/// Active members ordered by churn probability, highest first.
pub fn riskiest_members(results: &[ChurnResult]) -> Vec<&ChurnResult> {
    let mut members: Vec<&ChurnResult> = results.iter().filter(|r| r.is_active()).collect();
    members.sort_by(|a, b| {
        b.classification
            .churn_probability
            .total_cmp(&a.classification.churn_probability)
            .then_with(|| a.member_name.cmp(&b.member_name))
    });
    members
}

pub fn build_report(analysis: &GymAnalysis, member_limit: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Retention Report: {}", analysis.gym);
    let _ = writeln!(output, "Generated as of {}", analysis.as_of);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Focus");
    match &analysis.prioritized.focus {
        Some(focus) => {
            let _ = writeln!(
                output,
                "**{}** ({} priority): {}",
                focus.title,
                focus.priority.as_str(),
                focus.rationale
            );
            for step in &focus.execution_checklist {
                let _ = writeln!(output, "- [ ] {step}");
            }
        }
        None => {
            let _ = writeln!(output, "{}", recommend::MAINTAIN_MOMENTUM);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stability");
    match &analysis.stability {
        Some(stability) => {
            let _ = writeln!(
                output,
                "Score {:.0}/100 ({})",
                stability.score,
                stability.tier.as_str()
            );
            for component in stability.components() {
                let _ = writeln!(
                    output,
                    "- {}: {:.1}/{:.0} ({})",
                    component.kind.as_str(),
                    component.score,
                    component.max,
                    component.detail
                );
            }
        }
        None => {
            let _ = writeln!(output, "No monthly history to score.");
        }
    }

    let forecast = &analysis.forecast;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Forecast");
    let _ = writeln!(output, "Outlook: {}", forecast.outlook.as_str());
    let _ = writeln!(
        output,
        "- Current MRR ${:.0}, next period ${:.0} ({:+.0})",
        forecast.current_mrr, forecast.next_period_mrr, forecast.mrr_delta
    );
    let _ = writeln!(
        output,
        "- Churn {} at {:.1}% per month",
        forecast.churn_trajectory.as_str(),
        forecast.projected_churn_rate
    );
    let _ = writeln!(
        output,
        "- In {} months if nothing changes: ${:.0} MRR, {} members, ${:.0} at risk",
        forecast.trajectory.len(),
        forecast.projection.mrr,
        forecast.projection.members,
        forecast.projection.revenue_at_risk
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sales Funnel");
    match &analysis.bottleneck {
        Some(bottleneck) => {
            let _ = writeln!(
                output,
                "Bottleneck at the {} stage: {}",
                bottleneck.stage.as_str(),
                bottleneck.explanation
            );
        }
        None => {
            let _ = writeln!(output, "Not enough funnel data to find a bottleneck.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Engagement Mix");
    let summaries = summarize_by_class(&analysis.members);
    if summaries.is_empty() {
        let _ = writeln!(output, "No active members.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {}: {} members, ${:.0} MRR (avg churn {:.0}%)",
                summary.engagement_class.as_str(),
                summary.count,
                summary.mrr,
                summary.avg_probability * 100.0
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    if analysis.prioritized.recommendations.is_empty() {
        let _ = writeln!(output, "No interventions needed.");
    } else {
        for (rank, rec) in analysis.prioritized.recommendations.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. [{}] {} (${:.0} expected, {} members)",
                rank + 1,
                rec.priority.as_str(),
                rec.title,
                rec.expected_revenue_impact,
                rec.members_affected
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Members");
    let flagged: Vec<&ChurnResult> = riskiest_members(&analysis.members)
        .into_iter()
        .filter(|r| r.classification.engagement_class != EngagementClass::Core)
        .take(member_limit)
        .collect();
    if flagged.is_empty() {
        let _ = writeln!(output, "No members flagged.");
    } else {
        for member in flagged {
            let action = recommend::member_action(member)
                .map(|a| a.intervention.as_str())
                .unwrap_or("monitor");
            let _ = writeln!(
                output,
                "- {} ({}, {:.0}% churn): {}; next step: {}",
                member.member_name,
                member.classification.engagement_class.as_str(),
                member.classification.churn_probability * 100.0,
                member.classification.risk_reasons.join(", "),
                action
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RetentionEngine;
    use crate::models::{Member, MemberStatus};
    use crate::snapshot::GymSnapshot;
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn member(name: &str, attended: i64, contacted: i64, status: MemberStatus) -> Member {
        Member {
            id: Uuid::new_v4(),
            name: name.to_string(),
            join_date: now() - Duration::days(180),
            cancel_date: None,
            monthly_rate: 75.0,
            status,
            last_attended_date: Some(now() - Duration::days(attended)),
            last_contacted_at: Some(now() - Duration::days(contacted)),
        }
    }

    fn analysis() -> GymAnalysis {
        let snapshot = GymSnapshot {
            gym: "Harbor Fitness".to_string(),
            members: vec![
                member("Avery Lee", 2, 3, MemberStatus::Active),
                member("Jules Moreno", 35, 40, MemberStatus::Active),
                member("Kiara Patel", 9, 2, MemberStatus::Active),
                member("Noor Haddad", 60, 60, MemberStatus::Frozen),
            ],
            ..GymSnapshot::default()
        };
        RetentionEngine::default().run(&snapshot, now()).unwrap()
    }

    #[test]
    fn summary_groups_active_members() {
        let analysis = analysis();
        let summaries = summarize_by_class(&analysis.members);
        let classes: Vec<EngagementClass> = summaries.iter().map(|s| s.engagement_class).collect();
        assert_eq!(
            classes,
            vec![EngagementClass::Ghost, EngagementClass::Drifter, EngagementClass::Core]
        );
        assert!(summaries.iter().all(|s| s.count == 1 && s.mrr == 75.0));
    }

    #[test]
    fn report_lists_focus_and_flagged_members() {
        let report = build_report(&analysis(), 10);
        assert!(report.starts_with("# Retention Report: Harbor Fitness"));
        assert!(report.contains("## Focus\n**"));
        assert!(report.contains("- Jules Moreno (ghost, 89% churn): No attendance in 35 days"));
        assert!(report.contains("Kiara Patel (drifter"));
        assert!(!report.contains("Noor Haddad"));
        assert!(report.contains("No monthly history to score."));
        assert!(report.contains("Outlook: insufficient-data"));
    }

    #[test]
    fn empty_gym_gets_neutral_focus() {
        let snapshot = GymSnapshot {
            gym: "Quiet Gym".to_string(),
            ..GymSnapshot::default()
        };
        let analysis = RetentionEngine::default().run(&snapshot, now()).unwrap();
        let report = build_report(&analysis, 10);
        assert!(report.contains(recommend::MAINTAIN_MOMENTUM));
        assert!(report.contains("No members flagged."));
    }
}
