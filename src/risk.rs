use crate::config::ClassifierConfig;
use crate::models::{Classification, EngagementClass, Features, MemberStatus, RiskTier};

/// First matching class wins; every matching reason is kept, in evaluation order.
pub fn classify(features: &Features, config: &ClassifierConfig) -> Classification {
    let gap = features.days_since_attendance;
    let past_onboarding = features.tenure_days > config.onboarding_grace_days;
    let contact_lapsed = features.never_contacted
        || features
            .days_since_contact
            .is_some_and(|days| days >= config.contact_gap_days);

    let mut reasons = Vec::new();
    match gap {
        None if past_onboarding => reasons.push("No attendance on record".to_string()),
        None => reasons.push("New member with no attendance yet".to_string()),
        Some(days) if days > config.drifter_after_days => {
            reasons.push(format!("No attendance in {days} days"))
        }
        Some(_) => {}
    }
    if features.never_contacted {
        reasons.push("Never contacted".to_string());
    } else if let Some(days) = features.days_since_contact {
        if days >= config.contact_gap_days {
            reasons.push(format!("No contact in {days} days"));
        }
    }

    let engagement_class = if past_onboarding
        && gap.map_or(true, |days| days > config.ghost_after_days)
    {
        EngagementClass::Ghost
    } else if gap.is_some_and(|days| days > config.at_risk_after_days)
        || (contact_lapsed
            && gap.is_some_and(|days| {
                days >= config.drifter_after_days && days <= config.at_risk_after_days
            }))
    {
        EngagementClass::AtRisk
    } else if gap.is_some_and(|days| days > config.drifter_after_days) {
        EngagementClass::Drifter
    } else {
        EngagementClass::Core
    };

    let risk_tier = if features.status != MemberStatus::Active {
        reasons.push(format!(
            "Membership {}; risk tier held at low",
            features.status.as_str()
        ));
        RiskTier::Low
    } else {
        tier_for(engagement_class)
    };

    Classification {
        engagement_class,
        risk_tier,
        risk_reasons: reasons,
    }
}

pub fn tier_for(class: EngagementClass) -> RiskTier {
    match class {
        EngagementClass::Ghost | EngagementClass::AtRisk => RiskTier::High,
        EngagementClass::Drifter => RiskTier::Medium,
        EngagementClass::Core => RiskTier::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn features(tenure: i64, attended: Option<i64>, contacted: Option<i64>) -> Features {
        Features {
            member_id: Uuid::new_v4(),
            status: MemberStatus::Active,
            tenure_days: tenure,
            tenure_months: tenure / 30,
            days_since_attendance: attended,
            days_since_contact: contacted,
            never_contacted: contacted.is_none(),
            monthly_rate: 60.0,
            total_revenue: 180.0,
            is_high_value: false,
        }
    }

    fn run(f: &Features) -> Classification {
        classify(f, &ClassifierConfig::default())
    }

    #[test]
    fn long_absence_is_ghost() {
        let result = run(&features(90, Some(30), Some(40)));
        assert_eq!(result.engagement_class, EngagementClass::Ghost);
        assert_eq!(result.risk_tier, RiskTier::High);
        assert_eq!(
            result.risk_reasons,
            vec!["No attendance in 30 days", "No contact in 40 days"]
        );
    }

    #[test]
    fn never_attended_after_onboarding_is_ghost() {
        let result = run(&features(30, None, Some(2)));
        assert_eq!(result.engagement_class, EngagementClass::Ghost);
        assert_eq!(result.risk_reasons, vec!["No attendance on record"]);
    }

    #[test]
    fn new_members_are_not_ghosts() {
        let result = run(&features(10, None, Some(2)));
        assert_eq!(result.engagement_class, EngagementClass::Core);
        assert_eq!(result.risk_tier, RiskTier::Low);
    }

    #[test]
    fn attendance_gap_bands() {
        assert_eq!(
            run(&features(90, Some(21), Some(1))).engagement_class,
            EngagementClass::AtRisk
        );
        assert_eq!(
            run(&features(90, Some(11), Some(1))).engagement_class,
            EngagementClass::AtRisk
        );
        assert_eq!(
            run(&features(90, Some(10), Some(1))).engagement_class,
            EngagementClass::Drifter
        );
        assert_eq!(
            run(&features(90, Some(8), Some(1))).engagement_class,
            EngagementClass::Drifter
        );
        assert_eq!(
            run(&features(90, Some(7), Some(1))).engagement_class,
            EngagementClass::Core
        );
    }

    #[test]
    fn lapsed_contact_with_short_gap_escalates() {
        let result = run(&features(90, Some(8), Some(16)));
        assert_eq!(result.engagement_class, EngagementClass::AtRisk);
        assert_eq!(result.risk_tier, RiskTier::High);
        assert_eq!(
            result.risk_reasons,
            vec!["No attendance in 8 days", "No contact in 16 days"]
        );

        let never = run(&features(90, Some(7), None));
        assert_eq!(never.engagement_class, EngagementClass::AtRisk);
    }

    #[test]
    fn drifter_is_medium_tier() {
        let result = run(&features(90, Some(9), Some(3)));
        assert_eq!(result.engagement_class, EngagementClass::Drifter);
        assert_eq!(result.risk_tier, RiskTier::Medium);
    }

    #[test]
    fn inactive_members_stay_low_tier() {
        let mut frozen = features(90, Some(45), Some(50));
        frozen.status = MemberStatus::Frozen;
        let result = run(&frozen);
        assert_eq!(result.engagement_class, EngagementClass::Ghost);
        assert_eq!(result.risk_tier, RiskTier::Low);
        assert_eq!(
            result.risk_reasons.last().map(String::as_str),
            Some("Membership frozen; risk tier held at low")
        );
    }
}
