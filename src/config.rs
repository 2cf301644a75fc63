//! Engine configuration.
//!
//! Every threshold and weight the engine uses lives here. The defaults are
//! product heuristics, not derived values; operators can override any of them
//! from a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub churn: ChurnConfig,
    pub forecast: ForecastConfig,
    pub funnel: FunnelConfig,
    pub stability: StabilityConfig,
    pub prioritizer: PrioritizerConfig,
}

/// Attendance and contact gaps (in days) that drive engagement classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub ghost_after_days: i64,
    pub at_risk_after_days: i64,
    pub drifter_after_days: i64,
    /// Members this new are never classed as ghosts.
    pub onboarding_grace_days: i64,
    pub contact_gap_days: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ghost_after_days: 21,
            at_risk_after_days: 10,
            drifter_after_days: 7,
            onboarding_grace_days: 14,
            contact_gap_days: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    pub base_ghost: f64,
    pub base_at_risk: f64,
    pub base_drifter: f64,
    pub base_core: f64,
    pub per_overdue_day: f64,
    pub overdue_cap: f64,
    pub recent_contact_days: i64,
    pub recent_contact_credit: f64,
    pub never_contacted_penalty: f64,
    pub high_value_monthly_rate: f64,
    pub high_value_neglect_days: i64,
    pub high_value_penalty: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            base_ghost: 0.75,
            base_at_risk: 0.45,
            base_drifter: 0.25,
            base_core: 0.05,
            per_overdue_day: 0.01,
            overdue_cap: 0.15,
            recent_contact_days: 7,
            recent_contact_credit: 0.10,
            never_contacted_penalty: 0.03,
            high_value_monthly_rate: 100.0,
            high_value_neglect_days: 14,
            high_value_penalty: 0.05,
            floor: 0.02,
            ceiling: 0.97,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon_months: u32,
    pub trailing_months: usize,
    /// Members above this probability count as projected cancels.
    pub cancel_probability: f64,
    /// Churn-rate change (percentage points) that counts as a trend.
    pub trend_tolerance_pct: f64,
    /// MRR delta, as a share of current MRR, below which the outlook is flat.
    pub flat_band: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_months: 3,
            trailing_months: 3,
            cancel_probability: 0.5,
            trend_tolerance_pct: 0.5,
            flat_band: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    pub min_sample: u32,
    pub set_benchmark: f64,
    pub show_benchmark: f64,
    pub close_benchmark: f64,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            min_sample: 3,
            set_benchmark: 0.5,
            show_benchmark: 0.7,
            close_benchmark: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub window_months: usize,
    pub component_max: f64,
    pub rsi_level_weight: f64,
    pub rsi_baseline: f64,
    pub rsi_slope_weight: f64,
    /// Average monthly churn (percent) that scores zero.
    pub churn_ceiling_pct: f64,
    /// Growth and momentum score for a month with no change.
    pub growth_neutral: f64,
    pub growth_per_pct: f64,
    pub stable_at: f64,
    pub plateau_at: f64,
    pub drift_at: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_months: 3,
            component_max: 25.0,
            rsi_level_weight: 0.2,
            rsi_baseline: 5.0,
            rsi_slope_weight: 1.0,
            churn_ceiling_pct: 10.0,
            growth_neutral: 20.0,
            growth_per_pct: 2.0,
            stable_at: 80.0,
            plateau_at: 60.0,
            drift_at: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritizerConfig {
    pub confidence_personal_call: f64,
    pub confidence_goal_review: f64,
    pub confidence_schedule_change: f64,
    pub confidence_funnel: f64,
    pub confidence_stability: f64,
    pub urgency_ghost: f64,
    pub urgency_at_risk: f64,
    pub urgency_drifter: f64,
    pub urgency_below_benchmark: f64,
    pub urgency_instability: f64,
    pub urgency_early_drift: f64,
    /// Share of MRR a weak stability component is assumed to put in play per month.
    pub stability_mrr_share: f64,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        Self {
            confidence_personal_call: 0.7,
            confidence_goal_review: 0.5,
            confidence_schedule_change: 0.4,
            confidence_funnel: 0.5,
            confidence_stability: 0.4,
            urgency_ghost: 1.5,
            urgency_at_risk: 1.25,
            urgency_drifter: 1.0,
            urgency_below_benchmark: 1.25,
            urgency_instability: 1.5,
            urgency_early_drift: 1.25,
            stability_mrr_share: 0.05,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if !(0 < c.drifter_after_days
            && c.drifter_after_days < c.at_risk_after_days
            && c.at_risk_after_days < c.ghost_after_days)
        {
            return Err(EngineError::Config(format!(
                "attendance thresholds must increase: drifter {} < at-risk {} < ghost {}",
                c.drifter_after_days, c.at_risk_after_days, c.ghost_after_days
            )));
        }

        let p = &self.churn;
        if !(0.0 <= p.floor && p.floor < p.ceiling && p.ceiling <= 1.0) {
            return Err(EngineError::Config(format!(
                "churn probability bounds must satisfy 0 <= floor < ceiling <= 1 (got {} and {})",
                p.floor, p.ceiling
            )));
        }
        if !(p.base_core <= p.base_drifter
            && p.base_drifter <= p.base_at_risk
            && p.base_at_risk <= p.base_ghost)
        {
            return Err(EngineError::Config(
                "base churn probabilities must not decrease from core to ghost".to_string(),
            ));
        }
        if p.per_overdue_day < 0.0 || p.overdue_cap < 0.0 {
            return Err(EngineError::Config(
                "overdue terms must be non-negative".to_string(),
            ));
        }
        // a class's overdue term can reach the cap, the next class up starts
        // one overdue day in
        if p.base_drifter + p.overdue_cap > p.base_at_risk + p.per_overdue_day
            || p.base_at_risk + p.overdue_cap > p.base_ghost + p.per_overdue_day
        {
            return Err(EngineError::Config(format!(
                "overdue cap {} lets a shorter attendance gap outscore the next engagement class",
                p.overdue_cap
            )));
        }
        if p.recent_contact_credit < 0.0
            || p.never_contacted_penalty < 0.0
            || p.high_value_penalty < 0.0
        {
            return Err(EngineError::Config(
                "contact and neglect adjustments must be non-negative".to_string(),
            ));
        }

        let f = &self.funnel;
        if f.min_sample == 0 {
            return Err(EngineError::Config(
                "funnel min_sample must be at least 1".to_string(),
            ));
        }
        for (stage, benchmark) in [
            ("set", f.set_benchmark),
            ("show", f.show_benchmark),
            ("close", f.close_benchmark),
        ] {
            if !(0.0..=1.0).contains(&benchmark) {
                return Err(EngineError::Config(format!(
                    "{stage} benchmark must be a rate in [0, 1] (got {benchmark})"
                )));
            }
        }
        if self.forecast.horizon_months == 0 || self.forecast.trailing_months == 0 {
            return Err(EngineError::Config(
                "forecast horizon and trailing window must be at least one month".to_string(),
            ));
        }

        let s = &self.stability;
        if s.window_months == 0 || s.component_max <= 0.0 || s.churn_ceiling_pct <= 0.0 {
            return Err(EngineError::Config(
                "stability window, component max and churn ceiling must be positive".to_string(),
            ));
        }
        if !(s.drift_at < s.plateau_at && s.plateau_at < s.stable_at) {
            return Err(EngineError::Config(
                "stability tier thresholds must increase".to_string(),
            ));
        }

        let r = &self.prioritizer;
        let weights = [
            ("confidence_personal_call", r.confidence_personal_call),
            ("confidence_goal_review", r.confidence_goal_review),
            ("confidence_schedule_change", r.confidence_schedule_change),
            ("confidence_funnel", r.confidence_funnel),
            ("confidence_stability", r.confidence_stability),
            ("urgency_ghost", r.urgency_ghost),
            ("urgency_at_risk", r.urgency_at_risk),
            ("urgency_drifter", r.urgency_drifter),
            ("urgency_below_benchmark", r.urgency_below_benchmark),
            ("urgency_instability", r.urgency_instability),
            ("urgency_early_drift", r.urgency_early_drift),
            ("stability_mrr_share", r.stability_mrr_share),
        ];
        if let Some((name, value)) = weights.into_iter().find(|(_, v)| v.is_nan() || *v < 0.0) {
            return Err(EngineError::Config(format!(
                "prioritizer {name} must be non-negative (got {value})"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [classifier]
            ghost_after_days = 28

            [funnel]
            min_sample = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.ghost_after_days, 28);
        assert_eq!(config.classifier.at_risk_after_days, 10);
        assert_eq!(config.funnel.min_sample, 5);
        assert_eq!(config.churn, ChurnConfig::default());
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let err = EngineConfig::from_toml_str(
            r#"
            [classifier]
            drifter_after_days = 12
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rejects_inverted_probability_bounds() {
        let mut config = EngineConfig::default();
        config.churn.floor = 0.9;
        config.churn.ceiling = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overdue_cap_that_crosses_classes() {
        // an at-risk member at the cap would outscore a ghost just past the threshold
        let err = EngineConfig::from_toml_str(
            r#"
            [churn]
            overdue_cap = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let mut config = EngineConfig::default();
        config.churn.base_drifter = 0.40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_benchmarks_outside_unit_range() {
        let err = EngineConfig::from_toml_str(
            r#"
            [funnel]
            show_benchmark = 1.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(msg) if msg.contains("show")));

        let mut config = EngineConfig::default();
        config.funnel.close_benchmark = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_weights() {
        let mut config = EngineConfig::default();
        config.prioritizer.urgency_ghost = -1.0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::Config(msg)) if msg.contains("urgency_ghost")
        ));

        let mut config = EngineConfig::default();
        config.prioritizer.confidence_funnel = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[forecast]\nhorizon_months = 6").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.forecast.horizon_months, 6);
    }
}
