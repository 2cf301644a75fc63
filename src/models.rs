use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberStatus {
    Active,
    Cancelled,
    Frozen,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Cancelled => "cancelled",
            MemberStatus::Frozen => "frozen",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub join_date: NaiveDate,
    #[serde(default)]
    pub cancel_date: Option<NaiveDate>,
    pub monthly_rate: f64,
    pub status: MemberStatus,
    #[serde(default)]
    pub last_attended_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_contacted_at: Option<NaiveDate>,
}

impl Member {
    /// End of the billing relationship as seen from `now`.
    fn tenure_end(&self, now: NaiveDate) -> NaiveDate {
        match self.cancel_date {
            Some(cancelled) if cancelled < now => cancelled,
            _ => now,
        }
    }

    pub fn tenure_days(&self, now: NaiveDate) -> i64 {
        (self.tenure_end(now) - self.join_date).num_days().max(0)
    }

    pub fn tenure_months(&self, now: NaiveDate) -> i64 {
        self.tenure_days(now) / 30
    }

    /// Monthly billing anniversaries elapsed, counting the join month.
    pub fn billing_periods(&self, now: NaiveDate) -> u32 {
        let end = self.tenure_end(now);
        if end < self.join_date {
            return 0;
        }
        let mut months = (end.year() - self.join_date.year()) * 12 + end.month() as i32
            - self.join_date.month() as i32;
        if end.day() < self.join_date.day() {
            months -= 1;
        }
        months.max(0) as u32 + 1
    }

    pub fn total_revenue(&self, now: NaiveDate) -> f64 {
        self.monthly_rate * self.billing_periods(now) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub member_id: Uuid,
    pub contacted_at: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

/// One gym-month of aggregates produced upstream. `churn_rate` and `rsi` are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMetrics {
    /// First day of the month.
    pub month: NaiveDate,
    pub mrr: f64,
    pub active_members: u32,
    pub new_members: u32,
    pub cancels: u32,
    pub churn_rate: f64,
    pub rsi: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelCounts {
    pub leads: u32,
    pub booked: u32,
    pub shows: u32,
    pub new_members: u32,
}

/// Normalized per-member signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub member_id: Uuid,
    pub status: MemberStatus,
    pub tenure_days: i64,
    pub tenure_months: i64,
    pub days_since_attendance: Option<i64>,
    pub days_since_contact: Option<i64>,
    pub never_contacted: bool,
    pub monthly_rate: f64,
    pub total_revenue: f64,
    pub is_high_value: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngagementClass {
    Core,
    Drifter,
    AtRisk,
    Ghost,
}

impl EngagementClass {
    pub const ALL: [EngagementClass; 4] = [
        EngagementClass::Ghost,
        EngagementClass::AtRisk,
        EngagementClass::Drifter,
        EngagementClass::Core,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementClass::Core => "core",
            EngagementClass::Drifter => "drifter",
            EngagementClass::AtRisk => "at-risk",
            EngagementClass::Ghost => "ghost",
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, EngagementClass::AtRisk | EngagementClass::Ghost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Classifier output before a probability is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub engagement_class: EngagementClass,
    pub risk_tier: RiskTier,
    pub risk_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskClassification {
    pub member_id: Uuid,
    pub engagement_class: EngagementClass,
    pub risk_tier: RiskTier,
    pub risk_reasons: Vec<String>,
    pub churn_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactorKind {
    Baseline,
    AttendanceOverdue,
    RecentContact,
    NeverContacted,
    HighValueNeglect,
}

impl FactorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorKind::Baseline => "baseline",
            FactorKind::AttendanceOverdue => "attendance-overdue",
            FactorKind::RecentContact => "recent-contact",
            FactorKind::NeverContacted => "never-contacted",
            FactorKind::HighValueNeglect => "high-value-neglect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalFactor {
    pub kind: FactorKind,
    /// Signed probability delta.
    pub impact: f64,
    pub evidence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intervention {
    PersonalCall,
    GoalReview,
    ScheduleChange,
}

impl Intervention {
    pub const ALL: [Intervention; 3] = [
        Intervention::PersonalCall,
        Intervention::GoalReview,
        Intervention::ScheduleChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intervention::PersonalCall => "personal-call",
            Intervention::GoalReview => "goal-review",
            Intervention::ScheduleChange => "schedule-change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterfactual {
    pub intervention: Intervention,
    pub projected_probability: f64,
    /// Always <= 0.
    pub churn_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnEstimate {
    pub probability: f64,
    pub causal_factors: Vec<CausalFactor>,
    pub counterfactuals: Vec<Counterfactual>,
}

/// Everything the per-member stages produce for one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnResult {
    pub member_name: String,
    pub features: Features,
    pub classification: RiskClassification,
    pub estimate: ChurnEstimate,
}

impl ChurnResult {
    pub fn is_active(&self) -> bool {
        self.features.status == MemberStatus::Active
    }

    pub fn monthly_rate(&self) -> f64 {
        self.features.monthly_rate
    }

    pub fn counterfactual(&self, intervention: Intervention) -> Option<&Counterfactual> {
        self.estimate
            .counterfactuals
            .iter()
            .find(|c| c.intervention == intervention)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outlook {
    Growing,
    Flat,
    Declining,
    InsufficientData,
}

impl Outlook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outlook::Growing => "growing",
            Outlook::Flat => "flat",
            Outlook::Declining => "declining",
            Outlook::InsufficientData => "insufficient-data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChurnTrajectory {
    Improving,
    Steady,
    Worsening,
    Unknown,
}

impl ChurnTrajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChurnTrajectory::Improving => "improving",
            ChurnTrajectory::Steady => "steady",
            ChurnTrajectory::Worsening => "worsening",
            ChurnTrajectory::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub month_offset: u32,
    pub mrr: f64,
    pub members: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub mrr: f64,
    pub members: u32,
    pub revenue_at_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub outlook: Outlook,
    pub current_mrr: f64,
    pub current_members: u32,
    pub next_period_mrr: f64,
    pub mrr_delta: f64,
    pub projected_join_revenue: f64,
    pub projected_cancel_revenue: f64,
    pub churn_trajectory: ChurnTrajectory,
    pub projected_churn_rate: f64,
    pub trajectory: Vec<ProjectionPoint>,
    pub projection: Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunnelStage {
    /// lead -> booked
    Set,
    /// booked -> showed
    Show,
    /// showed -> joined
    Close,
}

impl FunnelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::Set => "set",
            FunnelStage::Show => "show",
            FunnelStage::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConversion {
    pub stage: FunnelStage,
    pub denominator: u32,
    pub rate: Option<f64>,
    pub drop_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelBottleneck {
    pub stage: FunnelStage,
    pub conversion_rate: f64,
    pub drop_percent: f64,
    pub sample_size: u32,
    pub benchmark: f64,
    pub below_benchmark: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StabilityTier {
    Stable,
    PlateauRisk,
    EarlyDrift,
    InstabilityRisk,
}

impl StabilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityTier::Stable => "stable",
            StabilityTier::PlateauRisk => "plateau-risk",
            StabilityTier::EarlyDrift => "early-drift",
            StabilityTier::InstabilityRisk => "instability-risk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StabilityComponentKind {
    RsiTrend,
    ChurnAverage,
    NetGrowth,
    RevenueMomentum,
}

impl StabilityComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityComponentKind::RsiTrend => "rsi-trend",
            StabilityComponentKind::ChurnAverage => "churn-average",
            StabilityComponentKind::NetGrowth => "net-growth",
            StabilityComponentKind::RevenueMomentum => "revenue-momentum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityComponent {
    pub kind: StabilityComponentKind,
    pub score: f64,
    pub max: f64,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityScore {
    pub score: f64,
    pub tier: StabilityTier,
    pub rsi_trend: StabilityComponent,
    pub churn_average: StabilityComponent,
    pub net_growth: StabilityComponent,
    pub revenue_momentum: StabilityComponent,
}

impl StabilityScore {
    pub fn components(&self) -> [&StabilityComponent; 4] {
        [
            &self.rsi_trend,
            &self.churn_average,
            &self.net_growth,
            &self.revenue_momentum,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Critical,
    High,
    Moderate,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Moderate => "moderate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecommendationCategory {
    Retention {
        cluster: EngagementClass,
        intervention: Intervention,
    },
    Funnel {
        stage: FunnelStage,
    },
    Stability {
        component: StabilityComponentKind,
    },
}

impl RecommendationCategory {
    /// Stable key used for display and as the final ranking tie-break.
    pub fn key(&self) -> String {
        match self {
            RecommendationCategory::Retention {
                cluster,
                intervention,
            } => format!("retention:{}:{}", cluster.as_str(), intervention.as_str()),
            RecommendationCategory::Funnel { stage } => format!("funnel:{}", stage.as_str()),
            RecommendationCategory::Stability { component } => {
                format!("stability:{}", component.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub title: String,
    pub rationale: String,
    pub priority: Priority,
    pub intervention_score: f64,
    pub expected_revenue_impact: f64,
    pub members_affected: u32,
    pub confidence_weight: f64,
    pub urgency_factor: f64,
    pub execution_checklist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prioritized {
    pub recommendations: Vec<Recommendation>,
    pub focus: Option<Recommendation>,
}
