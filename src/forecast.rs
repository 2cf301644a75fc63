//! Revenue and membership forecasting.
//!
//! Projections assume current churn and growth persist unchanged over the
//! horizon. They describe "if nothing changes", not expected operator action.

use tracing::{debug, warn};

use crate::config::ForecastConfig;
use crate::models::{
    ChurnResult, ChurnTrajectory, Forecast, MonthlyMetrics, Outlook, Projection, ProjectionPoint,
};

/// Probability-weighted MRR of active at-risk and ghost members.
pub fn revenue_at_risk(results: &[ChurnResult]) -> f64 {
    results
        .iter()
        .filter(|r| r.is_active() && r.classification.engagement_class.is_flagged())
        .map(|r| r.monthly_rate() * r.classification.churn_probability)
        .sum()
}

pub fn forecast(
    history: &[MonthlyMetrics],
    results: &[ChurnResult],
    current_mrr: f64,
    config: &ForecastConfig,
) -> Forecast {
    let current_mrr = current_mrr.max(0.0);
    let at_risk = revenue_at_risk(results);
    let current_members = history
        .last()
        .map(|m| m.active_members)
        .unwrap_or_else(|| results.iter().filter(|r| r.is_active()).count() as u32);

    if history.len() < 2 {
        warn!(
            months = history.len(),
            "not enough monthly history to forecast, holding current values"
        );
        let trajectory = (1..=config.horizon_months)
            .map(|month_offset| ProjectionPoint {
                month_offset,
                mrr: current_mrr,
                members: current_members,
            })
            .collect();
        return Forecast {
            outlook: Outlook::InsufficientData,
            current_mrr,
            current_members,
            next_period_mrr: current_mrr,
            mrr_delta: 0.0,
            projected_join_revenue: 0.0,
            projected_cancel_revenue: 0.0,
            churn_trajectory: ChurnTrajectory::Unknown,
            projected_churn_rate: history.last().map_or(0.0, churn_pct),
            trajectory,
            projection: Projection {
                mrr: current_mrr,
                members: current_members,
                revenue_at_risk: at_risk,
            },
        };
    }

    let window = trailing(history, config.trailing_months);
    let projected_join_revenue = mean(window.iter().map(|m| m.new_members as f64 * revenue_per_member(m)));
    let projected_cancel_revenue: f64 = results
        .iter()
        .filter(|r| r.is_active() && r.classification.churn_probability > config.cancel_probability)
        .map(|r| r.monthly_rate())
        .sum();
    let mrr_delta = projected_join_revenue - projected_cancel_revenue;

    let projected_churn_rate = mean(window.iter().map(churn_pct));
    let average_joins = mean(window.iter().map(|m| m.new_members as f64));
    let trajectory = project(
        current_mrr,
        current_members,
        mrr_delta,
        average_joins,
        projected_churn_rate,
        config.horizon_months,
    );
    let last_point = trajectory.last().cloned().unwrap_or(ProjectionPoint {
        month_offset: 0,
        mrr: current_mrr,
        members: current_members,
    });

    let band = config.flat_band * current_mrr;
    let outlook = if mrr_delta > band {
        Outlook::Growing
    } else if mrr_delta < -band {
        Outlook::Declining
    } else {
        Outlook::Flat
    };

    debug!(
        join = projected_join_revenue,
        cancel = projected_cancel_revenue,
        delta = mrr_delta,
        outlook = outlook.as_str(),
        "forecast computed"
    );

    Forecast {
        outlook,
        current_mrr,
        current_members,
        next_period_mrr: (current_mrr + mrr_delta).max(0.0),
        mrr_delta,
        projected_join_revenue,
        projected_cancel_revenue,
        churn_trajectory: churn_trajectory(history, config),
        projected_churn_rate,
        trajectory,
        projection: Projection {
            mrr: last_point.mrr,
            members: last_point.members,
            revenue_at_risk: at_risk,
        },
    }
}

/// Latest churn rate against the mean of the months before it.
pub fn churn_trajectory(history: &[MonthlyMetrics], config: &ForecastConfig) -> ChurnTrajectory {
    let Some((last, earlier)) = history.split_last() else {
        return ChurnTrajectory::Unknown;
    };
    if earlier.is_empty() {
        return ChurnTrajectory::Unknown;
    }
    let prior = mean(trailing(earlier, config.trailing_months).iter().map(churn_pct));
    let change = churn_pct(last) - prior;
    if change > config.trend_tolerance_pct {
        ChurnTrajectory::Worsening
    } else if change < -config.trend_tolerance_pct {
        ChurnTrajectory::Improving
    } else {
        ChurnTrajectory::Steady
    }
}

fn project(
    mrr: f64,
    members: u32,
    mrr_delta: f64,
    average_joins: f64,
    churn_rate_pct: f64,
    horizon: u32,
) -> Vec<ProjectionPoint> {
    let mut mrr = mrr;
    let mut members = members as f64;
    (1..=horizon)
        .map(|month_offset| {
            mrr = (mrr + mrr_delta).max(0.0);
            members = (members + average_joins - members * churn_rate_pct / 100.0).max(0.0);
            ProjectionPoint {
                month_offset,
                mrr,
                members: members.round() as u32,
            }
        })
        .collect()
}

fn trailing(history: &[MonthlyMetrics], months: usize) -> &[MonthlyMetrics] {
    &history[history.len().saturating_sub(months.max(1))..]
}

/// Monthly churn as a percentage; unusable readings count as zero.
fn churn_pct(metrics: &MonthlyMetrics) -> f64 {
    if metrics.churn_rate.is_finite() {
        metrics.churn_rate.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn revenue_per_member(metrics: &MonthlyMetrics) -> f64 {
    if metrics.active_members == 0 {
        0.0
    } else {
        metrics.mrr / metrics.active_members as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
