//! Composite business-stability score.
//!
//! Four components, each clamped to `component_max` (25 by default) before
//! summing, so the total always lands in 0..=100.

use tracing::warn;

use crate::config::StabilityConfig;
use crate::models::{
    MonthlyMetrics, StabilityComponent, StabilityComponentKind, StabilityScore, StabilityTier,
};

/// `None` when there is no history to score.
pub fn score(history: &[MonthlyMetrics], config: &StabilityConfig) -> Option<StabilityScore> {
    if history.is_empty() {
        warn!("no monthly history, skipping stability score");
        return None;
    }
    let window = &history[history.len().saturating_sub(config.window_months)..];

    let rsi_trend = rsi_component(window, config);
    let churn_average = churn_component(window, config);
    let net_growth = growth_component(window, config);
    let revenue_momentum = momentum_component(window, config);

    let total = (rsi_trend.score + churn_average.score + net_growth.score + revenue_momentum.score)
        .clamp(0.0, 4.0 * config.component_max);

    Some(StabilityScore {
        score: total,
        tier: tier_for(total, config),
        rsi_trend,
        churn_average,
        net_growth,
        revenue_momentum,
    })
}

pub fn tier_for(score: f64, config: &StabilityConfig) -> StabilityTier {
    if score >= config.stable_at {
        StabilityTier::Stable
    } else if score >= config.plateau_at {
        StabilityTier::PlateauRisk
    } else if score >= config.drift_at {
        StabilityTier::EarlyDrift
    } else {
        StabilityTier::InstabilityRisk
    }
}

fn component(
    kind: StabilityComponentKind,
    raw: f64,
    config: &StabilityConfig,
    detail: String,
) -> StabilityComponent {
    StabilityComponent {
        kind,
        score: if raw.is_finite() {
            raw.clamp(0.0, config.component_max)
        } else {
            0.0
        },
        max: config.component_max,
        detail,
    }
}

fn rsi_component(window: &[MonthlyMetrics], config: &StabilityConfig) -> StabilityComponent {
    let latest = window.last().map_or(0.0, |m| m.rsi.clamp(0.0, 100.0));
    let slope = slope(&window.iter().map(|m| m.rsi).collect::<Vec<_>>());
    component(
        StabilityComponentKind::RsiTrend,
        latest * config.rsi_level_weight + config.rsi_baseline + slope * config.rsi_slope_weight,
        config,
        format!("RSI {latest:.0}, trending {slope:+.1} per month"),
    )
}

fn churn_component(window: &[MonthlyMetrics], config: &StabilityConfig) -> StabilityComponent {
    let average = window.iter().map(|m| m.churn_rate.max(0.0)).sum::<f64>() / window.len() as f64;
    component(
        StabilityComponentKind::ChurnAverage,
        config.component_max * (1.0 - average / config.churn_ceiling_pct),
        config,
        format!("Average churn {average:.1}% over {} months", window.len()),
    )
}

fn growth_component(window: &[MonthlyMetrics], config: &StabilityConfig) -> StabilityComponent {
    let net: i64 = window
        .iter()
        .map(|m| m.new_members as i64 - m.cancels as i64)
        .sum();
    let base = window.first().map_or(1.0, |m| (m.active_members as f64).max(1.0));
    let monthly_pct = net as f64 / base * 100.0 / window.len() as f64;
    component(
        StabilityComponentKind::NetGrowth,
        config.growth_neutral + monthly_pct * config.growth_per_pct,
        config,
        format!("Net {net:+} members ({monthly_pct:+.1}% per month)"),
    )
}

fn momentum_component(window: &[MonthlyMetrics], config: &StabilityConfig) -> StabilityComponent {
    let monthly_pct = match (window.first(), window.last()) {
        (Some(first), Some(last)) if window.len() > 1 && first.mrr > 0.0 => {
            (last.mrr - first.mrr) / first.mrr * 100.0 / (window.len() - 1) as f64
        }
        _ => 0.0,
    };
    component(
        StabilityComponentKind::RevenueMomentum,
        config.growth_neutral + monthly_pct * config.growth_per_pct,
        config,
        format!("MRR moving {monthly_pct:+.1}% per month"),
    )
}

/// Least-squares slope against month index; zero for fewer than two points.
fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
