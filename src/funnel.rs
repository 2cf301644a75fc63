use crate::config::FunnelConfig;
use crate::models::{FunnelBottleneck, FunnelCounts, FunnelStage, StageConversion};

/// Stage-over-stage conversion. A stage with a zero denominator has no rate.
pub fn stage_conversions(counts: &FunnelCounts) -> [StageConversion; 3] {
    [
        conversion(FunnelStage::Set, counts.booked, counts.leads),
        conversion(FunnelStage::Show, counts.shows, counts.booked),
        conversion(FunnelStage::Close, counts.new_members, counts.shows),
    ]
}

fn conversion(stage: FunnelStage, numerator: u32, denominator: u32) -> StageConversion {
    let rate = (denominator > 0).then(|| (numerator as f64 / denominator as f64).clamp(0.0, 1.0));
    StageConversion {
        stage,
        denominator,
        rate,
        drop_percent: rate.map(|r| (1.0 - r) * 100.0),
    }
}

pub fn benchmark(stage: FunnelStage, config: &FunnelConfig) -> f64 {
    match stage {
        FunnelStage::Set => config.set_benchmark,
        FunnelStage::Show => config.show_benchmark,
        FunnelStage::Close => config.close_benchmark,
    }
}

/// Largest drop among stages with enough samples. Earlier stages win ties.
/// `None` means no stage had a usable sample, not a healthy funnel.
pub fn detect_bottleneck(counts: &FunnelCounts, config: &FunnelConfig) -> Option<FunnelBottleneck> {
    let mut worst: Option<(StageConversion, f64, f64)> = None;
    for stage in stage_conversions(counts) {
        if stage.denominator < config.min_sample {
            continue;
        }
        let (Some(rate), Some(drop)) = (stage.rate, stage.drop_percent) else {
            continue;
        };
        if worst.as_ref().map_or(true, |(_, _, worst_drop)| drop > *worst_drop) {
            worst = Some((stage, rate, drop));
        }
    }

    worst.map(|(stage, rate, drop)| {
        let benchmark = benchmark(stage.stage, config);
        FunnelBottleneck {
            stage: stage.stage,
            conversion_rate: rate,
            drop_percent: drop,
            sample_size: stage.denominator,
            benchmark,
            below_benchmark: rate < benchmark,
            explanation: explain(stage.stage, rate, drop, benchmark),
        }
    })
}

fn explain(stage: FunnelStage, rate: f64, drop: f64, benchmark: f64) -> String {
    let what = match stage {
        FunnelStage::Set => "of leads book an appointment",
        FunnelStage::Show => "of booked appointments show up",
        FunnelStage::Close => "of visitors who show up join",
    };
    format!(
        "Only {:.0}% {what} ({:.0}% drop, benchmark {:.0}%)",
        rate * 100.0,
        drop,
        benchmark * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(leads: u32, booked: u32, shows: u32, new_members: u32) -> FunnelCounts {
        FunnelCounts {
            leads,
            booked,
            shows,
            new_members,
        }
    }

    #[test]
    fn finds_largest_drop() {
        let bottleneck = detect_bottleneck(&counts(100, 60, 20, 10), &FunnelConfig::default()).unwrap();
        assert_eq!(bottleneck.stage, FunnelStage::Show);
        assert!((bottleneck.drop_percent - 66.666_666).abs() < 1e-3);
        assert_eq!(bottleneck.sample_size, 60);
        assert!(bottleneck.below_benchmark);
        assert_eq!(
            bottleneck.explanation,
            "Only 33% of booked appointments show up (67% drop, benchmark 70%)"
        );
    }

    #[test]
    fn tiny_funnel_has_no_bottleneck() {
        assert!(detect_bottleneck(&counts(2, 1, 1, 0), &FunnelConfig::default()).is_none());
        assert!(detect_bottleneck(&counts(0, 0, 0, 0), &FunnelConfig::default()).is_none());
    }

    #[test]
    fn skips_undersampled_stages() {
        // close stage has the worst rate but only two shows
        let bottleneck = detect_bottleneck(&counts(10, 5, 2, 0), &FunnelConfig::default()).unwrap();
        assert_eq!(bottleneck.stage, FunnelStage::Show);
    }

    #[test]
    fn perfect_funnel_reports_zero_drop() {
        let bottleneck = detect_bottleneck(&counts(10, 10, 10, 10), &FunnelConfig::default()).unwrap();
        assert_eq!(bottleneck.stage, FunnelStage::Set);
        assert_eq!(bottleneck.drop_percent, 0.0);
        assert!(!bottleneck.below_benchmark);
    }

    #[test]
    fn zero_denominator_has_no_rate() {
        let [set, show, close] = stage_conversions(&counts(5, 0, 0, 0));
        assert_eq!(set.rate, Some(0.0));
        assert_eq!(show.rate, None);
        assert_eq!(close.drop_percent, None);
    }
}
