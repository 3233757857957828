//! Heuristic confidence scoring for analytics reports.

use serde::{Deserialize, Serialize};

use docsight_types::{AnalysisType, Confidence};

/// Weights and thresholds for [`score`]. Every field can be overridden from
/// the `[confidence]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub base: f64,
    /// Record count strictly above which the large bonus applies.
    pub large_dataset_threshold: usize,
    pub large_dataset_bonus: f64,
    /// Record count strictly above which the medium bonus applies.
    pub medium_dataset_threshold: usize,
    pub medium_dataset_bonus: f64,
    /// Narrative length in characters, strictly above.
    pub narrative_length_threshold: usize,
    pub narrative_bonus: f64,
    pub min_insights: usize,
    pub insights_bonus: f64,
    pub chart_bonus: f64,
    /// Bonus for analysis types with more dependable output.
    pub reliable_type_bonus: f64,
    /// Fixed score for a report produced by the error route.
    pub error_confidence: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            large_dataset_threshold: 50,
            large_dataset_bonus: 0.2,
            medium_dataset_threshold: 20,
            medium_dataset_bonus: 0.1,
            narrative_length_threshold: 200,
            narrative_bonus: 0.1,
            min_insights: 3,
            insights_bonus: 0.1,
            chart_bonus: 0.1,
            reliable_type_bonus: 0.05,
            error_confidence: 0.1,
        }
    }
}

/// The observable facts a score is computed from.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceSignals {
    pub record_count: usize,
    pub narrative_chars: usize,
    pub insight_count: usize,
    pub has_chart: bool,
    pub analysis_type: Option<AnalysisType>,
}

fn is_reliable_type(analysis_type: Option<AnalysisType>) -> bool {
    matches!(
        analysis_type,
        Some(AnalysisType::TrendAnalysis) | Some(AnalysisType::Summary)
    )
}

/// Additive score, clamped to `[0, 1]` by [`Confidence::new`].
pub fn score(weights: &ConfidenceWeights, signals: &ConfidenceSignals) -> Confidence {
    let mut value = weights.base;

    if signals.record_count > weights.large_dataset_threshold {
        value += weights.large_dataset_bonus;
    } else if signals.record_count > weights.medium_dataset_threshold {
        value += weights.medium_dataset_bonus;
    }
    if signals.narrative_chars > weights.narrative_length_threshold {
        value += weights.narrative_bonus;
    }
    if signals.insight_count >= weights.min_insights {
        value += weights.insights_bonus;
    }
    if signals.has_chart {
        value += weights.chart_bonus;
    }
    if is_reliable_type(signals.analysis_type) {
        value += weights.reliable_type_bonus;
    }

    Confidence::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn base_only() {
        let c = score(&ConfidenceWeights::default(), &ConfidenceSignals::default());
        assert!(approx(c.value(), 0.5));
    }

    #[test]
    fn dataset_bonus_steps_at_thresholds() {
        let w = ConfidenceWeights::default();
        let at = |n| {
            score(
                &w,
                &ConfidenceSignals {
                    record_count: n,
                    ..Default::default()
                },
            )
            .value()
        };
        assert!(approx(at(20), 0.5));
        assert!(approx(at(21), 0.6));
        assert!(approx(at(50), 0.6));
        assert!(approx(at(51), 0.7));
    }

    #[test]
    fn monotonic_in_record_count() {
        let w = ConfidenceWeights::default();
        let mut prev = 0.0;
        for n in 0..120 {
            let v = score(
                &w,
                &ConfidenceSignals {
                    record_count: n,
                    narrative_chars: 300,
                    ..Default::default()
                },
            )
            .value();
            assert!(v >= prev, "score dropped at {n}");
            prev = v;
        }
    }

    #[test]
    fn all_signals_sum_and_clamp() {
        let signals = ConfidenceSignals {
            record_count: 100,
            narrative_chars: 500,
            insight_count: 5,
            has_chart: true,
            analysis_type: Some(AnalysisType::TrendAnalysis),
        };
        let c = score(&ConfidenceWeights::default(), &signals);
        assert!(approx(c.value(), 1.0));

        let generous = ConfidenceWeights {
            base: 0.9,
            ..Default::default()
        };
        assert!(approx(score(&generous, &signals).value(), 1.0));
    }

    #[test]
    fn comparison_gets_no_type_bonus() {
        let signals = ConfidenceSignals {
            analysis_type: Some(AnalysisType::Comparison),
            ..Default::default()
        };
        assert!(approx(
            score(&ConfidenceWeights::default(), &signals).value(),
            0.5
        ));
    }

    #[test]
    fn weights_deserialize_partially() {
        let w: ConfidenceWeights = serde_json::from_str(r#"{"chart_bonus": 0.3}"#).unwrap();
        assert!(approx(w.chart_bonus, 0.3));
        assert!(approx(w.base, 0.5));
    }
}
