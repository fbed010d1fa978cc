//! Aggregate scores across an evaluation run

use std::time::Duration;

use serde::Serialize;

use crate::harness::QuestionEvaluation;
use crate::metrics::METRIC_NAMES;

/// One metric across every scored question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub name: &'static str,
    /// Mean over questions where the metric has a value
    pub mean: Option<f32>,
    pub scored: usize,
    /// Questions that were scored but produced no value for this metric
    pub unavailable: usize,
}

/// Run-level report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub questions: usize,
    /// Questions the system under test could not answer
    pub skipped: usize,
    pub mean_latency_ms: f64,
    pub metrics: Vec<MetricSummary>,
}

impl MetricsSummary {
    pub fn from_evaluations(evaluations: &[QuestionEvaluation]) -> Self {
        let skipped = evaluations.iter().filter(|e| e.is_skipped()).count();
        let scored: Vec<&QuestionEvaluation> = evaluations.iter().filter(|e| !e.is_skipped()).collect();

        let metrics = METRIC_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<f32> = scored
                    .iter()
                    .filter_map(|e| e.metrics.values()[i].1)
                    .collect();
                let mean = if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f32>() / values.len() as f32)
                };
                MetricSummary {
                    name,
                    mean,
                    scored: values.len(),
                    unavailable: scored.len() - values.len(),
                }
            })
            .collect();

        let total_latency: Duration = evaluations.iter().map(|e| e.elapsed).sum();
        let mean_latency_ms = if evaluations.is_empty() {
            0.0
        } else {
            total_latency.as_secs_f64() * 1000.0 / evaluations.len() as f64
        };

        Self {
            questions: evaluations.len(),
            skipped,
            mean_latency_ms,
            metrics,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Print a summary of the run
    pub fn print_summary(&self) {
        println!("\n========== EVALUATION REPORT ==========\n");
        println!(
            "Questions: {} ({} answered, {} with no result)",
            self.questions,
            self.questions - self.skipped,
            self.skipped
        );
        println!("Mean latency: {:.0} ms", self.mean_latency_ms);

        println!("\n---------- Metrics ----------\n");
        for metric in &self.metrics {
            match metric.mean {
                Some(mean) => println!("{:<20} {:.3}  (n={})", metric.name, mean, metric.scored),
                None => println!("{:<20} n/a", metric.name),
            }
            if metric.unavailable > 0 {
                println!("  unavailable for {} question(s)", metric.unavailable);
            }
        }
        println!("\n========================================\n");
    }
}
