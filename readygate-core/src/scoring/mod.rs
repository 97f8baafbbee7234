//! Result normalization and aggregate scoring
//!
//! Pure transformations: no I/O, no hidden state. Re-running over the same
//! engine results yields byte-identical output, which is what makes run
//! reports reproducible.

use std::collections::HashMap;

use crate::domain::engine::{EngineFamily, EngineResult, EngineStatus};
use crate::domain::issue::Severity;
use crate::domain::run::{Category, SeveritySummary};

/// Aggregate of all normalized categories for one run
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    /// Sorted by engine name, independent of completion order
    pub categories: Vec<Category>,
    pub overall_score: f64,
    pub production_ready: bool,
    pub summary: SeveritySummary,
}

/// Score a category from its issue set.
///
/// Starts at 100 and subtracts a fixed penalty per issue by severity,
/// flooring at 0. An unusable engine result (error, timeout, cancelled)
/// forces the score to 0 regardless of any partial issues collected.
pub fn category_score(status: EngineStatus, issues: &[crate::domain::issue::Issue]) -> f64 {
    if !status.is_usable() {
        return 0.0;
    }
    let penalty: u32 = issues.iter().map(|i| i.severity.penalty()).sum();
    f64::from(100u32.saturating_sub(penalty))
}

/// Normalize one engine result into a category. Pure; performs no I/O.
pub fn normalize(result: &EngineResult) -> Category {
    Category {
        name: result.family.display_name().to_string(),
        family: result.family,
        engine: result.engine.clone(),
        score: category_score(result.status, &result.issues),
        status: result.status,
        issues: result.issues.clone(),
    }
}

/// Weighted average of the scores of participating categories.
///
/// Categories that were never requested do not exist here; skipped
/// categories do not participate; errored categories participate with their
/// floor score so failures are reflected rather than silently excluded.
/// Families absent from `weights` carry weight 1.0, which degenerates to an
/// equal distribution when no overrides are given.
pub fn overall_score(categories: &[Category], weights: &HashMap<EngineFamily, f64>) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for category in categories {
        if category.status == EngineStatus::Skipped {
            continue;
        }
        let weight = weights.get(&category.family).copied().unwrap_or(1.0);
        if weight <= 0.0 {
            continue;
        }
        weighted_sum += category.score * weight;
        weight_total += weight;
    }

    if weight_total == 0.0 {
        return 0.0;
    }
    weighted_sum / weight_total
}

/// Conjunctive production-readiness verdict.
///
/// True iff the overall score meets the threshold, no category contains an
/// outstanding critical issue, and no category is in an error/timeout state.
/// A high numeric average must not mask a single unresolved critical finding
/// or a tool that never ran.
pub fn production_ready(overall: f64, categories: &[Category], threshold: f64) -> bool {
    if overall < threshold {
        return false;
    }
    for category in categories {
        if !category.status.is_usable() {
            return false;
        }
        if category
            .issues
            .iter()
            .any(|i| i.severity == Severity::Critical)
        {
            return false;
        }
    }
    true
}

/// Severity breakdown across all categories of a run
pub fn summarize(categories: &[Category]) -> SeveritySummary {
    let mut summary = SeveritySummary::default();
    for category in categories {
        for issue in &category.issues {
            summary.record(issue.severity);
        }
    }
    summary
}

/// Normalize and score a full set of engine results.
///
/// Categories are re-sorted into a stable order by engine name so the same
/// inputs always produce the same report, independent of arrival order.
pub fn aggregate(
    results: &[EngineResult],
    weights: &HashMap<EngineFamily, f64>,
    threshold: f64,
) -> AggregateOutcome {
    let mut categories: Vec<Category> = results.iter().map(normalize).collect();
    categories.sort_by(|a, b| a.engine.cmp(&b.engine));

    let overall = overall_score(&categories, weights);
    let ready = production_ready(overall, &categories, threshold);
    let summary = summarize(&categories);

    AggregateOutcome {
        categories,
        overall_score: overall,
        production_ready: ready,
        summary,
    }
}
