//! Core-dimension resolution.

use crate::config::DimensionSettings;
use crate::error::{InsightError, Result};
use crate::types::{ColumnProfile, ColumnType, CoreDimension, DatasetProfile, ResolutionSource};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

const KEYWORD_WEIGHT: f64 = 2.0;
const CARDINALITY_WEIGHT: f64 = 1.0;
const SHAPE_WEIGHT: f64 = 1.0;
const COMPLETENESS_WEIGHT: f64 = 0.5;
const IDENTIFIER_SHAPE_RATIO: f64 = 0.9;

/// A scored core-dimension candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionCandidate {
    pub column: String,
    pub score: f64,
    /// Position of the first matching keyword, if any.
    pub keyword_rank: Option<usize>,
    pub unique_count: usize,
}

/// Position of the first keyword contained in `name` (case-insensitive).
pub fn keyword_rank(name: &str, keywords: &[String]) -> Option<usize> {
    let lower = name.to_lowercase();
    keywords
        .iter()
        .position(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
}

/// Infers or validates the core business entity column.
pub struct CoreDimensionResolver<'a> {
    settings: &'a DimensionSettings,
}

impl<'a> CoreDimensionResolver<'a> {
    pub fn new(settings: &'a DimensionSettings) -> Self {
        Self { settings }
    }

    /// Resolve the core dimension.
    ///
    /// An explicit name must be a categorical or identifier column, otherwise
    /// the run fails. Without one, the best-scoring candidate above the
    /// minimum score wins, or `None` when nothing qualifies.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        profile: &DatasetProfile,
    ) -> Result<Option<CoreDimension>> {
        if let Some(name) = explicit {
            return match profile.column(name) {
                Some(col) if col.inferred_type.is_dimension_like() => {
                    info!("Using explicitly specified core dimension: {}", name);
                    Ok(Some(CoreDimension {
                        column: name.to_string(),
                        source: ResolutionSource::Explicit,
                        score: None,
                    }))
                }
                _ => Err(InsightError::InvalidDimension {
                    column: name.to_string(),
                    available: profile
                        .columns
                        .iter()
                        .filter(|c| c.inferred_type.is_dimension_like())
                        .map(|c| c.name.clone())
                        .collect(),
                }),
            };
        }

        let candidates = self.score_candidates(profile);
        for candidate in &candidates {
            debug!(
                "Dimension candidate '{}': score {:.2}",
                candidate.column, candidate.score
            );
        }

        match candidates.into_iter().next() {
            Some(best) if best.score > self.settings.min_score => {
                info!(
                    "Inferred core dimension '{}' (score {:.2})",
                    best.column, best.score
                );
                Ok(Some(CoreDimension {
                    column: best.column,
                    source: ResolutionSource::Inferred,
                    score: Some(best.score),
                }))
            }
            _ => {
                info!("No core dimension candidate above score {:.2}", self.settings.min_score);
                Ok(None)
            }
        }
    }

    /// Score every categorical column, best first.
    ///
    /// Ties go to the earlier keyword, then more distinct values, then column order.
    pub fn score_candidates(&self, profile: &DatasetProfile) -> Vec<DimensionCandidate> {
        let mut candidates: Vec<DimensionCandidate> = profile
            .columns_of(ColumnType::Categorical)
            .filter(|col| col.unique_count >= 2)
            .map(|col| self.score_column(col))
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| match (a.keyword_rank, b.keyword_rank) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
                .then_with(|| b.unique_count.cmp(&a.unique_count))
        });
        candidates
    }

    fn score_column(&self, col: &ColumnProfile) -> DimensionCandidate {
        let rank = keyword_rank(&col.name, &self.settings.entity_keywords);
        let mut score = COMPLETENESS_WEIGHT * (1.0 - col.null_rate);
        if rank.is_some() {
            score += KEYWORD_WEIGHT;
        }
        if col.unique_count * 2 < col.row_count {
            score += CARDINALITY_WEIGHT;
        }
        if col.unique_ratio < IDENTIFIER_SHAPE_RATIO {
            score += SHAPE_WEIGHT;
        }

        DimensionCandidate {
            column: col.name.clone(),
            score,
            keyword_rank: rank,
            unique_count: col.unique_count,
        }
    }
}
