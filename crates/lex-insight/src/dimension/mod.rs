//! Column resolution performed once at pipeline start.
//!
//! The core dimension is resolved by [`CoreDimensionResolver`]. The value,
//! time, coverage, segment and price columns follow the same pattern: an
//! explicit override wins when it is usable, otherwise the profile decides.

mod core_dimension;

pub use core_dimension::{CoreDimensionResolver, DimensionCandidate, keyword_rank};

use crate::config::InsightConfig;
use crate::error::Result;
use crate::types::{ColumnType, DatasetProfile, ResolutionSource, ResolvedColumns, TimeColumn};
use tracing::{info, warn};

/// Resolves every column the analyses depend on.
pub struct ColumnResolver<'a> {
    config: &'a InsightConfig,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(config: &'a InsightConfig) -> Self {
        Self { config }
    }

    /// Resolve all columns. Only an invalid explicit core dimension is an error.
    pub fn resolve(&self, profile: &DatasetProfile) -> Result<ResolvedColumns> {
        let core_dimension = CoreDimensionResolver::new(&self.config.dimensions)
            .resolve(self.config.core_dimension.as_deref(), profile)?;
        let core_name = core_dimension.as_ref().map(|d| d.column.as_str());

        let (time_column, missing_time_column) = self.resolve_time_column(profile);
        let value_column = self.resolve_value_column(profile);
        let coverage_column = self.resolve_coverage_column(profile, core_name);
        let segment_column =
            self.resolve_segment_column(profile, core_name, coverage_column.as_deref());
        let price_column = self.resolve_price_column(profile, value_column.as_deref());

        let resolved = ResolvedColumns {
            core_dimension,
            value_column,
            time_column,
            missing_time_column,
            coverage_column,
            segment_column,
            price_column,
        };

        info!(
            "Resolved columns: core={:?}, value={:?}, time={:?}, coverage={:?}, segment={:?}, price={:?}",
            resolved.core_dimension_name(),
            resolved.value_column,
            resolved.time_column_name(),
            resolved.coverage_column,
            resolved.segment_column,
            resolved.price_column
        );
        Ok(resolved)
    }

    /// User-supplied column if present, else the first detected datetime column.
    ///
    /// A user-supplied column missing from the dataset disables detection and
    /// is returned separately so the gate can report it.
    fn resolve_time_column(&self, profile: &DatasetProfile) -> (Option<TimeColumn>, Option<String>) {
        if let Some(name) = self.config.time_column.as_deref() {
            if profile.has_column(name) {
                return (
                    Some(TimeColumn {
                        column: name.to_string(),
                        source: ResolutionSource::Explicit,
                    }),
                    None,
                );
            }
            warn!("Specified time column '{}' not found in dataset", name);
            return (None, Some(name.to_string()));
        }

        let detected = profile
            .columns_of(ColumnType::Datetime)
            .find(|c| c.non_null_count() > 0)
            .map(|c| TimeColumn {
                column: c.name.clone(),
                source: ResolutionSource::Inferred,
            });
        (detected, None)
    }

    fn resolve_value_column(&self, profile: &DatasetProfile) -> Option<String> {
        if let Some(name) = self.config.value_column.as_deref() {
            match profile.column(name) {
                Some(col) if col.inferred_type == ColumnType::Numeric => {
                    return Some(name.to_string());
                }
                Some(col) => warn!(
                    "Specified value column '{}' is {}, not numeric; falling back to auto-detection",
                    name, col.inferred_type
                ),
                None => warn!(
                    "Specified value column '{}' not found in dataset, falling back to auto-detection",
                    name
                ),
            }
        }

        let usable: Vec<&str> = self.usable_numeric(profile).collect();
        // price columns are a value only when nothing else is numeric
        let is_price = |name: &str| keyword_rank(name, &self.config.dimensions.price_keywords).is_some();
        let numeric: Vec<&str> = if usable.iter().all(|name| is_price(name)) {
            usable
        } else {
            usable.into_iter().filter(|name| !is_price(name)).collect()
        };

        numeric
            .iter()
            .filter_map(|name| {
                keyword_rank(name, &self.config.dimensions.value_keywords).map(|rank| (rank, *name))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, name)| name)
            .or_else(|| numeric.first().copied())
            .map(str::to_string)
    }

    fn usable_numeric<'p>(&self, profile: &'p DatasetProfile) -> impl Iterator<Item = &'p str> {
        profile
            .columns_of(ColumnType::Numeric)
            .filter(|c| c.non_null_count() > 0)
            .map(|c| c.name.as_str())
    }

    /// Numeric column matching a price keyword, other than the value column.
    fn resolve_price_column(&self, profile: &DatasetProfile, value: Option<&str>) -> Option<String> {
        if let Some(name) = self.config.price_column.as_deref() {
            match profile.column(name) {
                Some(col) if col.inferred_type == ColumnType::Numeric && Some(name) != value => {
                    return Some(name.to_string());
                }
                _ => warn!("Specified price column '{}' is not usable here, ignoring", name),
            }
        }

        self.usable_numeric(profile)
            .filter(|name| Some(*name) != value)
            .filter_map(|name| {
                keyword_rank(name, &self.config.dimensions.price_keywords).map(|rank| (rank, name))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, name)| name.to_string())
    }

    fn resolve_coverage_column(
        &self,
        profile: &DatasetProfile,
        core: Option<&str>,
    ) -> Option<String> {
        self.resolve_keyword_column(
            profile,
            self.config.coverage_column.as_deref(),
            &self.config.dimensions.coverage_keywords,
            &[core],
            true,
        )
    }

    fn resolve_segment_column(
        &self,
        profile: &DatasetProfile,
        core: Option<&str>,
        coverage: Option<&str>,
    ) -> Option<String> {
        self.resolve_keyword_column(
            profile,
            self.config.segment_column.as_deref(),
            &self.config.dimensions.segment_keywords,
            &[core, coverage],
            false,
        )
    }

    fn resolve_keyword_column(
        &self,
        profile: &DatasetProfile,
        explicit: Option<&str>,
        keywords: &[String],
        exclude: &[Option<&str>],
        allow_identifier: bool,
    ) -> Option<String> {
        let accepts = |t: ColumnType| {
            t == ColumnType::Categorical || (allow_identifier && t == ColumnType::Identifier)
        };
        let excluded = |name: &str| exclude.iter().flatten().any(|e| *e == name);

        if let Some(name) = explicit {
            match profile.column(name) {
                Some(col) if accepts(col.inferred_type) && !excluded(name) => {
                    return Some(name.to_string());
                }
                _ => warn!("Specified column '{}' is not usable here, ignoring", name),
            }
        }

        profile
            .columns
            .iter()
            .filter(|c| accepts(c.inferred_type) && !excluded(&c.name) && c.unique_count >= 2)
            .filter_map(|c| keyword_rank(&c.name, keywords).map(|rank| (rank, c.name.as_str())))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, name)| name.to_string())
    }
}
