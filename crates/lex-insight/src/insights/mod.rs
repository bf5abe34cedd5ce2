//! Insight assembly: structured records, the market narrative and the
//! chart plan consumed by downstream renderers.

mod assembler;
mod charts;
mod narrative;

pub use assembler::{FieldOverview, InsightAssembler, field_overview};
pub use charts::{ChartKind, ChartSpec, plan_charts};
pub use narrative::{MarketNarrative, NarrativeContext};
