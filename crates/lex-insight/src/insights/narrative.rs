//! Plain-language market narrative for business readers.
//!
//! Built from concentration, company position, opportunities and trend.
//! The wording carries no statistical vocabulary such as medians or
//! standard deviations.

use crate::aggregator::{CompanyPosition, ConcentrationAnalysis, OpportunityAnalysis, TrendAnalysis};
use serde::{Deserialize, Serialize};

/// Top3 share at which the head is treated as the main growth lever.
const HEAD_DRIVEN_SHARE: f64 = 60.0;
/// Top3 share at which concentration itself becomes a risk.
const CONCENTRATION_RISK_SHARE: f64 = 70.0;
const NAMES_SHOWN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketNarrative {
    pub current_state: String,
    pub opportunity: String,
    pub strategy: String,
    pub why_now: String,
    pub expected_benefit: String,
    pub key_risks: String,
    pub mitigation: String,
}

/// Inputs the narrative draws from.
#[derive(Debug, Clone, Default)]
pub struct NarrativeContext<'a> {
    /// Label of the core dimension, e.g. `brand`.
    pub dimension: &'a str,
    /// Label of the metric, e.g. `sales_amount` or `rows`.
    pub metric: &'a str,
    pub concentration: Option<&'a ConcentrationAnalysis>,
    pub company_position: Option<&'a CompanyPosition>,
    pub opportunities: Option<&'a OpportunityAnalysis>,
    pub trend: Option<&'a TrendAnalysis>,
    pub has_price: bool,
    pub has_structure: bool,
}

impl MarketNarrative {
    pub fn build(ctx: &NarrativeContext<'_>) -> Self {
        let head = ctx
            .concentration
            .map(|c| join_names(c.head.iter().map(|e| e.entity.as_str())))
            .unwrap_or_default();
        let tail = ctx
            .concentration
            .map(|c| join_names(c.tail.iter().map(|e| e.entity.as_str())))
            .unwrap_or_default();
        let top3 = ctx.concentration.map(|c| c.top3_share).unwrap_or(0.0);
        let has_time = ctx.trend.is_some();

        let mut current_state = match ctx.concentration {
            Some(c) => format!(
                "Current {} is driven by a few leading {} entries: the top one holds about {:.1}% and the top three about {:.1}%.",
                ctx.metric, ctx.dimension, c.top1_share, c.top3_share
            ),
            None => format!(
                "Current {} already splits into a head and a long tail, so investment needs a priority order.",
                ctx.metric
            ),
        };
        if !head.is_empty() {
            current_state.push_str(&format!(" Leading names include {}.", head));
        }
        if let Some(position) = ctx.company_position {
            current_state.push_str(&format!(
                " {} ranks #{} of {} with {:.1}% share.",
                position.company, position.rank, position.entity_count, position.share
            ));
        }

        let mut opportunity = Vec::new();
        if top3 >= HEAD_DRIVEN_SHARE {
            opportunity.push(format!(
                "the leading {} entries are the most direct lever for short-term volume",
                ctx.dimension
            ));
        }
        if !tail.is_empty() {
            opportunity.push(format!("{} in the long tail suit low-cost pilots", tail));
        }
        if let Some(top) = ctx.opportunities.and_then(|o| o.top()) {
            opportunity.push(format!(
                "{} ranks first for opportunity ({} priority)",
                top.segment, top.level
            ));
        }
        if opportunity.is_empty() {
            opportunity.push(
                "look for breakthroughs among entries with thin coverage and low share".to_string(),
            );
        }

        let strategy = format!(
            "Run two tracks: deepen share with the leading {} entries, and make targeted pushes on low-share, high-potential ones.",
            ctx.dimension
        );

        let mut why = vec![
            "this concentrates resources on the entries most likely to deliver without adding much load on the team"
                .to_string(),
        ];
        if top3 >= HEAD_DRIVEN_SHARE {
            why.push("it also keeps resources from being spread thin across a low-converting tail".to_string());
        }
        match ctx.trend {
            Some(trend) => why.push(format!(
                "{} has been moving {} recently",
                ctx.metric,
                trend.summary.direction.as_str()
            )),
            None => why.push(
                "without a time series, structure and coverage moves are safer than trend calls".to_string(),
            ),
        }

        let expected_benefit = format!(
            "Visible gains sooner, better conversion in key {} entries, and a repeatable playbook for similar ones.",
            ctx.dimension
        );

        let mut risks = Vec::new();
        if !has_time {
            risks.push("with no time dimension, short-term results are slow to evaluate");
        }
        if !ctx.has_price {
            risks.push("with no price field, price-band strategy has a blind spot");
        }
        if !ctx.has_structure {
            risks.push("with no stable structure field, substitution paths are judged coarsely");
        }
        if top3 >= CONCENTRATION_RISK_SHARE {
            risks.push("high concentration means a swing in one leading entry moves the whole picture");
        }
        if risks.is_empty() {
            risks.push("the main risk is uneven execution pace");
        }

        let mitigation = "Hold a weekly review: track progress per entry, fill in the missing fields (time, price, structure), set stop-loss thresholds and shift resources promptly."
            .to_string();

        Self {
            current_state,
            opportunity: sentence(&opportunity),
            strategy,
            why_now: sentence(&why),
            expected_benefit,
            key_risks: sentence(&risks),
            mitigation,
        }
    }

    /// `(section, text)` pairs in reading order.
    pub fn sections(&self) -> [(&'static str, &str); 7] {
        [
            ("current_state", self.current_state.as_str()),
            ("opportunity", self.opportunity.as_str()),
            ("strategy", self.strategy.as_str()),
            ("why_now", self.why_now.as_str()),
            ("expected_benefit", self.expected_benefit.as_str()),
            ("key_risks", self.key_risks.as_str()),
            ("mitigation", self.mitigation.as_str()),
        ]
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.take(NAMES_SHOWN).collect::<Vec<_>>().join(", ")
}

/// Join clauses into one capitalized sentence.
fn sentence<S: AsRef<str>>(clauses: &[S]) -> String {
    let joined = clauses
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("; ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concentration() -> ConcentrationAnalysis {
        let names: Vec<Option<String>> = ["BD", "Linhua", "Weigao", "Kindly", "Fengling", "BD"]
            .iter()
            .map(|v| Some(v.to_string()))
            .collect();
        let values = vec![Some(300.0), Some(250.0), Some(120.0), Some(60.0), Some(20.0), Some(50.0)];
        ConcentrationAnalysis::compute("enterprise", Some("units"), &names, Some(values.as_slice()))
            .unwrap()
    }

    #[test]
    fn test_all_sections_filled_without_jargon() {
        let c = concentration();
        let narrative = MarketNarrative::build(&NarrativeContext {
            dimension: "enterprise",
            metric: "units",
            concentration: Some(&c),
            ..Default::default()
        });

        for (name, text) in narrative.sections() {
            assert!(!text.is_empty(), "section {} is empty", name);
            assert!(!text.contains("median"), "section {} mentions median", name);
            assert!(!text.contains("standard deviation"));
        }
        assert!(narrative.current_state.contains("BD"));
        assert!(narrative.key_risks.contains("no time dimension"));
        assert!(narrative.key_risks.contains("high concentration"));
    }

    #[test]
    fn test_without_concentration() {
        let narrative = MarketNarrative::build(&NarrativeContext {
            dimension: "brand",
            metric: "rows",
            has_price: true,
            has_structure: true,
            ..Default::default()
        });
        assert!(narrative.current_state.contains("long tail"));
        assert!(narrative.opportunity.starts_with("Look for breakthroughs"));
        assert!(narrative.key_risks.contains("no time dimension"));
    }

    #[test]
    fn test_sentence() {
        assert_eq!(sentence(&["a", "b"]), "A; b.");
        assert_eq!(sentence::<&str>(&[]), "");
    }
}
