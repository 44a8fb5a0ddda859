//! # Filing Facts
//!
//! A library for pulling a fixed set of standardized financial metrics out of
//! the raw facts reported in one filing (10-Q, 10-K) and validating them before
//! they are used downstream.
//!
//! ## Core Concepts
//!
//! - **Fact Table**: Raw observations, each tagged with a concept (e.g. `us-gaap:Revenues`),
//!   a value, a period type and period dates
//! - **Taxonomy**: For every metric, its period type and an ordered list of acceptable concept tags
//! - **Resolution**: Per metric, the first tag that has rows wins; among its rows only those at
//!   the latest period date are kept
//! - **Validation**: Values are coerced to numbers, sign rules are enforced and dates parsed;
//!   any failure is a [`FactError`] that says whether the datum was missing or invalid
//!
//! ## Example
//!
//! ```rust,ignore
//! use filing_facts::*;
//!
//! let table = read_facts_csv(std::fs::File::open("facts.csv")?)?;
//! let resolved = resolve_filing_facts(table)?;
//!
//! let revenue = resolved.value(metrics::REVENUE)?;
//! let cash = resolved.value(metrics::CASH_EQUIVALENTS)?;
//! println!("{}", resolved.to_json()?);
//! ```

pub mod error;
pub mod ingestion;
pub mod resolver;
pub mod schema;
pub mod taxonomy;
pub mod utils;
pub mod validation;

pub use error::{ConversionError, FactContext, FactError, FactErrorKind, LoadError, Result};
pub use ingestion::*;
pub use resolver::FilingFacts;
pub use schema::*;
pub use taxonomy::{metrics, MetricSpec, Taxonomy, ValueRule};
pub use validation::*;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

/// The reporting period of a resolved fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "period_type", rename_all = "lowercase")]
pub enum Period {
    Duration { start: NaiveDate, end: NaiveDate },
    Instant { date: NaiveDate },
}

impl Period {
    pub fn period_type(&self) -> PeriodType {
        match self {
            Period::Duration { .. } => PeriodType::Duration,
            Period::Instant { .. } => PeriodType::Instant,
        }
    }

    /// The date the fact was selected by: the period end or the instant.
    pub fn end_date(&self) -> NaiveDate {
        match self {
            Period::Duration { end, .. } => *end,
            Period::Instant { date } => *date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    /// Index label of the row in the fact table the facts were resolved from
    pub row: usize,
    pub concept: String,
    pub value: f64,
    pub period: Period,
}

impl ResolvedFact {
    /// Reads a row that has been through value and date validation.
    fn from_validated(row: usize, fact: &FactRow) -> Result<Self> {
        let value = fact.value.as_number().ok_or_else(|| {
            FactError::invalid(
                FactContext::new().column(Column::Value).rows(vec![row]),
                format!("Value {} of {} was not converted to a number", fact.value, fact.concept),
            )
        })?;

        let date = |column: Column| {
            fact.cell_ref(column)
                .and_then(Cell::as_date)
                .ok_or_else(|| {
                    FactError::invalid(
                        FactContext::new().column(column).rows(vec![row]),
                        format!("{} of {} was not converted to a date", column, fact.concept),
                    )
                })
        };

        let period = match fact.period_type {
            PeriodType::Duration => Period::Duration {
                start: date(Column::PeriodStart)?,
                end: date(Column::PeriodEnd)?,
            },
            PeriodType::Instant => Period::Instant {
                date: date(Column::PeriodInstant)?,
            },
        };

        Ok(Self {
            row,
            concept: fact.concept.clone(),
            value,
            period,
        })
    }
}

/// All resolved rows for one metric. Usually one, more when a filing
/// reports the same period twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactGroup {
    pub fact_type: String,
    pub facts: Vec<ResolvedFact>,
}

impl FactGroup {
    pub(crate) fn from_table(fact_type: &str, table: &FactTable) -> Result<Self> {
        let facts = table
            .iter()
            .map(|(label, row)| ResolvedFact::from_validated(label, row))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.for_metric(fact_type))?;

        Ok(Self {
            fact_type: fact_type.to_string(),
            facts,
        })
    }

    pub fn values(&self) -> Vec<f64> {
        self.facts.iter().map(|f| f.value).collect()
    }

    /// The metric's value, provided every row reports the same number.
    pub fn value(&self) -> Result<f64> {
        let context = || {
            FactContext::new()
                .metric(&self.fact_type)
                .column(Column::Value)
                .rows(self.facts.iter().map(|f| f.row).collect())
        };

        let first = self.facts.first().ok_or_else(|| {
            FactError::missing(context(), format!("No rows resolved for {}", self.fact_type))
        })?;

        if self.facts.iter().any(|f| f.value != first.value) {
            return Err(FactError::invalid(
                context(),
                format!(
                    "Ambiguous {}: rows for the same period disagree ({:?})",
                    self.fact_type,
                    self.values()
                ),
            ));
        }

        Ok(first.value)
    }
}

/// The validated output of [`FilingFacts::parse`], one group per metric in
/// taxonomy order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedFacts {
    groups: Vec<FactGroup>,
}

impl ResolvedFacts {
    pub(crate) fn new(groups: Vec<FactGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[FactGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, metric: &str) -> Option<&FactGroup> {
        self.groups.iter().find(|g| g.fact_type == metric)
    }

    pub fn value(&self, metric: &str) -> Result<f64> {
        match self.get(metric) {
            Some(group) => group.value(),
            None => Err(FactError::missing(
                FactContext::new().metric(metric),
                format!("{} is not part of the resolved facts", metric),
            )),
        }
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Resolves and validates a filing's facts against the US-GAAP taxonomy.
pub fn resolve_filing_facts(facts: FactTable) -> Result<ResolvedFacts> {
    resolve_with_taxonomy(facts, Taxonomy::gaap())
}

pub fn resolve_with_taxonomy(facts: FactTable, taxonomy: Taxonomy) -> Result<ResolvedFacts> {
    debug!(
        "Resolving {} facts against {} metrics",
        facts.len(),
        taxonomy.len()
    );
    let mut filing = FilingFacts::with_taxonomy(facts, taxonomy);
    let resolved = filing.parse()?.clone();
    Ok(resolved)
}
