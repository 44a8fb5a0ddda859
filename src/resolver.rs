use crate::error::{FactContext, FactError, Result};
use crate::schema::{Cell, DateField, FactTable, PeriodType};
use crate::taxonomy::{MetricSpec, Taxonomy};
use crate::utils::parse_date;
use crate::validation::{apply_checks, data_missing, duration_to_date, instant_to_date};
use crate::{FactGroup, ResolvedFacts};
use log::{debug, info};

/// Facts reported in a single quarterly or annual filing (10-Q, 10-K).
///
/// Holds its own copy of the raw fact table. [`FilingFacts::parse`] resolves
/// every metric of the taxonomy and validates the result; nothing is kept
/// unless both steps succeed.
#[derive(Debug, Clone)]
pub struct FilingFacts {
    facts: FactTable,
    taxonomy: Taxonomy,
    resolved: Option<ResolvedFacts>,
}

impl FilingFacts {
    /// Resolves against the US-GAAP taxonomy.
    pub fn new(facts: FactTable) -> Self {
        Self::with_taxonomy(facts, Taxonomy::gaap())
    }

    pub fn with_taxonomy(facts: FactTable, taxonomy: Taxonomy) -> Self {
        Self {
            facts,
            taxonomy,
            resolved: None,
        }
    }

    pub fn facts(&self) -> &FactTable {
        &self.facts
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// The result of the last successful [`FilingFacts::parse`].
    pub fn resolved(&self) -> Option<&ResolvedFacts> {
        self.resolved.as_ref()
    }

    /// Resolves and validates every metric.
    ///
    /// On failure no resolved facts are kept; fix the input and call again.
    pub fn parse(&mut self) -> Result<&ResolvedFacts> {
        self.resolved = None;
        let rows = self.get_rows()?;
        let resolved = self.validate_rows(&rows)?;
        info!(
            "Resolved {} metrics from {} facts",
            resolved.len(),
            self.facts.len()
        );
        Ok(self.resolved.insert(resolved))
    }

    /// Pulls the rows for each metric, in taxonomy order, labelled with `fact_type`.
    ///
    /// Fails on the first metric none of whose tags yield a usable value.
    pub fn get_rows(&self) -> Result<FactTable> {
        if self.facts.is_empty() {
            return Err(FactError::missing(
                FactContext::new(),
                "Input fact table is empty.",
            ));
        }

        let mut results = FactTable::new();
        for metric in &self.taxonomy {
            let rows = self
                .seek_tags_until_found(metric)
                .map_err(|e| e.for_metric(&metric.name))?;

            if data_missing(&rows) {
                return Err(FactError::missing(
                    FactContext::new()
                        .metric(&metric.name)
                        .rows(rows.index().to_vec()),
                    format!(
                        "Could not find a matching row for {} (tried {})",
                        metric.name,
                        metric.tags.join(", ")
                    ),
                ));
            }

            results = results.concat(rows.with_fact_type(&metric.name));
        }
        Ok(results)
    }

    /// Tries each tag in order and returns the rows of the first one found.
    ///
    /// If no tag matches, the empty result of the last attempt is returned.
    pub fn seek_tags_until_found(&self, metric: &MetricSpec) -> Result<FactTable> {
        let field = metric.period_type.date_field();
        let mut rows = FactTable::new();
        for tag in &metric.tags {
            rows = self.get_for_latest_date(tag, field)?;
            if !rows.is_empty() {
                debug!(
                    "Resolved {} from {} ({} row(s))",
                    metric.name,
                    tag,
                    rows.len()
                );
                return Ok(rows);
            }
            debug!("No {} rows with a {} for {}", metric.name, field, tag);
        }
        Ok(rows)
    }

    /// All rows of `concept` at the latest value of `field`.
    ///
    /// Rows without a `field` value are ignored, and an empty table means the
    /// concept was not reported. Ties are kept. Fails if any remaining `field`
    /// value is not a date, or if any returned row declares a period type
    /// other than the one `field` implies.
    pub fn get_for_latest_date(&self, concept: &str, field: DateField) -> Result<FactTable> {
        let column = field.column();
        let present = self
            .facts
            .with_concept(concept)
            .filter(|row| !row.is_none_like(column));

        let mut unparseable = Vec::new();
        let mut cause = None;
        for (label, row) in present.iter() {
            match row.cell_ref(column) {
                Some(Cell::Date(_)) => {}
                Some(Cell::Text(text)) => {
                    if let Err(e) = parse_date(text) {
                        unparseable.push(label);
                        cause.get_or_insert(e);
                    }
                }
                _ => unparseable.push(label),
            }
        }
        if !unparseable.is_empty() {
            let context = FactContext::new().column(column).rows(unparseable);
            let details = format!("Found {} values for {} that are not dates", field, concept);
            return Err(match cause {
                Some(cause) => FactError::conversion(context, details, cause),
                None => FactError::invalid(context, details),
            });
        }

        let result = present.rows_at_max_date(column);

        let expected = field.period_type();
        let mismatched = result.labels_where(|row| row.period_type != expected);
        if !mismatched.is_empty() {
            return Err(FactError::invalid(
                FactContext::new()
                    .column(field.column())
                    .rows(mismatched),
                format!(
                    "Expected all {} rows for {} to be {}",
                    field, concept, expected
                ),
            ));
        }

        Ok(result)
    }

    fn validate_rows(&self, rows: &FactTable) -> Result<ResolvedFacts> {
        let mut groups = Vec::with_capacity(self.taxonomy.len());
        for metric in &self.taxonomy {
            let group = rows.filter(|row| row.fact_type.as_deref() == Some(metric.name.as_str()));

            let checked = apply_checks(&group, metric.rule.checks())
                .and_then(|table| match metric.period_type {
                    PeriodType::Duration => duration_to_date(&table),
                    PeriodType::Instant => instant_to_date(&table),
                })
                .map_err(|e| e.for_metric(&metric.name))?;

            groups.push(FactGroup::from_table(&metric.name, &checked)?);
        }
        Ok(ResolvedFacts::new(groups))
    }
}
