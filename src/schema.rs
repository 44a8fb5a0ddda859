use crate::utils::{is_blank, parse_date};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value in the fact table.
///
/// Facts arrive as text from the upstream parser; the validation primitives
/// replace `Text` with `Number` or `Date` once a column has been coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Null, NaN, and empty or whitespace-only text.
    pub fn is_none_like(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Number(n) => n.is_nan(),
            Cell::Date(_) => false,
            Cell::Text(s) => is_blank(s),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Ordering key used when picking the latest period date.
    ///
    /// Parseable dates compare chronologically. Anything else sorts before
    /// every real date; the resolver rejects such cells before ordering.
    pub(crate) fn date_key(&self) -> DateKey {
        match self {
            Cell::Date(d) => DateKey::Parsed(*d),
            Cell::Text(s) => match parse_date(s) {
                Ok(d) => DateKey::Parsed(d),
                Err(_) => DateKey::Raw(s.trim().to_string()),
            },
            Cell::Number(n) => DateKey::Raw(n.to_string()),
            Cell::Null => DateKey::Raw(String::new()),
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DateKey {
    Raw(String),
    Parsed(NaiveDate),
}

/// Deserializes case-insensitively, like [`PeriodType::parse`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    #[schemars(description = "The value applies over a date range (period_start..period_end), e.g. income statement items.")]
    Duration,

    #[schemars(description = "The value applies at a single point in time (period_instant), e.g. balance sheet items.")]
    Instant,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Duration => "duration",
            PeriodType::Instant => "instant",
        }
    }

    /// The date field that orders facts of this period type.
    pub fn date_field(&self) -> DateField {
        match self {
            PeriodType::Duration => DateField::PeriodEnd,
            PeriodType::Instant => DateField::PeriodInstant,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "duration" => Some(PeriodType::Duration),
            "instant" => Some(PeriodType::Instant),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for PeriodType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        PeriodType::parse(&text)
            .ok_or_else(|| de::Error::unknown_variant(&text, &["duration", "instant"]))
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The columns of a fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    FactType,
    Concept,
    Value,
    PeriodType,
    PeriodStart,
    PeriodEnd,
    PeriodInstant,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::FactType,
        Column::Concept,
        Column::Value,
        Column::PeriodType,
        Column::PeriodStart,
        Column::PeriodEnd,
        Column::PeriodInstant,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::FactType => "fact_type",
            Column::Concept => "concept",
            Column::Value => "value",
            Column::PeriodType => "period_type",
            Column::PeriodStart => "period_start",
            Column::PeriodEnd => "period_end",
            Column::PeriodInstant => "period_instant",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name.trim())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A date column that selects the most recent facts for a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    PeriodEnd,
    PeriodInstant,
}

impl DateField {
    pub fn column(&self) -> Column {
        match self {
            DateField::PeriodEnd => Column::PeriodEnd,
            DateField::PeriodInstant => Column::PeriodInstant,
        }
    }

    /// The period type a row must declare to be ordered by this field.
    pub fn period_type(&self) -> PeriodType {
        match self {
            DateField::PeriodEnd => PeriodType::Duration,
            DateField::PeriodInstant => PeriodType::Instant,
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.column().fmt(f)
    }
}

/// One observation from a filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    /// Metric this row was resolved for. Only set on resolved rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_type: Option<String>,

    /// Standardized concept tag, e.g. `us-gaap:Revenues`
    pub concept: String,

    /// Reported magnitude, usually text as emitted by the filing parser
    #[serde(default)]
    pub value: Cell,

    pub period_type: PeriodType,

    #[serde(default)]
    pub period_start: Cell,

    #[serde(default)]
    pub period_end: Cell,

    #[serde(default)]
    pub period_instant: Cell,
}

impl FactRow {
    pub fn duration(
        concept: impl Into<String>,
        value: impl Into<Cell>,
        start: impl Into<Cell>,
        end: impl Into<Cell>,
    ) -> Self {
        Self {
            fact_type: None,
            concept: concept.into(),
            value: value.into(),
            period_type: PeriodType::Duration,
            period_start: start.into(),
            period_end: end.into(),
            period_instant: Cell::Null,
        }
    }

    pub fn instant(
        concept: impl Into<String>,
        value: impl Into<Cell>,
        instant: impl Into<Cell>,
    ) -> Self {
        Self {
            fact_type: None,
            concept: concept.into(),
            value: value.into(),
            period_type: PeriodType::Instant,
            period_start: Cell::Null,
            period_end: Cell::Null,
            period_instant: instant.into(),
        }
    }

    /// Reads any column as a cell.
    pub fn cell(&self, column: Column) -> Cell {
        match column {
            Column::FactType => self.fact_type.clone().into(),
            Column::Concept => Cell::Text(self.concept.clone()),
            Column::Value => self.value.clone(),
            Column::PeriodType => Cell::Text(self.period_type.as_str().to_string()),
            Column::PeriodStart => self.period_start.clone(),
            Column::PeriodEnd => self.period_end.clone(),
            Column::PeriodInstant => self.period_instant.clone(),
        }
    }

    /// Borrows a cell-valued column. `None` for the columns stored as plain fields.
    pub fn cell_ref(&self, column: Column) -> Option<&Cell> {
        match column {
            Column::Value => Some(&self.value),
            Column::PeriodStart => Some(&self.period_start),
            Column::PeriodEnd => Some(&self.period_end),
            Column::PeriodInstant => Some(&self.period_instant),
            Column::FactType | Column::Concept | Column::PeriodType => None,
        }
    }

    pub(crate) fn cell_mut(&mut self, column: Column) -> Option<&mut Cell> {
        match column {
            Column::Value => Some(&mut self.value),
            Column::PeriodStart => Some(&mut self.period_start),
            Column::PeriodEnd => Some(&mut self.period_end),
            Column::PeriodInstant => Some(&mut self.period_instant),
            Column::FactType | Column::Concept | Column::PeriodType => None,
        }
    }

    pub fn is_none_like(&self, column: Column) -> bool {
        match column {
            Column::FactType => self.fact_type.as_deref().map_or(true, is_blank),
            Column::Concept => is_blank(&self.concept),
            Column::PeriodType => false,
            _ => self.cell_ref(column).map_or(true, Cell::is_none_like),
        }
    }
}

/// An ordered collection of fact rows scoped to one filing.
///
/// Every row keeps an index label. Rows built from scratch are labelled by
/// position; filtering and concatenation carry the labels along, so a row can
/// always be traced back to the table the caller supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FactRow>", into = "Vec<FactRow>")]
pub struct FactTable {
    index: Vec<usize>,
    rows: Vec<FactRow>,
    // Label for the next pushed row; above every label in `index`.
    next_label: usize,
}

impl PartialEq for FactTable {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.rows == other.rows
    }
}

impl FactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<FactRow>) -> Self {
        Self {
            index: (0..rows.len()).collect(),
            next_label: rows.len(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FactRow] {
        &self.rows
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FactRow)> {
        self.index.iter().copied().zip(self.rows.iter())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut FactRow)> {
        self.index.iter().copied().zip(self.rows.iter_mut())
    }

    pub fn push(&mut self, row: FactRow) {
        self.index.push(self.next_label);
        self.rows.push(row);
        self.next_label += 1;
    }

    /// Copies out the rows matching `predicate`, keeping their labels.
    pub fn filter<F>(&self, mut predicate: F) -> FactTable
    where
        F: FnMut(&FactRow) -> bool,
    {
        let mut out = FactTable {
            next_label: self.next_label,
            ..FactTable::new()
        };
        for (label, row) in self.iter() {
            if predicate(row) {
                out.index.push(label);
                out.rows.push(row.clone());
            }
        }
        out
    }

    /// Appends `other` after the rows of `self`, keeping both sets of labels.
    pub fn concat(mut self, other: FactTable) -> FactTable {
        self.index.extend(other.index);
        self.rows.extend(other.rows);
        self.next_label = self.next_label.max(other.next_label);
        self
    }

    /// Index labels of the rows matching `predicate`.
    pub fn labels_where<F>(&self, mut predicate: F) -> Vec<usize>
    where
        F: FnMut(&FactRow) -> bool,
    {
        self.iter()
            .filter(|(_, row)| predicate(row))
            .map(|(label, _)| label)
            .collect()
    }

    pub fn with_concept(&self, concept: &str) -> FactTable {
        self.filter(|row| row.concept == concept)
    }

    /// Sets `fact_type` on every row of a copy of this table.
    pub fn with_fact_type(&self, fact_type: &str) -> FactTable {
        let mut out = self.clone();
        for row in &mut out.rows {
            row.fact_type = Some(fact_type.to_string());
        }
        out
    }

    /// Rows whose `column` equals the first candidate that matches anything.
    ///
    /// Later candidates are not consulted once one matches. No match, or no
    /// candidates at all, yields an empty table.
    pub fn match_first_in_column(&self, column: Column, candidates: &[Cell]) -> FactTable {
        for candidate in candidates {
            let found = self.filter(|row| row.cell(column) == *candidate);
            if !found.is_empty() {
                return found;
            }
        }
        FactTable::new()
    }

    /// Rows sharing the greatest value of `column`, ignoring none-like cells.
    pub(crate) fn rows_at_max_date(&self, column: Column) -> FactTable {
        let present = self.filter(|row| !row.is_none_like(column));
        let latest = present
            .rows
            .iter()
            .map(|row| row.cell(column).date_key())
            .max();

        match latest {
            Some(latest) => present.filter(|row| row.cell(column).date_key() == latest),
            None => present,
        }
    }
}

impl From<Vec<FactRow>> for FactTable {
    fn from(rows: Vec<FactRow>) -> Self {
        Self::from_rows(rows)
    }
}

impl From<FactTable> for Vec<FactRow> {
    fn from(table: FactTable) -> Self {
        table.rows
    }
}

impl FromIterator<FactRow> for FactTable {
    fn from_iter<I: IntoIterator<Item = FactRow>>(iter: I) -> Self {
        Self::from_rows(iter.into_iter().collect())
    }
}
