use crate::schema::Column;
use std::fmt;
use std::num::ParseFloatError;
use thiserror::Error;

/// Where a fact failure was detected.
///
/// `rows` holds the index labels of the offending rows in the fact table the
/// caller originally supplied, not positions in an intermediate copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactContext {
    pub metric: Option<String>,
    pub column: Option<Column>,
    pub rows: Vec<usize>,
}

impl FactContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.column = Some(column);
        self
    }

    pub fn rows(mut self, rows: Vec<usize>) -> Self {
        self.rows = rows;
        self
    }
}

impl fmt::Display for FactContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(metric) = &self.metric {
            parts.push(format!("metric '{}'", metric));
        }
        if let Some(column) = &self.column {
            parts.push(format!("column '{}'", column));
        }
        if !self.rows.is_empty() {
            let rows: Vec<String> = self.rows.iter().map(|r| r.to_string()).collect();
            parts.push(format!("rows [{}]", rows.join(", ")));
        }
        if parts.is_empty() {
            write!(f, "fact table")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// The low-level conversion failure behind an `InvalidFact`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("not a number: {0}")]
    Number(#[from] ParseFloatError),

    #[error("'{0}' is not a finite number")]
    NotFinite(String),

    #[error("no value to convert")]
    Empty,

    #[error("not a date: {0}")]
    Date(#[from] chrono::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactErrorKind {
    MissingFact,
    InvalidFact,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactError {
    /// The required datum is absent.
    #[error("Missing fact ({context}): {details}")]
    MissingFact { context: FactContext, details: String },

    /// The datum is present but malformed or breaks a domain rule.
    #[error("Invalid fact ({context}): {details}")]
    InvalidFact {
        context: FactContext,
        details: String,
        #[source]
        cause: Option<ConversionError>,
    },
}

impl FactError {
    pub fn missing(context: FactContext, details: impl Into<String>) -> Self {
        Self::MissingFact {
            context,
            details: details.into(),
        }
    }

    pub fn invalid(context: FactContext, details: impl Into<String>) -> Self {
        Self::InvalidFact {
            context,
            details: details.into(),
            cause: None,
        }
    }

    pub fn conversion(
        context: FactContext,
        details: impl Into<String>,
        cause: ConversionError,
    ) -> Self {
        Self::InvalidFact {
            context,
            details: details.into(),
            cause: Some(cause),
        }
    }

    pub fn kind(&self) -> FactErrorKind {
        match self {
            Self::MissingFact { .. } => FactErrorKind::MissingFact,
            Self::InvalidFact { .. } => FactErrorKind::InvalidFact,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.kind() == FactErrorKind::MissingFact
    }

    pub fn is_invalid(&self) -> bool {
        self.kind() == FactErrorKind::InvalidFact
    }

    pub fn context(&self) -> &FactContext {
        match self {
            Self::MissingFact { context, .. } | Self::InvalidFact { context, .. } => context,
        }
    }

    /// Attaches the metric being processed when the failing check did not know it.
    pub fn for_metric(mut self, metric: &str) -> Self {
        let context = match &mut self {
            Self::MissingFact { context, .. } | Self::InvalidFact { context, .. } => context,
        };
        if context.metric.is_none() {
            context.metric = Some(metric.to_string());
        }
        self
    }
}

/// Failures while loading facts or configuration from outside the pipeline.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    #[error(transparent)]
    Fact(#[from] FactError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FactError>;
