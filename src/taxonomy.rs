use crate::error::LoadError;
use crate::schema::PeriodType;
use crate::validation::{values_non_positive, values_not_negative, values_positive, values_to_num, Check};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metric names used by [`Taxonomy::gaap`].
pub mod metrics {
    pub const REVENUE: &str = "revenue";
    pub const EPS: &str = "eps";
    pub const DILUTED_SHARES: &str = "diluted_shares";
    pub const NET_INCOME: &str = "net_income";
    pub const OPERATING_INCOME: &str = "operating_income";
    pub const OPERATING_CASH_FLOW: &str = "operating_cash_flow";
    pub const CAP_EX: &str = "cap_ex";
    pub const GROSS_PROFIT: &str = "gross_profit";
    pub const CASH_EQUIVALENTS: &str = "cash_equivalents";
}

/// The domain rule a resolved metric's values must satisfy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueRule {
    #[schemars(description = "Value must be numeric. Any sign is accepted (e.g. net income, operating cash flow).")]
    Numeric,

    #[schemars(description = "Value must be numeric and >= 0 (e.g. revenue, cash equivalents).")]
    NonNegative,

    #[schemars(description = "Value must be numeric and > 0 (e.g. diluted share count).")]
    Positive,

    #[schemars(description = "Value must be numeric and <= 0 (e.g. capital expenditure reported as a cash outflow).")]
    NonPositive,
}

impl Default for ValueRule {
    fn default() -> Self {
        Self::Numeric
    }
}

impl ValueRule {
    /// The validation chain enforcing this rule, applied in order.
    pub fn checks(&self) -> &'static [Check] {
        match self {
            ValueRule::Numeric => &[values_to_num],
            ValueRule::NonNegative => &[values_to_num, values_not_negative],
            ValueRule::Positive => &[values_to_num, values_positive],
            ValueRule::NonPositive => &[values_to_num, values_non_positive],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MetricSpec {
    #[schemars(description = "Logical metric name, used as the fact_type label on resolved rows (e.g. 'revenue')")]
    pub name: String,

    #[schemars(description = "Whether the metric is reported over a date range or at a point in time")]
    pub period_type: PeriodType,

    #[schemars(description = "Acceptable concept tags, most preferred first. Later tags are only tried when earlier ones yield no rows.")]
    pub tags: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Domain rule the resolved values must satisfy. Defaults to numeric.")]
    pub rule: ValueRule,
}

impl MetricSpec {
    pub fn new<I, S>(name: &str, period_type: PeriodType, tags: I, rule: ValueRule) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            period_type,
            tags: tags.into_iter().map(Into::into).collect(),
            rule,
        }
    }
}

/// Ordered mapping from metric name to its period type and synonym tags.
///
/// Iteration order is resolution order, and the order of groups in the
/// resolved fact set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<MetricSpec>", into = "Vec<MetricSpec>")]
pub struct Taxonomy {
    metrics: Vec<MetricSpec>,
}

impl Taxonomy {
    pub fn new(metrics: Vec<MetricSpec>) -> Result<Self, LoadError> {
        if metrics.is_empty() {
            return Err(LoadError::InvalidTaxonomy(
                "taxonomy defines no metrics".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for metric in &metrics {
            if metric.name.trim().is_empty() {
                return Err(LoadError::InvalidTaxonomy(
                    "metric name must not be empty".to_string(),
                ));
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(LoadError::InvalidTaxonomy(format!(
                    "metric '{}' is defined more than once",
                    metric.name
                )));
            }
            if metric.tags.is_empty() {
                return Err(LoadError::InvalidTaxonomy(format!(
                    "metric '{}' has no concept tags",
                    metric.name
                )));
            }
        }

        Ok(Self { metrics })
    }

    /// The US-GAAP metrics extracted from 10-K and 10-Q filings.
    pub fn gaap() -> Self {
        use metrics::*;
        use PeriodType::{Duration, Instant};

        Self {
            metrics: vec![
                MetricSpec::new(
                    REVENUE,
                    Duration,
                    [
                        "us-gaap:Revenues",
                        "us-gaap:SalesRevenueNet",
                        "us-gaap:SalesRevenueServicesNet",
                    ],
                    ValueRule::NonNegative,
                ),
                MetricSpec::new(
                    EPS,
                    Duration,
                    [
                        "us-gaap:EarningsPerShareDiluted",
                        "us-gaap:EarningsPerShareBasicAndDiluted",
                    ],
                    ValueRule::Numeric,
                ),
                MetricSpec::new(
                    DILUTED_SHARES,
                    Duration,
                    [
                        "us-gaap:WeightedAverageNumberOfDilutedSharesOutstanding",
                        "us-gaap:WeightedAverageNumberOfSharesOutstandingDiluted",
                    ],
                    ValueRule::Positive,
                ),
                MetricSpec::new(
                    NET_INCOME,
                    Duration,
                    ["us-gaap:NetIncomeLoss", "us-gaap:ProfitLoss"],
                    ValueRule::Numeric,
                ),
                MetricSpec::new(
                    OPERATING_INCOME,
                    Duration,
                    ["us-gaap:OperatingIncomeLoss"],
                    ValueRule::Numeric,
                ),
                MetricSpec::new(
                    OPERATING_CASH_FLOW,
                    Duration,
                    [
                        "us-gaap:NetCashProvidedByUsedInOperatingActivities",
                        "us-gaap:NetCashProvidedByUsedInOperatingActivitiesContinuingOperations",
                    ],
                    ValueRule::Numeric,
                ),
                MetricSpec::new(
                    CAP_EX,
                    Duration,
                    [
                        "us-gaap:PaymentsToAcquirePropertyPlantAndEquipment",
                        "us-gaap:CapitalExpenditures",
                        "us-gaap:PaymentsForCapitalExpenditures",
                        "us-gaap:NetCashUsedForInvestingActivities",
                        "us-gaap:PaymentsToAcquireProductiveAssets",
                    ],
                    ValueRule::NonPositive,
                ),
                MetricSpec::new(
                    GROSS_PROFIT,
                    Duration,
                    ["us-gaap:GrossProfit"],
                    ValueRule::Numeric,
                ),
                MetricSpec::new(
                    CASH_EQUIVALENTS,
                    Instant,
                    [
                        "us-gaap:CashAndCashEquivalentsAtCarryingValue",
                        "us-gaap:CashCashEquivalentsAndShortTermInvestments",
                    ],
                    ValueRule::NonNegative,
                ),
            ],
        }
    }

    /// Loads and validates a taxonomy from a JSON array of metric definitions.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let metrics: Vec<MetricSpec> = serde_json::from_str(json)?;
        Self::new(metrics)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.metrics)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<MetricSpec>)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn metrics(&self) -> &[MetricSpec] {
        &self.metrics
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricSpec> {
        self.metrics.iter()
    }

    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::gaap()
    }
}

impl TryFrom<Vec<MetricSpec>> for Taxonomy {
    type Error = LoadError;

    fn try_from(metrics: Vec<MetricSpec>) -> Result<Self, Self::Error> {
        Self::new(metrics)
    }
}

impl From<Taxonomy> for Vec<MetricSpec> {
    fn from(taxonomy: Taxonomy) -> Self {
        taxonomy.metrics
    }
}

impl<'a> IntoIterator for &'a Taxonomy {
    type Item = &'a MetricSpec;
    type IntoIter = std::slice::Iter<'a, MetricSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.metrics.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaap_order_and_period_types() {
        let taxonomy = Taxonomy::gaap();
        let names: Vec<&str> = taxonomy.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "revenue",
                "eps",
                "diluted_shares",
                "net_income",
                "operating_income",
                "operating_cash_flow",
                "cap_ex",
                "gross_profit",
                "cash_equivalents",
            ]
        );

        for metric in &taxonomy {
            let expected = if metric.name == metrics::CASH_EQUIVALENTS {
                PeriodType::Instant
            } else {
                PeriodType::Duration
            };
            assert_eq!(metric.period_type, expected, "{}", metric.name);
            assert!(!metric.tags.is_empty());
        }
    }

    #[test]
    fn test_gaap_rules() {
        let taxonomy = Taxonomy::gaap();
        let rule = |name: &str| taxonomy.get(name).unwrap().rule;
        assert_eq!(rule(metrics::REVENUE), ValueRule::NonNegative);
        assert_eq!(rule(metrics::DILUTED_SHARES), ValueRule::Positive);
        assert_eq!(rule(metrics::CAP_EX), ValueRule::NonPositive);
        assert_eq!(rule(metrics::CASH_EQUIVALENTS), ValueRule::NonNegative);
        assert_eq!(rule(metrics::NET_INCOME), ValueRule::Numeric);
    }

    #[test]
    fn test_gaap_preferred_tags() {
        let taxonomy = Taxonomy::gaap();
        let cap_ex = taxonomy.get(metrics::CAP_EX).unwrap();
        assert_eq!(cap_ex.tags.len(), 5);
        assert_eq!(
            cap_ex.tags[0],
            "us-gaap:PaymentsToAcquirePropertyPlantAndEquipment"
        );
    }

    #[test]
    fn test_new_rejects_bad_definitions() {
        assert!(matches!(
            Taxonomy::new(vec![]),
            Err(LoadError::InvalidTaxonomy(_))
        ));

        let no_tags = MetricSpec::new(
            "revenue",
            PeriodType::Duration,
            Vec::<String>::new(),
            ValueRule::Numeric,
        );
        assert!(matches!(
            Taxonomy::new(vec![no_tags]),
            Err(LoadError::InvalidTaxonomy(_))
        ));

        let a = MetricSpec::new("revenue", PeriodType::Duration, ["a"], ValueRule::Numeric);
        assert!(matches!(
            Taxonomy::new(vec![a.clone(), a]),
            Err(LoadError::InvalidTaxonomy(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let json = Taxonomy::gaap().to_json().unwrap();
        let loaded = Taxonomy::from_json(&json).unwrap();
        assert_eq!(loaded, Taxonomy::gaap());
    }

    #[test]
    fn test_from_json_defaults_rule() {
        let json = r#"[{"name": "assets", "period_type": "instant", "tags": ["us-gaap:Assets"]}]"#;
        let taxonomy = Taxonomy::from_json(json).unwrap();
        assert_eq!(taxonomy.len(), 1);
        assert_eq!(taxonomy.metrics()[0].rule, ValueRule::Numeric);
        assert_eq!(taxonomy.metrics()[0].period_type, PeriodType::Instant);
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"[{"name": "assets", "period_type": "instant", "tags": []}]"#;
        assert!(matches!(
            Taxonomy::from_json(json),
            Err(LoadError::InvalidTaxonomy(_))
        ));
        assert!(matches!(
            Taxonomy::from_json("not json"),
            Err(LoadError::SerializationError(_))
        ));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = Taxonomy::schema_as_json().unwrap();
        assert!(schema_json.contains("period_type"));
        assert!(schema_json.contains("tags"));
        assert!(schema_json.contains("non_positive"));
    }

    #[test]
    fn test_rule_checks() {
        assert_eq!(ValueRule::Numeric.checks().len(), 1);
        assert_eq!(ValueRule::Positive.checks().len(), 2);
    }
}
