use crate::error::{FactContext, FactError, LoadError};
use crate::schema::{Cell, Column, FactRow, FactTable, PeriodType};
use log::debug;
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Reads a fact table from a CSV dump with a header row.
///
/// `concept`, `value` and `period_type` columns are required. Date columns and
/// `fact_type` may be absent, columns with other names are ignored. Empty
/// cells become [`Cell::Null`]; everything else is kept as text for the
/// validation checks to coerce.
pub fn read_facts_csv<R: io::Read>(reader: R) -> Result<FactTable, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let positions: HashMap<Column, usize> = csv_reader
        .headers()?
        .iter()
        .enumerate()
        .filter_map(|(i, name)| Column::from_name(name).map(|column| (column, i)))
        .collect();

    for required in [Column::Concept, Column::Value, Column::PeriodType] {
        if !positions.contains_key(&required) {
            return Err(FactError::missing(
                FactContext::new().column(required),
                format!("CSV header has no '{}' column", required),
            )
            .into());
        }
    }

    let mut table = FactTable::new();
    for (label, record) in csv_reader.records().enumerate() {
        let record = record?;
        let field = |column: Column| {
            positions
                .get(&column)
                .and_then(|&i| record.get(i))
                .filter(|text| !text.is_empty())
        };
        let cell = |column: Column| field(column).map_or(Cell::Null, Cell::text);

        let period_type = match field(Column::PeriodType) {
            Some(text) => PeriodType::parse(text).ok_or_else(|| {
                FactError::invalid(
                    FactContext::new().column(Column::PeriodType).rows(vec![label]),
                    format!("Unknown period type '{}'", text),
                )
            })?,
            None => {
                return Err(FactError::missing(
                    FactContext::new().column(Column::PeriodType).rows(vec![label]),
                    "Row has no period type",
                )
                .into())
            }
        };

        table.push(FactRow {
            fact_type: field(Column::FactType).map(str::to_string),
            concept: field(Column::Concept).unwrap_or_default().to_string(),
            value: cell(Column::Value),
            period_type,
            period_start: cell(Column::PeriodStart),
            period_end: cell(Column::PeriodEnd),
            period_instant: cell(Column::PeriodInstant),
        });
    }

    debug!("Read {} facts from CSV", table.len());
    Ok(table)
}

pub fn load_facts_csv<P: AsRef<Path>>(path: P) -> Result<FactTable, LoadError> {
    let file = std::fs::File::open(path)?;
    read_facts_csv(io::BufReader::new(file))
}

/// Parses a JSON array of fact rows.
pub fn facts_from_json(json: &str) -> Result<FactTable, LoadError> {
    let table: FactTable = serde_json::from_str(json)?;
    debug!("Read {} facts from JSON", table.len());
    Ok(table)
}
