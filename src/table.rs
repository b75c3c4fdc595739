use crate::models::{FieldValue, MatchId, MatchRecord};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

pub const ID_COLUMN: &str = "match_id";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub id: MatchId,
    pub cells: HashMap<String, FieldValue>,
}

/// One row per extracted match; columns are the union of every field seen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
}

/// Builds the table from match records. Rows keep record order and are not deduplicated;
/// columns appear in first-seen order.
pub fn aggregate(records: &[MatchRecord]) -> ResultTable {
    let mut columns = Vec::new();
    let mut known = HashSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let mut cells = HashMap::with_capacity(record.len());
        for (name, value) in record.fields() {
            if known.insert(name.to_string()) {
                columns.push(name.to_string());
            }
            cells.insert(name.to_string(), value.clone());
        }
        rows.push(ResultRow {
            id: record.id.clone(),
            cells,
        });
    }

    ResultTable { columns, rows }
}

impl ResultTable {
    /// Field columns, without the leading id column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: &MatchId) -> Option<&ResultRow> {
        self.rows.iter().find(|row| &row.id == id)
    }

    pub fn get(&self, id: &MatchId, column: &str) -> Option<&FieldValue> {
        self.row(id).and_then(|row| row.cells.get(column))
    }

    /// Header `match_id` plus every column; missing cells are empty
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec![ID_COLUMN];
        header.extend(self.columns.iter().map(String::as_str));
        csv.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.id.to_string()];
            record.extend(self.columns.iter().map(|column| {
                row.cells
                    .get(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }));
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }

    /// Array of objects; missing cells are `null`
    pub fn to_json(&self) -> Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                object.insert(ID_COLUMN.to_string(), Value::String(row.id.to_string()));
                for column in &self.columns {
                    let value = row
                        .cells
                        .get(column)
                        .and_then(|value| serde_json::to_value(value).ok())
                        .unwrap_or(Value::Null);
                    object.insert(column.clone(), value);
                }
                Value::Object(object)
            })
            .collect();
        Value::Array(rows)
    }

    /// Writes JSON for a `.json` path, CSV otherwise
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let content = serde_json::to_string_pretty(&self.to_json())?;
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        } else {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            self.write_csv(file)?;
        }

        tracing::info!("Saved {} rows to {}", self.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, fields: &[(&str, FieldValue)]) -> MatchRecord {
        let mut record = MatchRecord::new(MatchId::from(id));
        for (name, value) in fields {
            record.insert(*name, value.clone());
        }
        record
    }

    fn sample_records() -> Vec<MatchRecord> {
        vec![
            record(
                "101",
                &[
                    ("home_team", FieldValue::from("Arsenal")),
                    ("home_goals", FieldValue::from(2i64)),
                    ("odds_H", FieldValue::from(1.5)),
                ],
            ),
            record(
                "102",
                &[
                    ("home_team", FieldValue::from("Everton")),
                    ("coach_home", FieldValue::from("Dyche S.")),
                ],
            ),
            record("103", &[]),
        ]
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let table = aggregate(&sample_records());
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.columns(),
            &["home_team", "home_goals", "odds_H", "coach_home"]
        );
        assert_eq!(table.get(&MatchId::from("102"), "odds_H"), None);
        assert_eq!(
            table.get(&MatchId::from("102"), "coach_home"),
            Some(&FieldValue::from("Dyche S."))
        );
        assert!(table.row(&MatchId::from("103")).unwrap().cells.is_empty());
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = sample_records();
        assert_eq!(aggregate(&records), aggregate(&records));
    }

    #[test]
    fn test_repeated_ids_give_separate_rows() {
        let records = vec![
            record("101", &[("home_goals", FieldValue::from(1i64))]),
            record("101", &[("home_goals", FieldValue::from(1i64))]),
        ];
        assert_eq!(aggregate(&records).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let table = aggregate(&[]);
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn test_write_csv_leaves_missing_cells_empty() {
        let table = aggregate(&sample_records());
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let csv = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "match_id,home_team,home_goals,odds_H,coach_home");
        assert_eq!(lines[1], "101,Arsenal,2,1.5,");
        assert_eq!(lines[2], "102,Everton,,,Dyche S.");
        assert_eq!(lines[3], "103,,,,");
    }

    #[test]
    fn test_to_json_uses_null_for_missing_cells() {
        let json = aggregate(&sample_records()).to_json();
        assert_eq!(json[0]["match_id"], "101");
        assert_eq!(json[0]["home_goals"], 2);
        assert_eq!(json[0]["odds_H"], 1.5);
        assert!(json[1]["odds_H"].is_null());
        assert_eq!(json[2]["home_team"], Value::Null);
    }

    #[test]
    fn test_save_picks_format_from_extension() {
        let dir = std::env::temp_dir().join(format!("matchcrawler-{}", uuid::Uuid::new_v4()));
        let table = aggregate(&sample_records());

        let csv_path = dir.join("results.csv");
        table.save(&csv_path).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("match_id,"));

        let json_path = dir.join("results.json");
        table.save(&json_path).unwrap();
        let json: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
