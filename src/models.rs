use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque match identifier taken from the listing page DOM ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        MatchId(id.to_string())
    }
}

/// A league season to crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub country: String,
    pub division: String,
    pub season: String,
}

impl League {
    pub fn new(country: &str, division: &str, season: &str) -> Self {
        Self {
            country: country.to_string(),
            division: division.to_string(),
            season: season.to_string(),
        }
    }

    /// Path segment of the results listing, e.g. `england/premier-league-2022-2023`
    pub fn listing_path(&self) -> String {
        format!(
            "{}/{}-{}",
            self.country.to_lowercase(),
            self.division.replace(' ', "-").to_lowercase(),
            self.season
        )
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.country, self.division, self.season)
    }
}

/// A single extracted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Fields collected for one match, in the order they were extracted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub id: MatchId,
    fields: Vec<(String, FieldValue)>,
}

impl MatchRecord {
    pub fn new(id: MatchId) -> Self {
        Self {
            id,
            fields: Vec::new(),
        }
    }

    /// Sets a field, replacing any earlier value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_path_lowercases_and_hyphenates() {
        let league = League::new("England", "Premier League", "2022-2023");
        assert_eq!(league.listing_path(), "england/premier-league-2022-2023");
    }

    #[test]
    fn test_record_insert_replaces_existing_field() {
        let mut record = MatchRecord::new(MatchId::from("abc"));
        record.insert("home_goals", 1i64);
        record.insert("away_goals", 0i64);
        record.insert("home_goals", 2i64);

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("home_goals"), Some(&FieldValue::Integer(2)));
        let names: Vec<&str> = record.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["home_goals", "away_goals"]);
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            FieldValue::from(3i64),
            FieldValue::from(1.5),
            FieldValue::from("Arsenal"),
        ])
        .unwrap();
        assert_eq!(json, r#"[3,1.5,"Arsenal"]"#);
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Float(0.5).to_string(), "0.5");
        assert_eq!(FieldValue::Integer(4).to_string(), "4");
        assert_eq!(FieldValue::Text("12.08. 13:30".to_string()).to_string(), "12.08. 13:30");
    }
}
