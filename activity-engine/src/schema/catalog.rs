//! Catalog of activity schemas
//!
//! The catalog is an in-memory snapshot supplied by the persistence layer.
//! It can also be read from TOML or JSON documents shaped like:
//!
//! ```toml
//! [[activities]]
//! id = 1
//! name = "Crediti IVA"
//!
//! [activities.layout]
//! kind = "periodic"
//! name = "Monthly"
//! period_count = 12
//! period_labels = ["January", "..."]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Activity, SchemaIssue};

/// Error when loading a catalog document
#[derive(Debug)]
pub enum CatalogError {
    Toml(toml::de::Error),
    Json(serde_json::Error),
    DuplicateId { id: i64 },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Toml(e) => write!(f, "invalid TOML schema: {}", e),
            CatalogError::Json(e) => write!(f, "invalid JSON schema: {}", e),
            CatalogError::DuplicateId { id } => write!(f, "activity id {} is defined twice", id),
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    activities: Vec<Activity>,
}

/// Activities keyed by id
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    activities: BTreeMap<i64, Activity>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate ids
    pub fn from_activities(activities: Vec<Activity>) -> Result<Self, CatalogError> {
        let mut catalog = SchemaCatalog::new();
        for activity in activities {
            if catalog.activities.contains_key(&activity.id) {
                return Err(CatalogError::DuplicateId { id: activity.id });
            }
            catalog.activities.insert(activity.id, activity);
        }
        Ok(catalog)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = toml::from_str(input).map_err(CatalogError::Toml)?;
        Self::from_activities(doc.activities)
    }

    pub fn from_json_str(input: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(input).map_err(CatalogError::Json)?;
        Self::from_activities(doc.activities)
    }

    /// Serialize the catalog back to TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        let doc = CatalogDocument {
            activities: self.activities.values().cloned().collect(),
        };
        toml::to_string_pretty(&doc)
    }

    /// Insert or replace an activity, returning the previous definition
    pub fn upsert(&mut self, activity: Activity) -> Option<Activity> {
        self.activities.insert(activity.id, activity)
    }

    pub fn get(&self, id: i64) -> Option<&Activity> {
        self.activities.get(&id)
    }

    /// Look up by case-insensitive name
    pub fn by_name(&self, name: &str) -> Option<&Activity> {
        let name = name.trim().to_lowercase();
        self.activities
            .values()
            .find(|a| a.name.to_lowercase() == name)
    }

    /// Look up by numeric id or, failing that, by name
    pub fn find(&self, id_or_name: &str) -> Option<&Activity> {
        id_or_name
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|id| self.get(id))
            .or_else(|| self.by_name(id_or_name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Validate every activity, pairing each issue with its activity
    pub fn validate(&self) -> Vec<(&Activity, SchemaIssue)> {
        self.activities
            .values()
            .flat_map(|activity| {
                activity
                    .validate()
                    .into_iter()
                    .map(move |issue| (activity, issue))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActivityLayout, CarryCondition, DataType, RuleScope};

    const DEMO_SCHEMA: &str = include_str!("../../../demos/schema.toml");

    #[test]
    fn test_load_demo_schema() {
        let catalog = SchemaCatalog::from_toml_str(DEMO_SCHEMA).unwrap();
        assert_eq!(catalog.len(), 2);

        let vat = catalog.find("crediti iva").unwrap();
        assert!(vat.is_periodic());
        assert_eq!(vat.period_count(), 12);
        assert_eq!(vat.carry_over_rules()[0].condition, CarryCondition::IfPositive);
        assert!(vat.color_rules().iter().any(|r| r.scope == RuleScope::Row));

        let registry = catalog.find("2").unwrap();
        assert!(!registry.is_periodic());

        let issues = catalog.validate();
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_load_json_catalog() {
        let json = serde_json::json!({
            "activities": [{
                "id": 5,
                "name": "Anagrafica",
                "layout": {
                    "kind": "plain",
                    "fields": [
                        { "name": "Ragione_Sociale", "data_type": "text", "is_required": true },
                        { "name": "Dipendenti", "data_type": "number" }
                    ]
                }
            }]
        });
        let catalog = SchemaCatalog::from_json_str(&json.to_string()).unwrap();
        let activity = catalog.get(5).unwrap();
        match &activity.layout {
            ActivityLayout::Plain { fields, .. } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].data_type, DataType::Number);
            }
            _ => panic!("expected plain layout"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let a = Activity::plain(1, "A", vec![]);
        let b = Activity::plain(1, "B", vec![]);
        assert!(matches!(
            SchemaCatalog::from_activities(vec![a, b]),
            Err(CatalogError::DuplicateId { id: 1 })
        ));
    }

    #[test]
    fn test_toml_round_trip_keeps_activities() {
        let catalog = SchemaCatalog::from_toml_str(DEMO_SCHEMA).unwrap();
        let text = catalog.to_toml_string().unwrap();
        let again = SchemaCatalog::from_toml_str(&text).unwrap();
        assert_eq!(again.get(1), catalog.get(1));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut catalog = SchemaCatalog::new();
        assert!(catalog.upsert(Activity::plain(1, "A", vec![])).is_none());
        let previous = catalog.upsert(Activity::plain(1, "A2", vec![])).unwrap();
        assert_eq!(previous.name, "A");
        assert_eq!(catalog.find("a2").unwrap().id, 1);
        assert!(catalog.find("missing").is_none());
    }
}
