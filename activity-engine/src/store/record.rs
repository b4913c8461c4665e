//! Per-client value records

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::{Activity, FieldId};

/// Values of one period of a client record
///
/// `raw` holds user input (and carried values), `computed` the last engine
/// output. `computed` is kept for history only and is never read back as a
/// source for recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeriodValues {
    /// 1-based period index
    pub period: u32,
    #[serde(default)]
    pub raw: BTreeMap<FieldId, String>,
    #[serde(default)]
    pub computed: BTreeMap<FieldId, String>,
    /// Raw values written by carry-over and not edited since
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub carried: BTreeSet<FieldId>,
}

impl PeriodValues {
    pub fn new(period: u32) -> Self {
        PeriodValues {
            period,
            ..Default::default()
        }
    }

    /// Raw value, `None` when absent or blank
    pub fn raw(&self, field: &FieldId) -> Option<&str> {
        self.raw
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn computed(&self, field: &FieldId) -> Option<&str> {
        self.computed.get(field).map(String::as_str)
    }

    /// Record a user edit; a blank value clears the field
    pub fn set_raw(&mut self, field: FieldId, value: impl Into<String>) {
        let value = value.into();
        self.carried.remove(&field);
        if value.trim().is_empty() {
            self.raw.remove(&field);
        } else {
            self.raw.insert(field, value);
        }
    }

    /// Write a value produced by carry-over
    pub fn set_carried(&mut self, field: FieldId, value: String) {
        self.carried.insert(field.clone());
        self.raw.insert(field, value);
    }

    pub fn is_carried(&self, field: &FieldId) -> bool {
        self.carried.contains(field)
    }
}

/// Identity of a client record in a value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub client_id: i64,
    pub activity_id: i64,
    /// `None` for plain activities
    pub fiscal_year: Option<i32>,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fiscal_year {
            Some(year) => write!(f, "client {} / activity {} / {}", self.client_id, self.activity_id, year),
            None => write!(f, "client {} / activity {}", self.client_id, self.activity_id),
        }
    }
}

/// All values of a client for one activity (and fiscal year)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: i64,
    pub activity_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    /// Bumped by the store on every successful save
    #[serde(default)]
    pub version: u64,
    /// One entry per period, ascending
    #[serde(default)]
    pub periods: Vec<PeriodValues>,
}

impl ClientRecord {
    /// Empty record with one entry per period of `activity`
    pub fn enroll(key: RecordKey, activity: &Activity) -> Self {
        ClientRecord {
            client_id: key.client_id,
            activity_id: key.activity_id,
            fiscal_year: key.fiscal_year,
            version: 0,
            periods: (1..=activity.period_count()).map(PeriodValues::new).collect(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            client_id: self.client_id,
            activity_id: self.activity_id,
            fiscal_year: self.fiscal_year,
        }
    }

    pub fn period(&self, period: u32) -> Option<&PeriodValues> {
        self.periods.iter().find(|p| p.period == period)
    }

    /// Period entry, created in order when missing
    pub fn period_mut(&mut self, period: u32) -> &mut PeriodValues {
        let index = match self.periods.iter().position(|p| p.period >= period) {
            Some(i) if self.periods[i].period == period => i,
            Some(i) => {
                self.periods.insert(i, PeriodValues::new(period));
                i
            }
            None => {
                self.periods.push(PeriodValues::new(period));
                self.periods.len() - 1
            }
        };
        &mut self.periods[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(name: &str) -> FieldId {
        FieldId::parse(name).unwrap()
    }

    #[test]
    fn test_user_edit_clears_carried_mark() {
        let mut values = PeriodValues::new(2);
        values.set_carried(id("Credito_Prec"), "100".into());
        assert!(values.is_carried(&id("credito_prec")));

        values.set_raw(id("CREDITO_PREC"), "80");
        assert!(!values.is_carried(&id("Credito_Prec")));
        assert_eq!(values.raw(&id("Credito_Prec")), Some("80"));

        values.set_raw(id("Credito_Prec"), " ");
        assert_eq!(values.raw(&id("Credito_Prec")), None);
    }

    #[test]
    fn test_period_mut_keeps_order() {
        let mut record: ClientRecord = serde_json::from_value(json!({
            "client_id": 1,
            "activity_id": 2,
            "periods": [{"period": 3}]
        }))
        .unwrap();
        record.period_mut(1).set_raw(id("A"), "1");
        record.period_mut(5);
        record.period_mut(3).set_raw(id("A"), "3");

        let order: Vec<u32> = record.periods.iter().map(|p| p.period).collect();
        assert_eq!(order, vec![1, 3, 5]);
        assert_eq!(record.period(3).unwrap().raw(&id("a")), Some("3"));
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_serde_shape() {
        let mut values = PeriodValues::new(1);
        values.set_raw(id("Versato"), "10,50");
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(
            json,
            json!({"period": 1, "raw": {"Versato": "10,50"}, "computed": {}})
        );
    }
}
