//! Declarative row filters.
//!
//! Every present criterion must hold for a row to survive. Set criteria use
//! exact string match on the rendered cell; rent bounds are inclusive.

use crate::model::{Table, Value};
use serde::{Deserialize, Serialize};

/// Column the rent bounds apply to.
pub const RENT_COLUMN: &str = "asking_monthly_rent";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_class: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent_min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent_max: Option<f64>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.building_class.is_none()
            && self.monthly_rent_min.is_none()
            && self.monthly_rent_max.is_none()
    }

    /// JSON rendering used in the report summary.
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A criterion resolved against the table's columns.
enum Predicate<'a> {
    OneOf(Option<usize>, &'a [String]),
    Range(Option<usize>, Option<f64>, Option<f64>),
}

impl Predicate<'_> {
    fn holds(&self, row: &[Value]) -> bool {
        match self {
            // A criterion on a missing column cannot be satisfied.
            Predicate::OneOf(None, _) | Predicate::Range(None, _, _) => false,
            Predicate::OneOf(Some(idx), allowed) => {
                allowed.iter().any(|a| row[*idx].matches_str(a))
            }
            Predicate::Range(Some(idx), min, max) => match row[*idx].as_f64() {
                Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
                None => false,
            },
        }
    }
}

/// Applies `spec` to `table`. Returns the surviving rows and how many were
/// excluded.
pub fn apply_filters(mut table: Table, spec: &FilterSpec) -> (Table, usize) {
    if spec.is_empty() {
        return (table, 0);
    }

    let mut predicates = Vec::new();
    if let Some(cities) = &spec.city {
        predicates.push(Predicate::OneOf(table.column_index("city"), cities));
    }
    if let Some(classes) = &spec.building_class {
        predicates.push(Predicate::OneOf(table.column_index("building_class"), classes));
    }
    if spec.monthly_rent_min.is_some() || spec.monthly_rent_max.is_some() {
        predicates.push(Predicate::Range(
            table.column_index(RENT_COLUMN),
            spec.monthly_rent_min,
            spec.monthly_rent_max,
        ));
    }

    let before = table.row_count();
    table.retain_rows(|row| predicates.iter().all(|p| p.holds(row)));
    let excluded = before - table.row_count();
    (table, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::from_rows(
            vec![
                "address".to_string(),
                "city".to_string(),
                "building_class".to_string(),
                "asking_monthly_rent".to_string(),
            ],
            vec![
                vec!["1 A St".into(), "Austin".into(), "A".into(), Value::Int(1500)],
                vec!["2 B St".into(), "Dallas".into(), "B".into(), Value::Float(999.5)],
                vec!["3 C St".into(), "Austin".into(), "B".into(), "2000.00".into()],
                vec!["4 D St".into(), "austin".into(), "A".into(), "N/A".into()],
            ],
        )
    }

    #[test]
    fn test_empty_spec_is_identity() {
        let original = table();
        let (out, excluded) = apply_filters(original.clone(), &FilterSpec::default());
        assert_eq!(out, original);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn test_set_membership_is_exact() {
        let spec = FilterSpec {
            city: Some(vec!["Austin".to_string()]),
            ..Default::default()
        };
        let (out, excluded) = apply_filters(table(), &spec);
        assert_eq!(out.row_count(), 2);
        assert_eq!(excluded, 2);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let spec = FilterSpec {
            city: Some(vec!["Austin".to_string(), "Dallas".to_string()]),
            building_class: Some(vec!["B".to_string()]),
            monthly_rent_min: Some(1000.0),
            ..Default::default()
        };
        let (out, _) = apply_filters(table(), &spec);
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.get(0, "address"), Some(&Value::text("3 C St")));
    }

    #[test]
    fn test_rent_bounds_inclusive_and_non_numeric_excluded() {
        let spec = FilterSpec {
            monthly_rent_min: Some(1500.0),
            monthly_rent_max: Some(2000.0),
            ..Default::default()
        };
        let (out, excluded) = apply_filters(table(), &spec);
        assert_eq!(out.row_count(), 2);
        assert_eq!(excluded, 2);
    }

    #[test]
    fn test_criterion_on_missing_column_excludes_all() {
        let t = Table::from_rows(vec!["address".to_string()], vec![vec!["1 A St".into()]]);
        let spec = FilterSpec {
            building_class: Some(vec!["A".to_string()]),
            ..Default::default()
        };
        let (out, excluded) = apply_filters(t, &spec);
        assert!(out.is_empty());
        assert_eq!(excluded, 1);
    }

    #[test]
    fn test_describe_serializes_present_keys() {
        let spec = FilterSpec {
            city: Some(vec!["Reno".to_string()]),
            monthly_rent_max: Some(3000.0),
            ..Default::default()
        };
        assert_eq!(spec.describe(), r#"{"city":["Reno"],"monthly_rent_max":3000.0}"#);
        assert_eq!(FilterSpec::default().describe(), "{}");
    }
}
