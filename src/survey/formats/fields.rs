//! Declarative label → field mapping for free-text surveys.
//!
//! Each entry names an output field, the literal label that precedes its
//! value on the page and the shape of the value. Entries are applied in
//! order and every field is always emitted, with [`NOT_AVAILABLE`] standing
//! in for labels that are not found.

use crate::model::{Value, NOT_AVAILABLE};
use crate::traits::ExtractionError;
use regex::Regex;

/// Shape of the value captured after a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Rest of the line.
    Text,
    /// Digits only.
    Integer,
    /// Digits with a decimal point.
    Decimal,
    /// No label; always [`NOT_AVAILABLE`].
    Placeholder,
}

impl FieldKind {
    fn capture(self) -> &'static str {
        match self {
            FieldKind::Text => r"(.+)",
            FieldKind::Integer => r"(\d+)",
            FieldKind::Decimal => r"(\d+\.\d+)",
            FieldKind::Placeholder => "",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn spec(field: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { field, label, kind }
}

/// The labeled-field survey template.
pub const SURVEY_FIELDS: &[FieldSpec] = &[
    spec("building_photo", "", FieldKind::Placeholder),
    spec("address", "Address:", FieldKind::Text),
    spec("property_name", "Property Name:", FieldKind::Text),
    spec("city", "City:", FieldKind::Text),
    spec("zip_code", "ZIP Code:", FieldKind::Integer),
    spec("total_building_sf", "Total Building SF:", FieldKind::Integer),
    spec("sf_available", "SF Available:", FieldKind::Integer),
    spec("monthly_asking_rent", "Monthly Asking Rent $/SF:", FieldKind::Decimal),
    spec("monthly_operating_expenses", "Monthly Operating Expenses:", FieldKind::Decimal),
    spec("monthly_asking_gross", "Monthly Asking Gross $/SF:", FieldKind::Decimal),
    spec("annual_asking_gross", "Annual Asking Gross $/SF:", FieldKind::Decimal),
    spec("asking_monthly_rent", "Asking Monthly Rent:", FieldKind::Decimal),
    spec("asking_annual_rent", "Asking Annual Rent:", FieldKind::Decimal),
    spec("rent_type", "Rent Type:", FieldKind::Text),
    spec("parking_ratio", "Parking Ratio / 1,000 SF:", FieldKind::Decimal),
    spec("tia", "TIA ($/SF/Yr):", FieldKind::Decimal),
    spec("total_parking_spaces", "Total # of Parking Spaces:", FieldKind::Integer),
    spec("building_class", "Building Class:", FieldKind::Text),
    spec("year_built", "Year Built:", FieldKind::Integer),
    spec("notes", "Notes:", FieldKind::Text),
];

/// Provenance column appended to every parsed row.
pub const SOURCE_PAGE: &str = "source_page";

#[derive(Debug, Clone)]
struct CompiledField {
    field: String,
    pattern: Option<Regex>,
}

/// A compiled, ordered field mapping.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    fields: Vec<CompiledField>,
}

impl FieldMapping {
    /// Compiles `specs` into anchored patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Pattern`] if a label produces an invalid
    /// regular expression.
    pub fn compile(specs: &[FieldSpec]) -> Result<Self, ExtractionError> {
        let fields = specs
            .iter()
            .map(|s| -> Result<CompiledField, ExtractionError> {
                let pattern = match s.kind {
                    FieldKind::Placeholder => None,
                    kind => {
                        let source = format!(r"{}\s*{}", regex::escape(s.label), kind.capture());
                        Some(Regex::new(&source).map_err(|e| ExtractionError::Pattern {
                            field: s.field.to_string(),
                            source: e,
                        })?)
                    }
                };
                Ok(CompiledField {
                    field: s.field.to_string(),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields })
    }

    /// Mapping for the standard survey template.
    pub fn survey() -> Result<Self, ExtractionError> {
        Self::compile(SURVEY_FIELDS)
    }

    /// Output columns: every mapped field, then `source_page`.
    pub fn columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.field.clone())
            .chain(std::iter::once(SOURCE_PAGE.to_string()))
            .collect()
    }

    /// Parses one page of text into a row aligned with [`Self::columns`].
    pub fn parse_page(&self, text: &str, page: usize) -> Vec<Value> {
        self.fields
            .iter()
            .map(|f| {
                f.pattern
                    .as_ref()
                    .and_then(|re| re.captures(text))
                    .and_then(|caps| caps.get(1))
                    .map(|m| Value::text(m.as_str().trim()))
                    .unwrap_or_else(|| Value::text(NOT_AVAILABLE))
            })
            .chain(std::iter::once(Value::Int(page as i64)))
            .collect()
    }
}
