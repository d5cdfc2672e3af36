//! PDF surveys with labeled fields.
//!
//! Every page is treated as an independent block of text and parsed with a
//! [`FieldMapping`]; one row per page that yields text.
//!
//! Page text is rebuilt from the content stream so that line moves inside a
//! text object (`Td`, `TD`, `T*`, `'`, `"`) become line breaks. Labels
//! therefore never run into the previous field's value.

use super::fields::FieldMapping;
use crate::model::{ExtractionMethod, Table};
use crate::traits::{extension_of, Extraction, ExtractionError, SurveyFormat};
use lopdf::{Document, Encoding, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// TJ adjustments below this (thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: i64 = -100;

fn push_line_break(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

fn collect_text(text: &mut String, encoding: &Encoding, operands: &[Object]) -> lopdf::Result<()> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&Document::decode_text(encoding, bytes)?),
            Object::Array(items) => collect_text(text, encoding, items)?,
            Object::Integer(i) if *i < TJ_SPACE_THRESHOLD => text.push(' '),
            Object::Real(r) if (*r as i64) < TJ_SPACE_THRESHOLD => text.push(' '),
            _ => {}
        }
    }
    Ok(())
}

/// Text of one page, one output line per text line on the page.
fn page_text(document: &Document, page_id: ObjectId) -> lopdf::Result<String> {
    let encodings = document
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, font)| font.get_font_encoding(document).map(|enc| (name, enc)))
        .collect::<lopdf::Result<BTreeMap<Vec<u8>, Encoding>>>()?;
    let content = document.get_and_decode_page_content(page_id)?;

    let mut text = String::new();
    let mut encoding: Option<&Encoding> = None;
    for operation in &content.operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "Tf" => {
                encoding = operands
                    .first()
                    .and_then(|font| font.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            "Td" | "TD" => {
                // A purely horizontal move stays on the same line.
                let dy = operands.get(1).and_then(|o| o.as_float().ok()).unwrap_or(0.0);
                if dy != 0.0 {
                    push_line_break(&mut text);
                } else if !text.is_empty() && !text.ends_with(|c: char| c == '\n' || c == ' ') {
                    text.push(' ');
                }
            }
            "T*" | "ET" => push_line_break(&mut text),
            "Tj" | "TJ" | "'" | "\"" => {
                if matches!(operation.operator.as_str(), "'" | "\"") {
                    push_line_break(&mut text);
                }
                // `"` carries word and char spacing ahead of the string.
                let shown = if operation.operator == "\"" {
                    operands.last().map(std::slice::from_ref).unwrap_or_default()
                } else {
                    operands
                };
                match encoding {
                    Some(encoding) => collect_text(&mut text, encoding, shown)?,
                    None => debug!(operator = %operation.operator, "Text shown without a font"),
                }
            }
            _ => {}
        }
    }

    Ok(text)
}

#[derive(Debug, Clone)]
pub struct PdfFieldExtractor {
    mapping: FieldMapping,
}

impl PdfFieldExtractor {
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping }
    }

    /// Extractor using the standard survey field mapping.
    pub fn survey() -> Result<Self, ExtractionError> {
        Ok(Self::new(FieldMapping::survey()?))
    }

    /// Builds the table from `(page_number, text)` pairs, pages 1-indexed.
    ///
    /// Pages whose text is missing or blank produce no row and are returned
    /// in the skipped list.
    pub fn parse_pages<I>(&self, pages: I) -> (Table, Vec<usize>)
    where
        I: IntoIterator<Item = (usize, Option<String>)>,
    {
        let mut table = Table::new(self.mapping.columns());
        let mut skipped = Vec::new();

        for (page, text) in pages {
            match text {
                Some(text) if !text.trim().is_empty() => {
                    table.push_row(self.mapping.parse_page(&text, page));
                }
                _ => skipped.push(page),
            }
        }

        (table, skipped)
    }
}

impl SurveyFormat for PdfFieldExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Pdf
    }

    fn can_handle(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| ext == "pdf")
    }

    fn extract(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let document = Document::load(path).map_err(|e| ExtractionError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // Page numbers from lopdf are 1-indexed and ordered.
        let pages = document.get_pages().into_iter().map(|(page_num, page_id)| {
            let text = match page_text(&document, page_id) {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!(page = page_num, error = %e, "Text extraction failed for page");
                    None
                }
            };
            (page_num as usize, text)
        });

        let (table, skipped_pages) = self.parse_pages(pages);
        if table.is_empty() {
            warn!(path = %path.display(), "No data extracted from PDF");
        }

        Ok(Extraction::Table {
            table,
            skipped_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    /// One text object: the font, a starting position, then each line
    /// advanced with `T*`.
    fn text_lines(lines: &[&str]) -> Vec<Operation> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));
        operations
    }

    fn write_pdf(path: &Path, pages: Vec<Vec<Operation>>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_extract_reads_pdf_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.pdf");
        write_pdf(
            &path,
            vec![
                text_lines(&["Address: 123 Main St", "City: Austin", "ZIP Code: 78701"]),
                text_lines(&[]),
                text_lines(&["Address: 9 Ninth St", "Building Class: A"]),
            ],
        );

        let extractor = PdfFieldExtractor::survey().unwrap();
        let Extraction::Table {
            table,
            skipped_pages,
        } = extractor.extract(&path).unwrap()
        else {
            panic!("expected a table");
        };

        assert_eq!(table.row_count(), 2);
        assert_eq!(skipped_pages, vec![2]);
        assert_eq!(table.get(0, "address"), Some(&Value::text("123 Main St")));
        assert_eq!(table.get(0, "city"), Some(&Value::text("Austin")));
        assert_eq!(table.get(0, "zip_code"), Some(&Value::text("78701")));
        assert_eq!(table.get(0, "source_page"), Some(&Value::Int(1)));
        assert_eq!(table.get(1, "address"), Some(&Value::text("9 Ninth St")));
        assert_eq!(table.get(1, "building_class"), Some(&Value::text("A")));
        assert_eq!(table.get(1, "city"), Some(&Value::text("N/A")));
        assert_eq!(table.get(1, "source_page"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_page_text_breaks_lines_on_text_moves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.pdf");
        write_pdf(
            &path,
            vec![vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("TL", vec![14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal("Address:")]),
                Operation::new("Td", vec![80.into(), 0.into()]),
                Operation::new("Tj", vec![Object::string_literal("1 First Ave")]),
                Operation::new("Td", vec![(-80).into(), (-14).into()]),
                Operation::new(
                    "TJ",
                    vec![Object::Array(vec![
                        Object::string_literal("City:"),
                        (-250).into(),
                        Object::string_literal("Reno"),
                    ])],
                ),
                Operation::new("'", vec![Object::string_literal("ZIP Code: 89501")]),
                Operation::new("ET", vec![]),
            ]],
        );

        let doc = Document::load(&path).unwrap();
        let page_id = doc.get_pages()[&1];
        let text = page_text(&doc, page_id).unwrap();

        assert_eq!(text, "Address: 1 First Ave\nCity: Reno\nZIP Code: 89501\n");
    }

    #[test]
    fn test_one_row_per_page_with_text() {
        let extractor = PdfFieldExtractor::survey().unwrap();
        let pages = vec![
            (1, Some("Address: 1 First Ave\nCity: Reno".to_string())),
            (2, None),
            (3, Some("   \n ".to_string())),
            (4, Some("Address: 4 Fourth Ave".to_string())),
        ];

        let (table, skipped) = extractor.parse_pages(pages);

        assert_eq!(table.row_count(), 2);
        assert_eq!(skipped, vec![2, 3]);
        assert_eq!(table.get(0, "source_page"), Some(&Value::Int(1)));
        assert_eq!(table.get(1, "source_page"), Some(&Value::Int(4)));
        assert_eq!(table.get(1, "address"), Some(&Value::text("4 Fourth Ave")));
    }

    #[test]
    fn test_fields_do_not_carry_across_pages() {
        let extractor = PdfFieldExtractor::survey().unwrap();
        let pages = vec![
            (1, Some("City: Reno".to_string())),
            (2, Some("Address: 2 Second St".to_string())),
        ];

        let (table, _) = extractor.parse_pages(pages);
        assert_eq!(table.get(1, "city"), Some(&Value::text("N/A")));
        assert_eq!(table.get(0, "address"), Some(&Value::text("N/A")));
    }

    #[test]
    fn test_all_pages_blank_is_empty_table() {
        let extractor = PdfFieldExtractor::survey().unwrap();
        let (table, skipped) = extractor.parse_pages(vec![(1, None), (2, None)]);

        assert!(table.is_empty());
        assert_eq!(skipped, vec![1, 2]);
    }

    #[test]
    fn test_unreadable_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let extractor = PdfFieldExtractor::survey().unwrap();
        assert!(matches!(
            extractor.extract(&path),
            Err(ExtractionError::Open { .. })
        ));
    }
}
