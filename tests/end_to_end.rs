use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use survey_consolidator::survey::{FileStatus, PipelineError, SurveyPipeline};
use survey_consolidator::{Config, PipelineEvent, RecordingObserver, SkipReason};

fn write_survey(path: &Path, header: &[&str], rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (c, label) in header.iter().enumerate() {
        sheet.write_string(0, c as u16, *label).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            sheet.write_string(r as u32 + 1, c as u16, *cell).unwrap();
        }
    }
    workbook.save(path).unwrap();
}

fn config_for(root: &Path) -> Arc<Config> {
    Arc::new(Config {
        photo_folder: root.join("photos"),
        output_folder: root.to_path_buf(),
        ..Config::default()
    })
}

fn read_properties(path: &Path) -> Vec<Vec<Data>> {
    let mut workbook = open_workbook_auto(path).unwrap();
    let range = workbook.worksheet_range("Properties").unwrap();
    range.rows().map(|r| r.to_vec()).collect()
}

fn column(rows: &[Vec<Data>], name: &str) -> Vec<Data> {
    let idx = rows[0]
        .iter()
        .position(|c| *c == Data::String(name.to_string()))
        .unwrap_or_else(|| panic!("column {} missing", name));
    rows[1..].iter().map(|r| r[idx].clone()).collect()
}

#[test]
fn disjoint_surveys_keep_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let header = ["Address", "City", "Building Class"];
    let mut inputs = Vec::new();
    for (i, count) in [2usize, 1, 3].iter().enumerate() {
        let path = dir.path().join(format!("survey{}.xlsx", i));
        let rows: Vec<Vec<String>> = (0..*count)
            .map(|n| vec![format!("{} Street {}", n, i), "Reno".to_string(), "A".to_string()])
            .collect();
        let rows: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        write_survey(&path, &header, &rows);
        inputs.push(path);
    }
    let output = dir.path().join("out.xlsx");

    let pipeline = SurveyPipeline::new(config_for(dir.path())).unwrap();
    let report = pipeline.run(&inputs, &output).unwrap();

    assert_eq!(report.summary.total_rows, 6);
    assert_eq!(read_properties(&output).len(), 7);
}

#[test]
fn duplicate_address_keeps_first_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.xlsx");
    let second = dir.path().join("second.xlsx");
    write_survey(&first, &["Address", "City"], &[vec!["123 Main St", "Austin"]]);
    write_survey(&second, &["address", "city"], &[vec!["123 Main St", "Dallas"]]);
    let output = dir.path().join("out.xlsx");

    let pipeline = SurveyPipeline::new(config_for(dir.path())).unwrap();
    pipeline.run(&[first, second], &output).unwrap();

    let rows = read_properties(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(column(&rows, "city"), vec![Data::String("Austin".to_string())]);
}

#[test]
fn missing_building_class_is_backfilled_with_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.xlsx");
    write_survey(
        &input,
        &["Address", "City"],
        &[vec!["1 A St", "Reno"], vec!["2 B St", "Elko"]],
    );
    let output = dir.path().join("out.xlsx");

    let pipeline = SurveyPipeline::new(config_for(dir.path())).unwrap();
    pipeline.run(&[input], &output).unwrap();

    let rows = read_properties(&output);
    let classes = column(&rows, "building_class");
    assert_eq!(classes.len(), 2);
    assert!(classes.iter().all(|c| *c == Data::String("Unknown".to_string())));
}

#[test]
fn unsupported_batch_is_a_failure_with_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.xlsx");
    let observer = Arc::new(RecordingObserver::new());

    let pipeline = SurveyPipeline::new(config_for(dir.path()))
        .unwrap()
        .with_observer(observer.clone());
    let inputs: Vec<PathBuf> = vec!["a.docx".into(), "b.csv".into()];
    let err = pipeline.run(&inputs, &output).unwrap_err();

    assert!(matches!(err, PipelineError::NoValidData { files: 2 }));
    assert!(!output.exists());
    assert!(observer.events().contains(&PipelineEvent::NoValidData));
}

#[test]
fn sentinel_rows_are_dropped_before_export() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.xlsx");
    write_survey(
        &input,
        &["Address", "City"],
        &[
            vec!["Unknown", "Reno"],
            vec!["2 B St", "Unknown"],
            vec!["3 C St", "Elko"],
        ],
    );
    let output = dir.path().join("out.xlsx");

    let pipeline = SurveyPipeline::new(config_for(dir.path())).unwrap();
    let report = pipeline.run(&[input], &output).unwrap();

    assert_eq!(report.summary.total_rows, 1);
    assert_eq!(report.summary.rows_missing_address, 0);
    assert_eq!(
        report.normalize.sentinel_rows_removed.get("address"),
        Some(&Some(1))
    );
}

#[test]
fn corrupt_workbook_contributes_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.xlsx");
    std::fs::write(&broken, b"not a workbook").unwrap();
    let good = dir.path().join("good.xlsx");
    write_survey(&good, &["Address", "City"], &[vec!["1 A St", "Reno"]]);
    let output = dir.path().join("out.xlsx");

    let pipeline = SurveyPipeline::new(config_for(dir.path())).unwrap();
    let report = pipeline.run(&[broken, good], &output).unwrap();

    assert_eq!(report.files[0].status, FileStatus::Skipped(SkipReason::NoRows));
    assert_eq!(report.files[1].status, FileStatus::Extracted { rows: 1 });
    assert_eq!(report.summary.total_rows, 1);
}
