use std::fs;
use std::path::Path;

use icu_cli::config::PipelineConfig;
use icu_cli::run::{ExtractSettings, SelectSettings, extract, select, write_report};
use icu_ingest::SelectionOptions;
use icu_model::ExtractionOptions;
use icu_output::emergency_path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    fs::write(path, content).expect("write table");
}

fn data_root() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    write(
        root,
        "icu/icustays.csv",
        "subject_id,hadm_id,stay_id,first_careunit,intime,los\n\
         1,10,100,Medical Intensive Care Unit (MICU),2180-01-01 00:00:00,2.5\n\
         1,11,101,Medical Intensive Care Unit (MICU),2180-03-01 00:00:00,4.0\n\
         2,20,200,Coronary Care Unit (CCU),2180-01-10 00:00:00,3.0\n\
         3,30,300,Neuro Intermediate,2180-01-10 00:00:00,3.0\n",
    );
    write(
        root,
        "hosp/labevents.csv",
        "subject_id,hadm_id,itemid,charttime,valuenum\n\
         1,10,50912,2180-01-01 02:00:00,1.0\n\
         1,10,50912,2180-01-01 12:00:00,2.5\n\
         2,20,50912,2180-01-10 06:00:00,0.8\n",
    );
    dir
}

fn settings(root: &Path, out: &Path) -> ExtractSettings {
    ExtractSettings {
        data_root: root.to_path_buf(),
        cohort: out.join("patients.csv"),
        output: out.join("features.csv"),
        intermediate: None,
        score_file: None,
        vocabulary: None,
        options: ExtractionOptions::default(),
    }
}

fn select_cohort(root: &Path, out: &Path) {
    let summary = select(&SelectSettings {
        data_root: root.to_path_buf(),
        output: out.join("patients.csv"),
        selection: SelectionOptions::default(),
    })
    .expect("select");
    assert_eq!(summary.total_stays, 4);
    assert_eq!(summary.selected, 2);
}

#[test]
fn select_then_extract_writes_one_row_per_patient() {
    let data = data_root();
    let out = tempfile::tempdir().expect("temp dir");
    select_cohort(data.path(), out.path());

    let outcome = extract(&settings(data.path(), out.path())).expect("extract");
    assert_eq!(outcome.rows, 2);
    assert_eq!(outcome.report.cohort_size, 2);
    assert!(outcome.output.exists());

    let content = fs::read_to_string(&outcome.output).expect("read output");
    let mut lines = content.lines();
    let header = lines.next().expect("header");
    assert!(header.starts_with("subject_id,"));
    assert!(header.contains("Creatinine_min"));
    assert_eq!(lines.count(), 2);

    let creatinine = outcome
        .coverage
        .iter()
        .find(|column| column.column == "Creatinine_max")
        .expect("creatinine coverage");
    assert_eq!(creatinine.covered, 2);
}

#[test]
fn intermediate_table_is_kept_when_requested() {
    let data = data_root();
    let out = tempfile::tempdir().expect("temp dir");
    select_cohort(data.path(), out.path());

    let mut settings = settings(data.path(), out.path());
    let intermediate = out.path().join("partial/features_intermediate.csv");
    settings.intermediate = Some(intermediate.clone());
    extract(&settings).expect("extract");
    assert!(intermediate.exists());
}

#[test]
fn failed_checkpoint_writes_emergency_save() {
    let data = data_root();
    let out = tempfile::tempdir().expect("temp dir");
    select_cohort(data.path(), out.path());

    let mut settings = settings(data.path(), out.path());
    // a directory cannot be opened as a file
    settings.intermediate = Some(out.path().to_path_buf());
    let err = extract(&settings).unwrap_err();
    assert!(format!("{err:#}").contains("feature extraction failed"));
    assert!(!settings.output.exists());
    assert!(emergency_path(&settings.output).exists());
}

#[test]
fn missing_cohort_fails_without_emergency_save() {
    let data = data_root();
    let out = tempfile::tempdir().expect("temp dir");
    let settings = settings(data.path(), out.path());
    let err = extract(&settings).unwrap_err();
    assert!(format!("{err:#}").contains("load cohort"));
    assert!(!emergency_path(&settings.output).exists());
}

#[test]
fn report_is_written_as_json() {
    let data = data_root();
    let out = tempfile::tempdir().expect("temp dir");
    select_cohort(data.path(), out.path());
    let outcome = extract(&settings(data.path(), out.path())).expect("extract");

    let path = out.path().join("report.json");
    write_report(&path, &outcome.report).expect("write report");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read report")).expect("json");
    assert_eq!(json["cohort_size"], 2);
    let labs = json["families"]
        .as_array()
        .expect("families")
        .iter()
        .find(|family| family["family"] == "labs")
        .expect("labs");
    assert_eq!(labs["outcome"]["status"], "completed");
    assert_eq!(labs["stats"]["kept"], 3);
}

#[test]
fn config_file_paths_resolve_next_to_it() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pipeline.toml");
    fs::write(
        &path,
        "data_root = \"mimic\"\ncohort = \"cohort.csv\"\n\n[selection]\nmin_los_days = 2.0\n",
    )
    .expect("write config");
    let config = PipelineConfig::load(&path).expect("load");
    assert_eq!(config.data_root, Some(dir.path().join("mimic")));
    assert_eq!(config.cohort_path(), dir.path().join("cohort.csv"));
    assert_eq!(config.selection.min_los_days, 2.0);
    assert_eq!(config.output_path(), Path::new("features.csv"));

    let defaults = PipelineConfig::load_optional(None).expect("defaults");
    assert_eq!(defaults, PipelineConfig::default());
}
