//! Tests for the record codegen
//!
//! Sources are rewritten in memory through `process_source`, and on disk
//! through `process_file`/`run` inside temporary directories.

use super::*;
use std::fs;

const SAMPLE: &str = r#"use depot::PersistentRecord;

#[derive(Debug, PersistentRecord)]
#[depot(table = "RECORDS")]
pub struct SampleRecord {
    #[depot(id)]
    pub record_id: i32,
    pub label: String,
}

impl SampleRecord {
    pub fn describe(&self) -> String {
        format!("{}: {}", self.record_id, self.label)
    }
}
"#;

const SAMPLE_GENERATED: &str = r#"use depot::PersistentRecord;

#[derive(Debug, PersistentRecord)]
#[depot(table = "RECORDS")]
pub struct SampleRecord {
    #[depot(id)]
    pub record_id: i32,
    pub label: String,
}

impl SampleRecord {
    // AUTO-GENERATED: FIELDS START
    pub const RECORD_ID: &'static str = "record_id";
    pub const LABEL: &'static str = "label";

    pub fn record_id_c() -> ::depot::ColumnExp {
        ::depot::ColumnExp::new::<Self>(Self::RECORD_ID)
    }

    pub fn label_c() -> ::depot::ColumnExp {
        ::depot::ColumnExp::new::<Self>(Self::LABEL)
    }
    // AUTO-GENERATED: FIELDS END

    pub fn describe(&self) -> String {
        format!("{}: {}", self.record_id, self.label)
    }

    // AUTO-GENERATED: METHODS START
    pub fn get_key(record_id: i32) -> ::depot::Key {
        ::depot::Key::new::<Self>(vec![(Self::RECORD_ID, ::depot::Value::from(record_id))])
    }
    // AUTO-GENERATED: METHODS END
}
"#;

/// Drop every line inside a marker region, keeping the markers
fn strip_regions(text: &str) -> String {
    let mut inside = false;
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(MARKER_PREFIX) && trimmed.ends_with("END") {
            inside = false;
        }
        if !inside {
            out.push_str(line);
            out.push('\n');
        }
        if trimmed.starts_with(MARKER_PREFIX) && trimmed.ends_with("START") {
            inside = true;
        }
    }
    out
}

mod source_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generates_into_existing_impl() {
        let output = process_source(SAMPLE).unwrap().unwrap();
        assert_eq!(output, SAMPLE_GENERATED);
    }

    #[test]
    fn test_second_run_is_identical() {
        let output = process_source(SAMPLE).unwrap().unwrap();
        assert_eq!(process_source(&output).unwrap(), None);
    }

    #[test]
    fn test_adding_an_id_field_widens_get_key() {
        let first = process_source(SAMPLE).unwrap().unwrap();
        let edited = first.replace(
            "    pub label: String,\n}",
            "    #[depot(id)]\n    pub region: i16,\n    pub label: String,\n}",
        );

        let second = process_source(&edited).unwrap().unwrap();
        assert!(second.contains(
            "    pub fn get_key(record_id: i32, region: i16) -> ::depot::Key {\n        \
             ::depot::Key::new::<Self>(vec![(Self::RECORD_ID, ::depot::Value::from(record_id)), \
             (Self::REGION, ::depot::Value::from(region))])\n    }\n"
        ));
        assert!(second.contains("    pub const REGION: &'static str = \"region\";\n"));
        assert!(!second.contains("pub fn get_key(record_id: i32) ->"));

        // nothing outside the regions moved
        assert_eq!(strip_regions(&second), strip_regions(&edited));
    }

    #[test]
    fn test_appends_impl_when_missing() {
        let source = "#[derive(PersistentRecord)]\npub struct TagRecord {\n    pub tag: String,\n}\n";
        let output = process_source(source).unwrap().unwrap();
        assert_eq!(
            output,
            "#[derive(PersistentRecord)]\npub struct TagRecord {\n    pub tag: String,\n}\n\n\
             impl TagRecord {\n    \
             // AUTO-GENERATED: FIELDS START\n    \
             pub const TAG: &'static str = \"tag\";\n\n    \
             pub fn tag_c() -> ::depot::ColumnExp {\n        \
             ::depot::ColumnExp::new::<Self>(Self::TAG)\n    }\n    \
             // AUTO-GENERATED: FIELDS END\n\n    \
             // AUTO-GENERATED: METHODS START\n    \
             // AUTO-GENERATED: METHODS END\n}\n"
        );
        assert_eq!(process_source(&output).unwrap(), None);
    }

    #[test]
    fn test_fills_empty_one_line_impl() {
        let source = "#[derive(PersistentRecord)]\npub struct TagRecord {\n    pub tag: String,\n}\n\nimpl TagRecord {}\n";
        let output = process_source(source).unwrap().unwrap();
        assert!(output.ends_with(
            "    // AUTO-GENERATED: FIELDS END\n\n    \
             // AUTO-GENERATED: METHODS START\n    \
             // AUTO-GENERATED: METHODS END\n}\n"
        ));
        assert!(output.contains("impl TagRecord {\n    // AUTO-GENERATED: FIELDS START\n"));
        assert_eq!(process_source(&output).unwrap(), None);
    }

    #[test]
    fn test_transient_fields_are_skipped() {
        let source = "#[derive(PersistentRecord)]\npub struct TagRecord {\n    \
                      #[depot(id)]\n    pub tag: String,\n    \
                      #[depot(transient)]\n    pub scratch: Vec<u8>,\n}\n";
        let output = process_source(source).unwrap().unwrap();
        assert!(!output.contains("SCRATCH"));
        assert!(output.contains("pub fn get_key(tag: String) -> ::depot::Key {"));
    }

    #[test]
    fn test_nested_module_indentation() {
        let source = "mod records {\n    use depot::PersistentRecord;\n\n    \
                      #[derive(PersistentRecord)]\n    pub struct TagRecord {\n        \
                      pub tag: String,\n    }\n\n    \
                      impl TagRecord {\n        pub fn new() {}\n    }\n}\n";
        let output = process_source(source).unwrap().unwrap();
        assert!(output.contains(
            "    impl TagRecord {\n        // AUTO-GENERATED: FIELDS START\n        \
             pub const TAG: &'static str = \"tag\";\n"
        ));
        assert!(output.contains(
            "        pub fn new() {}\n\n        \
             // AUTO-GENERATED: METHODS START\n        \
             // AUTO-GENERATED: METHODS END\n    }\n}\n"
        ));
        assert_eq!(process_source(&output).unwrap(), None);
    }

    #[test]
    fn test_files_without_records_are_left_alone() {
        assert_eq!(process_source("pub struct Plain { pub a: i32 }\n").unwrap(), None);
    }

    #[test]
    fn test_marker_mismatch() {
        let broken = SAMPLE_GENERATED.replace("    // AUTO-GENERATED: METHODS END\n", "");
        match process_source(&broken) {
            Err(DepotError::MarkerMismatch {
                found,
                missing,
                line,
            }) => {
                assert_eq!(found, "METHODS START");
                assert_eq!(missing, "METHODS END");
                assert_eq!(line, 29);
            }
            other => panic!("expected marker mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            process_source("pub struct Broken {"),
            Err(DepotError::Parse(_))
        ));
    }
}

mod file_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_process_file_writes_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sample.rs", SAMPLE);

        assert_eq!(process_file(&path, RunMode::Write).unwrap(), FileOutcome::Updated);
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE_GENERATED);

        assert_eq!(process_file(&path, RunMode::Write).unwrap(), FileOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE_GENERATED);
    }

    #[test]
    fn test_mismatch_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let broken = SAMPLE_GENERATED.replace("    // AUTO-GENERATED: FIELDS START\n", "");
        let path = write(&dir, "broken.rs", &broken);

        assert!(matches!(
            process_file(&path, RunMode::Write),
            Err(DepotError::MarkerMismatch { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);
    }

    #[test]
    fn test_check_mode_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sample.rs", SAMPLE);

        assert_eq!(process_file(&path, RunMode::Check).unwrap(), FileOutcome::Updated);
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            process_file(&dir.path().join("absent.rs"), RunMode::Write),
            Err(DepotError::Io { .. })
        ));
    }

    #[test]
    fn test_run_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let sample = write(&dir, "a_sample.rs", SAMPLE);
        let plain = write(&dir, "b_plain.rs", "pub fn helper() {}\n");
        let broken = write(
            &dir,
            "nested/c_broken.rs",
            &SAMPLE_GENERATED.replace("    // AUTO-GENERATED: FIELDS END\n", ""),
        );
        let current = write(&dir, "nested/d_current.rs", SAMPLE_GENERATED);
        write(&dir, "notes.txt", SAMPLE);
        let hidden = write(&dir, ".cache/e_hidden.rs", SAMPLE);

        let summary = run(&[dir.path().to_path_buf()], RunMode::Write);

        assert_eq!(summary.updated, vec![sample.clone()]);
        assert_eq!(summary.skipped, vec![plain]);
        assert_eq!(summary.unchanged, vec![current]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, broken);
        assert!(summary.has_failures());
        assert_eq!(summary.files(), 4);

        assert_eq!(fs::read_to_string(&sample).unwrap(), SAMPLE_GENERATED);
        assert_eq!(fs::read_to_string(&hidden).unwrap(), SAMPLE);

        let report = summary.to_string();
        assert!(report.ends_with("1 updated, 1 unchanged, 1 skipped, 1 failed"));
        assert!(report.contains("c_broken.rs: found FIELDS START"));
    }

    #[test]
    fn test_run_on_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sample.rs", SAMPLE);

        let summary = run(std::slice::from_ref(&path), RunMode::Check);
        assert_eq!(summary.updated, vec![path.clone()]);
        assert!(!summary.has_failures());
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
    }
}
