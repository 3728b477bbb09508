use super::common::write_file;
use dupesieve::config::Settings;
use dupesieve::deduper::{Deduper, DeduperError};
use dupesieve::session::SnapshotError;
use dupesieve::stats::file::{NAME, SIZE};
use dupesieve::stats::StatValue;
use std::path::Path;
use tempfile::tempdir;

fn settings(work: &Path) -> Settings {
    Settings {
        group_by: vec!["SIZE".to_string()],
        log_path: work.join("scan.log"),
        ..Settings::default()
    }
}

#[test]
fn test_keep_marks_survive_save_and_load() {
    let data = tempdir().unwrap();
    write_file(data.path(), "a.bin", 16);
    write_file(data.path(), "a copy.bin", 16);
    write_file(data.path(), "b.bin", 32);
    write_file(data.path(), "b copy.bin", 32);
    let work = tempdir().unwrap();
    let snapshot = work.path().join("results.csv");

    let mut deduper = Deduper::new(settings(work.path()), vec![data.path().to_path_buf()]).unwrap();
    deduper.scan(false).unwrap();
    deduper.auto_keep().unwrap();
    deduper.save_snapshot(&snapshot, false).unwrap();
    let saved: Vec<Vec<(String, bool)>> = deduper
        .groups()
        .iter()
        .map(|g| g.files.iter().map(|f| (f.file_name(), f.keep())).collect())
        .collect();

    let mut reloaded = Deduper::new(settings(work.path()), Vec::new()).unwrap();
    assert_eq!(reloaded.load_snapshot(&snapshot).unwrap(), 2);
    let loaded: Vec<Vec<(String, bool)>> = reloaded
        .groups()
        .iter()
        .map(|g| g.files.iter().map(|f| (f.file_name(), f.keep())).collect())
        .collect();
    assert_eq!(loaded, saved);
    assert!(reloaded.groups().iter().all(|g| g.stat == SIZE));
    assert!(reloaded.integrity_check().is_complete());
}

#[test]
fn test_hand_edited_snapshot() {
    let data = tempdir().unwrap();
    let a = write_file(data.path(), "a.bin", 4);
    let b = write_file(data.path(), "b.bin", 4);
    let work = tempdir().unwrap();
    let snapshot = work.path().join("results.csv");
    // reordered columns, a keep mark added by hand, and an unknown column
    // that takes the place of the default header's fifth column (Filename)
    std::fs::write(
        &snapshot,
        format!(
            "Path,Group,Type,Keep,Naam,size\n{},0,SIZE,x,a,4\n{},0,SIZE,,b,4\n",
            a.display(),
            b.display()
        ),
    )
    .unwrap();

    let mut deduper = Deduper::new(settings(work.path()), Vec::new()).unwrap();
    assert_eq!(deduper.load_snapshot(&snapshot).unwrap(), 1);
    let group = &deduper.groups()[0];
    assert_eq!(group.stat, SIZE);
    assert!(group.files[0].keep());
    assert!(!group.files[1].keep());
    assert_eq!(group.files[0].value(NAME), Some(StatValue::Text("a".into())));
    assert_eq!(group.files[1].value(SIZE), Some(StatValue::Int(4)));
}

#[test]
fn test_removal_command_lists_unkept_files() {
    let data = tempdir().unwrap();
    let a = write_file(data.path(), "a.bin", 4);
    let b = write_file(data.path(), "it's b.bin", 4);
    let work = tempdir().unwrap();
    let snapshot = work.path().join("results.csv");
    std::fs::write(
        &snapshot,
        format!(
            "Group,Type,Keep,Path,Size\n0,SIZE,x,{},4\n0,SIZE,,{},4\n",
            a.display(),
            b.display()
        ),
    )
    .unwrap();

    let mut deduper = Deduper::new(settings(work.path()), Vec::new()).unwrap();
    deduper.load_snapshot(&snapshot).unwrap();
    let command = deduper.removal_command().unwrap();
    assert!(command.starts_with("rm -- "));
    assert!(command.contains("it'\\''s b.bin"));
    assert!(!command.contains("/a.bin"));
    // nothing was removed
    assert!(b.is_file());
}

#[test]
fn test_refused_overwrite_keeps_scan_log() {
    let data = tempdir().unwrap();
    write_file(data.path(), "a.bin", 4);
    write_file(data.path(), "b.bin", 4);
    let work = tempdir().unwrap();
    let snapshot = work.path().join("results.csv");
    std::fs::write(&snapshot, "Group,Type,Keep,Path\n").unwrap();

    let mut deduper = Deduper::new(settings(work.path()), vec![data.path().to_path_buf()]).unwrap();
    deduper.scan(false).unwrap();
    let err = deduper.save_snapshot(&snapshot, false).unwrap_err();
    assert!(matches!(
        err,
        DeduperError::Snapshot(SnapshotError::AlreadyExists(_))
    ));
    assert!(deduper.can_resume());
    assert_eq!(
        std::fs::read_to_string(&snapshot).unwrap(),
        "Group,Type,Keep,Path\n"
    );
}
