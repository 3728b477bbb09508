use super::common::{registry, write_file};
use dupesieve::config::Settings;
use dupesieve::duplicates::{AutoKeeper, FileGroup, KeepOutcome};
use dupesieve::scanner::FileEntry;
use dupesieve::stats::file::{NAME, SIZE};
use std::sync::Arc;
use tempfile::tempdir;

fn probe(path: &std::path::Path, settings: &Settings) -> Arc<FileEntry> {
    Arc::new(FileEntry::probe(path, &registry(settings)).entry)
}

#[test]
fn test_name_group_keeps_shortest_name() {
    let dir = tempdir().unwrap();
    let settings = Settings {
        extensions: Some(vec![".jpg".to_string()]),
        ..Settings::default()
    };
    let copy = probe(&write_file(dir.path(), "a (1).jpg", 1000), &settings);
    let original = probe(&write_file(dir.path(), "a.jpg", 1000), &settings);
    let group = FileGroup::with_files(NAME, vec![Arc::clone(&original), Arc::clone(&copy)]);

    let registry = registry(&settings);
    let keeper = AutoKeeper::new(&registry, &settings.keep_settings(&[]));
    let outcome = keeper.run(&group, &registry).unwrap();

    assert_eq!(outcome, KeepOutcome::Selected(original.path().to_path_buf()));
    assert!(original.keep());
    assert!(!copy.keep());
}

#[test]
fn test_auto_keep_is_idempotent() {
    let dir = tempdir().unwrap();
    let settings = Settings::default();
    let a = probe(&write_file(dir.path(), "photo.bin", 64), &settings);
    let b = probe(&write_file(dir.path(), "photo copy.bin", 64), &settings);
    let group = FileGroup::with_files(SIZE, vec![a, b]);

    let registry = registry(&settings);
    let keeper = AutoKeeper::new(&registry, &settings.keep_settings(&[]));
    let first = keeper.run_all(std::slice::from_ref(&group), &registry).unwrap();
    let kept: Vec<bool> = group.files.iter().map(|f| f.keep()).collect();
    let second = keeper.run_all(std::slice::from_ref(&group), &registry).unwrap();

    assert_eq!(first.selected, 1);
    assert_eq!(second.already_kept, 1);
    assert_eq!(kept, group.files.iter().map(|f| f.keep()).collect::<Vec<_>>());
    assert_eq!(group.kept_count(), 1);
}

#[test]
fn test_rm_paths_keep_everything_outside() {
    let dir = tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let settings = Settings {
        rm_paths: vec![inbox.clone()],
        ..Settings::default()
    };
    let outside_a = probe(&write_file(dir.path(), "library/a.bin", 32), &settings);
    let outside_b = probe(&write_file(dir.path(), "archive/a.bin", 32), &settings);
    let inside = probe(&write_file(&inbox, "a.bin", 32), &settings);
    let group = FileGroup::with_files(
        SIZE,
        vec![Arc::clone(&inside), Arc::clone(&outside_a), Arc::clone(&outside_b)],
    );

    let registry = registry(&settings);
    let keeper = AutoKeeper::new(&registry, &settings.keep_settings(&[]));
    assert_eq!(
        keeper.run(&group, &registry).unwrap(),
        KeepOutcome::Restricted(2)
    );
    assert!(!inside.keep());
    assert!(outside_a.keep());
    assert!(outside_b.keep());
}

#[test]
fn test_existing_selection_is_respected() {
    let dir = tempdir().unwrap();
    let settings = Settings::default();
    let a = probe(&write_file(dir.path(), "a.bin", 10), &settings);
    let long = probe(&write_file(dir.path(), "a much longer name.bin", 10), &settings);
    long.set_keep(true);
    let group = FileGroup::with_files(SIZE, vec![a.clone(), long.clone()]);

    let registry = registry(&settings);
    let keeper = AutoKeeper::new(&registry, &settings.keep_settings(&[]));
    assert_eq!(keeper.run(&group, &registry).unwrap(), KeepOutcome::AlreadyKept);
    assert!(!a.keep());
    assert!(long.keep());
}

#[test]
fn test_preferred_root_order() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let settings = Settings::default();
    let b = probe(&write_file(&second, "x.bin", 10), &settings);
    let a = probe(&write_file(&first, "x.bin", 10), &settings);
    filetime::set_file_mtime(a.path(), filetime::FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    filetime::set_file_mtime(b.path(), filetime::FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    a.refresh(&registry(&settings));
    b.refresh(&registry(&settings));
    let group = FileGroup::with_files(SIZE, vec![b.clone(), a.clone()]);

    let registry = registry(&settings);
    let keeper = AutoKeeper::new(&registry, &settings.keep_settings(&[first, second]));
    keeper.run(&group, &registry).unwrap();
    assert!(a.keep());
    assert!(!b.keep());
}
