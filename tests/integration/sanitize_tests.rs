use super::common::{registry, write_file};
use dupesieve::config::Settings;
use dupesieve::duplicates::{check_data, clean_data, CleanOptions, FileGroup};
use dupesieve::scanner::{FileEntry, FileRef};
use dupesieve::stats::file::SIZE;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn probe(path: &Path) -> FileRef {
    Arc::new(FileEntry::probe(path, &registry(&Settings::default())).entry)
}

#[test]
fn test_check_reports_group_without_selection() {
    let dir = tempdir().unwrap();
    let a = probe(&write_file(dir.path(), "a.bin", 3));
    let b = probe(&write_file(dir.path(), "b.bin", 3));
    let c = probe(&write_file(dir.path(), "c.bin", 4));
    let d = probe(&write_file(dir.path(), "d.bin", 4));
    a.set_keep(true);
    b.set_keep(true);
    let groups = vec![
        FileGroup::with_files(SIZE, vec![a, b]),
        FileGroup::with_files(SIZE, vec![Arc::clone(&c), Arc::clone(&d)]),
    ];

    let report = check_data(&groups);
    assert_eq!(report.missing_selection, vec![1]);
    assert_eq!(report.unique_paths(), vec![c.path().to_path_buf(), d.path().to_path_buf()]);
    assert!(!report.is_complete());
    assert!(!report.nothing_selected());
}

#[test]
fn test_candidates_include_every_unkept_member() {
    let dir = tempdir().unwrap();
    let a = probe(&write_file(dir.path(), "a.bin", 3));
    let b = probe(&write_file(dir.path(), "b.bin", 3));
    a.set_keep(true);
    let groups = vec![FileGroup::with_files(SIZE, vec![a, Arc::clone(&b)])];

    let report = check_data(&groups);
    assert!(report.is_complete());
    assert_eq!(report.unique_paths(), vec![b.path().to_path_buf()]);
}

#[test]
fn test_clean_never_touches_disk() {
    let dir = tempdir().unwrap();
    let a = probe(&write_file(dir.path(), "a.bin", 3));
    let b = probe(&write_file(dir.path(), "b.bin", 3));
    let c = probe(&write_file(dir.path(), "c.bin", 3));
    let mut groups = vec![FileGroup::with_files(
        SIZE,
        vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)],
    )];
    std::fs::remove_file(c.path()).unwrap();

    let options = CleanOptions {
        min_stats: 0,
        clean_solo: true,
        clean_kept: true,
        roots: vec![dir.path().to_path_buf()],
    };
    let report = clean_data(&mut groups, options, &registry(&Settings::default()));

    assert_eq!(report.files_removed, 1);
    assert_eq!(groups[0].len(), 2);
    assert!(a.path().is_file());
    assert!(b.path().is_file());
}

#[test]
fn test_clean_drops_groups_left_with_one_member() {
    let dir = tempdir().unwrap();
    let a = probe(&write_file(dir.path(), "a.bin", 3));
    let b = probe(&write_file(dir.path(), "b.bin", 3));
    let mut groups = vec![FileGroup::with_files(SIZE, vec![a, Arc::clone(&b)])];
    std::fs::remove_file(b.path()).unwrap();

    let solo = CleanOptions {
        clean_solo: true,
        ..CleanOptions::default()
    };
    let report = clean_data(&mut groups, solo, &registry(&Settings::default()));
    assert_eq!(report.groups_removed, 1);
    assert!(groups.is_empty());
}

#[test]
fn test_clean_keeps_lone_survivor_without_solo() {
    let dir = tempdir().unwrap();
    let a = probe(&write_file(dir.path(), "a.bin", 3));
    let b = probe(&write_file(dir.path(), "b.bin", 3));
    let mut groups = vec![FileGroup::with_files(SIZE, vec![a, Arc::clone(&b)])];
    std::fs::remove_file(b.path()).unwrap();

    let report = clean_data(&mut groups, CleanOptions::default(), &registry(&Settings::default()));
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.groups_removed, 0);
    assert_eq!(groups[0].len(), 1);
}

#[test]
fn test_min_stats_filter_removes_weak_members() {
    let dir = tempdir().unwrap();
    let settings = Settings::default();
    // same name and size
    let a = probe(&write_file(dir.path(), "one/holiday.bin", 8));
    let b = probe(&write_file(dir.path(), "two/holiday.bin", 8));
    // same size only
    let c = probe(&write_file(dir.path(), "three/receipt.bin", 8));
    let mtimes = [
        filetime::FileTime::from_unix_time(1_600_000_000, 0),
        filetime::FileTime::from_unix_time(1_600_000_000, 0),
        filetime::FileTime::from_unix_time(1_700_000_000, 0),
    ];
    for (file, mtime) in [&a, &b, &c].into_iter().zip(mtimes) {
        filetime::set_file_mtime(file.path(), mtime).unwrap();
    }
    let registry = registry(&settings);
    for file in [&a, &b, &c] {
        file.refresh(&registry);
    }
    let mut groups = vec![FileGroup::with_files(
        SIZE,
        vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)],
    )];

    let options = CleanOptions {
        min_stats: 3,
        ..CleanOptions::default()
    };
    let report = clean_data(&mut groups, options, &registry);
    assert_eq!(report.files_removed, 1);
    assert_eq!(groups[0].paths(), vec![a.path().to_path_buf(), b.path().to_path_buf()]);
}
