use super::common::{names, registry, write_file};
use dupesieve::config::Settings;
use dupesieve::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupesieve::session::ScanLog;
use dupesieve::stats::file::SIZE;
use dupesieve::stats::image::IMG_HASH;
use dupesieve::stats::HashKey;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn finder_config(settings: &Settings, log: &Path, resume: bool) -> FinderConfig {
    FinderConfig::default()
        .with_walker_config(settings.walker_config())
        .with_log_path(log)
        .with_resume(resume)
}

#[test]
fn test_replay_literal_log() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("scan.log");
    std::fs::write(
        &log_path,
        "Group,Type,Keep,Path,Size\n\
         FILE,,,/x/a.mp4,1048576\n\
         KEY,SIZE,,,1048576\n",
    )
    .unwrap();

    let (_log, recovered) = ScanLog::resume(&log_path, &registry(&Settings::default())).unwrap();
    assert_eq!(recovered.entries.len(), 1);
    assert_eq!(recovered.entries[0].stat, SIZE);
    assert_eq!(recovered.entries[0].key, HashKey::Int(1_048_576));
    assert!(recovered.visited.contains(Path::new("/x/a.mp4")));
}

#[test]
fn test_resume_skips_logged_files() {
    let data = tempdir().unwrap();
    let root = std::fs::canonicalize(data.path()).unwrap();
    let a = write_file(&root, "a.bin", 64);
    write_file(&root, "b.bin", 64);

    let work = tempdir().unwrap();
    let log_path = work.path().join("scan.log");
    std::fs::write(
        &log_path,
        format!(
            "Group,Type,Keep,Path,Size\nFILE,,,{},64\nKEY,SIZE,,,64\n",
            a.display()
        ),
    )
    .unwrap();

    let settings = Settings::default();
    let registry = registry(&settings);
    let (groups, summary) = DuplicateFinder::new(&registry, finder_config(&settings, &log_path, true))
        .find_duplicates(&[root], &[SIZE])
        .unwrap();

    assert_eq!(summary.files_recovered, 1);
    assert_eq!(summary.files_scanned, 1);
    assert_eq!(names(&groups), vec![vec!["a.bin", "b.bin"]]);
}

#[test]
fn test_resumed_scan_matches_full_scan() {
    let data = tempdir().unwrap();
    let first: PathBuf = data.path().join("A");
    let second: PathBuf = data.path().join("B");
    write_file(&first, "a1.bin", 100);
    write_file(&first, "a2.bin", 104);
    write_file(&second, "b1.bin", 103);
    write_file(&second, "b2.bin", 108);
    write_file(&second, "b3.bin", 200);
    write_file(&second, "b4.bin", 200);

    let settings = Settings {
        size_var: 5,
        ..Settings::default()
    };
    let registry = registry(&settings);
    let work = tempdir().unwrap();
    let roots = vec![first.clone(), second];

    let full_log = work.path().join("full.log");
    let (full, _) = DuplicateFinder::new(&registry, finder_config(&settings, &full_log, false))
        .find_duplicates(&roots, &[SIZE])
        .unwrap();

    // first run only reaches A, then the scan is picked up again
    let split_log = work.path().join("split.log");
    DuplicateFinder::new(&registry, finder_config(&settings, &split_log, false))
        .find_duplicates(&[first], &[SIZE])
        .unwrap();
    let (resumed, summary) =
        DuplicateFinder::new(&registry, finder_config(&settings, &split_log, true))
            .find_duplicates(&roots, &[SIZE])
            .unwrap();

    assert_eq!(summary.files_recovered, 2);
    assert_eq!(summary.files_scanned, 4);
    assert_eq!(names(&resumed), names(&full));
    assert_eq!(
        names(&full),
        vec![vec!["a1.bin", "a2.bin", "b1.bin"], vec!["b3.bin", "b4.bin"]]
    );
}

#[test]
fn test_interrupted_scan_leaves_resumable_log() {
    let data = tempdir().unwrap();
    write_file(data.path(), "a.bin", 5);
    write_file(data.path(), "b.bin", 5);
    let work = tempdir().unwrap();
    let log_path = work.path().join("scan.log");

    let settings = Settings::default();
    let registry = registry(&settings);
    let config = finder_config(&settings, &log_path, false)
        .with_shutdown_flag(Arc::new(AtomicBool::new(true)));
    let err = DuplicateFinder::new(&registry, config)
        .find_duplicates(&[data.path().to_path_buf()], &[SIZE])
        .unwrap_err();
    assert!(matches!(err, FinderError::Interrupted));
    assert!(ScanLog::exists(&log_path));

    let (groups, _) = DuplicateFinder::new(&registry, finder_config(&settings, &log_path, true))
        .find_duplicates(&[data.path().to_path_buf()], &[SIZE])
        .unwrap();
    assert_eq!(names(&groups), vec![vec!["a.bin", "b.bin"]]);
}

#[test]
fn test_malformed_rows_do_not_abort_resume() {
    let data = tempdir().unwrap();
    write_file(data.path(), "a.bin", 5);
    write_file(data.path(), "b.bin", 5);
    let work = tempdir().unwrap();
    let log_path = work.path().join("scan.log");
    std::fs::write(
        &log_path,
        "Group,Type,Keep,Path,Size\n\
         KEY,SIZE,,,5\n\
         WHAT,,,,\n\
         FILE,,,/gone/elsewhere.bin,notanumber\n",
    )
    .unwrap();

    let settings = Settings::default();
    let registry = registry(&settings);
    let (groups, summary) = DuplicateFinder::new(&registry, finder_config(&settings, &log_path, true))
        .find_duplicates(&[data.path().to_path_buf()], &[SIZE])
        .unwrap();

    assert_eq!(summary.malformed_log_rows, 2);
    assert_eq!(summary.files_scanned, 2);
    assert_eq!(names(&groups), vec![vec!["a.bin", "b.bin"]]);
}

#[test]
fn test_failed_file_is_retried_on_resume() {
    let data = tempdir().unwrap();
    let root = data.path().canonicalize().unwrap();
    let pixels = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 64]));
    pixels.save(root.join("a.png")).unwrap();
    pixels.save(root.join("b.png")).unwrap();
    std::fs::write(root.join("broken.png"), b"garbage").unwrap();
    let work = tempdir().unwrap();
    let log_path = work.path().join("scan.log");
    let settings = Settings::default();
    let registry = registry(&settings);

    let (_, first) = DuplicateFinder::new(&registry, finder_config(&settings, &log_path, false))
        .find_duplicates(&[root.clone()], &[IMG_HASH])
        .unwrap();
    assert_eq!(first.files_scanned, 2);
    assert!(first.provider_errors >= 1);

    let (log, recovered) = ScanLog::resume(&log_path, &registry).unwrap();
    assert!(recovered.visited.contains(&root.join("a.png")));
    assert!(!recovered.visited.contains(&root.join("broken.png")));
    drop(log);

    let (groups, second) = DuplicateFinder::new(&registry, finder_config(&settings, &log_path, true))
        .find_duplicates(&[root], &[IMG_HASH])
        .unwrap();
    assert_eq!(second.files_recovered, 2);
    assert_eq!(second.files_scanned, 0);
    assert!(second.provider_errors >= 1);
    assert_eq!(names(&groups), vec![vec!["a.png", "b.png"]]);
}
