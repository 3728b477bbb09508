use super::common::{names, registry, write_file};
use dupesieve::config::Settings;
use dupesieve::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use dupesieve::scanner::WalkerConfig;
use dupesieve::stats::file::{NAME, SIZE};
use dupesieve::stats::image::IMG_HASH;
use image::{Rgb, RgbImage};
use std::path::Path;
use tempfile::tempdir;

fn scan(settings: &Settings, root: &Path, dims: &[dupesieve::stats::Stat]) -> Vec<Vec<String>> {
    let registry = registry(settings);
    let config = FinderConfig::default()
        .with_walker_config(settings.walker_config())
        .with_combine(settings.combine);
    let (groups, _) = DuplicateFinder::new(&registry, config)
        .find_duplicates(&[root.to_path_buf()], dims)
        .unwrap();
    names(&groups)
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let registry = registry(&Settings::default());
    let (groups, summary) = DuplicateFinder::new(&registry, FinderConfig::default())
        .find_duplicates(&[dir.path().to_path_buf()], &[SIZE])
        .unwrap();
    assert!(groups.is_empty());
    assert_eq!(summary.files_scanned, 0);
    assert_eq!(summary.groups, 0);
}

#[test]
fn test_scan_size_scenario() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.jpg", 1000);
    write_file(dir.path(), "a (1).jpg", 1000);
    write_file(dir.path(), "b.jpg", 2000);

    let groups = scan(&Settings::default(), dir.path(), &[SIZE]);
    assert_eq!(groups.len(), 1);
    let mut members = groups[0].clone();
    members.sort();
    assert_eq!(members, vec!["a (1).jpg", "a.jpg"]);
}

#[test]
fn test_scan_nested_directories() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "top.bin", 10);
    write_file(dir.path(), "sub/deeper/bottom.bin", 10);
    let groups = scan(&Settings::default(), dir.path(), &[SIZE]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[test]
fn test_clustering_is_insertion_order_dependent() {
    // 100 and 108 are 8 apart; each is within 5 of 104
    let forward = tempdir().unwrap();
    write_file(forward.path(), "1.bin", 100);
    write_file(forward.path(), "2.bin", 104);
    write_file(forward.path(), "3.bin", 108);

    let backward = tempdir().unwrap();
    write_file(backward.path(), "1.bin", 108);
    write_file(backward.path(), "2.bin", 104);
    write_file(backward.path(), "3.bin", 100);

    let settings = Settings {
        size_var: 5,
        ..Settings::default()
    };
    // First file keys the cluster; the second joins it; the third is too far
    // from the key even though it is close to the second file.
    assert_eq!(scan(&settings, forward.path(), &[SIZE]), vec![vec!["1.bin", "2.bin"]]);
    assert_eq!(scan(&settings, backward.path(), &[SIZE]), vec![vec!["1.bin", "2.bin"]]);
}

#[test]
fn test_scan_is_deterministic() {
    let dir = tempdir().unwrap();
    for (i, size) in [10, 12, 10, 30, 31, 12, 50, 10].iter().enumerate() {
        write_file(dir.path(), &format!("f{i}.bin"), *size);
    }
    let settings = Settings {
        size_var: 1,
        ..Settings::default()
    };
    let first = scan(&settings, dir.path(), &[SIZE]);
    let second = scan(&settings, dir.path(), &[SIZE]);
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn test_dimensions_are_independent() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one/holiday.txt", 10);
    write_file(dir.path(), "two/holiday.txt", 20);
    write_file(dir.path(), "three/other.txt", 10);

    let groups = scan(&Settings::default(), dir.path(), &[NAME, SIZE]);
    assert_eq!(groups.len(), 2);
    let mut by_name = groups[0].clone();
    by_name.sort();
    assert_eq!(by_name, vec!["holiday.txt", "holiday.txt"]);
    let mut by_size = groups[1].clone();
    by_size.sort();
    assert_eq!(by_size, vec!["holiday.txt", "other.txt"]);
}

#[test]
fn test_ignored_names_and_extensions() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.jpg", 10);
    write_file(dir.path(), "b.jpg", 10);
    write_file(dir.path(), "Thumbs.db", 10);
    write_file(dir.path(), "c.txt", 10);

    let settings = Settings {
        extensions: Some(vec![".jpg".to_string(), "db".to_string()]),
        ..Settings::default()
    };
    let registry = registry(&settings);
    let config = FinderConfig::default().with_walker_config(settings.walker_config());
    let (groups, summary) = DuplicateFinder::new(&registry, config)
        .find_duplicates(&[dir.path().to_path_buf()], &[SIZE])
        .unwrap();

    assert_eq!(names(&groups), vec![vec!["a.jpg", "b.jpg"]]);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.skipped_extensions, vec![".txt".to_string()]);
}

#[test]
fn test_roots_are_scanned_in_order() {
    let parent = tempdir().unwrap();
    let first = parent.path().join("z_first");
    let second = parent.path().join("a_second");
    write_file(&first, "late.bin", 7);
    write_file(&second, "early.bin", 7);

    let registry = registry(&Settings::default());
    let (groups, _) = DuplicateFinder::new(&registry, FinderConfig::default())
        .find_duplicates(&[first, second], &[SIZE])
        .unwrap();
    assert_eq!(names(&groups), vec![vec!["late.bin", "early.bin"]]);
}

#[test]
fn test_unreadable_image_is_excluded_but_scan_continues() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("broken.png"), b"garbage").unwrap();
    write_file(dir.path(), "x.bin", 9);
    write_file(dir.path(), "y.bin", 9);

    let registry = registry(&Settings::default());
    let (groups, summary) = DuplicateFinder::new(&registry, FinderConfig::default())
        .find_duplicates(&[dir.path().to_path_buf()], &[SIZE, IMG_HASH])
        .unwrap();
    assert_eq!(summary.files_scanned, 3);
    assert!(summary.provider_errors >= 1);
    assert_eq!(names(&groups), vec![vec!["x.bin", "y.bin"]]);
}

#[test]
fn test_perceptual_grouping() {
    let dir = tempdir().unwrap();
    let gradient = |x: u32, y: u32| Rgb([(x * 4) as u8, (y * 4) as u8, 128]);
    RgbImage::from_fn(64, 64, gradient)
        .save(dir.path().join("a.png"))
        .unwrap();
    RgbImage::from_fn(64, 64, gradient)
        .save(dir.path().join("b.png"))
        .unwrap();
    RgbImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
    .save(dir.path().join("c.png"))
    .unwrap();

    let groups = scan(&Settings::default(), dir.path(), &[IMG_HASH]);
    assert_eq!(groups, vec![vec!["a.png", "b.png"]]);
}

#[test]
fn test_not_a_directory() {
    let dir = tempdir().unwrap();
    let file = write_file(dir.path(), "plain.bin", 1);
    let registry = registry(&Settings::default());
    let err = DuplicateFinder::new(&registry, FinderConfig::default())
        .find_duplicates(&[file], &[SIZE])
        .unwrap_err();
    assert!(matches!(err, FinderError::NotADirectory(_)));
}

#[test]
fn test_walker_config_extension_normalization() {
    let config = WalkerConfig::new(Some(&["JPG".to_string()]), &[], false);
    assert_eq!(config.extensions, Some(vec![".jpg".to_string()]));
}
