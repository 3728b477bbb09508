use dupesieve::config::Settings;
use dupesieve::duplicates::FileGroup;
use dupesieve::stats::Registry;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Create `dir/name` (and its parents) with `len` bytes.
pub fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(&path)
        .unwrap()
        .write_all(&vec![b'x'; len])
        .unwrap();
    path
}

pub fn registry(settings: &Settings) -> Registry {
    settings.build_registry().unwrap()
}

/// Member file names of every group, in order.
pub fn names(groups: &[FileGroup]) -> Vec<Vec<String>> {
    groups
        .iter()
        .map(|g| g.files.iter().map(|f| f.file_name()).collect())
        .collect()
}
