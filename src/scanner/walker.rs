//! Directory walker.
//!
//! # Overview
//!
//! [`Walker`] traverses one root recursively and yields a [`WalkEvent`] per
//! regular file: either the file itself or a note that its extension is not
//! allowed. Entries are visited in file-name order within each directory, so
//! the same tree always produces the same sequence and clustering (which is
//! order-sensitive) is reproducible.
//!
//! # Example
//!
//! ```no_run
//! use dupesieve::scanner::{WalkEvent, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Pictures"), WalkerConfig::default());
//! for event in walker.walk() {
//!     match event {
//!         Ok(WalkEvent::File(path)) => println!("{}", path.display()),
//!         Ok(WalkEvent::Skipped { extension, .. }) => println!("skip {extension}"),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::path_utils::dotted_extension;
use super::{ScanError, WalkerConfig};

/// One regular file found by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// A file to process.
    File(PathBuf),
    /// A file whose extension is not in the allow-list.
    Skipped {
        /// The skipped file
        path: PathBuf,
        /// Its lowercase dotted extension
        extension: String,
    },
}

/// Sequential directory walker for one root.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .is_some_and(|name| self.config.ignore.contains(&name))
    }

    /// Walk the tree, yielding files and skipped extensions.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkEvent, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return false;
                }
                true
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let path = entry.into_path();

                    if self.is_ignored(&path) {
                        log::trace!("Ignoring file: {}", path.display());
                        return None;
                    }

                    if let Some(allowed) = &self.config.extensions {
                        let extension = dotted_extension(&path);
                        if !allowed.contains(&extension) {
                            return Some(Ok(WalkEvent::Skipped { path, extension }));
                        }
                    }

                    Some(Ok(WalkEvent::File(path)))
                }
                Err(e) => Some(Err(self.handle_walk_error(e))),
            })
    }

    fn handle_walk_error(&self, error: walkdir::Error) -> ScanError {
        use std::io::ErrorKind;

        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        match error.io_error().map(std::io::Error::kind) {
            Some(ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(ErrorKind::NotFound) => {
                log::debug!("Path not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}
