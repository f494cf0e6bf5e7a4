use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{BrowserError, Result};
use crate::record::FileRecord;

const PROGRESS_EMIT_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total_files: u64,
    pub total_dirs: u64,
    pub total_size: u64,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Discovering,
    Processing,
}

#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    pub discovered_entries: u64,
    pub processed_entries: u64,
    pub total_entries: Option<u64>,
}

impl ScanProgress {
    pub fn fraction(&self) -> Option<f32> {
        match self.phase {
            ScanPhase::Discovering => None,
            ScanPhase::Processing => {
                let total = self.total_entries?;
                if total == 0 {
                    Some(1.0)
                } else {
                    Some((self.processed_entries as f32 / total as f32).clamp(0.0, 1.0))
                }
            }
        }
    }
}

pub type ProgressReporter = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// Parallel directory walker producing a keyed listing.
///
/// Keys are relative to the scanned root and use `/` separators; directories
/// get a trailing `/` and no size.
pub struct FileCrawler {
    include_hidden: bool,
    file_count: Arc<AtomicU64>,
    dir_count: Arc<AtomicU64>,
    total_size: Arc<AtomicU64>,
}

impl FileCrawler {
    pub fn new() -> Self {
        Self {
            include_hidden: false,
            file_count: Arc::new(AtomicU64::new(0)),
            dir_count: Arc::new(AtomicU64::new(0)),
            total_size: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    fn emit_progress(reporter: &Option<ProgressReporter>, progress: ScanProgress) {
        if let Some(cb) = reporter {
            cb(progress);
        }
    }

    fn should_emit_progress(last_emit_ms: &AtomicU64, elapsed_ms: u64) -> bool {
        let previous = last_emit_ms.load(Ordering::Relaxed);
        if elapsed_ms.saturating_sub(previous) < PROGRESS_EMIT_INTERVAL_MS {
            return false;
        }

        last_emit_ms
            .compare_exchange(previous, elapsed_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    fn processing_parallelism() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores * 2).clamp(4, 64)
    }

    /// Key for `path` relative to `root`, or `None` for the root itself.
    pub fn relative_key(root: &Path, path: &Path, is_dir: bool) -> Option<String> {
        let rel = path.strip_prefix(root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        let mut key = parts.join("/");
        if is_dir {
            key.push('/');
        }
        Some(key)
    }

    pub fn scan<P: AsRef<Path>>(&mut self, root: P) -> Result<(Vec<FileRecord>, ScanStats)> {
        self.scan_with_progress(root, None)
    }

    /// Walk `root` and list every file and directory beneath it.
    pub fn scan_with_progress<P: AsRef<Path>>(
        &mut self,
        root: P,
        reporter: Option<ProgressReporter>,
    ) -> Result<(Vec<FileRecord>, ScanStats)> {
        let root_path = root.as_ref().to_path_buf();
        if !root_path.is_dir() {
            return Err(BrowserError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", root_path.display()),
            )));
        }

        let start = Instant::now();
        self.file_count.store(0, Ordering::Relaxed);
        self.dir_count.store(0, Ordering::Relaxed);
        self.total_size.store(0, Ordering::Relaxed);

        let scan_threads = Self::processing_parallelism();
        let walker = WalkDir::new(&root_path)
            .skip_hidden(!self.include_hidden)
            .sort(true)
            .parallelism(jwalk::Parallelism::RayonNewPool(scan_threads));

        let mut entries = Vec::new();
        let mut discovered_entries = 0u64;
        let mut discovery_last_emit = Instant::now();

        for entry in walker {
            match entry {
                Ok(entry) => {
                    discovered_entries = discovered_entries.saturating_add(1);
                    entries.push(entry);
                }
                Err(err) => tracing::warn!(error = %err, "skipping unreadable entry"),
            }

            if reporter.is_some() && discovery_last_emit.elapsed().as_millis() as u64 >= PROGRESS_EMIT_INTERVAL_MS {
                discovery_last_emit = Instant::now();
                Self::emit_progress(
                    &reporter,
                    ScanProgress {
                        phase: ScanPhase::Discovering,
                        discovered_entries,
                        processed_entries: 0,
                        total_entries: None,
                    },
                );
            }
        }

        let total_entries = entries.len() as u64;
        Self::emit_progress(
            &reporter,
            ScanProgress {
                phase: ScanPhase::Processing,
                discovered_entries,
                processed_entries: 0,
                total_entries: Some(total_entries),
            },
        );

        let processed_entries = AtomicU64::new(0);
        let processing_last_emit_ms = AtomicU64::new(0);
        let processing_started = Instant::now();

        let process_entries = || {
            entries
                .par_iter()
                .filter_map(|entry| {
                    let processed_now = processed_entries.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(cb) = reporter.as_ref() {
                        let elapsed_ms = processing_started.elapsed().as_millis() as u64;
                        if processed_now == total_entries
                            || Self::should_emit_progress(&processing_last_emit_ms, elapsed_ms)
                        {
                            cb(ScanProgress {
                                phase: ScanPhase::Processing,
                                discovered_entries,
                                processed_entries: processed_now,
                                total_entries: Some(total_entries),
                            });
                        }
                    }

                    let path = entry.path();
                    let metadata = match entry.metadata() {
                        Ok(metadata) => metadata,
                        Err(err) => {
                            tracing::warn!(path = %path.display(), error = %err, "no metadata");
                            return None;
                        }
                    };
                    let is_dir = metadata.is_dir();
                    let key = Self::relative_key(&root_path, &path, is_dir)?;
                    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

                    let size = if is_dir {
                        self.dir_count.fetch_add(1, Ordering::Relaxed);
                        None
                    } else {
                        let size = metadata.len();
                        self.file_count.fetch_add(1, Ordering::Relaxed);
                        self.total_size.fetch_add(size, Ordering::Relaxed);
                        Some(size)
                    };

                    Some(FileRecord {
                        key,
                        size,
                        modified,
                        ..Default::default()
                    })
                })
                .collect::<Vec<_>>()
        };

        let records = ThreadPoolBuilder::new()
            .num_threads(scan_threads)
            .build()
            .map(|pool| pool.install(process_entries))
            .unwrap_or_else(|_| process_entries());

        let stats = ScanStats {
            total_files: self.file_count.load(Ordering::Relaxed),
            total_dirs: self.dir_count.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
            duration_ms: start.elapsed().as_millis(),
        };
        tracing::info!(
            root = %root_path.display(),
            files = stats.total_files,
            dirs = stats.total_dirs,
            duration_ms = stats.duration_ms as u64,
            "scan finished"
        );

        Ok((records, stats))
    }
}

impl Default for FileCrawler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        // Keep the root itself visible to the hidden-entry filter.
        let dir = tempfile::Builder::new().prefix("scan").tempdir().unwrap();
        fs::create_dir_all(dir.path().join("photos/animals")).unwrap();
        fs::write(dir.path().join("photos/animals/cat.png"), [0u8; 10]).unwrap();
        fs::write(dir.path().join("photos/holiday.jpg"), [0u8; 20]).unwrap();
        fs::write(dir.path().join("readme.md"), b"hello").unwrap();
        fs::write(dir.path().join(".hidden"), b"x").unwrap();
        dir
    }

    #[test]
    fn test_scan_lists_relative_keys() {
        let dir = fixture();
        let mut crawler = FileCrawler::new();
        let (records, stats) = crawler.scan(dir.path()).unwrap();

        let mut keys: Vec<&str> = records.iter().map(|record| record.key.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "photos/",
                "photos/animals/",
                "photos/animals/cat.png",
                "photos/holiday.jpg",
                "readme.md",
            ]
        );
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_dirs, 2);
        assert_eq!(stats.total_size, 35);

        let cat = records.iter().find(|record| record.key == "photos/animals/cat.png").unwrap();
        assert_eq!(cat.size, Some(10));
        assert!(cat.modified.is_some());
        assert!(records.iter().find(|record| record.key == "photos/").unwrap().is_folder());
    }

    #[test]
    fn test_scan_hidden_entries() {
        let dir = fixture();
        let mut crawler = FileCrawler::new().include_hidden(true);
        let (records, _) = crawler.scan(dir.path()).unwrap();
        assert!(records.iter().any(|record| record.key == ".hidden"));
    }

    #[test]
    fn test_scan_reports_progress() {
        let dir = fixture();
        let seen = Arc::new(AtomicU64::new(0));
        let seen_by_reporter = seen.clone();
        let reporter: ProgressReporter = Arc::new(move |progress| {
            if progress.phase == ScanPhase::Processing {
                seen_by_reporter.fetch_max(progress.processed_entries, Ordering::Relaxed);
            }
        });

        FileCrawler::new().scan_with_progress(dir.path(), Some(reporter)).unwrap();
        // Five listed entries plus the root.
        assert_eq!(seen.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            FileCrawler::new().scan(&missing),
            Err(BrowserError::Io(_))
        ));
    }

    #[test]
    fn test_relative_key() {
        let root = Path::new("/data");
        assert_eq!(FileCrawler::relative_key(root, Path::new("/data"), true), None);
        assert_eq!(
            FileCrawler::relative_key(root, Path::new("/data/a/b.txt"), false),
            Some("a/b.txt".to_string())
        );
        assert_eq!(
            FileCrawler::relative_key(root, Path::new("/data/a"), true),
            Some("a/".to_string())
        );
    }
}
