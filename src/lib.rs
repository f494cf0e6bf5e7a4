//! Core of a keyed file browser: flat slash-delimited keys in, a grouped,
//! sorted and paginated listing out.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod error;
pub mod expand_state;
pub mod format;
pub mod key;
pub mod modified;
pub mod record;
pub mod render_tree;
pub mod sort;
pub mod tree;

pub use browser::{ActiveAction, BarAction, Browser, BrowserCallbacks, BrowserState, BrowserView, Preview};
pub use config::{BrowserConfig, Grouping, RenderStyle, Sorting};
pub use crawler::FileCrawler;
pub use error::{BrowserError, Result};
pub use format::{file_size, time_ago};
pub use modified::{group_by_modified, group_by_modified_at, TimeBucket};
pub use record::{Entry, FileEntry, FileRecord, FolderEntry};
pub use render_tree::RenderRow;
pub use sort::{last_modified_sort, natural_sort};
pub use tree::group_by_folder;
