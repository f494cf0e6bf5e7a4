//! Browser state machine: selection, open folders, actions, filtering and
//! pagination, dispatching to the transforms and to caller callbacks.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::config::{BrowserConfig, Grouping, RenderStyle, Sorting};
use crate::error::Result;
use crate::expand_state::OpenFolders;
use crate::key::{self, FileKind, NEW_FOLDER_SEGMENT};
use crate::modified::group_by_modified_at;
use crate::record::{Entry, FileRecord};
use crate::render_tree::{build_rows, RenderRow, RowContext};
use crate::sort::{last_modified_sort, natural_sort};
use crate::tree::group_by_folder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActiveAction {
    Rename,
    Delete,
    CreateFolder,
}

/// File shown in the detail pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub key: String,
    pub name: String,
    pub extension: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserState {
    pub selection: Option<String>,
    pub action_target: Option<String>,
    pub active_action: Option<ActiveAction>,
    pub name_filter: String,
    pub open_folders: OpenFolders,
    pub preview: Option<Preview>,
    /// Filtered rows shown before "show more".
    pub results_shown: usize,
}

impl BrowserState {
    fn new(page_size: usize) -> Self {
        Self {
            selection: None,
            action_target: None,
            active_action: None,
            name_filter: String::new(),
            open_folders: OpenFolders::default(),
            preview: None,
            results_shown: page_size,
        }
    }

    fn clear_action(&mut self) {
        self.active_action = None;
        self.action_target = None;
    }
}

pub type CreateFilesCallback = Box<dyn FnMut(&[FileRecord], &str)>;
pub type KeyCallback = Box<dyn FnMut(&str)>;
pub type MoveCallback = Box<dyn FnMut(&str, &str)>;

/// Caller-supplied side effects. A missing callback disables its action.
#[derive(Default)]
pub struct BrowserCallbacks {
    pub create_files: Option<CreateFilesCallback>,
    pub create_folder: Option<KeyCallback>,
    pub move_file: Option<MoveCallback>,
    pub move_folder: Option<MoveCallback>,
    pub rename_file: Option<MoveCallback>,
    pub rename_folder: Option<MoveCallback>,
    pub delete_file: Option<KeyCallback>,
    pub delete_folder: Option<KeyCallback>,
}

impl BrowserCallbacks {
    pub fn on_create_files(mut self, callback: impl FnMut(&[FileRecord], &str) + 'static) -> Self {
        self.create_files = Some(Box::new(callback));
        self
    }

    pub fn on_create_folder(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.create_folder = Some(Box::new(callback));
        self
    }

    pub fn on_move_file(mut self, callback: impl FnMut(&str, &str) + 'static) -> Self {
        self.move_file = Some(Box::new(callback));
        self
    }

    pub fn on_move_folder(mut self, callback: impl FnMut(&str, &str) + 'static) -> Self {
        self.move_folder = Some(Box::new(callback));
        self
    }

    pub fn on_rename_file(mut self, callback: impl FnMut(&str, &str) + 'static) -> Self {
        self.rename_file = Some(Box::new(callback));
        self
    }

    pub fn on_rename_folder(mut self, callback: impl FnMut(&str, &str) + 'static) -> Self {
        self.rename_folder = Some(Box::new(callback));
        self
    }

    pub fn on_delete_file(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.delete_file = Some(Box::new(callback));
        self
    }

    pub fn on_delete_folder(mut self, callback: impl FnMut(&str) + 'static) -> Self {
        self.delete_folder = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for BrowserCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserCallbacks")
            .field("create_files", &self.create_files.is_some())
            .field("create_folder", &self.create_folder.is_some())
            .field("move_file", &self.move_file.is_some())
            .field("move_folder", &self.move_folder.is_some())
            .field("rename_file", &self.rename_file.is_some())
            .field("rename_folder", &self.rename_folder.is_some())
            .field("delete_file", &self.delete_file.is_some())
            .field("delete_folder", &self.delete_folder.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarAction {
    AddFolder,
    AddSubfolder,
    Rename,
    Delete,
}

impl BarAction {
    pub fn label(self) -> &'static str {
        match self {
            BarAction::AddFolder => "Add Folder",
            BarAction::AddSubfolder => "Add Subfolder",
            BarAction::Rename => "Rename",
            BarAction::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBar {
    /// Filter input is shown (and holds this text) when filtering is enabled.
    pub filter: Option<String>,
    pub actions: Vec<BarAction>,
}

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserView {
    pub render_style: RenderStyle,
    /// Number of records the caller supplied.
    pub file_count: usize,
    pub rows: Vec<RenderRow>,
    pub show_more: bool,
    pub empty_message: Option<String>,
    pub selected: Option<Entry>,
    pub action_bar: ActionBar,
    pub preview: Option<Preview>,
}

pub struct Browser {
    config: BrowserConfig,
    root: String,
    state: BrowserState,
    callbacks: BrowserCallbacks,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("state", &self.state)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

impl Browser {
    pub fn new(config: BrowserConfig, callbacks: BrowserCallbacks) -> Self {
        let state = BrowserState::new(config.page_size);
        Self {
            config,
            root: String::new(),
            state,
            callbacks,
        }
    }

    /// Show keys relative to `root`; every record must start with it.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BrowserConfig {
        &mut self.config
    }

    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    pub fn callbacks(&self) -> &BrowserCallbacks {
        &self.callbacks
    }

    // item manipulation

    pub fn create_files(&mut self, files: &[FileRecord], prefix: &str) -> bool {
        let Some(callback) = self.callbacks.create_files.as_mut() else {
            return false;
        };
        if !prefix.is_empty() {
            self.state.open_folders.open(prefix);
        }
        self.state.selection = None;
        tracing::debug!(count = files.len(), prefix, "create files");
        callback(files, prefix);
        true
    }

    pub fn create_folder(&mut self, key: &str) -> bool {
        let Some(callback) = self.callbacks.create_folder.as_mut() else {
            return false;
        };
        self.state.clear_action();
        self.state.selection = Some(key.to_string());
        tracing::debug!(key, "create folder");
        callback(key);
        true
    }

    pub fn move_file(&mut self, old_key: &str, new_key: &str) -> bool {
        let Some(callback) = self.callbacks.move_file.as_mut() else {
            return false;
        };
        self.state.clear_action();
        self.state.selection = Some(new_key.to_string());
        tracing::debug!(old_key, new_key, "move file");
        callback(old_key, new_key);
        true
    }

    pub fn move_folder(&mut self, old_key: &str, new_key: &str) -> bool {
        let Some(callback) = self.callbacks.move_folder.as_mut() else {
            return false;
        };
        self.state.clear_action();
        self.state.selection = Some(new_key.to_string());
        self.state.open_folders.rekey(old_key, new_key);
        tracing::debug!(old_key, new_key, "move folder");
        callback(old_key, new_key);
        true
    }

    pub fn rename_file(&mut self, old_key: &str, new_key: &str) -> bool {
        let Some(callback) = self.callbacks.rename_file.as_mut() else {
            return false;
        };
        self.state.clear_action();
        self.state.selection = Some(new_key.to_string());
        tracing::debug!(old_key, new_key, "rename file");
        callback(old_key, new_key);
        true
    }

    pub fn rename_folder(&mut self, old_key: &str, new_key: &str) -> bool {
        let Some(callback) = self.callbacks.rename_folder.as_mut() else {
            return false;
        };
        self.state.clear_action();
        if let Some(selection) = self.state.selection.as_mut() {
            if let Some(rest) = selection.strip_prefix(old_key) {
                *selection = format!("{}{}", new_key, rest);
            }
        }
        self.state.open_folders.rekey(old_key, new_key);
        tracing::debug!(old_key, new_key, "rename folder");
        callback(old_key, new_key);
        true
    }

    pub fn delete_file(&mut self, key: &str) -> bool {
        let Some(callback) = self.callbacks.delete_file.as_mut() else {
            return false;
        };
        self.state.clear_action();
        self.state.selection = None;
        tracing::debug!(key, "delete file");
        callback(key);
        true
    }

    pub fn delete_folder(&mut self, key: &str) -> bool {
        let Some(callback) = self.callbacks.delete_folder.as_mut() else {
            return false;
        };
        self.state.clear_action();
        self.state.selection = None;
        self.state.open_folders.close_recursive(key);
        tracing::debug!(key, "delete folder");
        callback(key);
        true
    }

    // browser manipulation

    pub fn begin_action(&mut self, action: ActiveAction, target: &str) {
        self.state.active_action = Some(action);
        self.state.action_target = Some(target.to_string());
    }

    /// Cancel the active action; a pending new folder is also deselected.
    pub fn end_action(&mut self) {
        let selecting_draft = self
            .state
            .selection
            .as_deref()
            .is_some_and(|selection| selection.contains(NEW_FOLDER_SEGMENT));
        if selecting_draft {
            self.state.selection = None;
        }
        self.state.clear_action();
    }

    pub fn select(&mut self, key: &str) {
        self.state.selection = Some(key.to_string());
        if self.state.action_target.as_deref().is_some_and(|target| target != key) {
            self.state.clear_action();
        }
    }

    pub fn preview(&mut self, file_key: &str) {
        let name = key::file_name(file_key).to_string();
        self.state.preview = Some(Preview {
            key: file_key.to_string(),
            name,
            extension: key::extension(file_key),
            kind: key::file_kind(file_key),
        });
    }

    pub fn close_detail(&mut self) {
        self.state.preview = None;
    }

    pub fn show_more(&mut self) {
        self.state.results_shown += self.config.page_size;
    }

    pub fn toggle_folder(&mut self, key: &str) {
        self.state.open_folders.toggle(key);
    }

    pub fn open_folder(&mut self, key: &str) {
        self.state.open_folders.open(key);
    }

    /// A click landed outside the browser and its preview.
    pub fn click_outside(&mut self) {
        self.state.selection = None;
        self.state.clear_action();
    }

    pub fn update_filter(&mut self, value: &str) {
        self.state.name_filter = value.to_string();
        self.state.results_shown = self.config.page_size;
    }

    // action bar

    pub fn begin_rename(&mut self) {
        if let Some(selection) = self.state.selection.clone() {
            self.begin_action(ActiveAction::Rename, &selection);
        }
    }

    pub fn begin_delete(&mut self) {
        if let Some(selection) = self.state.selection.clone() {
            self.begin_action(ActiveAction::Delete, &selection);
        }
    }

    /// Start naming a new folder under the selection (or at the top level).
    pub fn begin_add_folder(&mut self) {
        if self.state.active_action == Some(ActiveAction::CreateFolder) {
            return;
        }
        let selection = self.state.selection.clone();
        let draft_key = key::draft_folder_key(selection.as_deref());
        self.state.active_action = Some(ActiveAction::CreateFolder);
        self.state.action_target = Some(draft_key.clone());
        self.state.selection = Some(draft_key);
        if let Some(selection) = selection {
            self.state.open_folders.open(&selection);
        }
    }

    // per-item submissions

    /// Apply a typed name to the item being renamed or the draft folder.
    ///
    /// Returns whether a callback was dispatched.
    pub fn submit_rename(&mut self, item_key: &str, new_name: &str) -> Result<bool> {
        if !key::is_folder_key(item_key) {
            if self.callbacks.rename_file.is_none() {
                return Ok(false);
            }
            let new_key = key::renamed_file_key(item_key, new_name)?;
            return Ok(self.rename_file(item_key, &new_key));
        }

        let new_key = key::renamed_folder_key(item_key, new_name)?;
        let is_draft = self.state.active_action == Some(ActiveAction::CreateFolder)
            && self.state.action_target.as_deref() == Some(item_key);
        if is_draft {
            Ok(self.create_folder(&new_key))
        } else {
            Ok(self.rename_folder(item_key, &new_key))
        }
    }

    pub fn submit_delete(&mut self, item_key: &str) -> bool {
        if key::is_folder_key(item_key) {
            self.delete_folder(item_key)
        } else {
            self.delete_file(item_key)
        }
    }

    /// Drop an existing item onto `target_key` (`""` is the top level).
    pub fn drop_onto(&mut self, dragged_key: &str, target_key: &str) -> bool {
        let path = key::drop_path(target_key).to_string();
        let dispatched = if key::is_folder_key(dragged_key) {
            match key::moved_folder_key(dragged_key, &path) {
                Some(new_key) if self.callbacks.move_folder.is_some() => {
                    self.open_drop_path(&path);
                    self.move_folder(dragged_key, &new_key)
                }
                _ => false,
            }
        } else {
            match key::moved_file_key(dragged_key, &path) {
                Some(new_key) if self.callbacks.move_file.is_some() => {
                    self.open_drop_path(&path);
                    self.move_file(dragged_key, &new_key)
                }
                _ => false,
            }
        };
        if !dispatched {
            tracing::debug!(dragged_key, target_key, "drop ignored");
        }
        dispatched
    }

    /// Drop new files from outside the browser onto `target_key`.
    pub fn drop_files(&mut self, files: &[FileRecord], target_key: &str) -> bool {
        let path = key::drop_path(target_key).to_string();
        self.create_files(files, &path)
    }

    fn open_drop_path(&mut self, path: &str) {
        if !path.is_empty() {
            self.state.open_folders.open(path);
        }
    }

    // rendering

    pub fn render(&self, files: &[FileRecord]) -> Result<BrowserView> {
        self.render_at(files, &Local::now())
    }

    /// Build the view for `files`, with date buckets anchored on `now`.
    pub fn render_at<Tz: TimeZone>(&self, files: &[FileRecord], now: &DateTime<Tz>) -> Result<BrowserView> {
        let filtering = !self.state.name_filter.is_empty();

        let mut records = files.to_vec();
        if self.state.active_action == Some(ActiveAction::CreateFolder) {
            if let Some(target) = &self.state.action_target {
                records.push(FileRecord {
                    key: target.clone(),
                    draft: true,
                    ..Default::default()
                });
            }
        }
        if filtering {
            records = filter_records(records, &self.state.name_filter);
        }

        let tree = match self.config.grouping {
            Grouping::Folder => group_by_folder(&records, &self.root)?,
            Grouping::Modified => group_by_modified_at(&records, now, self.config.week_start)
                .into_iter()
                .map(|bucket| bucket.into_entry())
                .collect(),
            Grouping::None => records
                .iter()
                .filter(|record| !record.is_folder())
                .map(Entry::from_record)
                .collect(),
        };

        let selected = self
            .state
            .selection
            .as_deref()
            .and_then(|selection| Entry::find(&tree, selection))
            .cloned();

        let tree = match self.config.sorting {
            Sorting::Natural => natural_sort(tree),
            Sorting::LastModified => last_modified_sort(tree),
            Sorting::None => tree,
        };

        let context = RowContext {
            selection: self.state.selection.as_deref(),
            active_action: self.state.active_action,
            action_target: self.state.action_target.as_deref(),
            open_folders: &self.state.open_folders,
            filtering,
            nest_children: self.config.nest_children,
        };
        let mut rows = build_rows(&tree, &context, 0);

        let mut show_more = false;
        if filtering && rows.len() > self.state.results_shown {
            rows.truncate(self.state.results_shown);
            show_more = true;
        }

        let empty_message = rows.is_empty().then(|| {
            if filtering {
                format!("No files matching \"{}\".", self.state.name_filter)
            } else {
                "No files.".to_string()
            }
        });

        let action_bar = self.action_bar(selected.as_ref());

        Ok(BrowserView {
            render_style: self.config.render_style,
            file_count: files.len(),
            rows,
            show_more,
            empty_message,
            selected,
            action_bar,
            preview: self.state.preview.clone(),
        })
    }

    fn action_bar(&self, selected: Option<&Entry>) -> ActionBar {
        let filtering = !self.state.name_filter.is_empty();
        let can_create_folder = self.callbacks.create_folder.is_some() && !filtering;
        let mut actions = Vec::new();

        match selected {
            Some(entry) => {
                let is_folder = entry.is_folder();
                if is_folder && can_create_folder {
                    actions.push(BarAction::AddSubfolder);
                }
                let (can_rename, can_delete) = if is_folder {
                    (self.callbacks.rename_folder.is_some(), self.callbacks.delete_folder.is_some())
                } else {
                    (self.callbacks.rename_file.is_some(), self.callbacks.delete_file.is_some())
                };
                if entry.key_derived() && can_rename {
                    actions.push(BarAction::Rename);
                }
                if entry.key_derived() && can_delete {
                    actions.push(BarAction::Delete);
                }
            }
            None => {
                if can_create_folder {
                    actions.push(BarAction::AddFolder);
                }
            }
        }

        ActionBar {
            filter: self.config.can_filter.then(|| self.state.name_filter.clone()),
            actions,
        }
    }
}

/// Keep records whose key contains every space-separated term.
pub fn filter_records(records: Vec<FileRecord>, filter: &str) -> Vec<FileRecord> {
    let filter = filter.to_lowercase();
    let terms: Vec<&str> = filter.split(' ').collect();
    records
        .into_iter()
        .filter(|record| {
            let key = record.key.to_lowercase();
            let key = key.trim();
            terms.iter().all(|term| key.contains(term))
        })
        .collect()
}
