use chrono::{DateTime, Utc};

use crate::browser::ActiveAction;
use crate::expand_state::OpenFolders;
use crate::format::{file_size, time_ago};
use crate::key::{self, FileKind};
use crate::record::Entry;

/// Indentation per depth level in text output.
pub const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    File(FileKind),
    Folder,
}

/// A row in the rendered listing, produced by build_rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRow {
    /// Stable row identifier, `file-<key>`.
    pub id: String,
    pub file_key: String,
    pub name: String,
    pub kind: RowKind,
    /// Byte count for files; folders have none.
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub depth: usize,
    pub is_selected: bool,
    pub is_open: bool,
    pub is_renaming: bool,
    pub is_deleting: bool,
    pub is_draft: bool,
    pub key_derived: bool,
    /// Sub-rows (only populated for open folders when nesting children).
    pub children: Vec<RenderRow>,
}

impl RenderRow {
    pub fn is_folder(&self) -> bool {
        self.kind == RowKind::Folder
    }

    pub fn icon(&self) -> &'static str {
        match self.kind {
            RowKind::Folder if self.is_open => "▾",
            RowKind::Folder => "▸",
            RowKind::File(FileKind::Image) => "▣",
            RowKind::File(FileKind::Pdf) => "▤",
            RowKind::File(FileKind::Other) => "·",
        }
    }

    /// Indented icon and name, as shown in the first column.
    pub fn label(&self) -> String {
        format!("{}{} {}", INDENT.repeat(self.depth), self.icon(), self.name)
    }

    pub fn size_text(&self) -> String {
        self.size.map(file_size).unwrap_or_default()
    }

    pub fn modified_text(&self, now: DateTime<Utc>) -> String {
        if self.is_folder() {
            return String::new();
        }
        time_ago(self.modified, now)
    }
}

/// Browser state a row needs to know about.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub selection: Option<&'a str>,
    pub active_action: Option<ActiveAction>,
    pub action_target: Option<&'a str>,
    pub open_folders: &'a OpenFolders,
    pub filtering: bool,
    pub nest_children: bool,
}

impl RowContext<'_> {
    fn targets(&self, action: ActiveAction, key: &str) -> bool {
        self.active_action == Some(action) && self.action_target == Some(key)
    }
}

fn make_row(entry: &Entry, context: &RowContext<'_>, depth: usize) -> RenderRow {
    let file_key = entry.key().to_string();
    let kind = if entry.is_folder() {
        RowKind::Folder
    } else {
        RowKind::File(key::file_kind(&file_key))
    };

    RenderRow {
        id: format!("file-{}", file_key),
        name: entry.display_name(),
        kind,
        size: (!entry.is_folder()).then(|| entry.size()),
        modified: entry.modified(),
        depth: if context.filtering { 0 } else { depth },
        is_selected: context.selection == Some(file_key.as_str()),
        is_open: context.open_folders.is_open(&file_key) || context.filtering,
        is_renaming: context.targets(ActiveAction::Rename, &file_key),
        is_deleting: context.targets(ActiveAction::Delete, &file_key),
        is_draft: entry.is_draft(),
        key_derived: entry.key_derived(),
        children: Vec::new(),
        file_key,
    }
}

/// Walk the sorted tree and emit the visible rows.
///
/// While filtering, folder rows are hidden and every matching file is shown
/// flat at depth 0. Otherwise open folders contribute their children, either
/// as following rows or nested in the folder row.
pub fn build_rows(entries: &[Entry], context: &RowContext<'_>, depth: usize) -> Vec<RenderRow> {
    let mut rows = Vec::new();

    for entry in entries {
        let mut row = make_row(entry, context, depth);

        if !entry.is_folder() {
            rows.push(row);
            continue;
        }

        if context.filtering {
            rows.extend(build_rows(entry.children(), context, depth + 1));
            continue;
        }

        let is_open = row.is_open;
        if is_open && context.nest_children {
            row.children = build_rows(entry.children(), context, depth + 1);
        }
        rows.push(row);
        if is_open && !context.nest_children {
            rows.extend(build_rows(entry.children(), context, depth + 1));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileRecord;
    use crate::sort::natural_sort;
    use crate::tree::group_by_folder;

    fn tree() -> Vec<Entry> {
        let records = vec![
            FileRecord::file("photos/cat.png", 10),
            FileRecord::file("photos/animals/dog.png", 20),
            FileRecord::file("readme.md", 30),
        ];
        natural_sort(group_by_folder(&records, "").unwrap())
    }

    fn context(open: &OpenFolders) -> RowContext<'_> {
        RowContext {
            selection: None,
            active_action: None,
            action_target: None,
            open_folders: open,
            filtering: false,
            nest_children: false,
        }
    }

    fn labels(rows: &[RenderRow]) -> Vec<String> {
        rows.iter().map(RenderRow::label).collect()
    }

    #[test]
    fn test_closed_folders_hide_children() {
        let open = OpenFolders::default();
        let rows = build_rows(&tree(), &context(&open), 0);
        assert_eq!(labels(&rows), vec!["▸ photos", "· readme.md"]);
        assert_eq!(rows[1].size_text(), "30 B");
        assert_eq!(rows[0].size_text(), "");
    }

    #[test]
    fn test_open_folders_follow_with_depth() {
        let mut open = OpenFolders::default();
        open.open("photos/");
        let rows = build_rows(&tree(), &context(&open), 0);

        assert_eq!(
            labels(&rows),
            vec!["▾ photos", "  ▸ animals", "  ▣ cat.png", "· readme.md"]
        );
        assert_eq!(rows[2].id, "file-photos/cat.png");
    }

    #[test]
    fn test_nested_children() {
        let mut open = OpenFolders::default();
        open.open("photos/");
        let mut ctx = context(&open);
        ctx.nest_children = true;
        let rows = build_rows(&tree(), &ctx, 0);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].children.len(), 2);
    }

    #[test]
    fn test_filtering_flattens_files() {
        let open = OpenFolders::default();
        let mut ctx = context(&open);
        ctx.filtering = true;
        let rows = build_rows(&tree(), &ctx, 0);

        assert_eq!(labels(&rows), vec!["▣ dog.png", "▣ cat.png", "· readme.md"]);
        assert!(rows.iter().all(|row| row.depth == 0 && !row.is_folder()));
    }

    #[test]
    fn test_row_flags() {
        let open = OpenFolders::default();
        let mut ctx = context(&open);
        ctx.selection = Some("readme.md");
        ctx.active_action = Some(ActiveAction::Rename);
        ctx.action_target = Some("readme.md");
        let rows = build_rows(&tree(), &ctx, 0);

        assert!(rows[1].is_selected);
        assert!(rows[1].is_renaming);
        assert!(!rows[1].is_deleting);
        assert!(!rows[0].is_selected);
        assert!(rows[1].key_derived);
    }
}
