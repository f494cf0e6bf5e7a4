//! Orderings over built trees. Folders always precede files at every level.

use std::cmp::Ordering;

use crate::key;
use crate::record::Entry;

/// One piece of a name for natural comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk<'a> {
    /// A run of ASCII digits.
    Number(&'a str),
    Text(&'a str),
}

fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (index, ch) in name.char_indices() {
        let is_digit = ch.is_ascii_digit();
        match in_digits {
            Some(previous) if previous != is_digit => {
                out.push(chunk(&name[start..index], previous));
                start = index;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(is_digit) = in_digits {
        out.push(chunk(&name[start..], is_digit));
    }
    out
}

fn chunk(text: &str, is_digit: bool) -> Chunk<'_> {
    if is_digit {
        Chunk::Number(text)
    } else {
        Chunk::Text(text)
    }
}

/// Compare digit runs by value, without overflow for long runs.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn compare_chunks(a: &Chunk<'_>, b: &Chunk<'_>) -> Ordering {
    match (a, b) {
        (Chunk::Number(a), Chunk::Number(b)) => compare_numbers(a, b),
        (Chunk::Text(a), Chunk::Text(b)) => compare_text(a, b),
        (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
        (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
    }
}

/// Natural order: digit runs compare numerically, text case-insensitively,
/// and a name that is a chunk-prefix of another sorts first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let aa = chunks(a);
    let bb = chunks(b);
    for (x, y) in aa.iter().zip(bb.iter()) {
        let ordering = compare_chunks(x, y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    aa.len().cmp(&bb.len())
}

fn natural_entry_cmp(a: &Entry, b: &Entry) -> Ordering {
    natural_cmp(a.name().unwrap_or(""), b.name().unwrap_or(""))
}

/// Drafts go last, then natural order.
fn natural_draft_cmp(a: &Entry, b: &Entry) -> Ordering {
    a.is_draft()
        .cmp(&b.is_draft())
        .then_with(|| natural_entry_cmp(a, b))
}

fn set_name(entry: &mut Entry, name: String) {
    match entry {
        Entry::File(file) => file.name = Some(name),
        Entry::Folder(folder) => folder.name = Some(name),
    }
}

fn fill_missing_name(entry: &mut Entry) {
    if entry.name().is_some() {
        return;
    }
    let name = if entry.is_folder() {
        key::folder_name(entry.effective_key()).unwrap_or("").to_string()
    } else {
        key::file_name(entry.effective_key()).to_string()
    };
    set_name(entry, name);
}

fn split_folders(entries: Vec<Entry>) -> (Vec<Entry>, Vec<Entry>) {
    entries.into_iter().partition(Entry::is_folder)
}

fn sort_children(entry: &mut Entry, sort: fn(Vec<Entry>) -> Vec<Entry>) {
    if let Entry::Folder(folder) = entry {
        let children = std::mem::take(&mut folder.children);
        folder.children = sort(children);
    }
}

/// Most recently modified files first; folders keep their relative order.
///
/// File names are reset to the last key segment. Files without a timestamp
/// go after all dated files.
pub fn last_modified_sort(entries: Vec<Entry>) -> Vec<Entry> {
    let (mut folders, mut files) = split_folders(entries);

    for file in &mut files {
        let name = key::file_name(file.effective_key()).to_string();
        set_name(file, name);
    }
    files.sort_by(|a, b| match (a.modified(), b.modified()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    for folder in &mut folders {
        sort_children(folder, last_modified_sort);
    }

    folders.extend(files);
    folders
}

/// Natural name order with draft folders last.
pub fn natural_sort(entries: Vec<Entry>) -> Vec<Entry> {
    let (mut folders, mut files) = split_folders(entries);

    for entry in folders.iter_mut().chain(files.iter_mut()) {
        fill_missing_name(entry);
    }
    files.sort_by(natural_entry_cmp);
    folders.sort_by(natural_draft_cmp);

    for folder in &mut folders {
        sort_children(folder, natural_sort);
    }

    folders.extend(files);
    folders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileRecord;
    use crate::tree::group_by_folder;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn names(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(|e| e.name().unwrap_or("").to_string()).collect()
    }

    fn files(keys: &[&str]) -> Vec<Entry> {
        keys.iter()
            .map(|key| Entry::from_record(&FileRecord::file(*key, 1)))
            .collect()
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(natural_cmp("File2", "file1"), Ordering::Greater);
        assert_eq!(natural_cmp("abc", "ABC"), Ordering::Equal);
        assert_eq!(natural_cmp("file", "file1"), Ordering::Less);
        assert_eq!(natural_cmp("img007", "img7"), Ordering::Equal);
        assert_eq!(
            natural_cmp("v99999999999999999999999", "v100000000000000000000000"),
            Ordering::Less
        );
        assert_eq!(natural_cmp("2", "a"), Ordering::Less);
    }

    #[test]
    fn test_natural_sort_numeric_chunks() {
        let sorted = natural_sort(files(&["file2", "file10", "file1"]));
        assert_eq!(names(&sorted), vec!["file1", "file2", "file10"]);
    }

    #[test]
    fn test_natural_sort_drafts_last() {
        let mut draft = FileRecord::folder("aaa/");
        draft.draft = true;
        let records = vec![
            draft,
            FileRecord::folder("zeta/"),
            FileRecord::folder("beta/"),
            FileRecord::file("readme.md", 1),
        ];
        let sorted = natural_sort(records.iter().map(Entry::from_record).collect());

        assert_eq!(names(&sorted), vec!["beta", "zeta", "aaa", "readme.md"]);
        assert!(sorted[2].is_draft());
    }

    #[test]
    fn test_natural_sort_recurses_and_keeps_names() {
        let mut named = FileRecord::folder("photos/");
        named.name = Some("Pictures".to_string());
        let records = vec![
            FileRecord::file("photos/img10.png", 1),
            FileRecord::file("photos/img9.png", 1),
            FileRecord::file("docs/b.md", 1),
            named,
        ];
        let sorted = natural_sort(group_by_folder(&records, "").unwrap());

        assert_eq!(names(&sorted), vec!["docs", "Pictures"]);
        assert_eq!(names(sorted[1].children()), vec!["img9.png", "img10.png"]);
    }

    #[test]
    fn test_last_modified_sort() {
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        let records = vec![
            FileRecord::file("cat.png", 1).with_modified(at(3)),
            FileRecord::file("kitten.png", 1).with_modified(at(100)),
            FileRecord::file("elephant.png", 1).with_modified(at(40)),
            FileRecord::file("undated.png", 1),
        ];
        let sorted = last_modified_sort(records.iter().map(Entry::from_record).collect());
        assert_eq!(names(&sorted), vec!["kitten.png", "elephant.png", "cat.png", "undated.png"]);
    }

    #[test]
    fn test_last_modified_sort_keeps_folder_order() {
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        let records = vec![
            FileRecord::file("zoo/old.png", 1).with_modified(at(1)),
            FileRecord::file("zoo/new.png", 1).with_modified(at(2)),
            FileRecord::file("alpha/a.png", 1),
            FileRecord::file("top.png", 1),
        ];
        let sorted = last_modified_sort(group_by_folder(&records, "").unwrap());

        let keys: Vec<&str> = sorted.iter().map(Entry::key).collect();
        assert_eq!(keys, vec!["zoo/", "alpha/", "top.png"]);
        assert_eq!(names(sorted[0].children()), vec!["new.png", "old.png"]);
    }

    #[test]
    fn test_sorting_leaves_caller_tree_alone() {
        let tree = group_by_folder(&[FileRecord::file("a/2.png", 1), FileRecord::file("a/1.png", 1)], "").unwrap();
        let snapshot = tree.clone();
        let sorted = natural_sort(tree.clone());

        assert_eq!(tree, snapshot);
        assert_ne!(sorted, snapshot);
    }
}
