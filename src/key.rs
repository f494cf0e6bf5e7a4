//! Key parsing: flat slash-delimited keys to path segments and back.
//!
//! A key ending in `/` names a folder, anything else names a file. Keys are
//! never normalized; `"a//b"` keeps its empty segment and callers skip it.

use crate::error::{BrowserError, Result};

/// Placeholder segment used for a folder that is still being named.
pub const NEW_FOLDER_SEGMENT: &str = "__new__";

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Rough file classification used for row icons and previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
    Other,
}

pub fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('/')
}

pub fn is_folder_key(key: &str) -> bool {
    key.ends_with('/')
}

/// Last segment of the key, which is empty for folder keys.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Second to last segment, i.e. the folder name of a `".../name/"` key.
pub fn folder_name(key: &str) -> Option<&str> {
    let mut parts = key.rsplit('/');
    parts.next()?;
    parts.next()
}

/// Last non-empty segment.
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').find(|part| !part.is_empty()).unwrap_or("")
}

/// Folder prefix an item dropped on `key` lands in.
///
/// Dropping on a file targets its containing folder, dropping on a folder
/// targets the folder itself.
pub fn drop_path(key: &str) -> &str {
    match key.rfind('/') {
        Some(index) => &key[..=index],
        None => "",
    }
}

/// Trimmed, validated replacement name for a rename or folder creation.
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BrowserError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be blank",
        });
    }
    if trimmed.contains('/') {
        return Err(BrowserError::InvalidName {
            name: name.to_string(),
            reason: "names cannot contain forward slashes",
        });
    }
    Ok(trimmed)
}

/// Key of `file_key` after renaming its last segment to `new_name`.
pub fn renamed_file_key(file_key: &str, new_name: &str) -> Result<String> {
    let new_name = validate_name(new_name)?;
    Ok(match file_key.rfind('/') {
        Some(index) => format!("{}/{}", &file_key[..index], new_name),
        None => new_name.to_string(),
    })
}

/// Key of `folder_key` after renaming the folder itself to `new_name`.
pub fn renamed_folder_key(folder_key: &str, new_name: &str) -> Result<String> {
    let new_name = validate_name(new_name)?;
    let trimmed = folder_key.strip_suffix('/').unwrap_or(folder_key);
    let mut key = match trimmed.rfind('/') {
        Some(index) => format!("{}/", &trimmed[..index]),
        None => String::new(),
    };
    key.push_str(new_name);
    key.push('/');
    Ok(key)
}

/// Destination of a file dropped into `target_path`, or `None` for a no-op.
pub fn moved_file_key(file_key: &str, target_path: &str) -> Option<String> {
    let new_key = format!("{}{}", target_path, file_name(file_key));
    (new_key != file_key).then_some(new_key)
}

/// Destination of a folder dropped into `target_path`.
///
/// Returns `None` when the drop is a no-op or would move the folder inside
/// itself.
pub fn moved_folder_key(folder_key: &str, target_path: &str) -> Option<String> {
    let name = folder_name(folder_key)?;
    let new_key = format!("{}{}/", target_path, name);
    if new_key.starts_with(folder_key) {
        return None;
    }
    Some(new_key)
}

/// Key of the draft folder created under the current selection.
pub fn draft_folder_key(selection: Option<&str>) -> String {
    let mut key = String::new();
    if let Some(selection) = selection {
        key.push_str(selection);
        if !key.ends_with('/') {
            key.push('/');
        }
    }
    key.push_str(NEW_FOLDER_SEGMENT);
    key.push('/');
    key
}

pub fn extension(key: &str) -> String {
    key.rsplit('.').next().unwrap_or("").trim().to_lowercase()
}

pub fn file_kind(key: &str) -> FileKind {
    let extension = extension(key);
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        FileKind::Image
    } else if extension == "pdf" {
        FileKind::Pdf
    } else {
        FileKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(file_name("a/b/c.png"), "c.png");
        assert_eq!(file_name("c.png"), "c.png");
        assert_eq!(file_name("a/b/"), "");
        assert_eq!(folder_name("a/b/"), Some("b"));
        assert_eq!(folder_name("b/"), Some("b"));
        assert_eq!(folder_name("b"), None);
        assert_eq!(base_name("a/b/"), "b");
        assert_eq!(base_name("a/b/c.png"), "c.png");
        assert!(is_folder_key("a/"));
        assert!(!is_folder_key("a"));
    }

    #[test]
    fn test_drop_path() {
        assert_eq!(drop_path("photos/cat.png"), "photos/");
        assert_eq!(drop_path("photos/animals/"), "photos/animals/");
        assert_eq!(drop_path("cat.png"), "");
    }

    #[test]
    fn test_rename_keys() {
        assert_eq!(renamed_file_key("a/b/c.png", " d.png ").unwrap(), "a/b/d.png");
        assert_eq!(renamed_file_key("c.png", "d.png").unwrap(), "d.png");
        assert_eq!(renamed_folder_key("a/b/", "z").unwrap(), "a/z/");
        assert_eq!(renamed_folder_key("b/", "z").unwrap(), "z/");
        assert!(matches!(
            renamed_file_key("a.png", "   "),
            Err(BrowserError::InvalidName { .. })
        ));
        assert!(matches!(
            renamed_folder_key("a/", "x/y"),
            Err(BrowserError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_move_keys() {
        assert_eq!(
            moved_file_key("photos/cat.png", "archive/"),
            Some("archive/cat.png".to_string())
        );
        assert_eq!(moved_file_key("photos/cat.png", "photos/"), None);
        assert_eq!(
            moved_folder_key("photos/animals/", "archive/"),
            Some("archive/animals/".to_string())
        );
        // Into itself or a descendant.
        assert_eq!(moved_folder_key("photos/", "photos/"), None);
        assert_eq!(moved_folder_key("photos/", "photos/animals/"), None);
    }

    #[test]
    fn test_draft_folder_key() {
        assert_eq!(draft_folder_key(None), "__new__/");
        assert_eq!(draft_folder_key(Some("photos/")), "photos/__new__/");
        assert_eq!(draft_folder_key(Some("photos/cat.png")), "photos/cat.png/__new__/");
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(file_kind("a/B.JPG"), FileKind::Image);
        assert_eq!(file_kind("doc.pdf"), FileKind::Pdf);
        assert_eq!(file_kind("notes.txt"), FileKind::Other);
        assert_eq!(extension("archive.tar.GZ "), "gz");
    }
}
