//! File records as supplied by the caller, and the tree entries built from them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BrowserError, Result};
use crate::key;

/// A flat, caller-supplied record. Folder iff `size` is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub draft: bool,
}

impl FileRecord {
    pub fn file(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn folder(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.size.is_none()
    }

    /// Key used for path derivation: a pending rename wins over `key`.
    pub fn effective_key(&self) -> &str {
        self.new_key.as_deref().unwrap_or(&self.key)
    }

    /// Parse a JSON array of records.
    pub fn list_from_json(text: &str) -> Result<Vec<FileRecord>> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Timestamps arrive either as RFC 3339 text or as Unix milliseconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| BrowserError::InvalidTimestamp(text.to_string()))
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| BrowserError::InvalidTimestamp(millis.to_string()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    let parsed = match raw {
        None => return Ok(None),
        Some(RawTimestamp::Millis(millis)) => timestamp_from_millis(millis),
        Some(RawTimestamp::Text(text)) => parse_timestamp(&text),
    };
    parsed.map(Some).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,
    #[serde(default)]
    pub relative_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub key_derived: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,
    #[serde(default)]
    pub relative_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub key_derived: bool,
    #[serde(default)]
    pub children: Vec<Entry>,
}

/// A node of a built tree: a leaf file or a folder owning its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    File(FileEntry),
    Folder(FolderEntry),
}

impl FileEntry {
    /// Copy of a file record, as placed by a grouper.
    pub fn from_record(record: &FileRecord, relative_key: String) -> Self {
        Self {
            key: record.key.clone(),
            new_key: record.new_key.clone(),
            relative_key,
            name: record.name.clone(),
            size: record.size.unwrap_or(0),
            modified: record.modified,
            draft: record.draft,
            key_derived: true,
        }
    }
}

impl Entry {
    /// Wrap a flat record without any grouping.
    pub fn from_record(record: &FileRecord) -> Self {
        if record.is_folder() {
            Entry::Folder(FolderEntry {
                key: record.key.clone(),
                new_key: record.new_key.clone(),
                relative_key: record.key.clone(),
                name: record.name.clone(),
                modified: record.modified,
                draft: record.draft,
                key_derived: false,
                children: Vec::new(),
            })
        } else {
            let mut file = FileEntry::from_record(record, record.key.clone());
            file.key_derived = false;
            Entry::File(file)
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Entry::File(file) => &file.key,
            Entry::Folder(folder) => &folder.key,
        }
    }

    pub fn effective_key(&self) -> &str {
        match self {
            Entry::File(file) => file.new_key.as_deref().unwrap_or(&file.key),
            Entry::Folder(folder) => folder.new_key.as_deref().unwrap_or(&folder.key),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Entry::File(file) => file.name.as_deref(),
            Entry::Folder(folder) => folder.name.as_deref(),
        }
    }

    /// Display name: explicit name, otherwise derived from the key.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name() {
            return name.to_string();
        }
        match self {
            Entry::File(_) => key::file_name(self.effective_key()).to_string(),
            Entry::Folder(_) => key::folder_name(self.effective_key())
                .unwrap_or_else(|| key::base_name(self.effective_key()))
                .to_string(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Entry::File(file) => file.size,
            Entry::Folder(_) => 0,
        }
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        match self {
            Entry::File(file) => file.modified,
            Entry::Folder(folder) => folder.modified,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder(_))
    }

    pub fn is_draft(&self) -> bool {
        match self {
            Entry::File(file) => file.draft,
            Entry::Folder(folder) => folder.draft,
        }
    }

    pub fn key_derived(&self) -> bool {
        match self {
            Entry::File(file) => file.key_derived,
            Entry::Folder(folder) => folder.key_derived,
        }
    }

    pub fn children(&self) -> &[Entry] {
        match self {
            Entry::File(_) => &[],
            Entry::Folder(folder) => &folder.children,
        }
    }

    /// Depth-first search for the entry with `key`.
    pub fn find<'a>(entries: &'a [Entry], key: &str) -> Option<&'a Entry> {
        for entry in entries {
            if entry.key() == key {
                return Some(entry);
            }
            if let Some(found) = Entry::find(entry.children(), key) {
                return Some(found);
            }
        }
        None
    }

    /// Flatten back into records: files with their sizes and every folder key.
    pub fn flatten(entries: &[Entry]) -> Vec<FileRecord> {
        let mut records = Vec::new();
        flatten_into(entries, &mut records);
        records
    }
}

fn flatten_into(entries: &[Entry], out: &mut Vec<FileRecord>) {
    for entry in entries {
        match entry {
            Entry::File(file) => out.push(FileRecord {
                key: file.key.clone(),
                new_key: file.new_key.clone(),
                size: Some(file.size),
                name: file.name.clone(),
                modified: file.modified,
                draft: file.draft,
            }),
            Entry::Folder(folder) => {
                out.push(FileRecord {
                    key: folder.key.clone(),
                    new_key: folder.new_key.clone(),
                    size: None,
                    name: folder.name.clone(),
                    modified: folder.modified,
                    draft: folder.draft,
                });
                flatten_into(&folder.children, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_timestamps() {
        let records = FileRecord::list_from_json(
            r#"[
                {"key": "a/cat.png", "size": 10, "modified": 1500000000000},
                {"key": "a/dog.png", "size": 20, "modified": "2017-07-14T02:40:00Z"},
                {"key": "b/", "draft": true}
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].modified.unwrap().timestamp_millis(), 1_500_000_000_000);
        assert_eq!(records[1].modified.unwrap().timestamp(), 1_500_000_000);
        assert!(records[2].is_folder());
        assert!(records[2].draft);
    }

    #[test]
    fn test_record_json_rejects_bad_timestamp() {
        let err = FileRecord::list_from_json(r#"[{"key": "a.png", "size": 1, "modified": "yesterday"}]"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn test_display_name() {
        let file = Entry::from_record(&FileRecord::file("a/b/c.png", 1));
        assert_eq!(file.display_name(), "c.png");

        let folder = Entry::from_record(&FileRecord::folder("a/b/"));
        assert_eq!(folder.display_name(), "b");

        let mut renamed = FileRecord::file("a/old.png", 1);
        renamed.new_key = Some("a/new.png".to_string());
        assert_eq!(Entry::from_record(&renamed).display_name(), "new.png");
    }
}
