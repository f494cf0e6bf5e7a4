use std::collections::BTreeSet;

/// Tracks which folder keys are open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenFolders {
    open: BTreeSet<String>,
}

impl OpenFolders {
    pub fn open(&mut self, key: &str) {
        self.open.insert(key.to_string());
    }

    /// Remove only this folder; descendants keep their state.
    pub fn close(&mut self, key: &str) {
        self.open.remove(key);
    }

    /// Remove this folder and every folder under it.
    pub fn close_recursive(&mut self, key: &str) {
        self.open.retain(|open| !open.starts_with(key));
    }

    pub fn toggle(&mut self, key: &str) {
        if !self.open.remove(key) {
            self.open.insert(key.to_string());
        }
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.open.contains(key)
    }

    /// Carry open state from `old_key` (and anything under it) to `new_key`.
    pub fn rekey(&mut self, old_key: &str, new_key: &str) {
        let moved: Vec<String> = self
            .open
            .iter()
            .filter(|open| open.starts_with(old_key))
            .cloned()
            .collect();
        for key in moved {
            self.open.remove(&key);
            self.open.insert(format!("{}{}", new_key, &key[old_key.len()..]));
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.open.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }
}
