//! The reading order: an ordered chain of document identifiers with a cursor.

use crate::error::NavError;
use crate::util::normalize_path;

/// Ordered, deduplicated list of document identifiers.
///
/// Identifiers are stored as given; comparisons go through
/// [`normalize_path`], so lookups are case-insensitive and ignore fragments,
/// percent-encoding and `./` segments. Failed moves leave the cursor where it
/// was.
#[derive(Debug, Clone, Default)]
pub struct Spine {
    files: Vec<String>,
    keys: Vec<String>,
    cursor: usize,
}

impl Spine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` unless an equivalent identifier is already present.
    ///
    /// Returns `true` when the identifier was added.
    pub fn add_file(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        let key = normalize_path(&id);
        if key.is_empty() || self.keys.contains(&key) {
            return false;
        }
        self.files.push(id);
        self.keys.push(key);
        true
    }

    /// Remove every identifier and reset the cursor.
    pub fn clear(&mut self) {
        self.files.clear();
        self.keys.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn file_at(&self, index: usize) -> Option<&str> {
        self.files.get(index).map(String::as_str)
    }

    /// Cursor position; meaningful only when the spine is not empty.
    pub fn index(&self) -> usize {
        self.cursor
    }

    /// Identifier under the cursor.
    pub fn current(&self) -> Option<&str> {
        self.file_at(self.cursor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn first_file(&mut self) -> Result<&str, NavError> {
        if self.is_empty() {
            return Err(NavError::NotInitialized);
        }
        self.cursor = 0;
        Ok(&self.files[0])
    }

    pub fn last_file(&mut self) -> Result<&str, NavError> {
        if self.is_empty() {
            return Err(NavError::NotInitialized);
        }
        self.cursor = self.files.len() - 1;
        Ok(&self.files[self.cursor])
    }

    /// Step forward. At the last document this returns `AtEnd` and leaves
    /// the cursor unchanged; the error carries no identifier, so the
    /// boundary document is read back through [`Spine::current`].
    pub fn next_file(&mut self) -> Result<&str, NavError> {
        if self.is_empty() {
            return Err(NavError::NotInitialized);
        }
        if self.cursor + 1 >= self.files.len() {
            return Err(NavError::AtEnd);
        }
        self.cursor += 1;
        Ok(&self.files[self.cursor])
    }

    /// Step backward. At the first document this returns `AtBeginning` and
    /// leaves the cursor unchanged, so [`Spine::current`] still names the
    /// first document.
    pub fn previous_file(&mut self) -> Result<&str, NavError> {
        if self.is_empty() {
            return Err(NavError::NotInitialized);
        }
        if self.cursor == 0 {
            return Err(NavError::AtBeginning);
        }
        self.cursor -= 1;
        Ok(&self.files[self.cursor])
    }

    /// Index of the document equivalent to `id`, if any.
    pub fn find(&self, id: &str) -> Option<usize> {
        let key = normalize_path(id);
        self.keys.iter().position(|k| *k == key)
    }

    /// Move the cursor to the document equivalent to `id`.
    pub fn go_to_file(&mut self, id: &str) -> Result<&str, NavError> {
        let index = self.find(id).ok_or(NavError::NotFound)?;
        self.cursor = index;
        Ok(&self.files[index])
    }

    /// Move the cursor to `index`.
    pub fn go_to_index(&mut self, index: usize) -> Result<&str, NavError> {
        if index >= self.files.len() {
            return Err(NavError::NotFound);
        }
        self.cursor = index;
        Ok(&self.files[index])
    }
}

impl<S: Into<String>> FromIterator<S> for Spine {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut spine = Spine::new();
        for id in iter {
            spine.add_file(id);
        }
        spine
    }
}
