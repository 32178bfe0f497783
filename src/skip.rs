//! Skip options: user-togglable categories of structure.
//!
//! A skip option is named by the same id that time containers carry in their
//! skip-option tag (DAISY 3 `customTest`). Its `state` is `true` when the
//! category is rendered and `false` when containers tagged with it are
//! skipped during traversal.

/// One named render/skip toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct SkipOption {
    pub id: String,
    /// Current state: `true` renders, `false` skips.
    pub state: bool,
    pub default_state: bool,
}

impl SkipOption {
    /// A new option whose state starts at its default.
    pub fn new(id: impl Into<String>, default_state: bool) -> Self {
        Self {
            id: id.into(),
            state: default_state,
            default_state,
        }
    }

    pub fn is_skipped(&self) -> bool {
        !self.state
    }
}

/// The book-wide skip-option registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipOptions {
    options: Vec<SkipOption>,
}

impl SkipOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, replacing any existing option with the same id.
    pub fn add(&mut self, option: SkipOption) {
        match self.options.iter_mut().find(|o| o.id == option.id) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
    }

    /// Add an option only if its id is not registered yet.
    ///
    /// Returns `true` when the option was added.
    pub fn add_if_missing(&mut self, option: SkipOption) -> bool {
        if self.contains(&option.id) {
            return false;
        }
        self.options.push(option);
        true
    }

    /// Set the state of `id`. Returns `false` if no such option exists.
    pub fn change(&mut self, id: &str, state: bool) -> bool {
        match self.options.iter_mut().find(|o| o.id == id) {
            Some(option) => {
                option.state = state;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&SkipOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Whether containers tagged `id` are currently skipped.
    ///
    /// Unknown ids are rendered.
    pub fn is_skipped(&self, id: &str) -> bool {
        self.get(id).is_some_and(SkipOption::is_skipped)
    }

    /// Put every option back to its default state.
    pub fn reset(&mut self) {
        for option in &mut self.options {
            option.state = option.default_state;
        }
    }

    /// Remove every option.
    pub fn clear(&mut self) {
        self.options.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SkipOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl FromIterator<SkipOption> for SkipOptions {
    fn from_iter<I: IntoIterator<Item = SkipOption>>(iter: I) -> Self {
        let mut options = SkipOptions::new();
        for option in iter {
            options.add(option);
        }
        options
    }
}

impl<'a> IntoIterator for &'a SkipOptions {
    type Item = &'a SkipOption;
    type IntoIter = std::slice::Iter<'a, SkipOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
