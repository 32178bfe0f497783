//! Book-level navigation across the spine.
//!
//! An [`Engine`] owns the [`Spine`], the skip registry and exactly one live
//! [`Tree`]. When the live tree runs out in the direction of travel, the
//! engine steps the spine, builds the neighbouring document through its
//! [`BookSource`] and retries there. The tree being replaced is held in
//! a pending slot until the new one delivers a phrase, so a
//! failed move puts everything back the way it was.

use tracing::{debug, warn};

use crate::error::{Error, NavError, SearchError, Status};
use crate::model::MediaGroup;
use crate::search::{SearchHit, TimeSearch};
use crate::skip::{SkipOption, SkipOptions};
use crate::source::BookSource;
use crate::spine::Spine;
use crate::tree::Tree;

/// Skip categories every DAISY 3 book may use.
pub const STANDARD_SKIP_OPTIONS: [&str; 7] = [
    "pagenum",
    "note",
    "noteref",
    "annotation",
    "linenum",
    "sidebar",
    "prodnote",
];

/// Engine settings applied on every [`Engine::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Registry contents right after opening a book.
    pub skip_options: Vec<SkipOption>,
    /// Whether a failed [`Engine::load_position`] returns to the last
    /// delivered position.
    pub rollback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_options: STANDARD_SKIP_OPTIONS
                .iter()
                .map(|id| SkipOption::new(*id, true))
                .collect(),
            rollback: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a default skip option.
    pub fn with_skip_option(mut self, id: impl Into<String>, render: bool) -> Self {
        let option = SkipOption::new(id, render);
        match self.skip_options.iter_mut().find(|o| o.id == option.id) {
            Some(existing) => *existing = option,
            None => self.skip_options.push(option),
        }
        self
    }

    /// Start from an empty registry; options come only from the documents.
    pub fn without_skip_options(mut self) -> Self {
        self.skip_options.clear();
        self
    }

    pub fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback = rollback;
        self
    }
}

/// Which end of the book [`Engine::open`] starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Entry {
    #[default]
    Start,
    End,
}

/// The last successfully delivered position.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct PositionRecord {
    pub document: String,
    pub element: String,
}

/// Result of [`Engine::seek`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct SeekOutcome {
    /// Phrase delivered at the resolved position.
    pub group: MediaGroup,
    pub hit: SearchHit,
}

/// Holder for the live tree.
///
/// `PendingReplace` exists only inside a single engine call: a replacement
/// tree has been built but has not delivered a phrase yet.
#[derive(Debug, Default)]
enum TreeSlot {
    #[default]
    Empty,
    Loaded(Tree),
    PendingReplace { current: Tree, previous: Tree },
}

impl TreeSlot {
    fn live(&self) -> Option<&Tree> {
        match self {
            TreeSlot::Empty => None,
            TreeSlot::Loaded(tree) | TreeSlot::PendingReplace { current: tree, .. } => Some(tree),
        }
    }

    fn live_mut(&mut self) -> Option<&mut Tree> {
        match self {
            TreeSlot::Empty => None,
            TreeSlot::Loaded(tree) | TreeSlot::PendingReplace { current: tree, .. } => Some(tree),
        }
    }

    /// Make `tree` live, keeping the committed tree for [`rollback`](Self::rollback).
    fn stage(&mut self, tree: Tree) {
        *self = match std::mem::take(self) {
            TreeSlot::Empty => TreeSlot::Loaded(tree),
            TreeSlot::Loaded(previous) | TreeSlot::PendingReplace { previous, .. } => {
                TreeSlot::PendingReplace {
                    current: tree,
                    previous,
                }
            }
        };
    }

    fn commit(&mut self) {
        *self = match std::mem::take(self) {
            TreeSlot::PendingReplace { current, .. } => TreeSlot::Loaded(current),
            other => other,
        };
    }

    fn rollback(&mut self) {
        *self = match std::mem::take(self) {
            TreeSlot::PendingReplace { previous, .. } => TreeSlot::Loaded(previous),
            other => other,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Previous,
    Escape,
}

impl Step {
    fn forward(self) -> bool {
        self != Step::Previous
    }
}

/// Navigation over a whole book.
///
/// ```
/// use daisy_nav::{Engine, Entry, MemorySource};
///
/// let smil = r#"<smil><body><seq>
///   <par id="p1"><text id="t1" src="book.html#t1"/></par>
///   <par id="p2"><text id="t2" src="book.html#t2"/></par>
/// </seq></body></smil>"#;
/// let source = MemorySource::new().with_smil("a.smil", smil);
///
/// let mut engine = Engine::new(source);
/// let group = engine.open(Entry::Start).unwrap();
/// assert_eq!(group.id, "p1");
/// assert_eq!(engine.next().unwrap().id, "p2");
/// assert!(engine.next().is_err());
/// ```
#[derive(Debug)]
pub struct Engine<S: BookSource> {
    source: S,
    config: EngineConfig,
    spine: Spine,
    skips: SkipOptions,
    slot: TreeSlot,
    last_good: Option<PositionRecord>,
    in_rollback: bool,
    status: Status,
}

impl<S: BookSource> Engine<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: S, config: EngineConfig) -> Self {
        let skips = config.skip_options.iter().cloned().collect();
        Self {
            source,
            config,
            spine: Spine::new(),
            skips,
            slot: TreeSlot::Empty,
            last_good: None,
            in_rollback: false,
            status: Status::NotInitialized,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Open the book: rebuild the spine and the skip registry, then deliver
    /// the first (or last) phrase of the book.
    pub fn open(&mut self, entry: Entry) -> Result<MediaGroup, NavError> {
        self.close();
        self.skips = self.config.skip_options.iter().cloned().collect();

        let result = self.open_inner(entry);
        if result.is_err() {
            self.close();
        }
        self.finish(result)
    }

    fn open_inner(&mut self, entry: Entry) -> Result<MediaGroup, NavError> {
        for file in self.source.spine()? {
            if !self.spine.add_file(file.as_str()) {
                debug!(document = %file, "duplicate spine entry ignored");
            }
        }
        if self.spine.is_empty() {
            return Err(Error::MissingElement("spine".into()).into());
        }
        debug!(documents = self.spine.len(), ?entry, "opened book");
        self.enter_edge(entry)
    }

    /// Forget the open book. The skip registry is kept.
    pub fn close(&mut self) {
        self.spine.clear();
        self.slot = TreeSlot::Empty;
        self.last_good = None;
        self.status = Status::NotInitialized;
    }

    pub fn is_open(&self) -> bool {
        self.slot.live().is_some()
    }

    /// First phrase of the book.
    pub fn first(&mut self) -> Result<MediaGroup, NavError> {
        let result = self.require_open().and_then(|()| self.enter_edge(Entry::Start));
        self.finish(result)
    }

    /// Last phrase of the book.
    pub fn last(&mut self) -> Result<MediaGroup, NavError> {
        let result = self.require_open().and_then(|()| self.enter_edge(Entry::End));
        self.finish(result)
    }

    pub fn next(&mut self) -> Result<MediaGroup, NavError> {
        let result = self.step(Step::Next);
        self.finish(result)
    }

    pub fn previous(&mut self) -> Result<MediaGroup, NavError> {
        let result = self.step(Step::Previous);
        self.finish(result)
    }

    /// Leave the escapable structure around the current phrase.
    pub fn escape_current(&mut self) -> Result<MediaGroup, NavError> {
        let result = self.step(Step::Escape);
        self.finish(result)
    }

    /// Jump to `element` inside `document`. An empty `element` means the
    /// start of the document.
    ///
    /// If the position cannot be reached, the engine returns to the last
    /// delivered position (once, if enabled in the config) and reports
    /// `NotFound`.
    pub fn load_position(
        &mut self,
        document: &str,
        element: &str,
    ) -> Result<MediaGroup, NavError> {
        let result = self.load_position_inner(document, element);
        self.finish(result)
    }

    fn load_position_inner(
        &mut self,
        document: &str,
        element: &str,
    ) -> Result<MediaGroup, NavError> {
        self.require_open()?;

        let err = match self.try_load_position(document, element) {
            Ok(group) => return Ok(group),
            Err(err) => err,
        };
        warn!(document, element, error = %err, "failed to load position");

        if self.in_rollback || !self.config.rollback {
            return Err(err);
        }
        let Some(last) = self.last_good.clone() else {
            return Err(err);
        };

        self.in_rollback = true;
        let recovered = self.load_position_inner(&last.document, &last.element);
        self.in_rollback = false;

        match recovered {
            Ok(_) => {
                debug!(document = %last.document, element = %last.element, "rolled back");
                Err(NavError::NotFound)
            }
            Err(rollback_err) => {
                warn!(error = %rollback_err, "rollback failed");
                Err(err)
            }
        }
    }

    fn try_load_position(&mut self, document: &str, element: &str) -> Result<MediaGroup, NavError> {
        let start_index = self.spine.index();
        let doc_id = self.spine.go_to_file(document)?.to_string();

        if let Err(e) = self.stage_document(&doc_id) {
            self.abandon(start_index);
            return Err(e.into());
        }

        let skips = &self.skips;
        let Some(tree) = self.slot.live_mut() else {
            return Err(NavError::NotInitialized);
        };
        match tree.go_to_id(element, skips) {
            Ok(group) => {
                self.slot.commit();
                Ok(self.deliver(group))
            }
            Err(e) => {
                self.abandon(start_index);
                Err(e)
            }
        }
    }

    /// Map an absolute time in seconds onto the book and go there.
    ///
    /// Resumes at the phrase holding the clip playing at that time, else at
    /// the last text seen before it, else at the start of the document.
    pub fn seek(&mut self, seconds: i64) -> Result<SeekOutcome, NavError> {
        let result = self.seek_inner(seconds);
        self.status = match &result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        };
        result
    }

    fn seek_inner(&mut self, seconds: i64) -> Result<SeekOutcome, NavError> {
        self.require_open()?;

        let hit = TimeSearch::new(&self.spine, &mut self.source)
            .search(seconds)
            .map_err(|e| {
                warn!(seconds, error = %e, "time search failed");
                match e {
                    SearchError::Load(e) => NavError::Parse(e),
                    SearchError::EmptySpine => NavError::NotInitialized,
                    SearchError::OutOfRange(_) | SearchError::MetadataMissing(_) => {
                        NavError::NotFound
                    }
                }
            })?;
        debug!(
            seconds,
            document = %hit.document,
            offset = hit.document_offset_secs,
            "time search hit"
        );

        let element = hit.resume_id().unwrap_or_default().to_string();
        let group = self.load_position_inner(&hit.document, &element)?;
        Ok(SeekOutcome { group, hit })
    }

    // ------------------------------------------------------------------
    // Skip options
    // ------------------------------------------------------------------

    /// Add (or replace) a skip option.
    pub fn add_skip_option(&mut self, option: SkipOption) {
        self.skips.add(option);
    }

    /// Set whether the option's structures are rendered. Returns `false`
    /// for unknown ids.
    pub fn change_skip_option(&mut self, id: &str, render: bool) -> bool {
        let changed = self.skips.change(id, render);
        if changed {
            debug!(id, render, "skip option changed");
        }
        changed
    }

    pub fn clear_skip_options(&mut self) {
        self.skips.clear();
    }

    /// Put every option back to its default state.
    pub fn reset_skip_options(&mut self) {
        self.skips.reset();
    }

    pub fn skip_options(&self) -> &SkipOptions {
        &self.skips
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Identifier of the live document.
    pub fn current_document_path(&self) -> Option<&str> {
        self.slot.live().map(Tree::document_id)
    }

    /// Id of the current phrase: the leaf id, or its first media id.
    pub fn current_element_id(&self) -> Option<&str> {
        self.slot
            .live()
            .map(Tree::current_id)
            .filter(|id| !id.is_empty())
    }

    /// Status of the last navigation call.
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn spine(&self) -> &Spine {
        &self.spine
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.slot.live()
    }

    pub fn last_position(&self) -> Option<&PositionRecord> {
        self.last_good.as_ref()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_open(&self) -> Result<(), NavError> {
        if self.spine.is_empty() || self.slot.live().is_none() {
            return Err(NavError::NotInitialized);
        }
        Ok(())
    }

    fn finish(&mut self, result: Result<MediaGroup, NavError>) -> Result<MediaGroup, NavError> {
        self.status = Status::of(&result);
        result
    }

    fn step(&mut self, step: Step) -> Result<MediaGroup, NavError> {
        self.require_open()?;

        let skips = &self.skips;
        let Some(tree) = self.slot.live_mut() else {
            return Err(NavError::NotInitialized);
        };
        let result = match step {
            Step::Next => tree.go_next(skips),
            Step::Previous => tree.go_previous(skips),
            Step::Escape => tree.escape_structure(skips),
        };

        match result {
            Ok(group) => Ok(self.deliver(group)),
            Err(e) if e.is_boundary() => {
                let start_index = self.spine.index();
                self.chain(step.forward(), start_index)
            }
            Err(e) => Err(e),
        }
    }

    /// Deliver the first or last phrase of the book.
    fn enter_edge(&mut self, entry: Entry) -> Result<MediaGroup, NavError> {
        let start_index = self.spine.index();
        let forward = entry == Entry::Start;
        let doc_id = match entry {
            Entry::Start => self.spine.first_file(),
            Entry::End => self.spine.last_file(),
        }?
        .to_string();

        match self.enter_document(&doc_id, forward) {
            Ok(group) => Ok(group),
            Err(e) if e.is_boundary() => self.chain(forward, start_index),
            Err(e) => {
                self.abandon(start_index);
                Err(e)
            }
        }
    }

    /// Step the spine until a document delivers a phrase. Runs at most once
    /// per remaining spine entry.
    fn chain(&mut self, forward: bool, start_index: usize) -> Result<MediaGroup, NavError> {
        loop {
            let moved = if forward {
                self.spine.next_file()
            } else {
                self.spine.previous_file()
            }
            .map(str::to_string);

            let doc_id = match moved {
                Ok(id) => id,
                Err(boundary) => {
                    debug!(forward, "spine exhausted");
                    self.abandon(start_index);
                    return Err(boundary);
                }
            };
            debug!(document = %doc_id, forward, "chaining into document");

            match self.enter_document(&doc_id, forward) {
                Ok(group) => return Ok(group),
                Err(e) if e.is_boundary() => continue,
                Err(e) => {
                    self.abandon(start_index);
                    return Err(e);
                }
            }
        }
    }

    /// Build `doc_id` and deliver its first (or last) phrase.
    fn enter_document(&mut self, doc_id: &str, forward: bool) -> Result<MediaGroup, NavError> {
        self.stage_document(doc_id)?;

        let skips = &self.skips;
        let Some(tree) = self.slot.live_mut() else {
            return Err(NavError::NotInitialized);
        };
        let group = if forward {
            tree.go_first(skips)
        } else {
            tree.go_last(skips)
        }?;
        self.slot.commit();
        Ok(self.deliver(group))
    }

    fn stage_document(&mut self, doc_id: &str) -> Result<(), Error> {
        let doc = self.source.load(doc_id).inspect_err(|e| {
            warn!(document = doc_id, error = %e, "failed to load document");
        })?;

        for option in doc.skip_options() {
            if self.skips.add_if_missing(option.clone()) {
                debug!(id = %option.id, document = doc_id, "registered skip option");
            }
        }

        debug!(document = doc_id, nodes = doc.len(), "loaded document");
        self.slot.stage(Tree::new(doc_id, doc));
        Ok(())
    }

    /// Undo a partial move: restore the committed tree and spine cursor.
    fn abandon(&mut self, start_index: usize) {
        self.slot.rollback();
        // start_index was a valid cursor when captured
        let _ = self.spine.go_to_index(start_index);
    }

    fn deliver(&mut self, group: MediaGroup) -> MediaGroup {
        if let Some(tree) = self.slot.live() {
            self.last_good = Some(PositionRecord {
                document: tree.document_id().to_string(),
                element: tree.current_id().to_string(),
            });
        }
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, MediaRef, Node, NodeId, TextRef};
    use crate::source::MemorySource;

    fn phrases(ids: &[&str]) -> Document {
        let mut doc = Document::new();
        for id in ids {
            let par = doc.push(NodeId::ROOT, Node::par().with_id(*id));
            doc.push(
                par,
                Node::content(MediaRef::Text(TextRef {
                    id: format!("t_{id}"),
                    src: format!("book.html#t_{id}"),
                })),
            );
        }
        doc
    }

    fn book() -> MemorySource {
        MemorySource::new()
            .with_document("a.smil", phrases(&["a1", "a2"]))
            .with_document("b.smil", phrases(&[]))
            .with_document("c.smil", phrases(&["c1"]))
    }

    #[test]
    fn test_not_initialized() {
        let mut engine = Engine::new(book());
        assert!(matches!(engine.next(), Err(NavError::NotInitialized)));
        assert!(matches!(
            engine.load_position("a.smil", ""),
            Err(NavError::NotInitialized)
        ));
        assert!(matches!(engine.seek(0), Err(NavError::NotInitialized)));
        assert_eq!(engine.status(), Status::NotInitialized);
        assert_eq!(engine.current_document_path(), None);
    }

    #[test]
    fn test_chaining_skips_empty_document() {
        let mut engine = Engine::new(book());
        assert_eq!(engine.open(Entry::Start).unwrap().id, "a1");
        assert_eq!(engine.next().unwrap().id, "a2");
        assert_eq!(engine.next().unwrap().id, "c1");
        assert_eq!(engine.current_document_path(), Some("c.smil"));
        assert_eq!(engine.spine().index(), 2);

        assert_eq!(engine.previous().unwrap().id, "a2");
        assert_eq!(engine.spine().index(), 0);
    }

    #[test]
    fn test_exhaustion_restores_state() {
        let mut engine = Engine::new(book());
        engine.open(Entry::End).unwrap();
        assert_eq!(engine.current_element_id(), Some("c1"));

        assert!(matches!(engine.next(), Err(NavError::AtEnd)));
        assert_eq!(engine.status(), Status::AtEnd);
        assert_eq!(engine.current_document_path(), Some("c.smil"));
        assert_eq!(engine.spine().index(), 2);

        engine.first().unwrap();
        assert!(matches!(engine.previous(), Err(NavError::AtBeginning)));
        assert_eq!(engine.current_document_path(), Some("a.smil"));
        assert_eq!(engine.spine().index(), 0);
    }

    #[test]
    fn test_tree_slot_transitions() {
        let mut slot = TreeSlot::Empty;
        slot.stage(Tree::new("a", Document::new()));
        assert!(matches!(slot, TreeSlot::Loaded(_)));

        slot.stage(Tree::new("b", Document::new()));
        assert_eq!(slot.live().map(Tree::document_id), Some("b"));
        slot.rollback();
        assert_eq!(slot.live().map(Tree::document_id), Some("a"));

        slot.stage(Tree::new("c", Document::new()));
        slot.stage(Tree::new("d", Document::new()));
        slot.commit();
        assert!(matches!(slot, TreeSlot::Loaded(ref t) if t.document_id() == "d"));
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_skip_option("pagenum", false)
            .with_skip_option("custom", true)
            .with_rollback(false);
        assert_eq!(config.skip_options.len(), STANDARD_SKIP_OPTIONS.len() + 1);
        let pagenum = config.skip_options.iter().find(|o| o.id == "pagenum").unwrap();
        assert!(!pagenum.state);
        assert!(!config.rollback);
        assert!(EngineConfig::new().without_skip_options().skip_options.is_empty());
    }

    #[test]
    fn test_open_resets_registry() {
        let mut engine = Engine::new(book());
        engine.open(Entry::Start).unwrap();
        assert!(engine.change_skip_option("sidebar", false));
        assert!(!engine.change_skip_option("unknown", false));
        engine.add_skip_option(SkipOption::new("extra", true));

        engine.open(Entry::Start).unwrap();
        assert!(!engine.skip_options().is_skipped("sidebar"));
        assert!(!engine.skip_options().contains("extra"));
    }

    #[test]
    fn test_open_empty_book() {
        let source = MemorySource::new().with_document("a.smil", phrases(&[]));
        let mut engine = Engine::new(source);
        assert!(matches!(engine.open(Entry::Start), Err(NavError::AtEnd)));
        assert!(!engine.is_open());
        assert!(matches!(engine.next(), Err(NavError::NotInitialized)));
    }
}
