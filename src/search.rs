//! Mapping an absolute elapsed time onto a document position.
//!
//! Every SMIL document carries two timing values in its head: the elapsed
//! time of all documents before it (`ncc:totalElapsedTime`,
//! `dtb:totalElapsedTime`) and its own duration (`ncc:timeInThisSmil`, or
//! the body sequence's `dur`). A binary search over the spine finds the
//! document whose interval contains the target; a depth-first scan of that
//! document then finds the audio clip playing at the remaining offset.
//!
//! Intervals are closed-open: document `i` contains second `t` when
//! `start <= t < start + duration`. A target equal to the end of the book is
//! therefore not contained by any document.

use tracing::trace;

use crate::error::SearchError;
use crate::model::{ContainerKind, Document, MediaRef, NodeId, NodeKind};
use crate::source::BookSource;
use crate::spine::Spine;
use crate::util::{parse_clock_secs, split_fragment};

const ELAPSED_SUFFIX: &str = "totalelapsedtime";
const DURATION_SUFFIXES: [&str; 2] = ["timeinthissmil", "duration"];

/// Where a document sits on the book's timeline, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct DocumentTiming {
    pub start_secs: u64,
    pub duration_secs: u64,
}

impl DocumentTiming {
    /// Read the timing from head metadata; `None` when either value is
    /// missing or malformed.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let start_secs = parse_clock_secs(doc.meta_by_suffix(ELAPSED_SUFFIX)?)?;
        let duration_secs = DURATION_SUFFIXES
            .iter()
            .find_map(|suffix| doc.meta_by_suffix(suffix))
            .and_then(parse_clock_secs)?;
        Some(Self {
            start_secs,
            duration_secs,
        })
    }

    pub fn end_secs(&self) -> u64 {
        self.start_secs + self.duration_secs
    }

    /// Whether this document starts after the target.
    fn is_beyond(&self, target: u64) -> bool {
        self.start_secs > target
    }

    pub fn contains(&self, target: u64) -> bool {
        !self.is_beyond(target) && target < self.end_secs()
    }
}

/// The audio clip playing at the searched time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct FragmentHit {
    pub audio_id: String,
    pub audio_src: String,
    /// Id of the phrase holding the clip: its `par`, or the clip itself when
    /// it sits directly in a sequence. Empty when that phrase is anonymous.
    pub leaf_id: String,
    /// Nearest enclosing container with an id.
    pub container_id: String,
    /// Offset into the clip, in milliseconds.
    pub clip_offset_ms: u64,
    /// Position in the audio file: clip begin plus `clip_offset_ms`.
    pub file_offset_ms: u64,
}

/// Result of a time search.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct SearchHit {
    /// Identifier of the containing document, as stored in the spine.
    pub document: String,
    /// Spine index of that document.
    pub index: usize,
    pub timing: DocumentTiming,
    /// Target minus the document start.
    pub document_offset_secs: u64,
    /// The clip playing at the target, if one brackets it.
    pub fragment: Option<FragmentHit>,
    /// Text ids met before (and at) the hit, most recent last.
    pub text_trail: Vec<String>,
}

impl SearchHit {
    /// Best element to resume at: the phrase holding the clip (by its own id,
    /// else the clip's id), else the most recent text id, else `None` for the
    /// document start.
    ///
    /// An enclosing sequence is never used: it would resume at its first
    /// phrase rather than the one playing.
    pub fn resume_id(&self) -> Option<&str> {
        self.fragment
            .as_ref()
            .and_then(|f| {
                [f.leaf_id.as_str(), f.audio_id.as_str()]
                    .into_iter()
                    .find(|id| !id.is_empty())
            })
            .or_else(|| self.text_trail.last().map(String::as_str))
    }
}

/// Binary search over a spine using per-document timing metadata.
///
/// The spine is only read; its cursor never moves.
pub struct TimeSearch<'a, S: BookSource + ?Sized> {
    spine: &'a Spine,
    source: &'a mut S,
}

impl<'a, S: BookSource + ?Sized> TimeSearch<'a, S> {
    pub fn new(spine: &'a Spine, source: &'a mut S) -> Self {
        Self { spine, source }
    }

    /// Find the document containing `target_secs`, then the clip inside it.
    pub fn search(&mut self, target_secs: i64) -> Result<SearchHit, SearchError> {
        let (index, doc, timing) = self.find_document(target_secs)?;
        // find_document only succeeds for non-negative targets
        let target = target_secs.unsigned_abs();
        let document_offset_secs = target - timing.start_secs;
        let (fragment, text_trail) = locate_fragment(&doc, document_offset_secs * 1000);

        Ok(SearchHit {
            document: self.spine.file_at(index).unwrap_or_default().to_string(),
            index,
            timing,
            document_offset_secs,
            fragment,
            text_trail,
        })
    }

    /// Binary search for the document whose interval contains `target_secs`.
    pub fn find_document(
        &mut self,
        target_secs: i64,
    ) -> Result<(usize, Document, DocumentTiming), SearchError> {
        if self.spine.is_empty() {
            return Err(SearchError::EmptySpine);
        }
        if target_secs < 0 {
            return Err(SearchError::OutOfRange(target_secs));
        }
        let target = target_secs.unsigned_abs();

        let (mut low, mut high) = (0, self.spine.len());
        let mut last_mid = None;
        while low < high {
            let mid = low + (high - low) / 2;
            if last_mid == Some(mid) {
                break;
            }
            last_mid = Some(mid);

            let Some(id) = self.spine.file_at(mid) else {
                break;
            };
            let doc = self.source.load(id)?;
            let timing = DocumentTiming::from_document(&doc)
                .ok_or_else(|| SearchError::MetadataMissing(id.to_string()))?;
            trace!(
                document = id,
                mid,
                start = timing.start_secs,
                duration = timing.duration_secs,
                target,
                "time search probe"
            );

            if timing.is_beyond(target) {
                high = mid;
            } else if timing.contains(target) {
                return Ok((mid, doc, timing));
            } else {
                low = mid + 1;
            }
        }

        Err(SearchError::OutOfRange(target_secs))
    }
}

/// Scan `doc` in document order, ignoring skip options, for the audio clip
/// playing `offset_ms` after the document start.
///
/// Document-local time is the running sum of clip lengths. Returns the hit,
/// if any, and the text ids met along the way.
pub fn locate_fragment(doc: &Document, offset_ms: u64) -> (Option<FragmentHit>, Vec<String>) {
    let mut scan = Scan {
        doc,
        target_ms: offset_ms,
        elapsed_ms: 0,
        trail: Vec::new(),
        hit: None,
    };
    let root_id = doc.root().id.clone();
    scan.visit(NodeId::ROOT, &root_id, "");
    (scan.hit, scan.trail)
}

struct Scan<'a> {
    doc: &'a Document,
    target_ms: u64,
    elapsed_ms: u64,
    trail: Vec<String>,
    hit: Option<FragmentHit>,
}

impl Scan<'_> {
    /// Returns `true` once the hit is found. `leaf_id` is the id of the
    /// enclosing `par`, empty outside one.
    fn visit(&mut self, id: NodeId, container_id: &str, leaf_id: &str) -> bool {
        let doc = self.doc;
        let Some(node) = doc.node(id) else {
            return false;
        };

        match &node.kind {
            NodeKind::Container(c) => {
                let container_id = if node.id.is_empty() {
                    container_id
                } else {
                    node.id.as_str()
                };
                let leaf_id = match c.kind {
                    ContainerKind::Parallel => node.id.as_str(),
                    ContainerKind::Sequential => "",
                };
                c.children
                    .iter()
                    .any(|&child| self.visit(child, container_id, leaf_id))
            }
            NodeKind::Content(MediaRef::Text(text)) => {
                let id = if text.id.is_empty() {
                    split_fragment(&text.src).1.unwrap_or_default()
                } else {
                    text.id.as_str()
                };
                if !id.is_empty() {
                    self.trail.push(id.to_string());
                }
                false
            }
            NodeKind::Content(MediaRef::Audio(audio)) => {
                let duration = audio.duration_ms();
                if self.target_ms >= self.elapsed_ms && self.target_ms < self.elapsed_ms + duration
                {
                    let clip_offset_ms = self.target_ms - self.elapsed_ms;
                    self.hit = Some(FragmentHit {
                        audio_id: audio.id.clone(),
                        audio_src: audio.src.clone(),
                        leaf_id: leaf_id.to_string(),
                        container_id: container_id.to_string(),
                        clip_offset_ms,
                        file_offset_ms: audio.begin_ms().unwrap_or(0) + clip_offset_ms,
                    });
                    return true;
                }
                self.elapsed_ms += duration;
                false
            }
            NodeKind::Content(MediaRef::Image(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{AudioRef, Node, TextRef};
    use crate::source::MemorySource;

    fn timed(start: &str, duration: &str) -> Document {
        let mut doc = Document::new();
        doc.set_meta("ncc:totalElapsedTime", start);
        doc.set_meta("ncc:timeInThisSmil", duration);
        doc
    }

    #[test]
    fn test_timing_from_metadata() {
        let doc = timed("0:00:10", "0:00:05.6");
        let timing = DocumentTiming::from_document(&doc).unwrap();
        assert_eq!(timing.start_secs, 10);
        assert_eq!(timing.duration_secs, 6);
        assert!(timing.contains(10));
        assert!(timing.contains(15));
        assert!(!timing.contains(16));
        assert!(!timing.contains(9));
    }

    #[test]
    fn test_timing_uses_body_duration() {
        let mut doc = Document::new();
        doc.set_meta("dtb:totalElapsedTime", "0:01:00");
        doc.set_meta("duration", "12.4s");
        let timing = DocumentTiming::from_document(&doc).unwrap();
        assert_eq!(timing.start_secs, 60);
        assert_eq!(timing.duration_secs, 12);
    }

    #[test]
    fn test_timing_missing() {
        let mut doc = Document::new();
        doc.set_meta("ncc:totalElapsedTime", "0:00:10");
        assert_eq!(DocumentTiming::from_document(&doc), None);
    }

    #[test]
    fn test_metadata_missing_is_error() {
        let spine: Spine = ["a.smil"].into_iter().collect();
        let mut source = MemorySource::new().with_document("a.smil", Document::new());
        let err = TimeSearch::new(&spine, &mut source).search(0).unwrap_err();
        assert!(matches!(err, SearchError::MetadataMissing(ref d) if d == "a.smil"));
    }

    #[test]
    fn test_load_failure_is_error() {
        let spine: Spine = ["a.smil"].into_iter().collect();
        let mut source = MemorySource::new();
        let err = TimeSearch::new(&spine, &mut source).search(0).unwrap_err();
        assert!(matches!(err, SearchError::Load(Error::DocumentNotFound(_))));
    }

    fn clip_doc() -> Document {
        let mut doc = timed("0:00:00", "0:00:06");
        doc.set_root_id("root");
        for (i, (begin, end)) in [("0s", "2s"), ("2s", "3s"), ("10s", "13s")].iter().enumerate() {
            let par = doc.push(NodeId::ROOT, Node::par().with_id(format!("par{i}")));
            doc.push(
                par,
                Node::content(MediaRef::Text(TextRef {
                    id: format!("txt{i}"),
                    src: format!("book.html#txt{i}"),
                })),
            );
            doc.push(
                par,
                Node::content(MediaRef::Audio(AudioRef::new(
                    format!("aud{i}"),
                    "book.mp3",
                    *begin,
                    *end,
                ))),
            );
        }
        doc
    }

    #[test]
    fn test_locate_fragment() {
        let doc = clip_doc();

        let (hit, trail) = locate_fragment(&doc, 0);
        let hit = hit.unwrap();
        assert_eq!(hit.audio_id, "aud0");
        assert_eq!(hit.leaf_id, "par0");
        assert_eq!(hit.container_id, "par0");
        assert_eq!(trail, vec!["txt0"]);

        let (hit, trail) = locate_fragment(&doc, 2_500);
        let hit = hit.unwrap();
        assert_eq!(hit.audio_id, "aud1");
        assert_eq!(hit.clip_offset_ms, 500);
        assert_eq!(hit.file_offset_ms, 2_500);
        assert_eq!(trail, vec!["txt0", "txt1"]);

        // Third clip starts at 3s of document time but 10s into the file.
        let (hit, _) = locate_fragment(&doc, 4_000);
        let hit = hit.unwrap();
        assert_eq!(hit.audio_id, "aud2");
        assert_eq!(hit.clip_offset_ms, 1_000);
        assert_eq!(hit.file_offset_ms, 11_000);
    }

    #[test]
    fn test_locate_fragment_past_audio() {
        let doc = clip_doc();
        let (hit, trail) = locate_fragment(&doc, 6_000);
        assert!(hit.is_none());
        assert_eq!(trail, vec!["txt0", "txt1", "txt2"]);
    }

    #[test]
    fn test_anonymous_phrase_resumes_at_clip() {
        let mut doc = timed("0:00:00", "0:00:10");
        doc.set_root_id("root_seq");
        for (i, (begin, end)) in [("0s", "5s"), ("5s", "10s")].iter().enumerate() {
            let par = doc.push(NodeId::ROOT, Node::par());
            doc.push(
                par,
                Node::content(MediaRef::Text(TextRef {
                    id: format!("t{i}"),
                    src: format!("book.html#t{i}"),
                })),
            );
            doc.push(
                par,
                Node::content(MediaRef::Audio(AudioRef::new(
                    format!("clip{i}"),
                    "book.mp3",
                    *begin,
                    *end,
                ))),
            );
        }

        let (fragment, text_trail) = locate_fragment(&doc, 7_000);
        let fragment = fragment.unwrap();
        assert_eq!(fragment.leaf_id, "");
        assert_eq!(fragment.container_id, "root_seq");

        let mut hit = SearchHit {
            document: "a.smil".into(),
            index: 0,
            timing: DocumentTiming {
                start_secs: 0,
                duration_secs: 10,
            },
            document_offset_secs: 7,
            fragment: Some(fragment),
            text_trail,
        };
        assert_eq!(hit.resume_id(), Some("clip1"));

        hit.fragment.as_mut().unwrap().audio_id.clear();
        assert_eq!(hit.resume_id(), Some("t1"));
    }

    #[test]
    fn test_resume_id_fallbacks() {
        let mut hit = SearchHit {
            document: "a.smil".into(),
            index: 0,
            timing: DocumentTiming {
                start_secs: 0,
                duration_secs: 1,
            },
            document_offset_secs: 0,
            fragment: None,
            text_trail: vec!["t1".into(), "t2".into()],
        };
        assert_eq!(hit.resume_id(), Some("t2"));
        hit.text_trail.clear();
        assert_eq!(hit.resume_id(), None);
    }
}
