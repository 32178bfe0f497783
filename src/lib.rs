//! # daisy-nav
//!
//! Phrase-level playback navigation for DAISY 2.02 and DAISY 3 talking books.
//!
//! A talking book is a chain of SMIL documents (the *spine*). Each document is
//! a tree of sequential and parallel time containers whose leaves reference
//! audio clips, text fragments and images. This crate walks that structure
//! one phrase at a time:
//!
//! - [`Tree`] traverses one document, passing over structures whose skip
//!   option is turned off and escaping the structure around the current
//!   phrase on request,
//! - [`Engine`] stitches the documents of a [`Spine`] into one continuous
//!   book and restores its last good position when a jump fails,
//! - [`TimeSearch`] maps an elapsed time onto the document and clip that play
//!   at that moment.
//!
//! ## Quick Start
//!
//! ```no_run
//! use daisy_nav::{DirSource, Engine, Entry};
//!
//! let source = DirSource::open("path/to/book").unwrap();
//! let mut engine = Engine::new(source);
//!
//! let mut phrase = engine.open(Entry::Start);
//! while let Ok(group) = phrase {
//!     println!("{:?} {:?}", group.text, group.audio);
//!     phrase = engine.next();
//! }
//! ```
//!
//! ## Skip options
//!
//! Page numbers, notes, sidebars and similar structures can be switched off
//! for the whole book:
//!
//! ```no_run
//! use daisy_nav::{DirSource, Engine, Entry};
//!
//! let mut engine = Engine::new(DirSource::open("path/to/book").unwrap());
//! engine.open(Entry::Start).unwrap();
//! engine.change_skip_option("pagenum", false);
//! engine.next().unwrap();
//! ```

pub mod daisy;
pub mod engine;
pub mod error;
pub mod model;
pub mod search;
pub mod skip;
pub mod source;
pub mod spine;
pub mod tree;
pub mod util;

pub use engine::{Engine, EngineConfig, Entry, PositionRecord, SeekOutcome};
pub use error::{Error, NavError, Result, SearchError, Status};
pub use model::{
    AudioRef, Container, ContainerKind, Document, ImageRef, MediaGroup, MediaRef, Node, NodeId,
    NodeKind, TextRef,
};
pub use search::{DocumentTiming, FragmentHit, SearchHit, TimeSearch};
pub use skip::{SkipOption, SkipOptions};
pub use source::{BookSource, DirSource, MemorySource, ZipSource};
pub use spine::Spine;
pub use tree::{Position, Tree};
