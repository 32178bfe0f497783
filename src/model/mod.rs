//! Core data model for time-synchronised documents.
//!
//! This module contains:
//! - Node types: time containers and media content
//! - The arena-allocated [`Document`] built from one SMIL file
//! - [`MediaGroup`], the unit delivered to the caller per phrase

mod document;
mod media;
mod node;

pub use document::{Descendants, Document};
pub use media::MediaGroup;
pub use node::{
    AudioRef, Container, ContainerKind, ImageRef, MediaRef, Node, NodeId, NodeKind, TextRef,
};
