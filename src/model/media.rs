//! The unit of delivery: everything to render for one phrase.

use super::document::Document;
use super::node::{AudioRef, ImageRef, MediaRef, NodeId, TextRef};

/// Media references reachable at the current leaf.
///
/// A parallel container contributes every text, image and audio reference in
/// its subtree; the first text and first image win, audio clips are kept in
/// document order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct MediaGroup {
    /// Id of the leaf (content node or parallel container) that produced this group.
    pub id: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub text: Option<TextRef>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub image: Option<ImageRef>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub audio: Vec<AudioRef>,
    /// Whether the leaf sits inside a structure that can be escaped.
    pub could_escape: bool,
}

impl MediaGroup {
    /// Collect the media under `leaf`.
    pub fn collect(doc: &Document, leaf: NodeId) -> Self {
        let mut group = MediaGroup {
            id: doc.node(leaf).map(|n| n.id.clone()).unwrap_or_default(),
            ..Default::default()
        };

        for id in doc.descendants(leaf) {
            match doc.media(id) {
                Some(MediaRef::Text(t)) if group.text.is_none() => group.text = Some(t.clone()),
                Some(MediaRef::Image(i)) if group.image.is_none() => {
                    group.image = Some(i.clone())
                }
                Some(MediaRef::Audio(a)) => group.audio.push(a.clone()),
                _ => {}
            }
        }

        group
    }

    /// True when nothing renderable was found.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none() && self.audio.is_empty()
    }

    /// Ids of every referenced media element, text first, then image, then audio.
    pub fn media_ids(&self) -> Vec<&str> {
        self.text
            .iter()
            .map(|t| t.id.as_str())
            .chain(self.image.iter().map(|i| i.id.as_str()))
            .chain(self.audio.iter().map(|a| a.id.as_str()))
            .collect()
    }

    /// Total audio length in milliseconds.
    pub fn audio_duration_ms(&self) -> u64 {
        self.audio.iter().map(AudioRef::duration_ms).sum()
    }
}
