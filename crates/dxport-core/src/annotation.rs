//! Body notes: key/value facts rendered into one text block
//!
//! Part-level facts (the drawing number) are collected once when the part is
//! opened. Each body starts from a copy of that set and adds or removes its
//! own facts before the note is rendered.

use dxport_kernel::{AlignmentPosition, Arrowhead, Justification, LeaderStyle, NoteSpec, OriginType};
use glam::{DVec2, DVec3};

use crate::bounds::BoundingInterval;
use crate::metadata::PartMetadata;

/// Key of the drawing number fact
pub const DRAWING_KEY: &str = "DRAWING";
/// Key of the plate thickness fact
pub const THICKNESS_KEY: &str = "THICKNESS";

/// Ordered key/value facts; keys are unique and keep their first position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    entries: Vec<(String, String)>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Part-level facts taken from metadata
    pub fn from_metadata(metadata: &PartMetadata) -> Self {
        let mut set = Self::new();
        if let Some(drawing) = &metadata.drawing_number {
            set.insert(DRAWING_KEY, drawing.clone());
        }
        set
    }

    /// Set a fact, replacing the value in place when the key exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a fact, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Set or clear the thickness fact for one body
    pub fn apply_thickness(&mut self, thickness: Option<f64>, precision: usize) {
        match thickness {
            Some(value) => self.insert(THICKNESS_KEY, format!("{:.*}", precision, value)),
            None => {
                self.remove(THICKNESS_KEY);
            }
        }
    }

    /// `key: value` lines in insertion order
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect()
    }
}

/// Note origin: lower-left of the body's extent, pushed out by `offset`.
///
/// Without bounds the note goes to `(0, -offset)`.
pub fn anchor_for(bounds: Option<&BoundingInterval>, offset: f64) -> DVec2 {
    match bounds {
        Some(bounds) => DVec2::new(bounds.min.x + offset, bounds.min.y - offset),
        None => DVec2::new(0.0, -offset),
    }
}

/// Render the facts as one top-left anchored, left-justified note
pub fn render(set: &AnnotationSet, anchor: DVec2, text_size: f64) -> NoteSpec {
    NoteSpec {
        lines: set.lines(),
        origin: DVec3::new(anchor.x, anchor.y, 0.0),
        anchor: AlignmentPosition::TopLeft,
        justification: Justification::Left,
        text_size,
        origin_type: OriginType::Drag,
        leader: LeaderStyle {
            arrowhead: Arrowhead::FilledArrow,
            attach_center: true,
            infer_stub_side: true,
        },
    }
}
