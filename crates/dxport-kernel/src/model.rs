//! Serializable part models for the in-memory session
//!
//! A `PartModel` is a plain description of what a CAD part exposes to the
//! export pipeline: string attributes, sketches and bodies with their edges.
//! Models are stored as RON files next to (or instead of) real part files.

use std::collections::BTreeMap;
use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::session::{CadError, CadResult};

/// A straight segment of sketch geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: DVec3,
    pub end: DVec3,
}

impl Segment {
    pub fn new(start: DVec3, end: DVec3) -> Self {
        Self { start, end }
    }
}

/// A sketch in a part model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchModel {
    pub name: String,
    /// Hidden in the display
    #[serde(default)]
    pub blanked: bool,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl SketchModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blanked: false,
            segments: Vec::new(),
        }
    }

    pub fn blanked(mut self) -> Self {
        self.blanked = true;
        self
    }

    pub fn with_segment(mut self, start: DVec3, end: DVec3) -> Self {
        self.segments.push(Segment::new(start, end));
        self
    }
}

/// An edge of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeModel {
    pub start: DVec3,
    pub end: DVec3,
    /// The point query for this edge fails (e.g. degenerate curve)
    #[serde(default)]
    pub sample_fails: bool,
}

impl EdgeModel {
    pub fn new(start: DVec3, end: DVec3) -> Self {
        Self {
            start,
            end,
            sample_fails: false,
        }
    }

    /// An edge whose point query always fails
    pub fn failing(start: DVec3, end: DVec3) -> Self {
        Self {
            start,
            end,
            sample_fails: true,
        }
    }

    /// Representative point of the edge (its midpoint)
    pub fn sample_point(&self) -> Option<DVec3> {
        (!self.sample_fails).then(|| (self.start + self.end) * 0.5)
    }
}

/// A solid body of a part model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyModel {
    /// Identity name, may be empty
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub edges: Vec<EdgeModel>,
}

impl BodyModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edges: Vec::new(),
        }
    }

    /// A rectangular plate spanning `min`..`max`, with its twelve box edges
    pub fn plate(name: impl Into<String>, min: DVec3, max: DVec3) -> Self {
        let corner = |x: bool, y: bool, z: bool| {
            DVec3::new(
                if x { max.x } else { min.x },
                if y { max.y } else { min.y },
                if z { max.z } else { min.z },
            )
        };

        let mut edges = Vec::with_capacity(12);
        for z in [false, true] {
            edges.push(EdgeModel::new(corner(false, false, z), corner(true, false, z)));
            edges.push(EdgeModel::new(corner(true, false, z), corner(true, true, z)));
            edges.push(EdgeModel::new(corner(true, true, z), corner(false, true, z)));
            edges.push(EdgeModel::new(corner(false, true, z), corner(false, false, z)));
        }
        for (x, y) in [(false, false), (true, false), (true, true), (false, true)] {
            edges.push(EdgeModel::new(corner(x, y, false), corner(x, y, true)));
        }

        Self {
            name: name.into(),
            edges,
        }
    }

    pub fn with_edge(mut self, edge: EdgeModel) -> Self {
        self.edges.push(edge);
        self
    }
}

/// Everything the export pipeline can see of one part
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartModel {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub sketches: Vec<SketchModel>,
    #[serde(default)]
    pub bodies: Vec<BodyModel>,
}

impl PartModel {
    /// Create an empty part model
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_sketch(mut self, sketch: SketchModel) -> Self {
        self.sketches.push(sketch);
        self
    }

    pub fn with_body(mut self, body: BodyModel) -> Self {
        self.bodies.push(body);
        self
    }

    /// Load a part model from a RON file
    pub fn load(path: impl AsRef<Path>) -> CadResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CadError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse a part model from RON text
    pub fn from_ron_str(content: &str) -> CadResult<Self> {
        ron::from_str(content).map_err(|e| CadError::PartLoad(e.to_string()))
    }

    /// Save the part model to a RON file
    pub fn save(&self, path: impl AsRef<Path>) -> CadResult<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| CadError::Io(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| CadError::Io(e.to_string()))
    }
}
