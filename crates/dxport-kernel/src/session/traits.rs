//! CAD session trait definitions
//!
//! These traits define the interface the export pipeline needs from a CAD
//! authoring session. Every call is blocking and the session is not
//! reentrant, so implementations take `&mut self` for anything that changes
//! session state.

use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of an open part document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartId(pub Uuid);

impl PartId {
    /// Create a fresh part ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PartId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of any displayable object (body, sketch curve, note)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    /// Create a fresh object ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an edge within a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    /// ID of the body this edge belongs to
    pub body: ObjectId,
    /// Index of the edge within the body
    pub index: u32,
}

impl EdgeId {
    /// Create a new edge ID
    pub fn new(body: ObjectId, index: u32) -> Self {
        Self { body, index }
    }
}

/// Handle of an export (DXF/DWG creator) instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExporterId(pub Uuid);

impl ExporterId {
    /// Create a fresh exporter ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExporterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Application context of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AppContext {
    /// No part loaded
    #[default]
    NoPart,
    /// Solid modeling
    Modeling,
    /// Drafting / annotation
    Drafting,
}

impl AppContext {
    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AppContext::NoPart => "no-part",
            AppContext::Modeling => "modeling",
            AppContext::Drafting => "drafting",
        }
    }
}

impl std::fmt::Display for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Information about an open part
#[derive(Debug, Clone, PartialEq)]
pub struct PartInfo {
    /// Session-side identifier
    pub id: PartId,
    /// Full path of the part file
    pub path: PathBuf,
}

impl PartInfo {
    /// File stem of the part path, empty when the path has none
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// Information about a sketch in a part
#[derive(Debug, Clone, PartialEq)]
pub struct SketchInfo {
    pub id: ObjectId,
    pub name: String,
    /// Hidden (blanked) in the display
    pub blanked: bool,
}

/// Information about a solid body in a part
#[derive(Debug, Clone, PartialEq)]
pub struct BodyInfo {
    pub id: ObjectId,
    /// Identity name, possibly empty
    pub name: String,
}

/// How modified parts are handled when closing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModifiedPartResponse {
    /// Close modified parts without writing them back
    CloseModified,
    /// Save modified parts before closing
    #[default]
    SaveModified,
}

/// Policy applied when a part is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePolicy {
    /// Close the whole assembly tree, not just the top part
    pub whole_tree: bool,
    pub modified: ModifiedPartResponse,
}

impl Default for ClosePolicy {
    fn default() -> Self {
        Self {
            whole_tree: true,
            modified: ModifiedPartResponse::SaveModified,
        }
    }
}

/// Alignment position of a note relative to its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlignmentPosition {
    #[default]
    TopLeft,
    TopCenter,
    MidLeft,
    BottomLeft,
}

/// Horizontal justification of note text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

/// How the note origin is associated with the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OriginType {
    /// Free origin that can be dragged
    #[default]
    Drag,
    /// Fixed to the given point
    Fixed,
}

/// Leader arrowhead style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Arrowhead {
    #[default]
    FilledArrow,
    ClosedArrow,
    None,
}

/// Leader settings for a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaderStyle {
    pub arrowhead: Arrowhead,
    /// Attach the leader at the vertical center of the text
    pub attach_center: bool,
    /// Let the session infer which side the stub goes on
    pub infer_stub_side: bool,
}

/// Everything needed to create one text note
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSpec {
    /// Text lines, top to bottom
    pub lines: Vec<String>,
    /// Origin in model coordinates (on the XY plane)
    pub origin: DVec3,
    pub anchor: AlignmentPosition,
    pub justification: Justification,
    /// General text size
    pub text_size: f64,
    pub origin_type: OriginType,
    pub leader: LeaderStyle,
}

/// Output encoding for exported faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FacesAs {
    #[default]
    PolylineMesh,
    Polyface,
}

/// Settings applied to the export mechanism when it is created
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterSettings {
    /// Exporter settings file
    pub settings_file: PathBuf,
    /// Part file being exported
    pub input_file: PathBuf,
    /// Export drawing data rather than the modeling view
    pub export_drawing: bool,
    pub view_edit_mode: bool,
    pub flatten_assembly: bool,
    /// Export as 3D geometry
    pub export_3d: bool,
    pub faces_as: FacesAs,
    pub process_hold: bool,
    /// Only export explicitly selected objects
    pub selected_objects_only: bool,
}

impl ExporterSettings {
    /// Standard settings for exporting selected objects of one part
    pub fn for_part(settings_file: impl Into<PathBuf>, input_file: impl Into<PathBuf>) -> Self {
        Self {
            settings_file: settings_file.into(),
            input_file: input_file.into(),
            export_drawing: true,
            view_edit_mode: true,
            flatten_assembly: true,
            export_3d: true,
            faces_as: FacesAs::PolylineMesh,
            process_hold: true,
            selected_objects_only: true,
        }
    }
}

/// Error type for CAD session operations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("CAD session not available: {0}")]
    SessionUnavailable(String),

    #[error("Part not found: {0}")]
    PartNotFound(PathBuf),

    #[error("Part failed to load: {0}")]
    PartLoad(String),

    #[error("No part is open")]
    NotOpen,

    #[error("Operation requires {required} context, session is in {current}")]
    WrongContext {
        required: AppContext,
        current: AppContext,
    },

    #[error("Failed to switch to {0} context")]
    ContextSwitch(AppContext),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Staging failed: {0}")]
    Staging(String),

    #[error("Point query failed: {0}")]
    Sampling(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    #[error("License error: {0}")]
    License(String),

    #[error("File I/O error: {0}")]
    Io(String),
}

/// Result type for CAD session operations
pub type CadResult<T> = Result<T, CadError>;

/// The CAD authoring session consumed by the export pipeline
pub trait CadSession {
    /// Get the name of this session backend
    fn name(&self) -> &str;

    // ========== License ==========

    /// Reserve a licensed capability for the caller's lifetime
    fn reserve_license(&mut self, capability: &str) -> CadResult<()>;

    /// Release a previously reserved capability
    fn release_license(&mut self, capability: &str);

    // ========== Part lifecycle ==========

    /// Open a part document as the active display part
    fn open_part(&mut self, path: &Path) -> CadResult<PartInfo>;

    /// Close an open part
    fn close_part(&mut self, part: PartId, policy: ClosePolicy) -> CadResult<()>;

    // ========== Application context ==========

    /// Switch the active application context
    fn switch_application(&mut self, context: AppContext) -> CadResult<()>;

    /// Current application context
    fn current_application(&self) -> AppContext;

    // ========== Queries ==========

    /// Read a string attribute of the part, `None` if absent
    fn string_attribute(&self, part: PartId, key: &str) -> Option<String>;

    /// Sketches of the part in model order
    fn sketches(&self, part: PartId) -> CadResult<Vec<SketchInfo>>;

    /// All geometry objects of a sketch
    fn sketch_geometry(&self, sketch: ObjectId) -> CadResult<Vec<ObjectId>>;

    /// Solid bodies of the part in model order
    fn bodies(&self, part: PartId) -> CadResult<Vec<BodyInfo>>;

    /// Edges of a body
    fn body_edges(&self, body: ObjectId) -> CadResult<Vec<EdgeId>>;

    /// Create a representative point on an edge and return its coordinates.
    ///
    /// Failure for an individual edge is normal for some curve types.
    fn edge_sample_point(&mut self, part: PartId, edge: EdgeId) -> CadResult<DVec3>;

    // ========== Drafting ==========

    /// Create a text note; only valid in the drafting context
    fn create_note(&mut self, part: PartId, note: &NoteSpec) -> CadResult<ObjectId>;

    // ========== Export mechanism ==========

    /// Create an exporter bound to a part
    fn create_exporter(&mut self, part: PartId, settings: &ExporterSettings)
    -> CadResult<ExporterId>;

    /// Register objects with the exporter's selection
    fn exporter_add(&mut self, exporter: ExporterId, objects: &[ObjectId]) -> CadResult<()>;

    /// Remove an object from the exporter's selection
    fn exporter_remove(&mut self, exporter: ExporterId, object: ObjectId) -> CadResult<()>;

    /// Write the current selection to a file
    fn exporter_commit(&mut self, exporter: ExporterId, output: &Path) -> CadResult<()>;

    /// Destroy the exporter and its selection
    fn destroy_exporter(&mut self, exporter: ExporterId);
}

/// A null session that always returns errors (used when no CAD host is attached)
#[derive(Debug, Default)]
pub struct NullSession;

fn unavailable<T>() -> CadResult<T> {
    Err(CadError::SessionUnavailable(
        "No CAD session attached".into(),
    ))
}

impl CadSession for NullSession {
    fn name(&self) -> &str {
        "null"
    }

    fn reserve_license(&mut self, _capability: &str) -> CadResult<()> {
        unavailable()
    }

    fn release_license(&mut self, _capability: &str) {}

    fn open_part(&mut self, _path: &Path) -> CadResult<PartInfo> {
        unavailable()
    }

    fn close_part(&mut self, _part: PartId, _policy: ClosePolicy) -> CadResult<()> {
        unavailable()
    }

    fn switch_application(&mut self, _context: AppContext) -> CadResult<()> {
        unavailable()
    }

    fn current_application(&self) -> AppContext {
        AppContext::NoPart
    }

    fn string_attribute(&self, _part: PartId, _key: &str) -> Option<String> {
        None
    }

    fn sketches(&self, _part: PartId) -> CadResult<Vec<SketchInfo>> {
        unavailable()
    }

    fn sketch_geometry(&self, _sketch: ObjectId) -> CadResult<Vec<ObjectId>> {
        unavailable()
    }

    fn bodies(&self, _part: PartId) -> CadResult<Vec<BodyInfo>> {
        unavailable()
    }

    fn body_edges(&self, _body: ObjectId) -> CadResult<Vec<EdgeId>> {
        unavailable()
    }

    fn edge_sample_point(&mut self, _part: PartId, _edge: EdgeId) -> CadResult<DVec3> {
        unavailable()
    }

    fn create_note(&mut self, _part: PartId, _note: &NoteSpec) -> CadResult<ObjectId> {
        unavailable()
    }

    fn create_exporter(
        &mut self,
        _part: PartId,
        _settings: &ExporterSettings,
    ) -> CadResult<ExporterId> {
        unavailable()
    }

    fn exporter_add(&mut self, _exporter: ExporterId, _objects: &[ObjectId]) -> CadResult<()> {
        unavailable()
    }

    fn exporter_remove(&mut self, _exporter: ExporterId, _object: ObjectId) -> CadResult<()> {
        unavailable()
    }

    fn exporter_commit(&mut self, _exporter: ExporterId, _output: &Path) -> CadResult<()> {
        unavailable()
    }

    fn destroy_exporter(&mut self, _exporter: ExporterId) {}
}
