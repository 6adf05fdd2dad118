//! CAD session abstraction for the dxport export pipeline
//!
//! This crate provides:
//! - The `CadSession` trait: every operation the exporter needs from a CAD
//!   authoring session (parts, application contexts, queries, drafting
//!   notes, and the export selection)
//! - `NullSession`, used when no CAD host is attached
//! - `MemorySession`, an in-memory backend serving serializable part models
//!   and writing DXF files on commit

pub mod dxf_out;
pub mod model;
pub mod session;

// Re-exports for convenience
pub use model::{BodyModel, EdgeModel, PartModel, Segment, SketchModel};
pub use session::{
    AlignmentPosition, AppContext, Arrowhead, BodyInfo, CadError, CadResult, CadSession,
    ClosePolicy, ClosedPart, CommitRecord, EdgeId, ExporterId, ExporterSettings, FacesAs,
    Justification, LeaderStyle, MemorySession, ModifiedPartResponse, NoteSpec, NullSession,
    ObjectId, OriginType, PartId, PartInfo, SketchInfo,
};
