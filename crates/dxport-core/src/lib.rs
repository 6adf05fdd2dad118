//! Body-per-file DXF export pipeline
//!
//! This crate provides:
//! - Bounds and plate thickness from sampled edge points
//! - Output file naming from part metadata, with a file-name fallback
//! - Body notes composed from part and body facts
//! - Scoped guards for open parts, application contexts and the export selection
//! - `ExportOrchestrator`, which drives a part through the whole export

pub mod annotation;
pub mod bounds;
pub mod config;
pub mod context;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod orchestrator;
pub mod part;
pub mod selection;

// Re-exports for convenience
pub use annotation::{AnnotationSet, DRAWING_KEY, THICKNESS_KEY, anchor_for, render};
pub use bounds::{BodyBounds, BoundingInterval, BoundsAccumulator, EdgeSample, compute_bounds};
pub use config::{AttributeKeys, ConfigError, ExportConfig, NoteConfig};
pub use context::ContextGuard;
pub use error::{ExportError, ExportResult, NamingError};
pub use metadata::{PartMetadata, is_blank};
pub use naming::{NamingPolicy, sanitize_component};
pub use orchestrator::{
    BatchReport, BodyExport, ExportOrchestrator, OrchestratorState, PartReport, SketchSummary,
};
pub use part::OpenPart;
pub use selection::{BodyScope, SelectionTransaction};
