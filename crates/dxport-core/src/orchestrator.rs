//! Per-part, per-body export state machine
//!
//! ```text
//! Idle -> PartOpen -> ModelingReady <-> DraftingBusy -> PartClosed -> Idle
//! ```
//!
//! One part is processed at a time. The part, the exporter and each body's
//! staged objects are held by guards, so a failure anywhere in a part still
//! unstages, destroys the exporter, leaves the modeling context and closes the
//! part before the error reaches the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dxport_kernel::{AppContext, BodyInfo, CadSession, ExporterSettings, NoteSpec, ObjectId, PartId};

use crate::annotation::{AnnotationSet, anchor_for, render};
use crate::bounds::compute_bounds;
use crate::config::ExportConfig;
use crate::context::ContextGuard;
use crate::error::{ExportError, ExportResult};
use crate::metadata::PartMetadata;
use crate::naming::NamingPolicy;
use crate::part::OpenPart;
use crate::selection::{BodyScope, SelectionTransaction};

/// Where the orchestrator is in the export of a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    Idle,
    PartOpen,
    ModelingReady,
    DraftingBusy,
    PartClosed,
}

/// Outcome of whole-part sketch staging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SketchSummary {
    /// Marker sketches whose geometry was staged
    pub staged: usize,
    /// Marker sketches skipped because they are hidden
    pub skipped_hidden: usize,
    /// Marker sketches whose geometry could not be queried or staged
    pub failed: usize,
    /// Sketch curves held in the selection for every body
    pub curves: usize,
}

/// One written output file
#[derive(Debug, Clone, PartialEq)]
pub struct BodyExport {
    pub body_name: String,
    pub output: PathBuf,
    pub thickness: Option<f64>,
    /// Note text, empty when no note was needed
    pub note_lines: Vec<String>,
    /// Objects that could not be staged for this body
    pub stage_failures: usize,
    pub sampled_edges: usize,
    pub failed_edges: usize,
}

/// Result of exporting one part
#[derive(Debug, Clone, PartialEq)]
pub struct PartReport {
    pub path: PathBuf,
    pub sketches: SketchSummary,
    pub bodies: Vec<BodyExport>,
    /// Output names came from the file name instead of the metadata
    pub naming_fallback: bool,
}

/// Results of a batch, one entry per part in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<(PathBuf, ExportResult<PartReport>)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Number of files written across all parts
    pub fn files_written(&self) -> usize {
        self.results
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .map(|report| report.bodies.len())
            .sum()
    }
}

/// Drives the export of parts through a CAD session
///
/// The license capability is held from construction until drop.
pub struct ExportOrchestrator<'s, S: CadSession + ?Sized> {
    session: &'s mut S,
    config: ExportConfig,
    state: OrchestratorState,
}

impl<'s, S: CadSession + ?Sized> ExportOrchestrator<'s, S> {
    /// Validate the configuration and reserve the license capability
    pub fn new(session: &'s mut S, config: ExportConfig) -> ExportResult<Self> {
        config.validate()?;

        tracing::info!("==================== DXF export ====================");
        tracing::info!("Session: {}", session.name());
        tracing::info!("Settings file: {}", config.settings_file.display());
        tracing::info!("Output directory: {}", config.output_dir.display());

        session
            .reserve_license(&config.license_capability)
            .map_err(|source| ExportError::License {
                capability: config.license_capability.clone(),
                source,
            })?;

        Ok(Self {
            session,
            config,
            state: OrchestratorState::Idle,
        })
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export every part in order, each attempted exactly once
    pub fn process_batch<P: AsRef<Path>>(&mut self, paths: &[P]) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            let path = path.as_ref();
            let result = self.process_part(path);
            if let Err(e) = &result {
                tracing::error!("Export of {} failed: {}", path.display(), e);
            }
            report.results.push((path.to_path_buf(), result));
        }

        tracing::info!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    /// Export every body of one part
    pub fn process_part(&mut self, path: &Path) -> ExportResult<PartReport> {
        tracing::info!("==================== {} ====================", path.display());

        let result = export_part(&mut *self.session, &self.config, &mut self.state, path);
        set_state(&mut self.state, OrchestratorState::Idle);
        result
    }
}

impl<S: CadSession + ?Sized> Drop for ExportOrchestrator<'_, S> {
    fn drop(&mut self) {
        self.session.release_license(&self.config.license_capability);
        tracing::info!("==================== DXF export done ====================");
    }
}

fn set_state(state: &mut OrchestratorState, to: OrchestratorState) {
    if *state != to {
        tracing::debug!("State {:?} -> {:?}", state, to);
        *state = to;
    }
}

fn io_error(path: &Path, e: io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn export_part<S: CadSession + ?Sized>(
    session: &mut S,
    config: &ExportConfig,
    state: &mut OrchestratorState,
    path: &Path,
) -> ExportResult<PartReport> {
    fs::create_dir_all(&config.output_dir).map_err(|e| io_error(&config.output_dir, e))?;

    let mut part = OpenPart::open(session, path, config.close_policy)?;
    set_state(state, OrchestratorState::PartOpen);

    let info = part.info().clone();
    let metadata = PartMetadata::read(&*part, info.id, &config.attributes);
    let bodies = part.bodies(info.id)?;

    part.switch_application(AppContext::Modeling)
        .map_err(|source| ExportError::Context {
            context: AppContext::Modeling,
            source,
        })?;
    set_state(state, OrchestratorState::ModelingReady);

    let settings = ExporterSettings::for_part(&config.settings_file, &info.path);
    let mut txn = SelectionTransaction::open(&mut *part, info.id, &settings)?;
    let sketches = stage_sketches(&mut txn, info.id, &config.sketch_marker)?;

    let file_stem = info.file_stem();
    let mut naming = NamingPolicy::new(&metadata, &file_stem, &config.extension, bodies.len());
    let mut report = PartReport {
        path: info.path.clone(),
        sketches,
        bodies: Vec::with_capacity(bodies.len()),
        naming_fallback: naming.uses_fallback(),
    };

    if bodies.is_empty() {
        tracing::info!("Part {} has no bodies; nothing to export", info.path.display());
    } else {
        tracing::info!("---------- Exporting {} bodies ----------", bodies.len());
        let seed = AnnotationSet::from_metadata(&metadata);
        for body in &bodies {
            let export = export_body(
                &mut txn,
                config,
                state,
                info.id,
                body,
                &mut naming,
                &seed,
            )?;
            report.bodies.push(export);
        }
    }

    txn.teardown();
    part.close()?;
    set_state(state, OrchestratorState::PartClosed);

    Ok(report)
}

/// Stage the geometry of every visible marker sketch for the whole part.
///
/// Each sketch is staged on its own; a rejected sketch is counted and skipped.
fn stage_sketches<S: CadSession + ?Sized>(
    txn: &mut SelectionTransaction<'_, S>,
    part: PartId,
    marker: &str,
) -> ExportResult<SketchSummary> {
    tracing::info!("---------- Adding Sketches ----------");

    let mut summary = SketchSummary::default();

    for sketch in txn.sketches(part)? {
        if !sketch.name.contains(marker) {
            continue;
        }
        if sketch.blanked {
            tracing::info!("Skipping hidden sketch '{}'", sketch.name);
            summary.skipped_hidden += 1;
            continue;
        }

        let curves = match txn.sketch_geometry(sketch.id) {
            Ok(curves) => curves,
            Err(e) => {
                tracing::warn!("Could not read geometry of sketch '{}': {}", sketch.name, e);
                summary.failed += 1;
                continue;
            }
        };
        if curves.is_empty() {
            tracing::info!("Sketch '{}' has no geometry", sketch.name);
            continue;
        }

        if txn.stage_whole_part(&curves) {
            tracing::info!("Adding sketch '{}' ({} curves): OK", sketch.name, curves.len());
            summary.staged += 1;
        } else {
            tracing::warn!("Adding sketch '{}': FAILED", sketch.name);
            summary.failed += 1;
        }
    }

    summary.curves = txn.whole_part().len();
    tracing::info!(
        "Sketches: {} staged ({} curves), {} hidden, {} failed",
        summary.staged,
        summary.curves,
        summary.skipped_hidden,
        summary.failed
    );
    Ok(summary)
}

/// Stage, measure, annotate and write one body. Everything staged here is
/// unstaged when the body scope ends.
fn export_body<S: CadSession + ?Sized>(
    txn: &mut SelectionTransaction<'_, S>,
    config: &ExportConfig,
    state: &mut OrchestratorState,
    part: PartId,
    body: &BodyInfo,
    naming: &mut NamingPolicy,
    seed: &AnnotationSet,
) -> ExportResult<BodyExport> {
    let mut scope: BodyScope<'_, '_, S> = txn.body_scope();
    let mut stage_failures = 0;

    if !scope.stage_for_body(body.id) {
        stage_failures += 1;
    }

    let measured = compute_bounds(&mut *scope, part, body.id);
    let thickness = measured.thickness_callout();

    let mut annotations = seed.clone();
    annotations.apply_thickness(thickness, config.note.thickness_precision);

    let note_lines = annotations.lines();
    if !annotations.is_empty() {
        let anchor = anchor_for(measured.bounds.as_ref(), config.note.offset);
        let layout = render(&annotations, anchor, config.note.text_size);

        set_state(state, OrchestratorState::DraftingBusy);
        let note = create_note(&mut *scope, part, &layout)?;
        set_state(state, OrchestratorState::ModelingReady);

        if !scope.stage_for_body(note) {
            stage_failures += 1;
        }
    }

    let file_name = naming.name_for(&body.name)?;
    let output = config.output_dir.join(file_name);
    remove_existing(&output)?;

    if let Err(e) = scope.commit(&output) {
        if output.exists() {
            if let Err(remove) = fs::remove_file(&output) {
                tracing::warn!("Could not remove partial {}: {}", output.display(), remove);
            }
        }
        return Err(e);
    }
    tracing::info!("Wrote {}", output.display());

    Ok(BodyExport {
        body_name: body.name.clone(),
        output,
        thickness,
        note_lines,
        stage_failures,
        sampled_edges: measured.sampled,
        failed_edges: measured.failed,
    })
}

/// Create a note in the drafting context and return to the current one
fn create_note<S: CadSession + ?Sized>(
    session: &mut S,
    part: PartId,
    layout: &NoteSpec,
) -> ExportResult<ObjectId> {
    let mut drafting = ContextGuard::enter_from_current(session, AppContext::Drafting)?;
    let note = drafting.create_note(part, layout)?;
    drafting.exit()?;
    Ok(note)
}

fn remove_existing(path: &Path) -> ExportResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed existing {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}
