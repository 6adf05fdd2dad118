//! In-memory CAD session backend
//!
//! Serves `PartModel`s as if they were open CAD parts. It enforces the same
//! rules a real authoring session does: one open part at a time, notes only in
//! the drafting context, export selection only in the modeling context, and
//! no duplicate registrations. Commits write real DXF files.
//!
//! Faults can be injected to exercise the error paths of callers.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glam::DVec3;

use super::{
    AppContext, BodyInfo, CadError, CadResult, CadSession, ClosePolicy, EdgeId, ExporterId,
    ExporterSettings, NoteSpec, ObjectId, PartId, PartInfo, SketchInfo,
};
use crate::dxf_out::{BODY_LAYER, DrawingItem, SKETCH_LAYER, write_drawing};
use crate::model::{EdgeModel, PartModel, Segment};

/// Objects living in the open part
#[derive(Debug, Clone)]
enum SessionObject {
    Body { name: String, edges: Vec<EdgeModel> },
    SketchCurve { sketch: String, segment: Segment },
    Note(NoteSpec),
}

/// State of the currently open part
#[derive(Debug)]
struct OpenPart {
    id: PartId,
    path: PathBuf,
    attributes: HashMap<String, String>,
    sketches: Vec<(SketchInfo, Vec<ObjectId>)>,
    bodies: Vec<BodyInfo>,
    objects: HashMap<ObjectId, SessionObject>,
    modified: bool,
}

impl OpenPart {
    fn from_model(path: &Path, model: PartModel) -> Self {
        let mut objects = HashMap::new();

        let sketches = model
            .sketches
            .into_iter()
            .map(|sketch| {
                let geometry = sketch
                    .segments
                    .into_iter()
                    .map(|segment| {
                        let id = ObjectId::new();
                        objects.insert(
                            id,
                            SessionObject::SketchCurve {
                                sketch: sketch.name.clone(),
                                segment,
                            },
                        );
                        id
                    })
                    .collect();
                let info = SketchInfo {
                    id: ObjectId::new(),
                    name: sketch.name,
                    blanked: sketch.blanked,
                };
                (info, geometry)
            })
            .collect();

        let bodies = model
            .bodies
            .into_iter()
            .map(|body| {
                let id = ObjectId::new();
                let info = BodyInfo {
                    id,
                    name: body.name.clone(),
                };
                objects.insert(
                    id,
                    SessionObject::Body {
                        name: body.name,
                        edges: body.edges,
                    },
                );
                info
            })
            .collect();

        Self {
            id: PartId::new(),
            path: path.to_path_buf(),
            attributes: model.attributes.into_iter().collect(),
            sketches,
            bodies,
            objects,
            modified: false,
        }
    }
}

/// Selection state of one exporter
#[derive(Debug)]
struct ExporterState {
    part: PartId,
    staged: Vec<ObjectId>,
}

/// What was written by one commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    /// Output file
    pub path: PathBuf,
    /// Names of the bodies in the selection
    pub bodies: Vec<String>,
    /// Number of sketch curves in the selection
    pub sketch_curves: usize,
    /// Text of each note in the selection
    pub notes: Vec<Vec<String>>,
}

/// A closed part and the policy used to close it
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPart {
    pub path: PathBuf,
    pub policy: ClosePolicy,
    /// The part had been modified (e.g. notes were added)
    pub was_modified: bool,
}

/// Injected failures
#[derive(Debug, Default)]
struct Faults {
    switch_to: HashSet<AppContext>,
    commit: bool,
    license: bool,
    rejected_bodies: HashSet<String>,
    rejected_sketches: HashSet<String>,
}

/// In-memory CAD session
#[derive(Debug, Default)]
pub struct MemorySession {
    library: HashMap<PathBuf, PartModel>,
    open: Option<OpenPart>,
    context: AppContext,
    context_history: Vec<AppContext>,
    licenses: Vec<String>,
    exporters: HashMap<ExporterId, ExporterState>,
    exporter_settings: Vec<ExporterSettings>,
    commits: Vec<CommitRecord>,
    closed: Vec<ClosedPart>,
    remaining_at_destroy: Vec<usize>,
    faults: Faults,
}

impl MemorySession {
    /// Create an empty session; parts are loaded from `.ron` files on open
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a part model under a path
    pub fn register(&mut self, path: impl Into<PathBuf>, model: PartModel) {
        self.library.insert(path.into(), model);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_part(mut self, path: impl Into<PathBuf>, model: PartModel) -> Self {
        self.register(path, model);
        self
    }

    // ========== Fault injection ==========

    /// Make every switch into `context` fail
    pub fn fail_switch_to(&mut self, context: AppContext) {
        self.faults.switch_to.insert(context);
    }

    /// Make every commit fail
    pub fn fail_commits(&mut self) {
        self.faults.commit = true;
    }

    /// Make license reservation fail
    pub fn fail_license(&mut self) {
        self.faults.license = true;
    }

    /// Reject staging of bodies with this name
    pub fn reject_body(&mut self, name: impl Into<String>) {
        self.faults.rejected_bodies.insert(name.into());
    }

    /// Reject staging of the geometry of sketches with this name
    pub fn reject_sketch(&mut self, name: impl Into<String>) {
        self.faults.rejected_sketches.insert(name.into());
    }

    // ========== Inspection ==========

    /// Every context switch that succeeded, in order
    pub fn context_history(&self) -> &[AppContext] {
        &self.context_history
    }

    /// Currently reserved license capabilities
    pub fn licenses(&self) -> &[String] {
        &self.licenses
    }

    /// Every successful commit, in order
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    /// Every closed part, in order
    pub fn closed_parts(&self) -> &[ClosedPart] {
        &self.closed
    }

    /// Selection size left in each exporter when it was destroyed
    pub fn remaining_at_destroy(&self) -> &[usize] {
        &self.remaining_at_destroy
    }

    /// Whether a part is currently open
    pub fn is_part_open(&self) -> bool {
        self.open.is_some()
    }

    /// Number of live exporters
    pub fn exporter_count(&self) -> usize {
        self.exporters.len()
    }

    /// Objects currently staged in an exporter
    pub fn staged(&self, exporter: ExporterId) -> Option<&[ObjectId]> {
        self.exporters.get(&exporter).map(|e| e.staged.as_slice())
    }

    /// Settings of every exporter created so far, in creation order
    pub fn exporter_settings(&self) -> &[ExporterSettings] {
        &self.exporter_settings
    }

    // ========== Internal helpers ==========

    fn open_part_ref(&self, part: PartId) -> CadResult<&OpenPart> {
        match &self.open {
            Some(open) if open.id == part => Ok(open),
            _ => Err(CadError::NotOpen),
        }
    }

    fn any_open_part(&self) -> CadResult<&OpenPart> {
        self.open.as_ref().ok_or(CadError::NotOpen)
    }

    fn require_context(&self, required: AppContext) -> CadResult<()> {
        if self.context == required {
            Ok(())
        } else {
            Err(CadError::WrongContext {
                required,
                current: self.context,
            })
        }
    }

    fn load_model(&self, path: &Path) -> CadResult<PartModel> {
        if let Some(model) = self.library.get(path) {
            return Ok(model.clone());
        }

        let is_ron = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ron"));
        if is_ron && path.is_file() {
            return PartModel::load(path);
        }

        Err(CadError::PartNotFound(path.to_path_buf()))
    }

    fn drawing_items(open: &OpenPart, staged: &[ObjectId]) -> Vec<DrawingItem> {
        let mut items = Vec::new();
        for id in staged {
            match open.objects.get(id) {
                Some(SessionObject::Body { edges, .. }) => {
                    items.extend(edges.iter().map(|edge| DrawingItem::Line {
                        start: edge.start,
                        end: edge.end,
                        layer: BODY_LAYER,
                    }));
                }
                Some(SessionObject::SketchCurve { segment, .. }) => items.push(DrawingItem::Line {
                    start: segment.start,
                    end: segment.end,
                    layer: SKETCH_LAYER,
                }),
                Some(SessionObject::Note(note)) => items.push(DrawingItem::Note {
                    origin: note.origin,
                    lines: note.lines.clone(),
                    height: note.text_size,
                }),
                None => {}
            }
        }
        items
    }

    fn commit_record(open: &OpenPart, staged: &[ObjectId], path: &Path) -> CommitRecord {
        let mut record = CommitRecord {
            path: path.to_path_buf(),
            bodies: Vec::new(),
            sketch_curves: 0,
            notes: Vec::new(),
        };
        for id in staged {
            match open.objects.get(id) {
                Some(SessionObject::Body { name, .. }) => record.bodies.push(name.clone()),
                Some(SessionObject::SketchCurve { .. }) => record.sketch_curves += 1,
                Some(SessionObject::Note(note)) => record.notes.push(note.lines.clone()),
                None => {}
            }
        }
        record
    }
}

impl CadSession for MemorySession {
    fn name(&self) -> &str {
        "memory"
    }

    fn reserve_license(&mut self, capability: &str) -> CadResult<()> {
        if self.faults.license {
            return Err(CadError::License(format!(
                "no seats available for {}",
                capability
            )));
        }
        self.licenses.push(capability.to_string());
        Ok(())
    }

    fn release_license(&mut self, capability: &str) {
        if let Some(pos) = self.licenses.iter().position(|c| c == capability) {
            self.licenses.remove(pos);
        }
    }

    fn open_part(&mut self, path: &Path) -> CadResult<PartInfo> {
        let model = self.load_model(path)?;
        let open = OpenPart::from_model(path, model);
        let info = PartInfo {
            id: open.id,
            path: open.path.clone(),
        };

        if let Some(previous) = self.open.replace(open) {
            tracing::debug!("Replacing open part {}", previous.path.display());
        }
        Ok(info)
    }

    fn close_part(&mut self, part: PartId, policy: ClosePolicy) -> CadResult<()> {
        let open = match self.open.take() {
            Some(open) if open.id == part => open,
            other => {
                self.open = other;
                return Err(CadError::NotOpen);
            }
        };

        self.exporters.retain(|_, exporter| exporter.part != part);
        self.closed.push(ClosedPart {
            path: open.path,
            policy,
            was_modified: open.modified,
        });
        Ok(())
    }

    fn switch_application(&mut self, context: AppContext) -> CadResult<()> {
        if self.faults.switch_to.contains(&context) {
            return Err(CadError::ContextSwitch(context));
        }
        if context != AppContext::NoPart && self.open.is_none() {
            return Err(CadError::ContextSwitch(context));
        }
        self.context = context;
        self.context_history.push(context);
        Ok(())
    }

    fn current_application(&self) -> AppContext {
        self.context
    }

    fn string_attribute(&self, part: PartId, key: &str) -> Option<String> {
        self.open_part_ref(part)
            .ok()
            .and_then(|open| open.attributes.get(key).cloned())
    }

    fn sketches(&self, part: PartId) -> CadResult<Vec<SketchInfo>> {
        let open = self.open_part_ref(part)?;
        Ok(open.sketches.iter().map(|(info, _)| info.clone()).collect())
    }

    fn sketch_geometry(&self, sketch: ObjectId) -> CadResult<Vec<ObjectId>> {
        let open = self.any_open_part()?;
        open.sketches
            .iter()
            .find(|(info, _)| info.id == sketch)
            .map(|(_, geometry)| geometry.clone())
            .ok_or_else(|| CadError::InvalidObject(format!("sketch {}", sketch)))
    }

    fn bodies(&self, part: PartId) -> CadResult<Vec<BodyInfo>> {
        Ok(self.open_part_ref(part)?.bodies.clone())
    }

    fn body_edges(&self, body: ObjectId) -> CadResult<Vec<EdgeId>> {
        let open = self.any_open_part()?;
        match open.objects.get(&body) {
            Some(SessionObject::Body { edges, .. }) => Ok((0..edges.len() as u32)
                .map(|index| EdgeId::new(body, index))
                .collect()),
            _ => Err(CadError::InvalidObject(format!("body {}", body))),
        }
    }

    fn edge_sample_point(&mut self, part: PartId, edge: EdgeId) -> CadResult<DVec3> {
        let open = self.open_part_ref(part)?;
        let edges = match open.objects.get(&edge.body) {
            Some(SessionObject::Body { edges, .. }) => edges,
            _ => return Err(CadError::InvalidObject(format!("body {}", edge.body))),
        };
        edges
            .get(edge.index as usize)
            .and_then(EdgeModel::sample_point)
            .ok_or_else(|| {
                CadError::Sampling(format!("no point on edge {} of {}", edge.index, edge.body))
            })
    }

    fn create_note(&mut self, part: PartId, note: &NoteSpec) -> CadResult<ObjectId> {
        self.require_context(AppContext::Drafting)?;
        self.open_part_ref(part)?;

        let open = self.open.as_mut().ok_or(CadError::NotOpen)?;
        let id = ObjectId::new();
        open.objects.insert(id, SessionObject::Note(note.clone()));
        open.modified = true;
        Ok(id)
    }

    fn create_exporter(
        &mut self,
        part: PartId,
        settings: &ExporterSettings,
    ) -> CadResult<ExporterId> {
        self.open_part_ref(part)?;
        let id = ExporterId::new();
        self.exporters.insert(
            id,
            ExporterState {
                part,
                staged: Vec::new(),
            },
        );
        self.exporter_settings.push(settings.clone());
        Ok(id)
    }

    fn exporter_add(&mut self, exporter: ExporterId, objects: &[ObjectId]) -> CadResult<()> {
        self.require_context(AppContext::Modeling)?;
        let open = self.any_open_part()?;
        let state = self
            .exporters
            .get(&exporter)
            .ok_or_else(|| CadError::Staging("unknown exporter".into()))?;

        for id in objects {
            match open.objects.get(id) {
                None => return Err(CadError::Staging(format!("unknown object {}", id))),
                Some(SessionObject::Body { name, .. })
                    if self.faults.rejected_bodies.contains(name) =>
                {
                    return Err(CadError::Staging(format!("body '{}' rejected", name)));
                }
                Some(SessionObject::SketchCurve { sketch, .. })
                    if self.faults.rejected_sketches.contains(sketch) =>
                {
                    return Err(CadError::Staging(format!(
                        "geometry of sketch '{}' rejected",
                        sketch
                    )));
                }
                Some(_) => {}
            }
            if state.staged.contains(id) {
                return Err(CadError::Staging(format!("object {} already staged", id)));
            }
        }

        let unique: HashSet<_> = objects.iter().collect();
        if unique.len() != objects.len() {
            return Err(CadError::Staging("duplicate objects in request".into()));
        }

        if let Some(state) = self.exporters.get_mut(&exporter) {
            state.staged.extend_from_slice(objects);
        }
        Ok(())
    }

    fn exporter_remove(&mut self, exporter: ExporterId, object: ObjectId) -> CadResult<()> {
        self.require_context(AppContext::Modeling)?;
        let state = self
            .exporters
            .get_mut(&exporter)
            .ok_or_else(|| CadError::Staging("unknown exporter".into()))?;

        match state.staged.iter().position(|id| *id == object) {
            Some(pos) => {
                state.staged.remove(pos);
                Ok(())
            }
            None => Err(CadError::Staging(format!("object {} not staged", object))),
        }
    }

    fn exporter_commit(&mut self, exporter: ExporterId, output: &Path) -> CadResult<()> {
        self.require_context(AppContext::Modeling)?;
        if self.faults.commit {
            return Err(CadError::Commit("exporter produced no file".into()));
        }

        let open = self.any_open_part()?;
        let state = self
            .exporters
            .get(&exporter)
            .ok_or_else(|| CadError::Commit("unknown exporter".into()))?;

        let items = Self::drawing_items(open, &state.staged);
        write_drawing(output, &items)?;

        let record = Self::commit_record(open, &state.staged, output);
        self.commits.push(record);
        Ok(())
    }

    fn destroy_exporter(&mut self, exporter: ExporterId) {
        if let Some(state) = self.exporters.remove(&exporter) {
            self.remaining_at_destroy.push(state.staged.len());
        }
    }
}
