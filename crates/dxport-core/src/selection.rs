//! Export selection staging
//!
//! A `SelectionTransaction` owns the exporter of one part. Whole-part objects
//! (marker sketches) are staged once and stay staged until the transaction is
//! torn down. Everything a body adds goes through a `BodyScope`, which
//! unstages it again when the scope ends, whether or not the commit worked.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use dxport_kernel::{CadSession, ExporterId, ExporterSettings, ObjectId, PartId};

use crate::error::{ExportError, ExportResult};

/// Exporter and selection of one part
pub struct SelectionTransaction<'a, S: CadSession + ?Sized> {
    session: &'a mut S,
    exporter: ExporterId,
    whole_part: Vec<ObjectId>,
    active: bool,
}

impl<'a, S: CadSession + ?Sized> SelectionTransaction<'a, S> {
    /// Create the exporter for a part
    pub fn open(
        session: &'a mut S,
        part: PartId,
        settings: &ExporterSettings,
    ) -> ExportResult<Self> {
        let exporter = session
            .create_exporter(part, settings)
            .map_err(ExportError::Transaction)?;

        Ok(Self {
            session,
            exporter,
            whole_part: Vec::new(),
            active: true,
        })
    }

    pub fn exporter(&self) -> ExporterId {
        self.exporter
    }

    /// Objects staged for the whole part
    pub fn whole_part(&self) -> &[ObjectId] {
        &self.whole_part
    }

    /// Stage objects for every body of the part. Returns whether it worked;
    /// a failure is logged and leaves the selection unchanged.
    pub fn stage_whole_part(&mut self, objects: &[ObjectId]) -> bool {
        match self.session.exporter_add(self.exporter, objects) {
            Ok(()) => {
                self.whole_part.extend_from_slice(objects);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to stage {} part objects: {}", objects.len(), e);
                false
            }
        }
    }

    /// Start staging for one body
    pub fn body_scope(&mut self) -> BodyScope<'_, 'a, S> {
        BodyScope {
            txn: self,
            staged: Vec::new(),
        }
    }

    /// Destroy the exporter and with it the whole-part selection
    pub fn teardown(mut self) {
        self.active = false;
        self.session.destroy_exporter(self.exporter);
        tracing::debug!("Export transaction torn down");
    }
}

impl<S: CadSession + ?Sized> Deref for SelectionTransaction<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.session
    }
}

impl<S: CadSession + ?Sized> DerefMut for SelectionTransaction<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.session
    }
}

impl<S: CadSession + ?Sized> Drop for SelectionTransaction<'_, S> {
    fn drop(&mut self) {
        if self.active {
            self.session.destroy_exporter(self.exporter);
        }
    }
}

/// Objects staged for one body; unstaged when the scope ends
pub struct BodyScope<'t, 'a, S: CadSession + ?Sized> {
    txn: &'t mut SelectionTransaction<'a, S>,
    staged: Vec<ObjectId>,
}

impl<S: CadSession + ?Sized> BodyScope<'_, '_, S> {
    /// Stage an object for this body only. Returns whether it worked; a
    /// failure is logged and the rest of the body still exports.
    pub fn stage_for_body(&mut self, object: ObjectId) -> bool {
        match self.txn.session.exporter_add(self.txn.exporter, &[object]) {
            Ok(()) => {
                self.staged.push(object);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to stage object {}: {}", object, e);
                false
            }
        }
    }

    /// Objects staged by this scope so far
    pub fn staged(&self) -> &[ObjectId] {
        &self.staged
    }

    /// Write the current selection (part and body objects) to `output`
    pub fn commit(&mut self, output: &Path) -> ExportResult<()> {
        self.txn
            .session
            .exporter_commit(self.txn.exporter, output)
            .map_err(|source| ExportError::Commit {
                path: output.to_path_buf(),
                source,
            })
    }

    /// Remove every object this scope staged, newest first
    pub fn unstage_all(&mut self) {
        while let Some(object) = self.staged.pop() {
            if let Err(e) = self.txn.session.exporter_remove(self.txn.exporter, object) {
                tracing::error!("Failed to unstage object {}: {}", object, e);
            }
        }
    }
}

impl<S: CadSession + ?Sized> Deref for BodyScope<'_, '_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.txn.session
    }
}

impl<S: CadSession + ?Sized> DerefMut for BodyScope<'_, '_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.txn.session
    }
}

impl<S: CadSession + ?Sized> Drop for BodyScope<'_, '_, S> {
    fn drop(&mut self) {
        self.unstage_all();
    }
}
