//! Scoped application-context switches
//!
//! Some session calls are only valid in one application context (notes in
//! drafting, export selection in modeling). A `ContextGuard` switches into a
//! context and switches back when it goes out of scope, on every exit path.

use std::ops::{Deref, DerefMut};

use dxport_kernel::{AppContext, CadSession};

use crate::error::{ExportError, ExportResult};

/// Holds the session in a context until dropped or [`exit`](Self::exit)ed
pub struct ContextGuard<'a, S: CadSession + ?Sized> {
    session: &'a mut S,
    context: AppContext,
    restore: AppContext,
    active: bool,
}

impl<'a, S: CadSession + ?Sized> ContextGuard<'a, S> {
    /// Switch into `context`, returning to `restore` afterwards
    pub fn enter(session: &'a mut S, context: AppContext, restore: AppContext) -> ExportResult<Self> {
        session
            .switch_application(context)
            .map_err(|source| ExportError::Context { context, source })?;
        tracing::debug!("Entered {} context", context);

        Ok(Self {
            session,
            context,
            restore,
            active: true,
        })
    }

    /// Switch into `context`, returning to whatever context is current now
    pub fn enter_from_current(session: &'a mut S, context: AppContext) -> ExportResult<Self> {
        let restore = session.current_application();
        Self::enter(session, context, restore)
    }

    /// Switch back now and report whether that worked
    pub fn exit(mut self) -> ExportResult<()> {
        self.active = false;
        let restore = self.restore;
        self.session
            .switch_application(restore)
            .map_err(|source| ExportError::Context {
                context: restore,
                source,
            })?;
        tracing::debug!("Returned to {} context", restore);
        Ok(())
    }
}

impl<S: CadSession + ?Sized> Deref for ContextGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.session
    }
}

impl<S: CadSession + ?Sized> DerefMut for ContextGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.session
    }
}

impl<S: CadSession + ?Sized> Drop for ContextGuard<'_, S> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.session.switch_application(self.restore) {
            tracing::error!(
                "Failed to return from {} to {} context: {}",
                self.context,
                self.restore,
                e
            );
        }
    }
}
