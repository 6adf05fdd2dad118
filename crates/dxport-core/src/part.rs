//! Open/close pairing for part documents

use std::ops::{Deref, DerefMut};
use std::path::Path;

use dxport_kernel::{AppContext, CadSession, ClosePolicy, PartInfo};

use crate::error::{ExportError, ExportResult};

/// An open part; closed with a fixed policy when dropped or [`close`](Self::close)d
pub struct OpenPart<'a, S: CadSession + ?Sized> {
    session: &'a mut S,
    info: PartInfo,
    policy: ClosePolicy,
    open: bool,
}

impl<'a, S: CadSession + ?Sized> OpenPart<'a, S> {
    /// Open a part document
    pub fn open(session: &'a mut S, path: &Path, policy: ClosePolicy) -> ExportResult<Self> {
        let info = session
            .open_part(path)
            .map_err(|source| ExportError::PartOpen {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!("Opened part {}", info.path.display());

        Ok(Self {
            session,
            info,
            policy,
            open: true,
        })
    }

    pub fn info(&self) -> &PartInfo {
        &self.info
    }

    /// Leave the part's application context and close it.
    ///
    /// Both steps are attempted; the first failure is reported.
    pub fn close(mut self) -> ExportResult<()> {
        self.open = false;
        let switched = self
            .session
            .switch_application(AppContext::NoPart)
            .map_err(|source| ExportError::Context {
                context: AppContext::NoPart,
                source,
            });
        let closed = self.session.close_part(self.info.id, self.policy);
        tracing::info!("Closed part {}", self.info.path.display());

        switched?;
        closed.map_err(ExportError::from)
    }
}

impl<S: CadSession + ?Sized> Deref for OpenPart<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.session
    }
}

impl<S: CadSession + ?Sized> DerefMut for OpenPart<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.session
    }
}

impl<S: CadSession + ?Sized> Drop for OpenPart<'_, S> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(e) = self.session.switch_application(AppContext::NoPart) {
            tracing::error!("Failed to leave part context: {}", e);
        }
        match self.session.close_part(self.info.id, self.policy) {
            Ok(()) => tracing::info!("Closed part {} after failure", self.info.path.display()),
            Err(e) => tracing::error!("Failed to close part {}: {}", self.info.path.display(), e),
        }
    }
}
