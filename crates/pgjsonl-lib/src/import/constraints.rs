//! Foreign-key suspension for the duration of an import run.
//!
//! Files are loaded in listing order, not dependency order, so a child
//! row can arrive before its parent. Suspending enforcement for the whole
//! session avoids having to compute a load order. The guard restores
//! enforcement exactly once: explicitly via [`ConstraintGuard::restore`],
//! or on drop if the run unwinds first.

use std::ops::{Deref, DerefMut};

use crate::error::{PgJsonlError, Result};
use crate::session::{Session, Statement};

/// Holds the session while foreign-key checks are suspended.
///
/// With suspension disabled the guard is a plain pass-through and both
/// suspend and restore are no-ops.
pub struct ConstraintGuard<'a> {
    session: &'a mut dyn Session,
    suspended: bool,
}

impl<'a> ConstraintGuard<'a> {
    /// Suspend foreign-key checks if `enabled`.
    ///
    /// # Errors
    ///
    /// Returns `Constraint` if the session refuses to suspend checks.
    pub fn suspend(session: &'a mut dyn Session, enabled: bool) -> Result<Self> {
        if enabled {
            session
                .execute(&Statement::SetForeignKeyChecks(false))
                .map_err(|e| {
                    PgJsonlError::Constraint(format!("failed to suspend foreign-key checks: {e}"))
                })?;
            tracing::debug!("Foreign-key checks suspended");
        }
        Ok(Self {
            session,
            suspended: enabled,
        })
    }

    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Re-enable foreign-key checks.
    ///
    /// # Errors
    ///
    /// Returns `Constraint` if the session refuses. The restore is not
    /// retried on drop.
    pub fn restore(mut self) -> Result<()> {
        self.restore_once()
    }

    fn restore_once(&mut self) -> Result<()> {
        if !self.suspended {
            return Ok(());
        }
        self.suspended = false;
        self.session
            .execute(&Statement::SetForeignKeyChecks(true))
            .map_err(|e| {
                PgJsonlError::Constraint(format!("failed to restore foreign-key checks: {e}"))
            })?;
        tracing::debug!("Foreign-key checks restored");
        Ok(())
    }
}

impl<'a> Deref for ConstraintGuard<'a> {
    type Target = dyn Session + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl DerefMut for ConstraintGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl Drop for ConstraintGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_once() {
            tracing::warn!(error = %e, "Foreign-key checks left disabled");
        }
    }
}
