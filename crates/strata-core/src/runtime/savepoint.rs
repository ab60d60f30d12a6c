// crates/strata-core/src/runtime/savepoint.rs
// ============================================================================
// Module: Strata Savepoint Guard
// Description: Scoped savepoint that rolls back unless committed.
// Purpose: Make every multi-statement mutation all-or-nothing.
// Dependencies: tracing, crate::interfaces
// ============================================================================

//! ## Overview
//! [`Savepoint`] opens the store's single savepoint and holds the mutable
//! borrow of the store for its lifetime. Work runs through
//! [`Savepoint::store`]. Dropping the guard without [`Savepoint::commit`]
//! rolls back, so early returns through `?` never leave partial effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::error;

use crate::interfaces::RelationalStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Open savepoint on a relational store.
///
/// # Invariants
/// - At most one guard exists per store; the store enforces it as well.
/// - The savepoint is released or rolled back exactly once.
pub struct Savepoint<'a, S: RelationalStore + ?Sized> {
    /// Store holding the open savepoint.
    store: &'a mut S,
    /// True until the savepoint is released or rolled back.
    open: bool,
}

impl<'a, S: RelationalStore + ?Sized> Savepoint<'a, S> {
    /// Opens a savepoint on `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SavepointActive`] when one is already open, or
    /// the store's error when it cannot begin.
    pub fn begin(store: &'a mut S) -> Result<Self, StoreError> {
        store.begin_savepoint()?;
        Ok(Self {
            store,
            open: true,
        })
    }

    /// Returns the store for work inside the savepoint.
    pub fn store(&mut self) -> &mut S {
        &mut *self.store
    }

    /// Releases the savepoint, keeping its effects.
    ///
    /// When the release fails the savepoint is rolled back before the error
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the release fails.
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.open = false;
        if let Err(err) = self.store.release_savepoint() {
            if let Err(rollback) = self.store.rollback_savepoint() {
                error!(error = %rollback, "savepoint rollback after failed release failed");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Rolls the savepoint back, discarding its effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the rollback fails.
    pub fn rollback(mut self) -> Result<(), StoreError> {
        self.open = false;
        self.store.rollback_savepoint()
    }
}

impl<S: RelationalStore + ?Sized> Drop for Savepoint<'_, S> {
    fn drop(&mut self) {
        if self.open
            && let Err(err) = self.store.rollback_savepoint()
        {
            error!(error = %err, "savepoint rollback on drop failed");
        }
    }
}
