//! Thread-safe handle to a constraint manager.

use std::sync::Arc;

use keel_core::{ConstraintError, ConstraintId, ConstraintVariable, EntityId, KeelConfig};
use parking_lot::Mutex;

use crate::constraint::Constraint;
use crate::manager::ConstraintManager;
use crate::tree::EntityTree;

/// A [`ConstraintManager`] behind a mutex.
///
/// Every call takes the lock for its whole duration, so readers only ever
/// see a settled tableau. Use [`batch`](Self::batch) to apply several
/// mutations without other threads observing the intermediate states.
#[derive(Debug, Clone, Default)]
pub struct SharedManager {
    inner: Arc<Mutex<ConstraintManager>>,
}

impl From<ConstraintManager> for SharedManager {
    fn from(manager: ConstraintManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }
}

impl SharedManager {
    pub fn new(config: KeelConfig) -> Self {
        ConstraintManager::new(config).into()
    }

    /// Run `f` with exclusive access to the manager.
    pub fn batch<R>(&self, f: impl FnOnce(&mut ConstraintManager) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    pub fn add_managed_view(&self, entity: EntityId) {
        self.inner.lock().add_managed_view(entity);
    }

    pub fn remove_managed_view(&self, entity: EntityId) {
        self.inner.lock().remove_managed_view(entity);
    }

    pub fn add_constraint(&self, constraint: &Constraint) -> Result<(), ConstraintError> {
        self.inner.lock().add_constraint(constraint)
    }

    pub fn remove_constraint(&self, id: ConstraintId) -> Option<Constraint> {
        self.inner.lock().remove_constraint(id)
    }

    pub fn value_for_variable(&self, variable: ConstraintVariable) -> f64 {
        self.inner.lock().value_for_variable(variable)
    }

    pub fn needs_intrinsic_width(&self, entity: EntityId) -> bool {
        self.inner.lock().needs_intrinsic_width(entity)
    }

    pub fn needs_intrinsic_height(&self, entity: EntityId) -> bool {
        self.inner.lock().needs_intrinsic_height(entity)
    }

    /// Split the subtree at `root` into a new shared manager.
    pub fn split(&self, root: EntityId, tree: &impl EntityTree) -> SharedManager {
        self.inner.lock().split(root, tree).into()
    }

    /// Move everything managed by `other` into this manager, leaving
    /// `other` empty. Returns the ids of constraints that were rejected.
    ///
    /// Both locks are held for the whole transfer. They are always taken
    /// in address order, so two threads joining the same pair in opposite
    /// directions cannot deadlock.
    pub fn join(&self, other: &SharedManager) -> Vec<ConstraintId> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Vec::new();
        }
        let self_first = Arc::as_ptr(&self.inner) < Arc::as_ptr(&other.inner);
        let (mut this, mut that) = if self_first {
            let this = self.inner.lock();
            let that = other.inner.lock();
            (this, that)
        } else {
            let that = other.inner.lock();
            let this = self.inner.lock();
            (this, that)
        };
        let config = that.config().clone();
        let drained = std::mem::replace(&mut *that, ConstraintManager::new(config));
        this.join(drained)
    }

    pub fn ptr_eq(&self, other: &SharedManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
