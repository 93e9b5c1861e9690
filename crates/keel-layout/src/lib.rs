//! Constraint management for trees of entities.
//!
//! This crate sits between the entity tree of an embedding system and the
//! tableau solver:
//! - [`Constraint`]s relate attributes of managed entities
//! - [`ConstraintManager`] installs them into one solver per independent
//!   group of entities and splits or joins groups as the tree changes
//! - [`NecessityDecider`] tells the embedder which entities still need an
//!   intrinsic measurement
//! - [`SharedManager`] is the thread-safe handle
//!
//! # Example
//!
//! ```
//! use keel_core::{Attribute, ConstraintVariable, EntityId, Relation};
//! use keel_layout::{Constraint, ConstraintManager};
//!
//! let (parent, child) = (EntityId(1), EntityId(2));
//! let mut manager = ConstraintManager::default();
//! manager.add_managed_view(parent);
//! manager.add_managed_view(child);
//!
//! let left = |entity| ConstraintVariable::new(entity, Attribute::Left);
//! manager.add_constraint(&Constraint::to_value(left(parent), Relation::Equal, 10.0))?;
//! manager.add_constraint(
//!     &Constraint::between(left(child), Relation::Equal, left(parent)).with_offset(8.0),
//! )?;
//!
//! assert!((manager.value_for_variable(left(child)) - 18.0).abs() < 1e-6);
//! # Ok::<(), keel_core::ConstraintError>(())
//! ```

mod constraint;
mod intrinsic;
mod manager;
mod necessity;
mod shared;
mod tree;

pub use constraint::{Constraint, ConstraintItem};
pub use intrinsic::{AxisIntrinsic, IntrinsicSize};
pub use manager::ConstraintManager;
pub use necessity::NecessityDecider;
pub use shared::SharedManager;
pub use tree::{EntityHierarchy, EntityTree};
