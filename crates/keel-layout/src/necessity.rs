//! Decides which entities still need an intrinsic measurement.
//!
//! An attribute is *fixed* when required equalities determine it from other
//! fixed attributes or from constants. The analysis looks only at fixing
//! constraints and never at the solver's numbers, so it stays valid however
//! the tableau happens to be pivoted.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use keel_core::{Attribute, Axis, ConstraintId, ConstraintVariable, EntityId};
use smallvec::SmallVec;
use tracing::trace;

use crate::constraint::{Constraint, ConstraintItem};

type Items = SmallVec<[ConstraintItem; 2]>;

/// Lazily recomputed fixed-point analysis over fixing constraints.
#[derive(Debug, Clone, Default)]
pub struct NecessityDecider {
    fixed: HashMap<EntityId, HashSet<Attribute>>,
    /// Axes whose intrinsic priorities force a measurement
    forced: HashSet<(EntityId, Axis)>,
    active: IndexMap<ConstraintId, Items>,
    pending_add: IndexMap<ConstraintId, Items>,
    pending_remove: IndexSet<ConstraintId>,
}

impl NecessityDecider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `constraint` if it is fixing. Other constraints are ignored.
    pub fn add_constraint(&mut self, constraint: &Constraint) {
        if !constraint.is_fixing() {
            return;
        }
        let id = constraint.id();
        self.pending_remove.shift_remove(&id);
        if !self.active.contains_key(&id) {
            self.pending_add.insert(id, constraint.items().iter().copied().collect());
        }
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) {
        if self.pending_add.shift_remove(&id).is_none() && self.active.contains_key(&id) {
            self.pending_remove.insert(id);
        }
    }

    /// Mark an axis of `entity` as needing measurement no matter what is
    /// fixed, or clear that mark.
    pub fn set_requires_measurement(&mut self, entity: EntityId, axis: Axis, required: bool) {
        if required {
            self.forced.insert((entity, axis));
        } else {
            self.forced.remove(&(entity, axis));
        }
    }

    /// Drop the measurement marks of an entity that left the manager.
    pub fn forget_entity(&mut self, entity: EntityId) {
        self.forced.remove(&(entity, Axis::Horizontal));
        self.forced.remove(&(entity, Axis::Vertical));
    }

    pub fn needs_intrinsic_width(&mut self, entity: EntityId) -> bool {
        self.needs_intrinsic_size(entity, Axis::Horizontal)
    }

    pub fn needs_intrinsic_height(&mut self, entity: EntityId) -> bool {
        self.needs_intrinsic_size(entity, Axis::Vertical)
    }

    pub fn needs_intrinsic_size(&mut self, entity: EntityId, axis: Axis) -> bool {
        self.invalidate();
        self.forced.contains(&(entity, axis))
            || !is_fixed(&self.fixed, ConstraintVariable::new(entity, axis.extent()))
    }

    pub fn is_fixed(&mut self, variable: ConstraintVariable) -> bool {
        self.invalidate();
        is_fixed(&self.fixed, variable)
    }

    /// Apply pending changes and rerun the analysis, if anything changed
    /// since the last query.
    fn invalidate(&mut self) {
        if self.pending_add.is_empty() && self.pending_remove.is_empty() {
            return;
        }
        for id in self.pending_remove.drain(..) {
            self.active.shift_remove(&id);
        }
        self.active.extend(self.pending_add.drain(..));
        self.fixed.clear();
        self.solve();
    }

    fn solve(&mut self) {
        let fixed = &mut self.fixed;
        let mut items: Vec<ConstraintItem> = self.active.values().flatten().copied().collect();
        let mut passes = 0;
        loop {
            let before = items.len();
            items.retain(|item| {
                if is_fixed(fixed, item.left) {
                    if let Some(right) = item.right {
                        fix(fixed, right);
                    }
                    false
                } else if item.right.map_or(true, |right| is_fixed(fixed, right)) {
                    fix(fixed, item.left);
                    false
                } else {
                    true
                }
            });
            passes += 1;
            if items.len() == before {
                break;
            }
        }
        trace!(passes, unresolved = items.len(), "necessity analysis settled");
    }
}

fn is_fixed(fixed: &HashMap<EntityId, HashSet<Attribute>>, variable: ConstraintVariable) -> bool {
    fixed
        .get(&variable.entity)
        .is_some_and(|attributes| attributes.contains(&variable.attribute))
}

fn fix(fixed: &mut HashMap<EntityId, HashSet<Attribute>>, variable: ConstraintVariable) {
    let attributes = fixed.entry(variable.entity).or_default();
    if !attributes.insert(variable.attribute) {
        return;
    }
    // Any two of edge, edge, extent, and center determine the other two.
    let group = variable.attribute.axis().box_attributes();
    if group.iter().filter(|a| attributes.contains(*a)).count() >= 2 {
        attributes.extend(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{Priority, Relation};

    fn var(entity: u64, attribute: Attribute) -> ConstraintVariable {
        ConstraintVariable::new(EntityId(entity), attribute)
    }

    #[test]
    fn test_edges_fix_width() {
        let mut decider = NecessityDecider::new();
        decider.add_constraint(&Constraint::to_value(var(1, Attribute::Left), Relation::Equal, 0.0));
        decider.add_constraint(&Constraint::to_value(var(1, Attribute::Right), Relation::Equal, 40.0));

        assert!(!decider.needs_intrinsic_width(EntityId(1)));
        assert!(decider.is_fixed(var(1, Attribute::CenterX)));
        assert!(decider.needs_intrinsic_height(EntityId(1)));
    }

    #[test]
    fn test_soft_size_needs_measurement() {
        let mut decider = NecessityDecider::new();
        decider.add_constraint(
            &Constraint::to_value(var(1, Attribute::Width), Relation::Equal, 40.0)
                .with_priority(Priority::HIGH),
        );
        assert!(decider.needs_intrinsic_width(EntityId(1)));
    }

    #[test]
    fn test_fix_propagates_through_chain() {
        let mut decider = NecessityDecider::new();
        // Added out of order so the first pass cannot resolve everything.
        decider.add_constraint(&Constraint::between(
            var(3, Attribute::Width),
            Relation::Equal,
            var(2, Attribute::Width),
        ));
        decider.add_constraint(&Constraint::between(
            var(2, Attribute::Width),
            Relation::Equal,
            var(1, Attribute::Width),
        ));
        decider.add_constraint(&Constraint::to_value(var(1, Attribute::Width), Relation::Equal, 10.0));

        assert!(!decider.needs_intrinsic_width(EntityId(3)));
    }

    #[test]
    fn test_fix_flows_right_to_left() {
        let mut decider = NecessityDecider::new();
        decider.add_constraint(&Constraint::between(
            var(2, Attribute::Left),
            Relation::Equal,
            var(1, Attribute::Left),
        ));
        decider.add_constraint(&Constraint::to_value(var(1, Attribute::Left), Relation::Equal, 0.0));
        assert!(decider.is_fixed(var(2, Attribute::Left)));
    }

    #[test]
    fn test_unpinned_pair_stays_free() {
        let mut decider = NecessityDecider::new();
        decider.add_constraint(&Constraint::between(
            var(2, Attribute::Width),
            Relation::Equal,
            var(1, Attribute::Width),
        ));
        assert!(decider.needs_intrinsic_width(EntityId(1)));
        assert!(decider.needs_intrinsic_width(EntityId(2)));
    }

    #[test]
    fn test_removal_is_applied_lazily() {
        let mut decider = NecessityDecider::new();
        let pin = Constraint::to_value(var(1, Attribute::Width), Relation::Equal, 10.0);
        decider.add_constraint(&pin);
        assert!(!decider.needs_intrinsic_width(EntityId(1)));

        decider.remove_constraint(pin.id());
        assert!(decider.needs_intrinsic_width(EntityId(1)));

        // Add then remove before any query leaves nothing behind.
        decider.add_constraint(&pin);
        decider.remove_constraint(pin.id());
        assert!(decider.needs_intrinsic_width(EntityId(1)));
    }

    #[test]
    fn test_forced_measurement_wins() {
        let mut decider = NecessityDecider::new();
        decider.add_constraint(&Constraint::to_value(var(1, Attribute::Width), Relation::Equal, 10.0));
        decider.set_requires_measurement(EntityId(1), Axis::Horizontal, true);
        assert!(decider.needs_intrinsic_width(EntityId(1)));

        decider.forget_entity(EntityId(1));
        assert!(!decider.needs_intrinsic_width(EntityId(1)));
    }
}
