//! The constraint manager.
//!
//! A manager owns one solver and the set of entities whose constraints live
//! in it. Every installed constraint references only managed entities; when
//! an entity leaves, constraints that reach it are dropped with it.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use keel_core::{
    Axis, ConstraintError, ConstraintId, ConstraintVariable, EntityId, KeelConfig, Priority,
    Relation,
};
use keel_solver::{Equation, EquationKey, Solver, Term};
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::constraint::Constraint;
use crate::intrinsic::{AxisIntrinsic, IntrinsicSize};
use crate::necessity::NecessityDecider;
use crate::tree::EntityTree;

const AXES: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];

fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::Horizontal => 0,
        Axis::Vertical => 1,
    }
}

/// Per-entity housekeeping.
#[derive(Debug, Clone)]
struct EntityRecord {
    /// Required equations tying extent and center to the edges
    box_equations: SmallVec<[EquationKey; 4]>,
    intrinsic: IntrinsicSize,
    /// Installed intrinsic-size constraints, per axis
    intrinsic_constraints: [SmallVec<[ConstraintId; 2]>; 2],
}

#[derive(Debug, Clone)]
struct Installed {
    constraint: Constraint,
    equations: SmallVec<[EquationKey; 2]>,
}

/// Bridges user-facing [`Constraint`]s and a [`Solver`] for one group of
/// entities.
#[derive(Debug)]
pub struct ConstraintManager {
    config: KeelConfig,
    solver: Solver,
    entities: IndexMap<EntityId, EntityRecord>,
    constraints: IndexMap<ConstraintId, Installed>,
    /// Constraint ids per owning entity
    owned: HashMap<EntityId, IndexSet<ConstraintId>>,
    /// Constraints installed by the manager itself (value pins and
    /// intrinsic sizes)
    system: HashSet<ConstraintId>,
    value_pins: HashMap<ConstraintVariable, ConstraintId>,
    necessity: NecessityDecider,
}

impl Default for ConstraintManager {
    fn default() -> Self {
        Self::new(KeelConfig::default())
    }
}

impl ConstraintManager {
    pub fn new(config: KeelConfig) -> Self {
        let solver = Solver::new(config.solver.clone());
        Self {
            config,
            solver,
            entities: IndexMap::new(),
            constraints: IndexMap::new(),
            owned: HashMap::new(),
            system: HashSet::new(),
            value_pins: HashMap::new(),
            necessity: NecessityDecider::new(),
        }
    }

    pub fn config(&self) -> &KeelConfig {
        &self.config
    }

    pub fn is_managed(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Managed entities in the order they were added.
    pub fn managed_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of active constraints, including system-installed ones.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn is_active(&self, id: ConstraintId) -> bool {
        self.constraints.contains_key(&id)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(&id).map(|installed| &installed.constraint)
    }

    /// Active constraints owned by `entity`.
    pub fn constraints_of(&self, entity: EntityId) -> impl Iterator<Item = &Constraint> + '_ {
        self.owned
            .get(&entity)
            .into_iter()
            .flatten()
            .filter_map(|id| self.constraint(*id))
    }

    /// Start managing `entity`. Does nothing if it is already managed.
    pub fn add_managed_view(&mut self, entity: EntityId) {
        if self.is_managed(entity) {
            return;
        }
        let intrinsic = IntrinsicSize::new(&self.config.intrinsic);
        self.adopt(entity, intrinsic, Default::default());
        debug!(%entity, "managing entity");
    }

    /// Stop managing `entity`, removing its constraints and every other
    /// constraint that references it.
    pub fn remove_managed_view(&mut self, entity: EntityId) {
        let Some(record) = self.entities.shift_remove(&entity) else {
            return;
        };
        self.remove_box_equations(&record);
        if let Some(ids) = self.owned.remove(&entity) {
            for id in ids {
                self.remove_constraint(id);
            }
        }
        self.value_pins.retain(|variable, _| variable.entity != entity);
        self.necessity.forget_entity(entity);
        self.normalize_constraints();
        debug!(%entity, "released entity");
    }

    /// Install `constraint`.
    ///
    /// Adding a constraint that is already active does nothing. Every
    /// entity the constraint references must be managed here. A required
    /// constraint that conflicts with the installed ones is rejected and
    /// leaves the solver as it was.
    pub fn add_constraint(&mut self, constraint: &Constraint) -> Result<(), ConstraintError> {
        if self.is_active(constraint.id()) {
            return Ok(());
        }
        self.install(constraint.clone())
    }

    /// Uninstall a constraint, returning it if it was active.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Constraint> {
        self.system.remove(&id);
        self.uninstall(id)
    }

    /// Edit an active constraint in place.
    ///
    /// The constraint is taken out of the solver, changed, and installed
    /// again, so the solver never sees a half-edited equation. If the edited
    /// constraint is rejected it stays inactive and the error is returned.
    pub fn update_constraint(
        &mut self,
        id: ConstraintId,
        edit: impl FnOnce(&mut Constraint),
    ) -> Result<(), ConstraintError> {
        let mut constraint = self
            .uninstall(id)
            .ok_or(ConstraintError::UnknownConstraint(id))?;
        edit(&mut constraint);
        let result = self.install(constraint);
        if result.is_err() {
            self.system.remove(&id);
        }
        result
    }

    pub fn set_multiplier(&mut self, id: ConstraintId, multiplier: f64) -> Result<(), ConstraintError> {
        self.update_constraint(id, |constraint| constraint.set_multiplier(multiplier))
    }

    pub fn set_offset(&mut self, id: ConstraintId, offset: f64) -> Result<(), ConstraintError> {
        self.update_constraint(id, |constraint| constraint.set_offset(offset))
    }

    pub fn set_priority(&mut self, id: ConstraintId, priority: Priority) -> Result<(), ConstraintError> {
        self.update_constraint(id, |constraint| constraint.set_priority(priority))
    }

    /// Solved value of `variable`. Variables the solver has never seen are 0.
    pub fn value_for_variable(&self, variable: ConstraintVariable) -> f64 {
        self.solver.value(variable)
    }

    /// Pin `variable` to `value` with a required, manager-owned equality.
    ///
    /// Calling it again moves the existing pin. Variables of unmanaged
    /// entities are ignored.
    pub fn set_value_for_variable(
        &mut self,
        variable: ConstraintVariable,
        value: f64,
    ) -> Result<(), ConstraintError> {
        if !self.is_managed(variable.entity) {
            debug!(%variable, "ignoring pin on unmanaged entity");
            return Ok(());
        }
        if let Some(&id) = self.value_pins.get(&variable) {
            if self.is_active(id) {
                return self.set_offset(id, value).map_err(|err| {
                    self.value_pins.remove(&variable);
                    err
                });
            }
        }
        let pin = Constraint::to_value(variable, Relation::Equal, value);
        let id = pin.id();
        self.install(pin)?;
        self.system.insert(id);
        self.value_pins.insert(variable, id);
        Ok(())
    }

    /// Remove the pin set by [`set_value_for_variable`](Self::set_value_for_variable).
    pub fn reset_value_for_variable(&mut self, variable: ConstraintVariable) {
        if let Some(id) = self.value_pins.remove(&variable) {
            self.remove_constraint(id);
        }
    }

    pub fn intrinsic_size(&self, entity: EntityId) -> Option<&IntrinsicSize> {
        self.entities.get(&entity).map(|record| &record.intrinsic)
    }

    /// Set the measured extent of `entity` along `axis`; `None` clears it.
    pub fn set_intrinsic_size(
        &mut self,
        entity: EntityId,
        axis: Axis,
        size: Option<f64>,
    ) -> Result<(), ConstraintError> {
        self.update_intrinsic(entity, axis, |intrinsic| intrinsic.size = size)
    }

    pub fn set_content_hugging_priority(
        &mut self,
        entity: EntityId,
        axis: Axis,
        priority: Priority,
    ) -> Result<(), ConstraintError> {
        self.update_intrinsic(entity, axis, |intrinsic| intrinsic.content_hugging = priority)
    }

    pub fn set_compression_resistance_priority(
        &mut self,
        entity: EntityId,
        axis: Axis,
        priority: Priority,
    ) -> Result<(), ConstraintError> {
        self.update_intrinsic(entity, axis, |intrinsic| {
            intrinsic.compression_resistance = priority
        })
    }

    /// Whether the surrounding system has to measure `entity`'s width.
    /// Always false for entities this manager does not own.
    pub fn needs_intrinsic_width(&mut self, entity: EntityId) -> bool {
        self.is_managed(entity) && self.necessity.needs_intrinsic_width(entity)
    }

    /// Vertical counterpart of [`needs_intrinsic_width`](Self::needs_intrinsic_width).
    pub fn needs_intrinsic_height(&mut self, entity: EntityId) -> bool {
        self.is_managed(entity) && self.necessity.needs_intrinsic_height(entity)
    }

    /// Drop every constraint owned by `entity` that the manager did not
    /// install itself. Returns the removed constraints.
    pub fn remove_constraints_created_externally(&mut self, entity: EntityId) -> Vec<Constraint> {
        let external: Vec<ConstraintId> = self
            .owned
            .get(&entity)
            .into_iter()
            .flatten()
            .filter(|id| !self.system.contains(*id))
            .copied()
            .collect();
        external
            .into_iter()
            .filter_map(|id| self.remove_constraint(id))
            .collect()
    }

    /// Move the subtree rooted at `root` into a new manager.
    ///
    /// Managed entities of the subtree leave together with the constraints
    /// whose entities all lie inside it. Constraints that cross the
    /// boundary are dropped on both sides.
    pub fn split(&mut self, root: EntityId, tree: &impl EntityTree) -> ConstraintManager {
        let leaving = tree.subtree(root);
        let mut split_off = ConstraintManager::new(self.config.clone());

        let mut moving = Vec::new();
        for entity in &leaving {
            let ids: Vec<ConstraintId> = self.owned.get(entity).into_iter().flatten().copied().collect();
            for id in ids {
                let system = self.system.contains(&id);
                if let Some(constraint) = self.remove_constraint(id) {
                    moving.push((constraint, system));
                }
            }
        }

        for &entity in &leaving {
            let Some(record) = self.entities.shift_remove(&entity) else {
                continue;
            };
            self.remove_box_equations(&record);
            self.owned.remove(&entity);
            self.necessity.forget_entity(entity);
            split_off.adopt(entity, record.intrinsic, record.intrinsic_constraints);
        }

        let mut dropped = 0;
        for (constraint, system) in moving {
            if let Some(entity) = split_off.unmanaged_entity(&constraint) {
                debug!(constraint = %constraint, %entity, "dropping constraint that crosses the split");
                dropped += 1;
                continue;
            }
            let id = constraint.id();
            match split_off.install(constraint) {
                Ok(()) if system => {
                    split_off.system.insert(id);
                }
                Ok(()) => {}
                Err(err) => {
                    warn!(error = %err, "constraint rejected by split-off manager");
                    dropped += 1;
                }
            }
        }

        let pins: Vec<ConstraintVariable> = self
            .value_pins
            .keys()
            .filter(|variable| leaving.contains(&variable.entity))
            .copied()
            .collect();
        for variable in pins {
            if let Some(id) = self.value_pins.remove(&variable) {
                split_off.value_pins.insert(variable, id);
            }
        }

        dropped += self.normalize_constraints();

        info!(
            %root,
            entities = split_off.entities.len(),
            constraints = split_off.constraints.len(),
            dropped,
            "split manager"
        );
        split_off
    }

    /// Merge `other` into this manager.
    ///
    /// Every entity and constraint of `other` moves here and its equations
    /// are reinstalled in this solver. Constraints that conflict with the
    /// required constraints already here are left out; their ids are
    /// returned.
    ///
    /// For an entity managed on both sides the receiver keeps its own
    /// intrinsic size, so the other side's intrinsic-size constraints for
    /// it are discarded. Likewise a variable pinned on both sides keeps
    /// the receiver's pin.
    pub fn join(&mut self, other: ConstraintManager) -> Vec<ConstraintId> {
        let ConstraintManager {
            entities,
            constraints,
            system,
            value_pins,
            ..
        } = other;

        let joined_entities = entities.len();
        let mut superseded: HashSet<ConstraintId> = HashSet::new();
        for (entity, record) in entities {
            if self.is_managed(entity) {
                superseded.extend(record.intrinsic_constraints.iter().flatten().copied());
                continue;
            }
            self.adopt(entity, record.intrinsic, record.intrinsic_constraints);
        }
        let value_pins: Vec<(ConstraintVariable, ConstraintId)> = value_pins
            .into_iter()
            .filter(|(variable, id)| {
                let duplicate = self.value_pins.contains_key(variable);
                if duplicate {
                    superseded.insert(*id);
                }
                !duplicate
            })
            .collect();

        let mut rejected = Vec::new();
        for (id, installed) in constraints {
            if superseded.contains(&id) {
                debug!(%id, "discarding constraint superseded by the receiving manager");
                continue;
            }
            match self.install(installed.constraint) {
                Ok(()) => {
                    if system.contains(&id) {
                        self.system.insert(id);
                    }
                }
                Err(err) => {
                    warn!(%id, error = %err, "dropping constraint while joining managers");
                    rejected.push(id);
                }
            }
        }
        for (variable, id) in value_pins {
            if self.is_active(id) {
                self.value_pins.insert(variable, id);
            }
        }

        info!(
            entities = joined_entities,
            constraints = self.constraints.len(),
            superseded = superseded.len(),
            rejected = rejected.len(),
            "joined manager"
        );
        rejected
    }

    /// Register `entity` with its box equations and intrinsic state.
    fn adopt(
        &mut self,
        entity: EntityId,
        intrinsic: IntrinsicSize,
        intrinsic_constraints: [SmallVec<[ConstraintId; 2]>; 2],
    ) {
        let box_equations = self.install_box_equations(entity);
        for axis in AXES {
            self.necessity
                .set_requires_measurement(entity, axis, intrinsic.axis(axis).requires_measurement());
        }
        self.entities.insert(
            entity,
            EntityRecord {
                box_equations,
                intrinsic,
                intrinsic_constraints,
            },
        );
        self.owned.entry(entity).or_default();
    }

    /// `extent = trailing - leading` and `2 * center = leading + trailing`
    /// on both axes.
    fn install_box_equations(&mut self, entity: EntityId) -> SmallVec<[EquationKey; 4]> {
        let mut keys = SmallVec::new();
        for axis in AXES {
            let [leading, trailing, extent, center] = axis
                .box_attributes()
                .map(|attribute| ConstraintVariable::new(entity, attribute));
            let equations = [
                Equation::new(
                    [Term::new(1.0, extent), Term::new(-1.0, trailing), Term::new(1.0, leading)],
                    Relation::Equal,
                    0.0,
                    Priority::Required,
                ),
                Equation::new(
                    [Term::new(2.0, center), Term::new(-1.0, leading), Term::new(-1.0, trailing)],
                    Relation::Equal,
                    0.0,
                    Priority::Required,
                ),
            ];
            for equation in &equations {
                match self.solver.add_equation(equation) {
                    Ok(key) => keys.push(key),
                    Err(err) => warn!(%entity, equation = %equation, error = %err, "box equation rejected"),
                }
            }
        }
        keys
    }

    fn remove_box_equations(&mut self, record: &EntityRecord) {
        for &key in &record.box_equations {
            if let Err(err) = self.solver.remove_equation(key) {
                warn!(error = %err, "box equation already gone");
            }
        }
    }

    fn update_intrinsic(
        &mut self,
        entity: EntityId,
        axis: Axis,
        edit: impl FnOnce(&mut AxisIntrinsic),
    ) -> Result<(), ConstraintError> {
        let Some(record) = self.entities.get_mut(&entity) else {
            return Ok(());
        };
        let intrinsic = record.intrinsic.axis_mut(axis);
        let before = intrinsic.clone();
        edit(&mut *intrinsic);
        if *intrinsic == before {
            return Ok(());
        }
        let intrinsic = intrinsic.clone();
        let stale = std::mem::take(&mut record.intrinsic_constraints[axis_slot(axis)]);

        for id in stale {
            self.remove_constraint(id);
        }
        self.necessity
            .set_requires_measurement(entity, axis, intrinsic.requires_measurement());

        let mut installed = SmallVec::new();
        let mut result = Ok(());
        for constraint in intrinsic.constraints(entity, axis) {
            let id = constraint.id();
            match self.install(constraint) {
                Ok(()) => {
                    self.system.insert(id);
                    installed.push(id);
                }
                Err(err) => {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        if let Some(record) = self.entities.get_mut(&entity) {
            record.intrinsic_constraints[axis_slot(axis)] = installed;
        }
        result
    }

    /// First entity referenced by `constraint` that is not managed here.
    fn unmanaged_entity(&self, constraint: &Constraint) -> Option<EntityId> {
        constraint.entities().find(|entity| !self.is_managed(*entity))
    }

    /// Verify and install a constraint that is not active yet.
    fn install(&mut self, constraint: Constraint) -> Result<(), ConstraintError> {
        if let Some(entity) = self.unmanaged_entity(&constraint) {
            return Err(ConstraintError::EntityNotManaged { entity });
        }

        let mut equations: SmallVec<[EquationKey; 2]> = SmallVec::new();
        for equation in constraint.equations() {
            match self.solver.add_equation(&equation) {
                Ok(key) => equations.push(key),
                Err(err) => {
                    for key in equations.drain(..) {
                        if let Err(undo) = self.solver.remove_equation(key) {
                            warn!(error = %undo, "rolled-back equation already gone");
                        }
                    }
                    warn!(constraint = %constraint, "rejecting infeasible constraint");
                    return Err(ConstraintError::Infeasible {
                        constraint: constraint.id(),
                        description: format!("{}: {}", constraint, err),
                    });
                }
            }
        }

        let id = constraint.id();
        debug!(%id, constraint = %constraint, "constraint installed");
        self.necessity.add_constraint(&constraint);
        self.owned.entry(constraint.owner()).or_default().insert(id);
        self.constraints.insert(id, Installed { constraint, equations });
        Ok(())
    }

    /// Take a constraint out of the solver without touching its system flag.
    fn uninstall(&mut self, id: ConstraintId) -> Option<Constraint> {
        let installed = self.constraints.shift_remove(&id)?;
        for &key in &installed.equations {
            if let Err(err) = self.solver.remove_equation(key) {
                warn!(%id, error = %err, "equation already gone");
            }
        }
        if let Some(ids) = self.owned.get_mut(&installed.constraint.owner()) {
            ids.shift_remove(&id);
        }
        self.necessity.remove_constraint(id);
        debug!(%id, "constraint removed");
        Some(installed.constraint)
    }

    /// Drop constraints that reference entities no longer managed here.
    /// Returns how many were dropped.
    fn normalize_constraints(&mut self) -> usize {
        let foreign: Vec<ConstraintId> = self
            .constraints
            .iter()
            .filter(|(_, installed)| self.unmanaged_entity(&installed.constraint).is_some())
            .map(|(&id, _)| id)
            .collect();
        for &id in &foreign {
            self.remove_constraint(id);
        }
        foreign.len()
    }
}
