//! User-facing constraints.

use std::fmt;

use keel_core::{ConstraintId, ConstraintVariable, EntityId, Priority, Relation};
use keel_solver::{Equation, Term};
use smallvec::SmallVec;

/// One relation between two attributes, or between an attribute and a
/// constant.
///
/// With a right-hand variable the item reads
/// `left <relation> multiplier * right + offset`; without one it reads
/// `left <relation> offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintItem {
    pub left: ConstraintVariable,
    pub relation: Relation,
    pub right: Option<ConstraintVariable>,
}

impl ConstraintItem {
    pub fn new(left: ConstraintVariable, relation: Relation, right: ConstraintVariable) -> Self {
        Self {
            left,
            relation,
            right: Some(right),
        }
    }

    /// An item comparing `left` against the constraint's offset.
    pub fn constant(left: ConstraintVariable, relation: Relation) -> Self {
        Self {
            left,
            relation,
            right: None,
        }
    }
}

/// A semantic relation made of one or more items sharing a multiplier,
/// offset, and priority.
///
/// A constraint is a value; the manager that installs it keeps its own copy.
/// Edit an installed constraint through
/// [`ConstraintManager::update_constraint`](crate::ConstraintManager::update_constraint)
/// so the solver never sees a half-updated equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    id: ConstraintId,
    owner: EntityId,
    items: SmallVec<[ConstraintItem; 2]>,
    multiplier: f64,
    offset: f64,
    priority: Priority,
}

impl Constraint {
    /// Create a required constraint with multiplier 1 and offset 0.
    pub fn new(owner: EntityId, items: impl IntoIterator<Item = ConstraintItem>) -> Self {
        Self {
            id: ConstraintId::next(),
            owner,
            items: items.into_iter().collect(),
            multiplier: 1.0,
            offset: 0.0,
            priority: Priority::Required,
        }
    }

    /// `left <relation> right` owned by `left`'s entity.
    pub fn between(left: ConstraintVariable, relation: Relation, right: ConstraintVariable) -> Self {
        Self::new(left.entity, [ConstraintItem::new(left, relation, right)])
    }

    /// `variable <relation> value` owned by the variable's entity.
    pub fn to_value(variable: ConstraintVariable, relation: Relation, value: f64) -> Self {
        Self::new(variable.entity, [ConstraintItem::constant(variable, relation)]).with_offset(value)
    }

    pub fn multiplied_by(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn divided_by(self, divisor: f64) -> Self {
        self.multiplied_by(1.0 / divisor)
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority.normalized();
        self
    }

    pub fn id(&self) -> ConstraintId {
        self.id
    }

    /// The entity whose constraint set this constraint belongs to.
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn items(&self) -> &[ConstraintItem] {
        &self.items
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier;
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority.normalized();
    }

    /// The owner and every entity referenced by an item.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        std::iter::once(self.owner).chain(self.items.iter().flat_map(|item| {
            std::iter::once(item.left.entity).chain(item.right.map(|right| right.entity))
        }))
    }

    /// Required and made only of equalities: such a constraint determines
    /// one side of each item from the other.
    pub fn is_fixing(&self) -> bool {
        self.priority.is_required() && self.items.iter().all(|item| item.relation == Relation::Equal)
    }

    /// One solver equation per item.
    pub fn equations(&self) -> impl Iterator<Item = Equation> + '_ {
        self.items.iter().map(move |item| {
            let mut terms: SmallVec<[Term; 2]> = SmallVec::new();
            terms.push(Term::new(1.0, item.left));
            if let Some(right) = item.right {
                terms.push(Term::new(-self.multiplier, right));
            }
            Equation::new(terms, item.relation, self.offset, self.priority)
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            match item.right {
                Some(right) => write!(
                    f,
                    "{} {} {} * {} + {}",
                    item.left, item.relation, right, self.multiplier, self.offset
                )?,
                None => write!(f, "{} {} {}", item.left, item.relation, self.offset)?,
            }
        }
        write!(f, " @{}", self.priority)
    }
}
