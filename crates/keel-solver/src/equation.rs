//! Equations as submitted to the solver.

use std::fmt;

use keel_core::{ConstraintVariable, Priority, Relation};
use smallvec::SmallVec;

/// One weighted variable of an equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub coefficient: f64,
    pub variable: ConstraintVariable,
}

impl Term {
    pub fn new(coefficient: f64, variable: ConstraintVariable) -> Self {
        Self {
            coefficient,
            variable,
        }
    }
}

/// A linear relation `Σ(coefficient * variable) <relation> constant`.
///
/// Equations are immutable once built; to change one, remove it from the
/// solver and add a new one. Preferred weights are clamped to a positive,
/// finite value on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    constant: f64,
    terms: SmallVec<[Term; 3]>,
    relation: Relation,
    priority: Priority,
}

impl Equation {
    pub fn new(
        terms: impl IntoIterator<Item = Term>,
        relation: Relation,
        constant: f64,
        priority: Priority,
    ) -> Self {
        Self {
            constant,
            terms: terms.into_iter().collect(),
            relation,
            priority: priority.normalized(),
        }
    }

    /// `variable == value`, required.
    pub fn pin(variable: ConstraintVariable, value: f64) -> Self {
        Self::new([Term::new(1.0, variable)], Relation::Equal, value, Priority::Required)
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{}·{}", term.coefficient, term.variable)?;
        }
        write!(f, " {} {} @{}", self.relation, self.constant, self.priority)
    }
}
