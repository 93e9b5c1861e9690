//! The incremental simplex solver.

use std::collections::HashMap;

use indexmap::IndexMap;
use keel_core::{ConstraintVariable, Relation, SolverConfig};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, warn};

use crate::equation::Equation;
use crate::near_zero;
use crate::row::Row;
use crate::symbol::{Symbol, SymbolKind, SymbolTable};
use crate::tableau::Tableau;

/// Handle of an equation installed in a [`Solver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquationKey(u64);

/// Errors that can occur during constraint solving.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// A required equation conflicts with the required equations already
    /// installed. The tableau is left exactly as it was.
    #[error("The equation cannot be satisfied")]
    Unsatisfiable,

    /// The key does not name an equation installed in this solver.
    #[error("The equation {0:?} is not in the solver")]
    UnknownEquation(EquationKey),
}

/// The symbols that represent one installed equation.
#[derive(Debug, Clone)]
struct Marker {
    /// Symbol used to locate and remove the equation's row
    symbol: Symbol,
    /// Error symbols charged into the objective
    errors: SmallVec<[Symbol; 2]>,
    /// Objective weight of each error symbol
    weight: f64,
    relation: Relation,
}

/// The Cassowary constraint solver.
///
/// Structural operations take `&mut self`, so a solver is mutated by one
/// owner at a time and every read observes a fully optimised tableau.
#[derive(Debug)]
pub struct Solver {
    config: SolverConfig,
    symbols: SymbolTable,
    /// Key of the objective row inside the tableau
    objective: Symbol,
    tableau: Tableau,
    /// Marker symbols of every installed equation
    markers: IndexMap<EquationKey, Marker>,
    /// External symbol of every variable seen so far
    variables: HashMap<ConstraintVariable, Symbol>,
    next_key: u64,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver {
    /// Create a new solver.
    pub fn new(config: SolverConfig) -> Self {
        let mut symbols = SymbolTable::default();
        let objective = symbols.make(SymbolKind::Objective);
        let mut tableau = Tableau::default();
        tableau.add_row(objective, Row::new(0.0));
        Self {
            config,
            symbols,
            objective,
            tableau,
            markers: IndexMap::new(),
            variables: HashMap::new(),
            next_key: 0,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Number of installed equations.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn contains(&self, key: EquationKey) -> bool {
        self.markers.contains_key(&key)
    }

    /// Get the current value of a variable.
    ///
    /// Basic variables take their row's constant; everything else rests at
    /// zero.
    pub fn value(&self, variable: ConstraintVariable) -> f64 {
        self.variables
            .get(&variable)
            .and_then(|&symbol| self.tableau.row(symbol))
            .map_or(0.0, Row::constant)
    }

    /// Current value of the objective (total weighted error).
    pub fn objective_value(&self) -> f64 {
        self.tableau.row(self.objective).map_or(0.0, Row::constant)
    }

    /// Add an equation to the solver.
    ///
    /// A required equation that conflicts with the installed required
    /// equations is rejected with [`SolverError::Unsatisfiable`] and the
    /// tableau is left untouched. Preferred equations never fail.
    pub fn add_equation(&mut self, equation: &Equation) -> Result<EquationKey, SolverError> {
        let (row, marker) = self.create_row(equation);

        match self.choose_subject(&row) {
            Ok(Some(subject)) => self.install_row(subject, row),
            Ok(None) => {
                let snapshot = self.tableau.clone();
                if let Err(err) = self.add_with_artificial_variable(row) {
                    self.tableau = snapshot;
                    warn!(equation = %equation, "equation cannot be satisfied and is rejected");
                    return Err(err);
                }
            }
            Err(err) => {
                warn!(equation = %equation, "equation cannot be satisfied and is rejected");
                return Err(err);
            }
        }

        self.charge_errors(&marker, 1.0);
        let key = EquationKey(self.next_key);
        self.next_key += 1;
        self.markers.insert(key, marker);
        self.optimize(self.objective);

        debug!(?key, equation = %equation, rows = self.tableau.rows.len(), "added equation");
        Ok(key)
    }

    /// Remove an equation from the solver.
    ///
    /// The result is equivalent, up to floating-point drift, to a tableau
    /// that never saw the equation.
    pub fn remove_equation(&mut self, key: EquationKey) -> Result<(), SolverError> {
        let marker = self
            .markers
            .shift_remove(&key)
            .ok_or(SolverError::UnknownEquation(key))?;

        self.charge_errors(&marker, -1.0);

        if self.tableau.remove_row(marker.symbol).is_none() {
            match self.marker_leaving_row(marker.symbol) {
                Some(leaving) => {
                    self.tableau.pivot(marker.symbol, leaving);
                    self.tableau.remove_row(marker.symbol);
                }
                None => self.tableau.remove_column(marker.symbol),
            }
        }
        for &error in &marker.errors {
            if error != marker.symbol {
                self.tableau.remove_column(error);
            }
        }

        self.optimize(self.objective);

        debug!(?key, relation = %marker.relation, rows = self.tableau.rows.len(), "removed equation");
        Ok(())
    }

    /// Re-run optimisation of the objective.
    pub fn solve(&mut self) {
        self.optimize(self.objective);
    }

    /// Compile an equation into a row over non-basic symbols.
    fn create_row(&mut self, equation: &Equation) -> (Row, Marker) {
        let mut row = Row::new(-equation.constant());

        for term in equation.terms() {
            let symbol = self.variable_symbol(term.variable);
            match self.tableau.row(symbol) {
                Some(basic) => row.add_expression(basic, term.coefficient),
                None => row.add_variable(symbol, term.coefficient),
            }
        }

        let weight = equation.priority().weight();
        let marker = match (equation.relation(), weight) {
            (Relation::Equal, None) => {
                let dummy = self.symbols.make(SymbolKind::Dummy);
                row.add_variable(dummy, 1.0);
                Marker {
                    symbol: dummy,
                    errors: SmallVec::new(),
                    weight: 0.0,
                    relation: Relation::Equal,
                }
            }
            (Relation::Equal, Some(weight)) => {
                let plus = self.symbols.make(SymbolKind::Slack);
                let minus = self.symbols.make(SymbolKind::Slack);
                row.add_variable(plus, -1.0);
                row.add_variable(minus, 1.0);
                Marker {
                    symbol: plus,
                    errors: SmallVec::from_slice(&[plus, minus]),
                    weight,
                    relation: Relation::Equal,
                }
            }
            (relation, weight) => {
                if relation == Relation::LessOrEqual {
                    row.scale(-1.0);
                }
                let slack = self.symbols.make(SymbolKind::Slack);
                row.add_variable(slack, -1.0);
                let mut errors = SmallVec::new();
                if weight.is_some() {
                    let error = self.symbols.make(SymbolKind::Slack);
                    row.add_variable(error, 1.0);
                    errors.push(error);
                }
                Marker {
                    symbol: slack,
                    errors,
                    weight: weight.unwrap_or(0.0),
                    relation,
                }
            }
        };

        if row.constant() < 0.0 {
            row.scale(-1.0);
        }

        (row, marker)
    }

    /// Choose the symbol the new row will be solved for.
    ///
    /// Returns `Ok(None)` when no symbol can be chosen directly and the
    /// artificial-variable method is needed.
    fn choose_subject(&self, row: &Row) -> Result<Option<Symbol>, SolverError> {
        if let Some(symbol) = row.symbols().find(|symbol| symbol.is_external()) {
            return Ok(Some(symbol));
        }

        if let Some((symbol, _)) = row.cells().find(|&(symbol, coefficient)| {
            symbol.is_slack() && coefficient < 0.0 && !self.tableau.is_referenced(symbol)
        }) {
            return Ok(Some(symbol));
        }

        // Only dummies left: the row is either redundant or conflicting.
        let mut subject = None;
        for symbol in row.symbols() {
            if !symbol.is_dummy() {
                return Ok(None);
            }
            if !self.tableau.is_referenced(symbol) {
                subject = Some(symbol);
            }
        }
        if !near_zero(row.constant()) {
            return Err(SolverError::Unsatisfiable);
        }
        Ok(subject)
    }

    fn install_row(&mut self, subject: Symbol, mut row: Row) {
        row.pivot_on_new_subject(subject);
        self.tableau.substitute_out(subject, &row);
        self.tableau.add_row(subject, row);
    }

    /// Two-phase insertion: minimise an artificial variable standing in for
    /// the row, and accept the row only if it reaches zero.
    fn add_with_artificial_variable(&mut self, row: Row) -> Result<(), SolverError> {
        let artificial = self.symbols.make(SymbolKind::Slack);
        let phase_one = self.symbols.make(SymbolKind::Objective);
        self.tableau.add_row(phase_one, row.clone());
        self.tableau.add_row(artificial, row);

        self.optimize(phase_one);
        let satisfied = self
            .tableau
            .remove_row(phase_one)
            .is_some_and(|objective| near_zero(objective.constant()));
        if !satisfied {
            return Err(SolverError::Unsatisfiable);
        }

        if let Some(row) = self.tableau.row(artificial) {
            if row.is_constant() {
                self.tableau.remove_row(artificial);
                return Ok(());
            }
            let entering = row
                .symbols()
                .find(|symbol| symbol.is_slack())
                .ok_or(SolverError::Unsatisfiable)?;
            self.tableau.pivot(entering, artificial);
        }
        self.tableau.remove_column(artificial);
        Ok(())
    }

    /// Add (`sign = 1`) or withdraw (`sign = -1`) the weighted error
    /// symbols of a marker from the objective.
    fn charge_errors(&mut self, marker: &Marker, sign: f64) {
        let coefficient = sign * marker.weight;
        for &error in &marker.errors {
            match self.tableau.row(error).cloned() {
                Some(row) => self.tableau.add_expression_to(self.objective, &row, coefficient),
                None => self.tableau.add_variable_to(self.objective, error, coefficient),
            }
        }
    }

    /// Pivot until no slack symbol can lower the given objective row.
    fn optimize(&mut self, objective: Symbol) {
        let mut pivots = 0;
        loop {
            let Some(row) = self.tableau.row(objective) else {
                return;
            };
            let Some(entering) = row
                .cells()
                .find(|&(symbol, coefficient)| symbol.is_slack() && coefficient < 0.0)
                .map(|(symbol, _)| symbol)
            else {
                return;
            };
            let Some(leaving) = self.leaving_symbol(entering) else {
                warn!(?entering, "objective is unbounded; stopping optimisation");
                return;
            };

            self.tableau.pivot(entering, leaving);

            pivots += 1;
            if pivots >= self.config.max_pivots {
                warn!(pivots, "pivot limit reached; stopping optimisation");
                return;
            }
        }
    }

    /// Ratio test over the restricted rows of the entering symbol's column.
    fn leaving_symbol(&self, entering: Symbol) -> Option<Symbol> {
        let mut best: Option<(f64, Symbol)> = None;
        for basic in self.tableau.column(entering) {
            if !basic.is_restricted() {
                continue;
            }
            let Some(row) = self.tableau.row(basic) else {
                continue;
            };
            let coefficient = row.coefficient(entering);
            if coefficient < 0.0 {
                let ratio = -row.constant() / coefficient;
                if best.map_or(true, |(min, _)| ratio < min) {
                    best = Some((ratio, basic));
                }
            }
        }
        best.map(|(_, symbol)| symbol)
    }

    /// Choose the row a non-basic marker should be pivoted into before its
    /// row can be deleted.
    fn marker_leaving_row(&self, marker: Symbol) -> Option<Symbol> {
        let mut negative: Option<(f64, Symbol)> = None;
        let mut positive: Option<(f64, Symbol)> = None;
        let mut unrestricted = None;

        for basic in self.tableau.column(marker) {
            if basic.kind() == SymbolKind::Objective {
                continue;
            }
            let Some(row) = self.tableau.row(basic) else {
                continue;
            };
            let coefficient = row.coefficient(marker);
            if !basic.is_restricted() {
                unrestricted = unrestricted.or(Some(basic));
            } else if coefficient < 0.0 {
                let ratio = -row.constant() / coefficient;
                if negative.map_or(true, |(min, _)| ratio < min) {
                    negative = Some((ratio, basic));
                }
            } else {
                let ratio = row.constant() / coefficient;
                if positive.map_or(true, |(min, _)| ratio < min) {
                    positive = Some((ratio, basic));
                }
            }
        }

        negative
            .or(positive)
            .map(|(_, symbol)| symbol)
            .or(unrestricted)
    }

    fn variable_symbol(&mut self, variable: ConstraintVariable) -> Symbol {
        let symbols = &mut self.symbols;
        *self
            .variables
            .entry(variable)
            .or_insert_with(|| symbols.make(SymbolKind::External))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::Term;
    use keel_core::{Attribute, EntityId, Priority};
    use proptest::prelude::*;

    fn var(entity: u64, attribute: Attribute) -> ConstraintVariable {
        ConstraintVariable::new(EntityId(entity), attribute)
    }

    fn x() -> ConstraintVariable {
        var(1, Attribute::Left)
    }

    fn y() -> ConstraintVariable {
        var(1, Attribute::Right)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    /// `variable <relation> value`
    fn bound(variable: ConstraintVariable, relation: Relation, value: f64, priority: Priority) -> Equation {
        Equation::new([Term::new(1.0, variable)], relation, value, priority)
    }

    #[test]
    fn test_simple_equality() {
        let mut solver = Solver::default();
        solver.add_equation(&Equation::pin(x(), 100.0)).unwrap();
        assert!(approx(solver.value(x()), 100.0));
        solver.tableau.assert_consistent();
    }

    #[test]
    fn test_unknown_variable_is_zero() {
        let solver = Solver::default();
        assert_eq!(solver.value(x()), 0.0);
    }

    #[test]
    fn test_chained_required_equalities() {
        let mut solver = Solver::default();
        solver.add_equation(&Equation::pin(y(), 0.0)).unwrap();
        // x - y == 5
        let chained = Equation::new(
            [Term::new(1.0, x()), Term::new(-1.0, y())],
            Relation::Equal,
            5.0,
            Priority::Required,
        );
        solver.add_equation(&chained).unwrap();
        assert!(approx(solver.value(x()), 5.0));
        assert!(approx(solver.value(y()), 0.0));
    }

    #[test]
    fn test_inequality_bounds() {
        let mut solver = Solver::default();
        solver
            .add_equation(&bound(x(), Relation::GreaterOrEqual, 50.0, Priority::Required))
            .unwrap();
        solver
            .add_equation(&bound(x(), Relation::Equal, 10.0, Priority::LOWEST))
            .unwrap();
        assert!(approx(solver.value(x()), 50.0));

        solver
            .add_equation(&bound(y(), Relation::LessOrEqual, 20.0, Priority::Required))
            .unwrap();
        solver
            .add_equation(&bound(y(), Relation::Equal, 90.0, Priority::LOWEST))
            .unwrap();
        assert!(approx(solver.value(y()), 20.0));
        solver.tableau.assert_consistent();
    }

    #[test]
    fn test_strength_ordering() {
        let mut solver = Solver::default();
        solver
            .add_equation(&bound(x(), Relation::Equal, 0.0, Priority::preferred(1.0)))
            .unwrap();
        solver
            .add_equation(&bound(x(), Relation::Equal, 100.0, Priority::preferred(1000.0)))
            .unwrap();
        let value = solver.value(x());
        assert!((value - 100.0).abs() < (value - 0.0).abs());
        assert!(approx(value, 100.0));
    }

    #[test]
    fn test_invalid_weights_still_attract() {
        let mut solver = Solver::default();
        solver
            .add_equation(&bound(x(), Relation::GreaterOrEqual, 0.0, Priority::Required))
            .unwrap();
        solver
            .add_equation(&bound(x(), Relation::Equal, 10.0, Priority::Preferred(-5.0)))
            .unwrap();
        solver
            .add_equation(&bound(y(), Relation::Equal, 7.0, Priority::Preferred(f64::NAN)))
            .unwrap();
        assert!(approx(solver.value(x()), 10.0));
        assert!(approx(solver.value(y()), 7.0));
        assert!(solver.objective_value() >= -crate::EPSILON);
        solver.tableau.assert_consistent();
    }

    #[test]
    fn test_conflicting_required_equality_is_rejected() {
        let mut solver = Solver::default();
        solver.add_equation(&Equation::pin(x(), 10.0)).unwrap();
        let before = solver.tableau.rows.clone();

        let err = solver.add_equation(&Equation::pin(x(), 20.0)).unwrap_err();
        assert_eq!(err, SolverError::Unsatisfiable);
        assert_eq!(solver.tableau.rows, before);
        assert_eq!(solver.len(), 1);
        assert!(approx(solver.value(x()), 10.0));
    }

    #[test]
    fn test_conflicting_required_inequality_is_rejected() {
        let mut solver = Solver::default();
        solver
            .add_equation(&bound(x(), Relation::GreaterOrEqual, 10.0, Priority::Required))
            .unwrap();
        solver
            .add_equation(&bound(x(), Relation::Equal, 15.0, Priority::LOW))
            .unwrap();
        let before = solver.tableau.rows.clone();

        let err = solver
            .add_equation(&bound(x(), Relation::LessOrEqual, 5.0, Priority::Required))
            .unwrap_err();
        assert_eq!(err, SolverError::Unsatisfiable);
        assert_eq!(solver.tableau.rows, before);
        assert!(approx(solver.value(x()), 15.0));
        solver.tableau.assert_consistent();
    }

    #[test]
    fn test_redundant_required_equality_is_accepted() {
        let mut solver = Solver::default();
        solver.add_equation(&Equation::pin(x(), 10.0)).unwrap();
        let key = solver.add_equation(&Equation::pin(x(), 10.0)).unwrap();
        assert!(approx(solver.value(x()), 10.0));
        solver.remove_equation(key).unwrap();
        assert!(approx(solver.value(x()), 10.0));
    }

    #[test]
    fn test_remove_restores_previous_solution() {
        let mut solver = Solver::default();
        solver
            .add_equation(&bound(x(), Relation::Equal, 40.0, Priority::LOW))
            .unwrap();
        let strong = solver
            .add_equation(&bound(x(), Relation::Equal, 70.0, Priority::HIGH))
            .unwrap();
        assert!(approx(solver.value(x()), 70.0));

        solver.remove_equation(strong).unwrap();
        assert!(approx(solver.value(x()), 40.0));
        assert!(approx(solver.objective_value(), 0.0));
        solver.tableau.assert_consistent();
    }

    #[test]
    fn test_remove_required_inequality() {
        let mut solver = Solver::default();
        let floor = solver
            .add_equation(&bound(x(), Relation::GreaterOrEqual, 30.0, Priority::Required))
            .unwrap();
        solver
            .add_equation(&bound(x(), Relation::Equal, 0.0, Priority::MEDIUM))
            .unwrap();
        assert!(approx(solver.value(x()), 30.0));

        solver.remove_equation(floor).unwrap();
        assert!(approx(solver.value(x()), 0.0));
        solver.tableau.assert_consistent();
    }

    #[test]
    fn test_remove_unknown_equation() {
        let mut solver = Solver::default();
        let key = solver.add_equation(&Equation::pin(x(), 1.0)).unwrap();
        solver.remove_equation(key).unwrap();
        assert_eq!(
            solver.remove_equation(key),
            Err(SolverError::UnknownEquation(key))
        );
        assert!(solver.is_empty());
    }

    #[test]
    fn test_remove_everything_leaves_only_objective() {
        let mut solver = Solver::default();
        let keys = [
            solver.add_equation(&Equation::pin(x(), 3.0)).unwrap(),
            solver
                .add_equation(&bound(y(), Relation::GreaterOrEqual, 1.0, Priority::LOW))
                .unwrap(),
            solver
                .add_equation(&Equation::new(
                    [Term::new(1.0, y()), Term::new(-2.0, x())],
                    Relation::Equal,
                    0.0,
                    Priority::MEDIUM,
                ))
                .unwrap(),
        ];
        assert!(approx(solver.value(y()), 6.0));

        for key in keys {
            solver.remove_equation(key).unwrap();
        }
        solver.tableau.assert_consistent();
        assert_eq!(solver.tableau.rows.len(), 1);
        assert!(solver.tableau.row(solver.objective).unwrap().is_constant());
    }

    proptest! {
        #[test]
        fn prop_add_then_remove_round_trips(
            pins in proptest::collection::vec(-500.0f64..500.0, 1..6),
            extra in -500.0f64..500.0,
            weight in 1.0f64..1000.0,
            required in any::<bool>(),
        ) {
            let mut solver = Solver::default();
            let base: Vec<_> = (0..pins.len()).map(|i| var(i as u64, Attribute::Left)).collect();
            for (variable, value) in base.iter().zip(&pins) {
                solver.add_equation(&Equation::pin(*variable, *value)).unwrap();
            }
            let before: Vec<f64> = base.iter().map(|v| solver.value(*v)).collect();

            let fresh = var(99, Attribute::Width);
            let priority = if required { Priority::Required } else { Priority::preferred(weight) };
            let key = solver
                .add_equation(&Equation::new(
                    [Term::new(1.0, fresh), Term::new(-1.0, base[0])],
                    Relation::GreaterOrEqual,
                    extra,
                    priority,
                ))
                .unwrap();
            solver.remove_equation(key).unwrap();

            let after: Vec<f64> = base.iter().map(|v| solver.value(*v)).collect();
            for (a, b) in before.iter().zip(&after) {
                prop_assert!((a - b).abs() < 1e-6);
            }
            solver.tableau.assert_consistent();
        }
    }
}
