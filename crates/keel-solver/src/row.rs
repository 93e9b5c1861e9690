//! Affine rows of the simplex tableau.

use indexmap::IndexMap;

use crate::near_zero;
use crate::symbol::Symbol;

/// Structural change of a row, reported so the tableau can keep its column
/// index in step with the row's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermChange {
    /// The symbol now has a non-zero coefficient in the row.
    Entered,
    /// The symbol's coefficient cancelled to zero and was pruned.
    Left,
}

/// A row in the simplex tableau: `constant + Σ(coefficient * symbol)`.
///
/// Cells keep insertion order so that pivot selection is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Row {
    constant: f64,
    cells: IndexMap<Symbol, f64>,
}

impl Row {
    pub(crate) fn new(constant: f64) -> Self {
        Self {
            constant,
            cells: IndexMap::new(),
        }
    }

    pub(crate) fn constant(&self) -> f64 {
        self.constant
    }

    pub(crate) fn coefficient(&self, symbol: Symbol) -> f64 {
        self.cells.get(&symbol).copied().unwrap_or(0.0)
    }

    pub(crate) fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.cells.keys().copied()
    }

    pub(crate) fn cells(&self) -> impl Iterator<Item = (Symbol, f64)> + '_ {
        self.cells.iter().map(|(&symbol, &coefficient)| (symbol, coefficient))
    }

    /// True if the row has no symbols left.
    pub(crate) fn is_constant(&self) -> bool {
        self.cells.is_empty()
    }

    /// Multiply the row by a scalar.
    pub(crate) fn scale(&mut self, factor: f64) {
        self.constant *= factor;
        for coefficient in self.cells.values_mut() {
            *coefficient *= factor;
        }
    }

    /// Remove a symbol without touching the rest of the row.
    pub(crate) fn remove(&mut self, symbol: Symbol) -> Option<f64> {
        self.cells.shift_remove(&symbol)
    }

    pub(crate) fn add_variable(&mut self, symbol: Symbol, coefficient: f64) {
        self.add_variable_tracked(symbol, coefficient, &mut |_, _| {});
    }

    /// Add `coefficient * symbol`, pruning a cancelled cell and reporting
    /// cells that enter or leave the row.
    pub(crate) fn add_variable_tracked<F>(&mut self, symbol: Symbol, coefficient: f64, on_change: &mut F)
    where
        F: FnMut(Symbol, TermChange),
    {
        match self.cells.get_mut(&symbol) {
            Some(existing) => {
                let updated = *existing + coefficient;
                if near_zero(updated) {
                    self.cells.shift_remove(&symbol);
                    on_change(symbol, TermChange::Left);
                } else {
                    *existing = updated;
                }
            }
            None => {
                if !near_zero(coefficient) {
                    self.cells.insert(symbol, coefficient);
                    on_change(symbol, TermChange::Entered);
                }
            }
        }
    }

    pub(crate) fn add_expression(&mut self, other: &Row, coefficient: f64) {
        self.add_expression_tracked(other, coefficient, &mut |_, _| {});
    }

    /// Add `coefficient * other` into this row.
    pub(crate) fn add_expression_tracked<F>(&mut self, other: &Row, coefficient: f64, on_change: &mut F)
    where
        F: FnMut(Symbol, TermChange),
    {
        self.constant += coefficient * other.constant;
        for (&symbol, &c) in &other.cells {
            self.add_variable_tracked(symbol, c * coefficient, on_change);
        }
    }

    /// Replace `symbol` by the expression it is equal to.
    ///
    /// Returns false if the symbol did not occur in the row.
    pub(crate) fn substitute_out<F>(&mut self, symbol: Symbol, replacement: &Row, on_change: &mut F) -> bool
    where
        F: FnMut(Symbol, TermChange),
    {
        match self.cells.shift_remove(&symbol) {
            Some(coefficient) => {
                self.add_expression_tracked(replacement, coefficient, on_change);
                true
            }
            None => false,
        }
    }

    /// Re-solve the row for `subject`.
    ///
    /// The row `x = c + a·subject + rest` becomes
    /// `subject = -(c + rest) / a`, i.e. `subject` is removed and the rest
    /// is scaled by `-1/a`. Returns `1/a`, the coefficient the previous
    /// subject `x` takes in the new row.
    pub(crate) fn pivot_on_new_subject(&mut self, subject: Symbol) -> f64 {
        let reciprocal = 1.0 / self.cells.shift_remove(&subject).unwrap_or(1.0);
        self.scale(-reciprocal);
        reciprocal
    }

    /// Turn `old = row` into `new = row'`, keeping `old` as a term.
    pub(crate) fn change_subject(&mut self, old: Symbol, new: Symbol) {
        let coefficient = self.pivot_on_new_subject(new);
        self.cells.insert(old, coefficient);
    }
}
