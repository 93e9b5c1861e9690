//! Row storage with a reverse column index.
//!
//! Every structural change to a stored row (a symbol entering or leaving it)
//! is mirrored into `columns` in the same operation, so the rows that
//! mention a symbol can be found without scanning the whole tableau.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::row::{Row, TermChange};
use crate::symbol::Symbol;

type Columns = HashMap<Symbol, IndexSet<Symbol>>;

#[derive(Debug, Clone, Default)]
pub(crate) struct Tableau {
    /// Rows keyed by their basic symbol
    pub(crate) rows: IndexMap<Symbol, Row>,
    /// For each symbol, the basic symbols whose rows mention it
    pub(crate) columns: Columns,
}

/// Keeps `columns` in step with changes to the row of `subject`.
fn column_tracker(columns: &mut Columns, subject: Symbol) -> impl FnMut(Symbol, TermChange) + '_ {
    move |symbol, change| match change {
        TermChange::Entered => {
            columns.entry(symbol).or_default().insert(subject);
        }
        TermChange::Left => {
            if let Some(column) = columns.get_mut(&symbol) {
                column.shift_remove(&subject);
            }
        }
    }
}

impl Tableau {
    pub(crate) fn row(&self, symbol: Symbol) -> Option<&Row> {
        self.rows.get(&symbol)
    }

    #[cfg(test)]
    pub(crate) fn is_basic(&self, symbol: Symbol) -> bool {
        self.rows.contains_key(&symbol)
    }

    /// True if some stored row mentions `symbol`.
    pub(crate) fn is_referenced(&self, symbol: Symbol) -> bool {
        self.columns.get(&symbol).is_some_and(|column| !column.is_empty())
    }

    /// Basic symbols whose rows mention `symbol`.
    pub(crate) fn column(&self, symbol: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.columns.get(&symbol).into_iter().flatten().copied()
    }

    pub(crate) fn add_row(&mut self, subject: Symbol, row: Row) {
        for symbol in row.symbols() {
            self.columns.entry(symbol).or_default().insert(subject);
        }
        self.rows.insert(subject, row);
    }

    pub(crate) fn remove_row(&mut self, subject: Symbol) -> Option<Row> {
        let row = self.rows.shift_remove(&subject)?;
        for symbol in row.symbols() {
            if let Some(column) = self.columns.get_mut(&symbol) {
                column.shift_remove(&subject);
            }
        }
        Some(row)
    }

    /// Drop `symbol` from every row that mentions it, i.e. fix it at zero.
    pub(crate) fn remove_column(&mut self, symbol: Symbol) {
        if let Some(column) = self.columns.remove(&symbol) {
            for subject in column {
                if let Some(row) = self.rows.get_mut(&subject) {
                    row.remove(symbol);
                }
            }
        }
    }

    /// Replace `symbol` by `replacement` in every row that mentions it.
    pub(crate) fn substitute_out(&mut self, symbol: Symbol, replacement: &Row) {
        let Some(column) = self.columns.remove(&symbol) else {
            return;
        };
        for subject in column {
            if let Some(row) = self.rows.get_mut(&subject) {
                row.substitute_out(symbol, replacement, &mut column_tracker(&mut self.columns, subject));
            }
        }
    }

    /// Make `entering` basic in the row currently solved for `leaving`.
    pub(crate) fn pivot(&mut self, entering: Symbol, leaving: Symbol) {
        if let Some(mut row) = self.remove_row(leaving) {
            row.change_subject(leaving, entering);
            self.substitute_out(entering, &row);
            self.add_row(entering, row);
        }
    }

    /// Add `coefficient * symbol` into the row of `subject`.
    pub(crate) fn add_variable_to(&mut self, subject: Symbol, symbol: Symbol, coefficient: f64) {
        if let Some(row) = self.rows.get_mut(&subject) {
            row.add_variable_tracked(symbol, coefficient, &mut column_tracker(&mut self.columns, subject));
        }
    }

    /// Add `coefficient * expression` into the row of `subject`.
    pub(crate) fn add_expression_to(&mut self, subject: Symbol, expression: &Row, coefficient: f64) {
        if let Some(row) = self.rows.get_mut(&subject) {
            row.add_expression_tracked(expression, coefficient, &mut column_tracker(&mut self.columns, subject));
        }
    }

    /// Check that `columns` is exactly the transpose of `rows`.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (&subject, row) in &self.rows {
            for symbol in row.symbols() {
                assert!(
                    self.columns.get(&symbol).is_some_and(|c| c.contains(&subject)),
                    "{:?} in row {:?} missing from column index",
                    symbol,
                    subject
                );
            }
        }
        for (&symbol, column) in &self.columns {
            for &subject in column {
                assert!(
                    self.rows.get(&subject).is_some_and(|r| r.coefficient(symbol) != 0.0),
                    "column {:?} lists {:?} but its row does not mention it",
                    symbol,
                    subject
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{SymbolKind, SymbolTable};

    #[test]
    fn test_substitution_keeps_columns_in_step() {
        let mut table = SymbolTable::default();
        let x = table.make(SymbolKind::External);
        let y = table.make(SymbolKind::External);
        let s = table.make(SymbolKind::Slack);
        let mut tableau = Tableau::default();

        // x = 1 + s
        let mut row_x = Row::new(1.0);
        row_x.add_variable(s, 1.0);
        tableau.add_row(x, row_x);
        // y = 2 + s
        let mut row_y = Row::new(2.0);
        row_y.add_variable(s, 1.0);
        tableau.add_row(y, row_y);
        tableau.assert_consistent();

        // s = x - 1
        tableau.pivot(s, x);
        tableau.assert_consistent();
        assert!(tableau.is_basic(s));
        assert!(!tableau.is_basic(x));
        assert_eq!(tableau.row(s).unwrap().constant(), -1.0);
        assert_eq!(tableau.row(y).unwrap().constant(), 1.0);
        assert_eq!(tableau.column(x).count(), 2);
    }

    #[test]
    fn test_remove_column_and_row() {
        let mut table = SymbolTable::default();
        let x = table.make(SymbolKind::External);
        let s = table.make(SymbolKind::Slack);
        let mut tableau = Tableau::default();
        let mut row = Row::new(4.0);
        row.add_variable(s, 2.0);
        tableau.add_row(x, row);

        tableau.remove_column(s);
        assert!(!tableau.is_referenced(s));
        assert!(tableau.row(x).unwrap().is_constant());

        assert!(tableau.remove_row(x).is_some());
        assert!(tableau.remove_row(x).is_none());
        tableau.assert_consistent();
    }
}
