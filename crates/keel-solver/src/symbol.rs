//! Tableau symbols.

/// What a symbol stands for in the tableau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SymbolKind {
    /// An external variable (the actual unknowns we're solving for)
    External,
    /// A slack or error variable (inequalities and preferred constraints)
    Slack,
    /// A dummy variable (marker for required equalities, pinned at zero)
    Dummy,
    /// An objective row key
    Objective,
}

/// An unknown in the tableau.
///
/// Ids are unique per solver, so two symbols are equal only if they are the
/// same symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Symbol {
    id: u64,
    kind: SymbolKind,
}

impl Symbol {
    pub(crate) fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub(crate) fn is_external(&self) -> bool {
        self.kind == SymbolKind::External
    }

    pub(crate) fn is_slack(&self) -> bool {
        self.kind == SymbolKind::Slack
    }

    pub(crate) fn is_dummy(&self) -> bool {
        self.kind == SymbolKind::Dummy
    }

    /// Restricted symbols must never take a negative value.
    pub(crate) fn is_restricted(&self) -> bool {
        matches!(self.kind, SymbolKind::Slack | SymbolKind::Dummy)
    }
}

/// Mints symbols for one solver.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    next: u64,
}

impl SymbolTable {
    pub(crate) fn make(&mut self, kind: SymbolKind) -> Symbol {
        let id = self.next;
        self.next += 1;
        Symbol { id, kind }
    }
}
