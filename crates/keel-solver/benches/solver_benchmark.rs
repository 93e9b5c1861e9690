//! Solver benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keel_core::{Attribute, ConstraintVariable, EntityId, Priority, Relation};
use keel_solver::{Equation, Solver, Term};

const CHAIN_LENGTH: u64 = 200;

fn left(entity: u64) -> ConstraintVariable {
    ConstraintVariable::new(EntityId(entity), Attribute::Left)
}

/// `left(i) == left(i - 1) + 8` for every link, with a preferred pull on each.
fn chain_equations() -> Vec<Equation> {
    let mut equations = vec![Equation::pin(left(0), 0.0)];
    for i in 1..CHAIN_LENGTH {
        equations.push(Equation::new(
            [Term::new(1.0, left(i)), Term::new(-1.0, left(i - 1))],
            Relation::GreaterOrEqual,
            8.0,
            Priority::Required,
        ));
        equations.push(Equation::new(
            [Term::new(1.0, left(i))],
            Relation::Equal,
            0.0,
            Priority::LOW,
        ));
    }
    equations
}

fn add_chain(c: &mut Criterion) {
    let equations = chain_equations();
    c.bench_function("add_chain", |b| {
        b.iter(|| {
            let mut solver = Solver::default();
            for equation in &equations {
                let _ = solver.add_equation(black_box(equation));
            }
            solver.value(left(CHAIN_LENGTH - 1))
        })
    });
}

fn edit_chain(c: &mut Criterion) {
    let mut solver = Solver::default();
    for equation in &chain_equations() {
        let _ = solver.add_equation(equation);
    }
    let pull = Equation::new(
        [Term::new(1.0, left(CHAIN_LENGTH / 2))],
        Relation::Equal,
        5_000.0,
        Priority::HIGH,
    );
    c.bench_function("edit_chain", |b| {
        b.iter(|| {
            if let Ok(key) = solver.add_equation(black_box(&pull)) {
                let _ = solver.remove_equation(key);
            }
        })
    });
}

criterion_group!(benches, add_chain, edit_chain);
criterion_main!(benches);
