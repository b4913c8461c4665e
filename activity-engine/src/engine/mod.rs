//! Computation engine
//!
//! Compiles an activity once (formula parsing, dependency ordering) and
//! then computes client records period by period: calculated fields,
//! carry-over into the next period, styles, completeness and the badge.

mod compiled;
mod graph;
mod grid;
mod orchestrator;

pub use compiled::{CompiledSchema, PlannedField, Step};
pub use graph::{CycleError, DependencyGraph};
pub use grid::{Badge, BadgeColor, Cell, CellError, Column, Grid, PeriodRow};
pub use orchestrator::{CarryEvent, Computation, Orchestrator, PeriodRange, recompute};
