//! Dynamic field and periodic carry-over engine
//!
//! Administrators define activities (sets of typed fields, optionally split
//! into periods) at runtime. The engine evaluates calculated fields, carries
//! values from one period into the next and resolves conditional styles,
//! producing a grid ready for display.

pub mod config;
pub mod engine;
pub mod formula;
pub mod rules;
pub mod schema;
pub mod store;

pub use config::EngineConfig;
pub use engine::{Computation, Grid, Orchestrator, PeriodRange, recompute};
pub use schema::{Activity, SchemaCatalog};
pub use store::{ClientRecord, MemoryStore, RecordKey, ValueStore};
