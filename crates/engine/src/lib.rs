//! symex-engine: the symbolic memory, constraint, state-space, and search
//! core of the symbolic execution engine.
//!
//! Built on `symex_expr`'s hash-consed DAG, this crate owns everything
//! that consumes expressions to run a symbolic machine:
//!
//! - `memory`: the symbolic memory object model (C3) - `MemoryObject`,
//!   `ObjectState`'s concrete/symbolic/unflushed byte caches, lazy
//!   update-list materialization.
//! - `constraints`: the path's constraint store (C4) - ordered insertion,
//!   symcretes, the independence partition, copy-on-write.
//! - `simplificator`: the equality-rewriting constraint simplifier (C5).
//! - `path`: `Path`/`PathConstraints` (C6), block-indexed and ordered.
//! - `solver`: the layered solver chain (C7) - `SolverImpl`, its four
//!   wrappers, and `DummySolver`.
//! - `state`: `ExecutionState` (C8) - stack, address space, targets,
//!   history, copy-on-fork.
//! - `forest`: the `ProcessForest` (C9) binary tree with per-searcher
//!   ownership bits.
//! - `distance`: CFG/call-graph distance and reachability (C10).
//! - `searcher`: the full searcher family (C11).
//! - `pob`: the bidirectional engine (C12) - proof obligations,
//!   propagations, targeted conflicts.
//! - `manager`: the `ObjectManager` event bus (C13).
//! - `scheduler`: the single-threaded cooperative loop (§5) tying the
//!   above together.
//!
//! `ir`, `annotation`, `sarif`, and `config` define only the boundary
//! types/traits the excluded LLVM-IR front-end, annotation parser, SARIF
//! reporter, and CLI driver populate or implement (§6); this crate never
//! loads LLVM bitcode, parses JSON, or shells out to an SMT binary.

pub mod annotation;
pub mod config;
pub mod constraints;
pub mod distance;
pub mod error;
pub mod forest;
pub mod ir;
pub mod manager;
pub mod memory;
pub mod path;
pub mod pob;
pub mod sarif;
pub mod scheduler;
pub mod searcher;
pub mod simplificator;
pub mod solver;
pub mod state;
pub mod target;

pub use config::EngineConfig;
pub use error::EngineError;
pub use forest::{ProcessForest, StateId};
pub use manager::{Event, ObjectManager, Subscriber};
pub use pob::{BidirectionalEngine, ProofObligation, Propagation, TargetedConflict};
pub use scheduler::{Scheduler, StepOutcome};
pub use state::ExecutionState;
