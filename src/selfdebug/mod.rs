//! Solving problems: chain-of-thought, self-edit and the self-debug loop.
//!
//! A [`Solver`] pairs a [`crate::structured::StructuredGenerator`] with a
//! [`crate::execution::CandidateExecutor`]. Every call to
//! [`Solver::solve`] is an independent attempt with its own
//! [`DebugSession`]; nothing is shared between attempts, so callers may run
//! attempts concurrently if the backend and facility allow it.
//!
//! ```ignore
//! use cot_bench::selfdebug::{Solver, Strategy};
//!
//! let solver = Solver::new(generator, executor);
//! let report = solver.solve(Strategy::SelfDebug, &problem, 3).await;
//! if let Some(candidate) = report.candidate {
//!     println!("{} after {} round(s)", report.termination.label(), report.rounds);
//!     println!("{}", candidate.completion());
//! }
//! ```

pub mod session;
pub mod strategies;

pub use session::{DebugSession, SessionReport, Termination};
pub use strategies::{Solver, Strategy};
