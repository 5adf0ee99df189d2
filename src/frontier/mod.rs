/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Hierarchical forward filtering over composable class models.
//!
//! The frontier algorithm extends the single-model forward recursion to a
//! set of class models joined by inter-class transitions. At every frame,
//! mass that exited a class on the previous frame (its *frontier*) is
//! redistributed into the entry states of every class:
//!
//! - soft-exit mass follows the hierarchy transition table,
//! - hard-exit mass restarts recognition according to the class prior.
//!
//! Within a class, mass follows the model's own topology. Fully connected
//! and strictly ordered classes use distinct recursions (see `topology`).

pub mod engine;
pub mod forward;
mod topology;

pub use engine::{FilterPhase, FrontierEngine};
pub use forward::{ExitSelector, ForwardState};
