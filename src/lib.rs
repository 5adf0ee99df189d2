//! # hhmm-core
//!
//! Continuous recognition over a hierarchy of sequence models.
//!
//! ---
//!
//! ## Recognition without segmentation
//!
//! Each class (a gesture, a motion, a phrase) is a trained HMM. The
//! hierarchy glues them into one larger model: mass that leaves a class
//! through an exit state either hands off to a sibling class (soft exit) or
//! ends the current segment and restarts from the class prior (hard exit).
//!
//! A single forward pass over that structure, one frame at a time, tells you
//! at every moment which class is most likely, how far through it the input
//! is, and whether it is about to finish. There is no backward pass and no
//! fixed sequence length.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! frame → FrontierEngine → HierarchyResults → likeliest / likelihoods / output
//!              ↑                  ↑
//!     ClassModel per label   RegressionEstimator (bimodal)
//!              ↑
//!    Prior · Transition · Exit transition   (TransitionTables ⇄ PortableTables)
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`model`] | [`ClassModel`], [`Topology`], [`Label`] | Interface every class model implements |
//! | [`gaussian`] | [`GaussianHmm`], [`GaussianState`] | Reference class model with diagonal Gaussian emissions |
//! | [`tables`] | [`TransitionTables`] | Prior, transition and exit-transition tables |
//! | [`hierarchy`] | [`Hierarchy`] | Class registry, lifecycle and `filter` |
//! | [`frontier`] | [`FrontierEngine`], [`ForwardState`] | Partitioned forward recursion across classes |
//! | [`results`] | [`HierarchyResults`] | Normalized likelihoods, likeliest class, regression blending |
//! | [`portable`] | [`portable::PortableTables`] | Serializable tables and full snapshots (requires `serde` feature) |
//! | [`ring`] | [`ring::RingBuffer`] | Fixed-capacity window used for likelihood smoothing |
//! | [`config`] | [`HierarchyConfig`], [`GaussianHmmConfig`] | Runtime configuration |
//! | [`error`] | [`HierarchyError`] | Error taxonomy |
//!
//! ## Features
//!
//! `serde` (default) enables the [`portable`] module and serde derives on the
//! configuration and model types. `python-ffi` builds the PyO3 extension.
//!
//! ## License
//!
//! Business Source License 1.1. Free for evaluation and non-production use.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod frontier;
pub mod gaussian;
pub mod hierarchy;
pub mod model;
pub mod results;
pub mod ring;
pub mod tables;
#[cfg(feature = "serde")]
pub mod portable;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use config::{ClassRegressionEstimator, GaussianHmmConfig, HierarchyConfig, RegressionEstimator};
pub use error::{HierarchyError, Result};
pub use frontier::{ExitSelector, FilterPhase, ForwardState, FrontierEngine};
pub use gaussian::{GaussianHmm, GaussianState};
pub use hierarchy::Hierarchy;
pub use model::{ClassModel, Label, Regression, Topology};
pub use results::{ClassResults, HierarchyResults};
pub use tables::TransitionTables;
