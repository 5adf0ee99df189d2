/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Portable form of a hierarchy's inter-class tables, and the full snapshot
//! document that also carries every class model.
//!
//! # Logical schema
//!
//! ```text
//! prior            [ { label, probability } ]                 one per class
//! transition       [ { srcLabel, dstLabel, probability } ]    one per ordered pair
//! exit_transition  [ { label, probability } ]                 one per class
//! ```
//!
//! Records are emitted in label order. A load is all-or-nothing: every
//! label must name an existing class and every table must hold exactly one
//! record per class (or class pair), otherwise the hierarchy is left as it
//! was.
//!
//! # Example
//!
//! ```rust,ignore
//! let json = serde_json::to_string(&hierarchy.to_portable())?;
//! let tables: PortableTables<String> = serde_json::from_str(&json)?;
//! other.load_portable(&tables)?;
//! ```

use std::collections::BTreeMap;

use hashbrown::HashSet;
use tracing::warn;

use crate::config::HierarchyConfig;
use crate::error::{HierarchyError, Result};
use crate::hierarchy::Hierarchy;
use crate::model::{ClassModel, Label};
use crate::tables::TransitionTables;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Probability attached to one class.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct LabelRecord<L> {
    /// Class label.
    pub label: L,
    /// Probability.
    pub probability: f64,
}

/// Transition weight between two classes.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct TransitionRecord<L> {
    /// Source class.
    #[serde(rename = "srcLabel")]
    pub source: L,
    /// Destination class.
    #[serde(rename = "dstLabel")]
    pub destination: L,
    /// Transition weight.
    pub probability: f64,
}

/// The three inter-class tables as flat record lists.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct PortableTables<L> {
    /// Class prior.
    pub prior: Vec<LabelRecord<L>>,
    /// Dense transition table.
    pub transition: Vec<TransitionRecord<L>>,
    /// Exit transition per class.
    pub exit_transition: Vec<LabelRecord<L>>,
}

/// One class of a [`HierarchySnapshot`].
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct ClassRecord<L, M> {
    /// Class label.
    pub label: L,
    /// Serialized class model.
    pub model: M,
}

/// Complete hierarchy document: configuration, models and tables.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct HierarchySnapshot<L, M> {
    /// Format version, [`SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Hierarchy configuration.
    pub config: HierarchyConfig,
    /// Every class in label order.
    pub classes: Vec<ClassRecord<L, M>>,
    /// Inter-class tables.
    #[serde(flatten)]
    pub tables: PortableTables<L>,
}

impl<M: ClassModel, L: Label> Hierarchy<M, L> {
    /// Export the inter-class tables in label order.
    pub fn to_portable(&self) -> PortableTables<L> {
        let tables = self.tables();
        let labels: Vec<&L> = self.labels().collect();
        let record = |label: &L, probability: f64| LabelRecord {
            label: label.clone(),
            probability,
        };
        let mut transition = Vec::with_capacity(labels.len() * labels.len());
        for &src in &labels {
            for &dst in &labels {
                transition.push(TransitionRecord {
                    source: src.clone(),
                    destination: dst.clone(),
                    probability: tables.transition(src, dst),
                });
            }
        }
        PortableTables {
            prior: labels.iter().map(|&l| record(l, tables.prior(l))).collect(),
            transition,
            exit_transition: labels.iter().map(|&l| record(l, tables.exit_transition(l))).collect(),
        }
    }

    /// Replace the inter-class tables with `portable`.
    ///
    /// Fails with [`HierarchyError::UnknownLabel`] or
    /// [`HierarchyError::CardinalityMismatch`] and leaves the current tables
    /// untouched when `portable` does not fit the classes.
    pub fn load_portable(&mut self, portable: &PortableTables<L>) -> Result<()> {
        match self.validate(portable) {
            Ok(tables) => {
                self.install_tables(tables);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "portable tables rejected");
                Err(e)
            }
        }
    }

    fn validate(&self, portable: &PortableTables<L>) -> Result<TransitionTables<L>> {
        let known = |label: &L| {
            if self.contains(label) {
                Ok(())
            } else {
                Err(HierarchyError::UnknownLabel(label.to_string()))
            }
        };
        for r in portable.prior.iter().chain(&portable.exit_transition) {
            known(&r.label)?;
        }
        for r in &portable.transition {
            known(&r.source)?;
            known(&r.destination)?;
        }

        let n = self.len();
        let prior: HashSet<&L> = portable.prior.iter().map(|r| &r.label).collect();
        let transition: HashSet<(&L, &L)> = portable
            .transition
            .iter()
            .map(|r| (&r.source, &r.destination))
            .collect();
        let exit: HashSet<&L> = portable.exit_transition.iter().map(|r| &r.label).collect();
        for (table, expected, records, distinct) in [
            ("prior", n, portable.prior.len(), prior.len()),
            ("transition", n * n, portable.transition.len(), transition.len()),
            ("exit_transition", n, portable.exit_transition.len(), exit.len()),
        ] {
            // duplicates show up as fewer distinct keys than records
            let found = if records != expected { records } else { distinct };
            if found != expected {
                return Err(HierarchyError::CardinalityMismatch { table, expected, found });
            }
        }

        let mut tables = TransitionTables::new();
        for r in &portable.prior {
            tables.set_prior(r.label.clone(), r.probability);
        }
        for r in &portable.transition {
            tables.set_transition(r.source.clone(), r.destination.clone(), r.probability);
        }
        for r in &portable.exit_transition {
            tables.set_exit_transition(r.label.clone(), r.probability);
        }
        Ok(tables)
    }
}

impl<M: ClassModel + Clone, L: Label> Hierarchy<M, L> {
    /// Capture configuration, models and tables.
    pub fn to_snapshot(&self) -> HierarchySnapshot<L, M> {
        HierarchySnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config().clone(),
            classes: self
                .classes()
                .map(|(label, model)| ClassRecord {
                    label: label.clone(),
                    model: model.clone(),
                })
                .collect(),
            tables: self.to_portable(),
        }
    }

    /// Rebuild a hierarchy: models first, then the tables.
    ///
    /// Model exit points are kept as serialized. Each model is checked with
    /// [`ClassModel::validate`] first; parameter and table errors propagate.
    pub fn from_snapshot(snapshot: HierarchySnapshot<L, M>) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(HierarchyError::InvalidParameter(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let mut classes = BTreeMap::new();
        for ClassRecord { label, model } in snapshot.classes {
            if classes.contains_key(&label) {
                return Err(HierarchyError::DuplicateLabel(label.to_string()));
            }
            if let Err(e) = model.validate() {
                warn!(label = %label, error = %e, "snapshot class rejected");
                return Err(e);
            }
            classes.insert(label, model);
        }
        let mut hierarchy = Self::from_classes(snapshot.config, classes);
        hierarchy.load_portable(&snapshot.tables)?;
        Ok(hierarchy)
    }
}
