//! Correspondences from an explicit mother/daughter table.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::CorrespondenceSource;
use crate::error::{LineageError, Result};
use crate::tracker::{Frame, LocalLabel};

/// One link exported by an external tracker: `child` of `frame + 1`
/// descends from `mother` of `frame`. A mother of 0 marks a birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub frame: Frame,
    pub mother: LocalLabel,
    pub child: LocalLabel,
}

/// Correspondence source backed by a mother → children map.
#[derive(Debug, Clone, Default)]
pub struct TableCorrespondence {
    children: HashMap<(Frame, LocalLabel), Vec<LocalLabel>>,
}

impl TableCorrespondence {
    /// Group transitions by mother.
    ///
    /// A mother may be listed at most twice: a third record is
    /// [`LineageError::TooManyDaughters`] even when it repeats an earlier
    /// link. Within those two records an exact repeat collapses, so the
    /// mother keeps a single daughter. Records with a mother or child of 0
    /// are births and are skipped.
    pub fn from_transitions(transitions: impl IntoIterator<Item = Transition>) -> Result<Self> {
        let mut grouped: HashMap<(Frame, LocalLabel), (usize, BTreeSet<LocalLabel>)> =
            HashMap::new();
        for t in transitions {
            if t.mother == 0 || t.child == 0 {
                continue;
            }
            let (listed, set) = grouped.entry((t.frame, t.mother)).or_default();
            *listed += 1;
            set.insert(t.child);
        }

        let mut children = HashMap::with_capacity(grouped.len());
        for ((frame, mother), (listed, set)) in grouped {
            if listed > 2 {
                return Err(LineageError::TooManyDaughters {
                    frame,
                    mother,
                    count: listed,
                });
            }
            children.insert((frame, mother), set.into_iter().collect());
        }
        Ok(Self { children })
    }

    /// Number of mothers with at least one child.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl CorrespondenceSource for TableCorrespondence {
    fn daughters(&self, frame: Frame, label: LocalLabel) -> Result<Vec<LocalLabel>> {
        Ok(self
            .children
            .get(&(frame, label))
            .cloned()
            .unwrap_or_default())
    }
}
