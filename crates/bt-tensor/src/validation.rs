use std::fmt;
use std::sync::RwLock;

use bt_space::{Grid, PlacementPolicy};
use bt_types::Coordinate;
use tracing::warn;

use crate::block::Block;
use crate::ledger::{summarize, LineDigestLedger};

/// Result of a full integrity pass over one tensor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityReport {
    pub dim_count: usize,
    pub width: usize,
    pub size: usize,
    pub blocks_checked: usize,
    pub lines_checked: usize,
    pub blocks_valid: bool,
    pub lines_valid: bool,
    pub summaries_valid: bool,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    /// Returns `true` if every comparison matched.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// One stored digest that disagrees with its recomputed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub description: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    BlockDigestMismatch { block_number: usize },
    LineDigestMismatch { axis: usize, fixed: Coordinate },
    AxisSummaryMismatch { axis: usize },
}

/// Recompute every digest of a tensor and compare against what is stored.
///
/// The caller must hold off mutations for the duration so the pass sees one
/// consistent state.
pub(crate) struct TensorValidator<'a> {
    pub placement: &'a PlacementPolicy,
    pub cells: &'a Grid<RwLock<Block>>,
    pub ledger: &'a LineDigestLedger,
}

impl TensorValidator<'_> {
    pub fn validate(&self, size: usize) -> IntegrityReport {
        let space = self.placement.space();
        let mut violations = Vec::new();
        let mut blocks_valid = true;
        let mut lines_valid = true;
        let mut summaries_valid = true;

        // Unwritten cells are checked too: their empty blocks carry real digests.
        for (block_number, coordinate) in self.placement.iter().enumerate() {
            let cell = self.cells.at(coordinate).expect("placement within grid");
            let block = cell.read().expect("block lock poisoned");
            if !block.is_intact() {
                blocks_valid = false;
                violations.push(Violation {
                    kind: ViolationKind::BlockDigestMismatch { block_number },
                    description: format!(
                        "block {block_number} at {coordinate} does not match its digest"
                    ),
                });
            }
        }

        let mut lines_checked = 0;
        for axis in 0..space.dim_count() {
            let stored = self.ledger.line_digests(axis).expect("axis within space");
            let mut computed = Vec::with_capacity(stored.len());
            for (line, stored) in space.lines_of_axis(axis).expect("axis within space").zip(stored) {
                let digest = self
                    .ledger
                    .compute_line(axis, &line.fixed, self.cells)
                    .expect("line within space");
                if digest != stored {
                    lines_valid = false;
                    violations.push(Violation {
                        description: format!("line {line} does not match its cells"),
                        kind: ViolationKind::LineDigestMismatch {
                            axis,
                            fixed: line.fixed,
                        },
                    });
                }
                computed.push(digest);
                lines_checked += 1;
            }

            let summary = self.ledger.axis_summary(axis).expect("axis within space");
            if summarize(&computed) != summary {
                summaries_valid = false;
                violations.push(Violation {
                    kind: ViolationKind::AxisSummaryMismatch { axis },
                    description: format!("summary of axis {axis} does not match its lines"),
                });
            }
        }

        for violation in &violations {
            warn!(violation = %violation, "integrity violation");
        }

        IntegrityReport {
            dim_count: space.dim_count(),
            width: space.width(),
            size,
            blocks_checked: space.capacity(),
            lines_checked,
            blocks_valid,
            lines_valid,
            summaries_valid,
            violations,
        }
    }
}
