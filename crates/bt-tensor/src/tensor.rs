//! The block tensor engine.
//!
//! Lock order, outermost first:
//!
//! 1. `mutation_gate`: shared by every mutation, exclusive for
//!    [`BlockTensor::verify`] and [`BlockTensor::snapshot`]. Reads never take it.
//! 2. The target cell. Held only while the block is overwritten. The
//!    timestamp is read from the clock before the cell is locked, so a clock
//!    outage stalls the mutation but never a read of the cell.
//! 3. The `dim_count` lines through the cell, ascending by axis.
//! 4. Each axis summary, one at a time, after the line locks are released.
//!
//! Mutations whose coordinates share no line run in parallel; mutations on a
//! shared line serialize on that line's lock.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use bt_clock::TimeSource;
use bt_space::{Grid, PlacementPolicy};
use bt_types::{Coordinate, Digest};
use tracing::{debug, info};

use crate::block::{check_payload, Block};
use crate::config::TensorConfig;
use crate::error::{TensorError, TensorResult};
use crate::ledger::LineDigestLedger;
use crate::snapshot::TensorSnapshot;
use crate::validation::{IntegrityReport, TensorValidator};

/// Tamper-evident block store over a `width^dim_count` grid.
///
/// Block numbers are claimed in order (`add`, or `set` on `size()`), mapped
/// to cells by a [`PlacementPolicy`], and every mutation refreshes exactly
/// the `dim_count` line digests through the mutated cell plus the axis
/// summaries. Erasure is a write of the empty payload.
pub struct BlockTensor {
    placement: PlacementPolicy,
    cells: Grid<RwLock<Block>>,
    ledger: LineDigestLedger,
    size: AtomicUsize,
    max_payload_bytes: usize,
    clock: Box<dyn TimeSource>,
    mutation_gate: RwLock<()>,
}

impl BlockTensor {
    /// Create a tensor with the default payload ceiling.
    ///
    /// Fails with [`TensorError::InvalidShape`] before allocating anything if
    /// `dim_count < 2` or `width < 1`.
    pub fn new(
        dim_count: usize,
        width: usize,
        clock: impl TimeSource + 'static,
    ) -> TensorResult<Self> {
        Self::with_config(&TensorConfig::new(dim_count, width), clock)
    }

    /// Create a tensor from a validated configuration.
    ///
    /// Every cell starts as an empty block stamped with the creation time.
    pub fn with_config(
        config: &TensorConfig,
        clock: impl TimeSource + 'static,
    ) -> TensorResult<Self> {
        let space = config.validate()?;
        let placement = PlacementPolicy::for_space(space);
        let created_ms = clock.now_ms();
        let cells = Grid::from_fn(space, |_| RwLock::new(Block::empty(created_ms)));
        let ledger = LineDigestLedger::build(space, &cells);

        info!(
            dim_count = space.dim_count(),
            width = space.width(),
            capacity = space.capacity(),
            created_ms,
            "block tensor created"
        );

        Ok(Self {
            placement,
            cells,
            ledger,
            size: AtomicUsize::new(0),
            max_payload_bytes: config.max_payload_bytes,
            clock: Box::new(clock),
            mutation_gate: RwLock::new(()),
        })
    }

    /// Rebuild a tensor from a snapshot without recomputing any digest.
    ///
    /// Only the shape, array lengths, `size` and payload sizes are checked;
    /// a snapshot whose digests were altered restores fine and is caught by
    /// [`check_integrity`](Self::check_integrity).
    pub fn restore(
        snapshot: TensorSnapshot,
        clock: impl TimeSource + 'static,
    ) -> TensorResult<Self> {
        let config = snapshot.config();
        let space = config.validate()?;
        let capacity = space.capacity();
        let size = snapshot.size;

        if snapshot.blocks.len() != capacity {
            return Err(TensorError::SnapshotMismatch(format!(
                "expected {capacity} blocks, found {}",
                snapshot.blocks.len()
            )));
        }
        if size > capacity {
            return Err(TensorError::SnapshotMismatch(format!(
                "size {size} exceeds capacity {capacity}"
            )));
        }
        for block in &snapshot.blocks {
            check_payload(block.payload().len(), config.max_payload_bytes)?;
        }

        let placement = PlacementPolicy::for_space(space);
        let mut slots: Vec<Option<RwLock<Block>>> = (0..capacity).map(|_| None).collect();
        for (number, block) in snapshot.blocks.into_iter().enumerate() {
            slots[placement.linear_of(number)?] = Some(RwLock::new(block));
        }
        let cells = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .and_then(|cells| Grid::from_cells(space, cells))
            .ok_or_else(|| TensorError::SnapshotMismatch("blocks do not cover every cell".into()))?;

        let ledger =
            LineDigestLedger::from_parts(space, snapshot.line_digests, snapshot.axis_summaries)
                .ok_or_else(|| {
                    TensorError::SnapshotMismatch(format!(
                        "expected {} axes of {} line digests and {} summaries",
                        space.dim_count(),
                        space.lines_per_axis(),
                        space.dim_count()
                    ))
                })?;

        info!(
            dim_count = space.dim_count(),
            width = space.width(),
            capacity,
            size,
            "block tensor restored"
        );

        Ok(Self {
            placement,
            cells,
            ledger,
            size: AtomicUsize::new(size),
            max_payload_bytes: config.max_payload_bytes,
            clock: Box::new(clock),
            mutation_gate: RwLock::new(()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.placement.capacity()
    }

    /// Number of block numbers claimed so far. Erasure does not lower it.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn dim_count(&self) -> usize {
        self.placement.space().dim_count()
    }

    pub fn width(&self) -> usize {
        self.placement.space().width()
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    pub fn placement(&self) -> &PlacementPolicy {
        &self.placement
    }

    /// Payload of block `number`; empty if never written or erased.
    pub fn get(&self, number: usize) -> TensorResult<Vec<u8>> {
        Ok(self.read_block(number)?.payload().to_vec())
    }

    pub fn timestamp(&self, number: usize) -> TensorResult<u64> {
        Ok(self.read_block(number)?.timestamp_ms())
    }

    /// Stored digest of block `number`.
    pub fn block_digest(&self, number: usize) -> TensorResult<Digest> {
        Ok(self.read_block(number)?.digest())
    }

    pub fn coordinate_of(&self, number: usize) -> TensorResult<&Coordinate> {
        Ok(self.placement.coordinate_of(number)?)
    }

    pub fn block_number_of(&self, coordinate: &Coordinate) -> TensorResult<usize> {
        Ok(self.placement.number_of(coordinate)?)
    }

    /// Write `payload` to block `number`, returning the previous payload.
    ///
    /// `number == size()` claims the next number; `number < size()` rewrites.
    /// Anything else is [`TensorError::OutOfRange`], as is a payload above
    /// the ceiling ([`TensorError::PayloadTooLarge`]). Rejections change
    /// nothing.
    pub fn set(&self, number: usize, payload: impl Into<Vec<u8>>) -> TensorResult<Vec<u8>> {
        let payload = payload.into();
        check_payload(payload.len(), self.max_payload_bytes)?;
        let _gate = self.mutation_gate.read().expect("mutation gate poisoned");

        let (coordinate, cell) = self.cell(number)?;
        let claimed = self.claim(number)?;
        self.write(number, coordinate, cell, payload, claimed)
    }

    /// Write `payload` to the next unclaimed number and return that number.
    pub fn add(&self, payload: impl Into<Vec<u8>>) -> TensorResult<usize> {
        let payload = payload.into();
        check_payload(payload.len(), self.max_payload_bytes)?;
        let _gate = self.mutation_gate.read().expect("mutation gate poisoned");

        let capacity = self.capacity();
        let number = self
            .size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                (size < capacity).then_some(size + 1)
            })
            .map_err(|size| TensorError::OutOfRange {
                what: "block number",
                value: size,
                bound: capacity,
            })?;
        let (coordinate, cell) = self.cell(number)?;
        self.write(number, coordinate, cell, payload, true)?;
        Ok(number)
    }

    /// Overwrite block `number` with the empty payload, returning what it
    /// held. Erasing an empty block leaves it untouched, so erasing twice
    /// stores the same state as erasing once.
    pub fn erase(&self, number: usize) -> TensorResult<Vec<u8>> {
        self.set(number, Vec::new())
    }

    /// Stored digest of the line along `axis` with the given fixed
    /// coordinates.
    pub fn line_digest(&self, axis: usize, fixed: &Coordinate) -> TensorResult<Digest> {
        Ok(self.ledger.digest_of(axis, fixed)?)
    }

    /// Stored digests of every line of `axis`, in lexicographic order of the
    /// fixed coordinates.
    pub fn line_digests(&self, axis: usize) -> TensorResult<Vec<Digest>> {
        Ok(self.ledger.line_digests(axis)?)
    }

    /// Stored summary of `axis`. May trail [`line_digests`](Self::line_digests)
    /// while a mutation is in flight; consistent once mutations stop.
    pub fn axis_summary(&self, axis: usize) -> TensorResult<Digest> {
        Ok(self.ledger.axis_summary(axis)?)
    }

    pub fn axis_summaries(&self) -> Vec<Digest> {
        self.ledger.summaries()
    }

    /// Recompute every block, line, and summary digest and compare with the
    /// stored values.
    ///
    /// Holds off mutations for the duration; reads continue. Costs
    /// `O(capacity * dim_count)` hashes.
    pub fn verify(&self) -> IntegrityReport {
        let _gate = self.mutation_gate.write().expect("mutation gate poisoned");
        TensorValidator {
            placement: &self.placement,
            cells: &self.cells,
            ledger: &self.ledger,
        }
        .validate(self.size())
    }

    /// `true` only if nothing was altered outside the mutation path.
    pub fn check_integrity(&self) -> bool {
        self.verify().is_valid()
    }

    /// Capture the full state for an external store.
    ///
    /// Holds off mutations while copying, like [`verify`](Self::verify).
    pub fn snapshot(&self) -> TensorSnapshot {
        let _gate = self.mutation_gate.write().expect("mutation gate poisoned");
        let blocks = self
            .placement
            .iter()
            .map(|coordinate| {
                self.cells
                    .at(coordinate)
                    .expect("placement within grid")
                    .read()
                    .expect("block lock poisoned")
                    .clone()
            })
            .collect();

        TensorSnapshot {
            dim_count: self.dim_count(),
            width: self.width(),
            max_payload_bytes: self.max_payload_bytes,
            size: self.size(),
            blocks,
            line_digests: self.ledger.all_line_digests(),
            axis_summaries: self.ledger.summaries(),
        }
    }

    fn cell(&self, number: usize) -> TensorResult<(&Coordinate, &RwLock<Block>)> {
        let coordinate = self.placement.coordinate_of(number)?;
        Ok((coordinate, self.cells.at(coordinate)?))
    }

    fn read_block(&self, number: usize) -> TensorResult<RwLockReadGuard<'_, Block>> {
        let (_, cell) = self.cell(number)?;
        Ok(cell.read().expect("block lock poisoned"))
    }

    /// Claim `number` if it is the next one; `Ok(false)` for a rewrite.
    fn claim(&self, number: usize) -> TensorResult<bool> {
        match self.size.compare_exchange(
            number,
            number + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(true),
            Err(size) if number < size => Ok(false),
            Err(size) => Err(TensorError::OutOfRange {
                what: "block number",
                value: number,
                bound: size + 1,
            }),
        }
    }

    fn write(
        &self,
        number: usize,
        coordinate: &Coordinate,
        cell: &RwLock<Block>,
        payload: Vec<u8>,
        claimed: bool,
    ) -> TensorResult<Vec<u8>> {
        let already_empty = |block: &Block| {
            let skip = payload.is_empty() && block.is_empty();
            if skip {
                debug!(block_number = number, coordinate = %coordinate, claimed, "block already empty");
            }
            skip
        };
        if already_empty(&*cell.read().expect("block lock poisoned")) {
            return Ok(Vec::new());
        }

        // Stamped before the cell is locked, so readers of this block never
        // wait on the clock.
        let timestamp_ms = self.clock.now_ms();
        let previous = {
            let mut block = cell.write().expect("block lock poisoned");
            if already_empty(&*block) {
                return Ok(Vec::new());
            }
            block.overwrite(timestamp_ms, payload)
        };

        let lines = self.ledger.recompute_through(coordinate, &self.cells)?;
        debug!(
            block_number = number,
            coordinate = %coordinate,
            claimed,
            lines = lines.len(),
            "block written"
        );
        Ok(previous)
    }
}

impl fmt::Debug for BlockTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockTensor")
            .field("dim_count", &self.dim_count())
            .field("width", &self.width())
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .field("max_payload_bytes", &self.max_payload_bytes)
            .finish()
    }
}
