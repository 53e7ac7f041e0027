//! Per-line and per-axis digests.
//!
//! For every axis and every choice of the other `dim_count - 1` coordinates
//! the ledger keeps the digest of that line:
//! `H_line(block digest at position 0 ‖ … ‖ block digest at position width-1)`.
//! Each axis also has a summary digest over all of its line digests in
//! lexicographic order of the fixed coordinates.
//!
//! Every line and every summary sits behind its own lock. Lines through one
//! cell are locked in ascending axis order; summaries are refreshed after the
//! line locks are released, one axis at a time. A summary refresh only ever
//! waits on line locks and a line update never waits on a summary lock, so
//! the two phases cannot deadlock against each other.

use std::sync::{RwLock, RwLockWriteGuard};

use bt_crypto::ContentHasher;
use bt_space::{CoordinateSpace, Grid, LineId, SpaceResult};
use bt_types::{Coordinate, Digest};

use crate::block::Block;

/// Read access to the stored digest of each cell, by linear index.
pub trait DigestSource {
    fn digest_at(&self, linear: usize) -> Digest;
}

impl DigestSource for Grid<RwLock<Block>> {
    fn digest_at(&self, linear: usize) -> Digest {
        self.get(linear)
            .expect("linear index within grid")
            .read()
            .expect("block lock poisoned")
            .digest()
    }
}

/// Line and axis-summary digests of one tensor.
pub struct LineDigestLedger {
    space: CoordinateSpace,
    /// `lines[axis][line_index]`.
    lines: Vec<Vec<RwLock<Digest>>>,
    summaries: Vec<RwLock<Digest>>,
}

impl LineDigestLedger {
    /// Compute every line and summary digest from `source`.
    pub fn build(space: CoordinateSpace, source: &impl DigestSource) -> Self {
        let lines: Vec<Vec<RwLock<Digest>>> = (0..space.dim_count())
            .map(|axis| {
                (0..space.lines_per_axis())
                    .map(|index| RwLock::new(Self::line_digest_at(&space, axis, index, source)))
                    .collect()
            })
            .collect();
        let summaries = lines
            .iter()
            .map(|axis_lines| {
                let digests: Vec<Digest> = axis_lines.iter().map(read_digest).collect();
                RwLock::new(summarize(&digests))
            })
            .collect();
        Self {
            space,
            lines,
            summaries,
        }
    }

    /// Reassemble a ledger from stored digests without recomputing anything.
    ///
    /// Returns `None` unless there are `dim_count` axes of
    /// `lines_per_axis` lines each and `dim_count` summaries.
    pub fn from_parts(
        space: CoordinateSpace,
        lines: Vec<Vec<Digest>>,
        summaries: Vec<Digest>,
    ) -> Option<Self> {
        let shape_ok = lines.len() == space.dim_count()
            && summaries.len() == space.dim_count()
            && lines.iter().all(|l| l.len() == space.lines_per_axis());
        if !shape_ok {
            return None;
        }
        Some(Self {
            space,
            lines: lines
                .into_iter()
                .map(|axis| axis.into_iter().map(RwLock::new).collect())
                .collect(),
            summaries: summaries.into_iter().map(RwLock::new).collect(),
        })
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    /// Stored digest of one line.
    pub fn digest_of(&self, axis: usize, fixed: &Coordinate) -> SpaceResult<Digest> {
        let (axis, index) = self.locate(axis, fixed)?;
        Ok(read_digest(&self.lines[axis][index]))
    }

    /// Stored summary digest of one axis.
    ///
    /// Summaries are refreshed after a mutation releases its line locks, so
    /// while a mutation is in flight the summary can trail the lines returned
    /// by [`line_digests`](Self::line_digests). It matches them again as soon
    /// as no mutation is running.
    pub fn axis_summary(&self, axis: usize) -> SpaceResult<Digest> {
        self.space.check_axis(axis)?;
        Ok(read_digest(&self.summaries[axis]))
    }

    /// Stored digests of every line of `axis`, in enumeration order.
    pub fn line_digests(&self, axis: usize) -> SpaceResult<Vec<Digest>> {
        self.space.check_axis(axis)?;
        Ok(self.lines[axis].iter().map(read_digest).collect())
    }

    /// Stored digests of every line, `[axis][line_index]`.
    pub fn all_line_digests(&self) -> Vec<Vec<Digest>> {
        self.lines
            .iter()
            .map(|axis| axis.iter().map(read_digest).collect())
            .collect()
    }

    /// Stored summary digests, one per axis.
    pub fn summaries(&self) -> Vec<Digest> {
        self.summaries.iter().map(read_digest).collect()
    }

    /// Digest a line from `source`, ignoring the stored value.
    pub fn compute_line(
        &self,
        axis: usize,
        fixed: &Coordinate,
        source: &impl DigestSource,
    ) -> SpaceResult<Digest> {
        let (axis, index) = self.locate(axis, fixed)?;
        Ok(Self::line_digest_at(&self.space, axis, index, source))
    }

    /// Recompute and store one line, then its axis summary.
    pub fn recompute(
        &self,
        axis: usize,
        fixed: &Coordinate,
        source: &impl DigestSource,
    ) -> SpaceResult<Digest> {
        let (axis, index) = self.locate(axis, fixed)?;
        let digest = {
            let mut line = write_digest(&self.lines[axis][index]);
            *line = Self::line_digest_at(&self.space, axis, index, source);
            *line
        };
        self.refresh_summary(axis);
        Ok(digest)
    }

    /// Recompute the `dim_count` lines through `coordinate` and then every
    /// axis summary. This is the only ledger work a mutation does.
    ///
    /// All line locks are held together, taken in ascending axis order.
    pub fn recompute_through(
        &self,
        coordinate: &Coordinate,
        source: &impl DigestSource,
    ) -> SpaceResult<Vec<LineId>> {
        let through = self.space.lines_through(coordinate)?;
        let mut located = Vec::with_capacity(through.len());
        for line in &through {
            located.push(self.locate(line.axis, &line.fixed)?);
        }

        {
            let mut guards: Vec<RwLockWriteGuard<'_, Digest>> = located
                .iter()
                .map(|&(axis, index)| write_digest(&self.lines[axis][index]))
                .collect();
            for (guard, &(axis, index)) in guards.iter_mut().zip(&located) {
                **guard = Self::line_digest_at(&self.space, axis, index, source);
            }
        }

        for axis in 0..self.space.dim_count() {
            self.refresh_summary(axis);
        }
        Ok(through)
    }

    /// Recompute every line and summary. Not used on the mutation path.
    pub fn recompute_all(&self, source: &impl DigestSource) {
        for axis in 0..self.space.dim_count() {
            for index in 0..self.space.lines_per_axis() {
                *write_digest(&self.lines[axis][index]) =
                    Self::line_digest_at(&self.space, axis, index, source);
            }
            self.refresh_summary(axis);
        }
    }

    /// Hash the stored line digests of `axis` into its summary.
    fn refresh_summary(&self, axis: usize) {
        let mut summary = write_digest(&self.summaries[axis]);
        let digests: Vec<Digest> = self.lines[axis].iter().map(read_digest).collect();
        *summary = summarize(&digests);
    }

    fn locate(&self, axis: usize, fixed: &Coordinate) -> SpaceResult<(usize, usize)> {
        self.space.check_axis(axis)?;
        Ok((axis, self.space.line_index(fixed)?))
    }

    fn line_digest_at(
        space: &CoordinateSpace,
        axis: usize,
        index: usize,
        source: &impl DigestSource,
    ) -> Digest {
        let fixed = space.fixed_of(index).expect("line index within axis");
        let cells = space.line(axis, &fixed).expect("line within space");
        let digests: Vec<Digest> = cells.into_iter().map(|i| source.digest_at(i)).collect();
        ContentHasher::LINE.hash_digests(&digests)
    }

    #[cfg(test)]
    pub(crate) fn tamper_line(&self, axis: usize, fixed: &Coordinate, digest: Digest) {
        let (axis, index) = self.locate(axis, fixed).expect("valid line");
        *write_digest(&self.lines[axis][index]) = digest;
    }

    #[cfg(test)]
    pub(crate) fn tamper_summary(&self, axis: usize, digest: Digest) {
        *write_digest(&self.summaries[axis]) = digest;
    }
}

/// Summary of one axis computed from the given line digests.
pub fn summarize(line_digests: &[Digest]) -> Digest {
    ContentHasher::AXIS.hash_digests(line_digests)
}

fn read_digest(lock: &RwLock<Digest>) -> Digest {
    *lock.read().expect("digest lock poisoned")
}

fn write_digest(lock: &RwLock<Digest>) -> RwLockWriteGuard<'_, Digest> {
    lock.write().expect("digest lock poisoned")
}

impl std::fmt::Debug for LineDigestLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineDigestLedger")
            .field("dim_count", &self.space.dim_count())
            .field("lines_per_axis", &self.space.lines_per_axis())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl DigestSource for Grid<Block> {
        fn digest_at(&self, linear: usize) -> Digest {
            self.get(linear).map(Block::digest).unwrap()
        }
    }

    fn grid(dim: usize, width: usize) -> Grid<Block> {
        let space = CoordinateSpace::new(dim, width).unwrap();
        Grid::from_fn(space, |i| Block::empty(i as u64))
    }

    fn expected_line(g: &Grid<Block>, axis: usize, fixed: &Coordinate) -> Digest {
        let digests: Vec<Digest> = g.line(axis, fixed).unwrap().map(Block::digest).collect();
        ContentHasher::LINE.hash_digests(&digests)
    }

    #[test]
    fn build_matches_definition() {
        let g = grid(3, 3);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        for axis in 0..3 {
            let mut lines = Vec::new();
            for line in g.space().lines_of_axis(axis).unwrap() {
                let stored = ledger.digest_of(axis, &line.fixed).unwrap();
                assert_eq!(stored, expected_line(&g, axis, &line.fixed));
                lines.push(stored);
            }
            assert_eq!(ledger.line_digests(axis).unwrap(), lines);
            assert_eq!(ledger.axis_summary(axis).unwrap(), summarize(&lines));
        }
    }

    #[test]
    fn recompute_updates_line_and_summary_only() {
        let mut g = grid(2, 3);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        let summary_before = ledger.summaries();
        let other_axis_before = ledger.line_digests(1).unwrap();

        // Cell (1, 2) lies on axis-0 line fixed (2).
        let linear = g.space().linear_of(&Coordinate::from([1, 2])).unwrap();
        g.get_mut(linear).unwrap().overwrite(99, b"x".to_vec());
        let fixed = Coordinate::from([2]);
        let digest = ledger.recompute(0, &fixed, &g).unwrap();

        assert_eq!(digest, expected_line(&g, 0, &fixed));
        assert_eq!(ledger.digest_of(0, &fixed).unwrap(), digest);
        assert_ne!(ledger.axis_summary(0).unwrap(), summary_before[0]);
        assert_eq!(ledger.axis_summary(1).unwrap(), summary_before[1]);
        assert_eq!(ledger.line_digests(1).unwrap(), other_axis_before);
    }

    #[test]
    fn recompute_through_touches_one_line_per_axis() {
        let mut g = grid(3, 3);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        let before: Vec<Vec<Digest>> = (0..3).map(|a| ledger.line_digests(a).unwrap()).collect();

        let coordinate = Coordinate::from([2, 0, 1]);
        let linear = g.space().linear_of(&coordinate).unwrap();
        g.get_mut(linear).unwrap().overwrite(1, b"payload".to_vec());
        let touched = ledger.recompute_through(&coordinate, &g).unwrap();
        assert_eq!(touched.len(), 3);

        for axis in 0..3 {
            let after = ledger.line_digests(axis).unwrap();
            let changed: Vec<usize> = (0..after.len())
                .filter(|&i| after[i] != before[axis][i])
                .collect();
            let expected = g.space().line_index(&coordinate.without_axis(axis)).unwrap();
            assert_eq!(changed, vec![expected]);
        }
    }

    #[test]
    fn recompute_all_repairs_tampering() {
        let g = grid(2, 2);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        let good = ledger.line_digests(0).unwrap();
        let fixed = Coordinate::from([1]);
        ledger.tamper_line(0, &fixed, Digest::from_hash([7; 32]));
        ledger.tamper_summary(1, Digest::from_hash([8; 32]));
        assert_ne!(ledger.line_digests(0).unwrap(), good);

        ledger.recompute_all(&g);
        assert_eq!(ledger.line_digests(0).unwrap(), good);
        let lines = ledger.line_digests(1).unwrap();
        assert_eq!(ledger.axis_summary(1).unwrap(), summarize(&lines));
    }

    #[test]
    fn compute_line_ignores_stored_value() {
        let g = grid(2, 3);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        let fixed = Coordinate::from([0]);
        ledger.tamper_line(1, &fixed, Digest::from_hash([1; 32]));
        assert_eq!(
            ledger.compute_line(1, &fixed, &g).unwrap(),
            expected_line(&g, 1, &fixed)
        );
    }

    #[test]
    fn bad_lines_are_rejected() {
        let g = grid(2, 3);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        assert!(ledger.digest_of(2, &Coordinate::from([0])).unwrap_err().is_out_of_range());
        assert!(ledger.digest_of(0, &Coordinate::from([3])).unwrap_err().is_out_of_range());
        assert!(ledger
            .digest_of(0, &Coordinate::from([0, 0]))
            .unwrap_err()
            .is_out_of_range());
        assert!(ledger.axis_summary(5).is_err());
    }

    #[test]
    fn from_parts_checks_shape() {
        let g = grid(2, 3);
        let ledger = LineDigestLedger::build(*g.space(), &g);
        let lines: Vec<Vec<Digest>> = (0..2).map(|a| ledger.line_digests(a).unwrap()).collect();
        let summaries = ledger.summaries();

        let rebuilt = LineDigestLedger::from_parts(*g.space(), lines.clone(), summaries.clone()).unwrap();
        assert_eq!(rebuilt.summaries(), summaries);

        let mut short = lines;
        short[1].pop();
        assert!(LineDigestLedger::from_parts(*g.space(), short, summaries).is_none());
    }
}
