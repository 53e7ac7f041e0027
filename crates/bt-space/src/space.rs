use std::fmt;

use bt_types::Coordinate;

use crate::error::{SpaceError, SpaceResult};

/// Smallest number of axes a block tensor may have.
pub const MIN_DIM_COUNT: usize = 2;

/// Identifies one line: the free `axis` plus the `dim_count - 1` fixed
/// coordinates on every other axis.
///
/// Ordering is `axis` first, then the fixed tuple lexicographically. This is
/// the global order in which line locks are taken.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId {
    pub axis: usize,
    pub fixed: Coordinate,
}

impl LineId {
    pub fn new(axis: usize, fixed: Coordinate) -> Self {
        Self { axis, fixed }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "axis {} @ {}", self.axis, self.fixed)
    }
}

/// Fixed-shape N-dimensional grid of `width^dim_count` cells.
///
/// Linear indices and coordinates convert by mixed-radix arithmetic with
/// axis 0 as the most significant digit. The same arithmetic over
/// `dim_count - 1` axes numbers the lines of each axis, so line index `i` of
/// every axis is the `i`-th fixed tuple in lexicographic order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoordinateSpace {
    dim_count: usize,
    width: usize,
    capacity: usize,
    lines_per_axis: usize,
}

impl CoordinateSpace {
    /// Validate the shape and compute its capacity.
    ///
    /// Fails with [`SpaceError::InvalidShape`] if `dim_count < 2`,
    /// `width < 1`, or `width^dim_count` does not fit in `usize`.
    pub fn new(dim_count: usize, width: usize) -> SpaceResult<Self> {
        let invalid = |reason| SpaceError::InvalidShape {
            dim_count,
            width,
            reason,
        };
        if dim_count < MIN_DIM_COUNT {
            return Err(invalid("dim_count must be at least 2"));
        }
        if width < 1 {
            return Err(invalid("width must be at least 1"));
        }
        let capacity = u32::try_from(dim_count)
            .ok()
            .and_then(|exp| width.checked_pow(exp))
            .ok_or_else(|| invalid("width^dim_count overflows the address space"))?;

        Ok(Self {
            dim_count,
            width,
            capacity,
            lines_per_axis: capacity / width,
        })
    }

    pub fn dim_count(&self) -> usize {
        self.dim_count
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of cells, `width^dim_count`.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of lines along one axis, `width^(dim_count - 1)`.
    pub fn lines_per_axis(&self) -> usize {
        self.lines_per_axis
    }

    /// Coordinate of the cell at `linear`.
    pub fn coordinate_of(&self, linear: usize) -> SpaceResult<Coordinate> {
        if linear >= self.capacity {
            return Err(SpaceError::OutOfRange {
                what: "linear index",
                value: linear,
                bound: self.capacity,
            });
        }
        Ok(self.decode(linear, self.dim_count))
    }

    /// Linear index of the cell at `coordinate`.
    pub fn linear_of(&self, coordinate: &Coordinate) -> SpaceResult<usize> {
        self.encode(coordinate.as_slice(), self.dim_count)
    }

    /// Index of the line with the given fixed coordinates within its axis.
    pub fn line_index(&self, fixed: &Coordinate) -> SpaceResult<usize> {
        self.encode(fixed.as_slice(), self.dim_count - 1)
    }

    /// Fixed coordinates of the line at `line_index` within an axis.
    pub fn fixed_of(&self, line_index: usize) -> SpaceResult<Coordinate> {
        if line_index >= self.lines_per_axis {
            return Err(SpaceError::OutOfRange {
                what: "line index",
                value: line_index,
                bound: self.lines_per_axis,
            });
        }
        Ok(self.decode(line_index, self.dim_count - 1))
    }

    /// Linear indices of the `width` cells on a line, in axis-position order.
    pub fn line(&self, axis: usize, fixed: &Coordinate) -> SpaceResult<Vec<usize>> {
        self.check_axis(axis)?;
        self.line_index(fixed)?;

        let stride = self.stride(axis);
        // The fixed tuple with the free axis pinned to zero.
        let base = fixed
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let position = if i < axis { i } else { i + 1 };
                c * self.stride(position)
            })
            .sum::<usize>();

        Ok((0..self.width).map(|k| base + k * stride).collect())
    }

    /// The `dim_count` lines through `coordinate`, one per axis, in lock order.
    pub fn lines_through(&self, coordinate: &Coordinate) -> SpaceResult<Vec<LineId>> {
        self.linear_of(coordinate)?;
        Ok((0..self.dim_count)
            .map(|axis| LineId::new(axis, coordinate.without_axis(axis)))
            .collect())
    }

    /// Every line of `axis` in the fixed enumeration order.
    pub fn lines_of_axis(&self, axis: usize) -> SpaceResult<impl Iterator<Item = LineId> + '_> {
        self.check_axis(axis)?;
        Ok((0..self.lines_per_axis)
            .map(move |i| LineId::new(axis, self.decode(i, self.dim_count - 1))))
    }

    /// Fails with [`SpaceError::OutOfRange`] unless `axis < dim_count`.
    pub fn check_axis(&self, axis: usize) -> SpaceResult<()> {
        if axis >= self.dim_count {
            return Err(SpaceError::OutOfRange {
                what: "axis",
                value: axis,
                bound: self.dim_count,
            });
        }
        Ok(())
    }

    /// Distance in linear index between neighbours along `axis`.
    fn stride(&self, axis: usize) -> usize {
        // Bounded by capacity, so cannot overflow.
        self.width.pow((self.dim_count - 1 - axis) as u32)
    }

    fn encode(&self, components: &[usize], arity: usize) -> SpaceResult<usize> {
        if components.len() != arity {
            return Err(SpaceError::ArityMismatch {
                expected: arity,
                actual: components.len(),
            });
        }
        components.iter().try_fold(0usize, |acc, &c| {
            if c >= self.width {
                return Err(SpaceError::OutOfRange {
                    what: "coordinate component",
                    value: c,
                    bound: self.width,
                });
            }
            Ok(acc * self.width + c)
        })
    }

    fn decode(&self, mut index: usize, arity: usize) -> Coordinate {
        let mut components = vec![0; arity];
        for slot in components.iter_mut().rev() {
            *slot = index % self.width;
            index /= self.width;
        }
        Coordinate::new(components)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn rejects_too_few_axes() {
        for dim in 0..2 {
            let err = CoordinateSpace::new(dim, 3).unwrap_err();
            assert!(matches!(err, SpaceError::InvalidShape { .. }));
        }
    }

    #[test]
    fn rejects_zero_width() {
        assert!(matches!(
            CoordinateSpace::new(2, 0),
            Err(SpaceError::InvalidShape { .. })
        ));
    }

    #[test]
    fn rejects_overflowing_capacity() {
        assert!(matches!(
            CoordinateSpace::new(64, 3),
            Err(SpaceError::InvalidShape { .. })
        ));
    }

    #[test]
    fn capacity_and_line_counts() {
        let s = CoordinateSpace::new(3, 4).unwrap();
        assert_eq!(s.capacity(), 64);
        assert_eq!(s.lines_per_axis(), 16);

        let unit = CoordinateSpace::new(5, 1).unwrap();
        assert_eq!(unit.capacity(), 1);
        assert_eq!(unit.lines_per_axis(), 1);
    }

    #[test]
    fn most_significant_axis_first() {
        let s = CoordinateSpace::new(3, 3).unwrap();
        assert_eq!(s.coordinate_of(1).unwrap(), Coordinate::from([0, 0, 1]));
        assert_eq!(s.coordinate_of(3).unwrap(), Coordinate::from([0, 1, 0]));
        assert_eq!(s.coordinate_of(9).unwrap(), Coordinate::from([1, 0, 0]));
        assert_eq!(s.linear_of(&Coordinate::from([2, 2, 2])).unwrap(), 26);
    }

    #[test]
    fn out_of_range_inputs() {
        let s = CoordinateSpace::new(2, 3).unwrap();
        assert!(s.coordinate_of(9).unwrap_err().is_out_of_range());
        assert!(s
            .linear_of(&Coordinate::from([0, 3]))
            .unwrap_err()
            .is_out_of_range());
        assert_eq!(
            s.linear_of(&Coordinate::from([0, 1, 2])).unwrap_err(),
            SpaceError::ArityMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert!(s.line(2, &Coordinate::from([0])).is_err());
        assert!(s.line(0, &Coordinate::from([0, 0])).is_err());
        assert!(s.line(0, &Coordinate::from([3])).is_err());
        assert!(s.fixed_of(3).is_err());
    }

    #[test]
    fn line_lets_exactly_one_axis_vary() {
        let s = CoordinateSpace::new(3, 3).unwrap();
        let fixed = Coordinate::from([2, 1]);
        let cells = s.line(1, &fixed).unwrap();
        let coords: Vec<Coordinate> = cells
            .iter()
            .map(|&i| s.coordinate_of(i).unwrap())
            .collect();
        assert_eq!(
            coords,
            vec![
                Coordinate::from([2, 0, 1]),
                Coordinate::from([2, 1, 1]),
                Coordinate::from([2, 2, 1]),
            ]
        );
    }

    #[test]
    fn every_cell_lies_on_one_line_per_axis() {
        let s = CoordinateSpace::new(3, 3).unwrap();
        let mut hits = vec![0usize; s.capacity()];
        for axis in 0..s.dim_count() {
            for line in s.lines_of_axis(axis).unwrap() {
                for cell in s.line(line.axis, &line.fixed).unwrap() {
                    hits[cell] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == s.dim_count()));
    }

    #[test]
    fn lines_through_contains_the_cell() {
        let s = CoordinateSpace::new(4, 2).unwrap();
        let c = Coordinate::from([1, 0, 1, 1]);
        let linear = s.linear_of(&c).unwrap();
        let lines = s.lines_through(&c).unwrap();
        assert_eq!(lines.len(), 4);
        let distinct: HashSet<_> = lines.iter().collect();
        assert_eq!(distinct.len(), 4);
        for line in &lines {
            assert!(s.line(line.axis, &line.fixed).unwrap().contains(&linear));
        }
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(sorted, lines);
    }

    #[test]
    fn lines_of_axis_enumerates_lexicographically() {
        let s = CoordinateSpace::new(3, 2).unwrap();
        let fixed: Vec<Coordinate> = s.lines_of_axis(2).unwrap().map(|l| l.fixed).collect();
        assert_eq!(
            fixed,
            vec![
                Coordinate::from([0, 0]),
                Coordinate::from([0, 1]),
                Coordinate::from([1, 0]),
                Coordinate::from([1, 1]),
            ]
        );
    }

    proptest! {
        #[test]
        fn linear_coordinate_conversion_is_inverse(dim in 2usize..6, width in 1usize..6, seed in any::<usize>()) {
            let s = CoordinateSpace::new(dim, width).unwrap();
            let linear = seed % s.capacity();
            let c = s.coordinate_of(linear).unwrap();
            prop_assert_eq!(c.len(), dim);
            prop_assert!(c.as_slice().iter().all(|&x| x < width));
            prop_assert_eq!(s.linear_of(&c).unwrap(), linear);
        }

        #[test]
        fn line_index_conversion_is_inverse(dim in 2usize..6, width in 1usize..6, seed in any::<usize>()) {
            let s = CoordinateSpace::new(dim, width).unwrap();
            let index = seed % s.lines_per_axis();
            let fixed = s.fixed_of(index).unwrap();
            prop_assert_eq!(s.line_index(&fixed).unwrap(), index);
        }
    }
}
