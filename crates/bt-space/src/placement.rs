use std::collections::VecDeque;

use bt_types::Coordinate;
use tracing::debug;

use crate::error::{SpaceError, SpaceResult};
use crate::space::CoordinateSpace;

/// Bijection from sequential block numbers to cells.
///
/// Numbers are assigned by a breadth-first expansion from the origin where
/// the successors of a cell are the cells one step further along each axis
/// (axis 0 first), each enqueued the first time it is reached. The result is
/// a numbering in non-decreasing coordinate sum ("shell" order) that depends
/// only on `(dim_count, width)`, so two tensors of the same shape are
/// comparable cell by cell.
///
/// Built once and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementPolicy {
    space: CoordinateSpace,
    number_to_coordinate: Vec<Coordinate>,
    number_to_linear: Vec<usize>,
    linear_to_number: Vec<usize>,
}

impl PlacementPolicy {
    /// Validate the shape and compute the numbering.
    pub fn build(dim_count: usize, width: usize) -> SpaceResult<Self> {
        let space = CoordinateSpace::new(dim_count, width)?;
        Ok(Self::for_space(space))
    }

    /// Compute the numbering for an already validated space.
    pub fn for_space(space: CoordinateSpace) -> Self {
        let capacity = space.capacity();
        let mut number_to_coordinate = Vec::with_capacity(capacity);
        let mut number_to_linear = Vec::with_capacity(capacity);
        let mut linear_to_number: Vec<Option<usize>> = vec![None; capacity];
        let mut reached = vec![false; capacity];

        let origin = Coordinate::origin(space.dim_count());
        let mut queue = VecDeque::from([(origin, 0usize)]);
        reached[0] = true;

        while let Some((current, linear)) = queue.pop_front() {
            let number = number_to_coordinate.len();
            linear_to_number[linear] = Some(number);
            number_to_linear.push(linear);

            for axis in 0..space.dim_count() {
                if current.as_slice()[axis] + 1 >= space.width() {
                    continue;
                }
                let next = current.incremented(axis);
                let next_linear = linear + space.width().pow((space.dim_count() - 1 - axis) as u32);
                if !reached[next_linear] {
                    reached[next_linear] = true;
                    queue.push_back((next, next_linear));
                }
            }

            number_to_coordinate.push(current);
        }

        debug!(
            dim_count = space.dim_count(),
            width = space.width(),
            capacity,
            "placement computed"
        );

        Self {
            space,
            number_to_coordinate,
            number_to_linear,
            // Every cell is reachable from the origin by +1 steps.
            linear_to_number: linear_to_number.into_iter().flatten().collect(),
        }
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    pub fn capacity(&self) -> usize {
        self.space.capacity()
    }

    /// Coordinate assigned to `number`.
    pub fn coordinate_of(&self, number: usize) -> SpaceResult<&Coordinate> {
        self.number_to_coordinate
            .get(number)
            .ok_or_else(|| self.number_out_of_range(number))
    }

    /// Linear cell index assigned to `number`.
    pub fn linear_of(&self, number: usize) -> SpaceResult<usize> {
        self.number_to_linear
            .get(number)
            .copied()
            .ok_or_else(|| self.number_out_of_range(number))
    }

    /// Block number assigned to the cell at `coordinate`.
    pub fn number_of(&self, coordinate: &Coordinate) -> SpaceResult<usize> {
        let linear = self.space.linear_of(coordinate)?;
        Ok(self.linear_to_number[linear])
    }

    /// Block number assigned to the cell at linear index `linear`.
    pub fn number_at_linear(&self, linear: usize) -> SpaceResult<usize> {
        self.linear_to_number
            .get(linear)
            .copied()
            .ok_or(SpaceError::OutOfRange {
                what: "linear index",
                value: linear,
                bound: self.capacity(),
            })
    }

    /// Coordinates in block-number order.
    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.number_to_coordinate.iter()
    }

    fn number_out_of_range(&self, number: usize) -> SpaceError {
        SpaceError::OutOfRange {
            what: "block number",
            value: number,
            bound: self.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn invalid_shape_is_rejected() {
        assert!(matches!(
            PlacementPolicy::build(1, 3),
            Err(SpaceError::InvalidShape { .. })
        ));
        assert!(matches!(
            PlacementPolicy::build(2, 0),
            Err(SpaceError::InvalidShape { .. })
        ));
    }

    #[test]
    fn two_by_three_order() {
        let p = PlacementPolicy::build(2, 3).unwrap();
        let order: Vec<Vec<usize>> = p.iter().map(|c| c.as_slice().to_vec()).collect();
        assert_eq!(
            order,
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 2],
                vec![2, 1],
                vec![1, 2],
                vec![2, 2],
            ]
        );
    }

    #[test]
    fn origin_is_block_zero() {
        let p = PlacementPolicy::build(4, 3).unwrap();
        assert_eq!(p.coordinate_of(0).unwrap(), &Coordinate::origin(4));
        assert_eq!(p.linear_of(0).unwrap(), 0);
        assert_eq!(p.number_of(&Coordinate::origin(4)).unwrap(), 0);
    }

    #[test]
    fn numbers_past_capacity_are_out_of_range() {
        let p = PlacementPolicy::build(2, 3).unwrap();
        assert!(p.coordinate_of(9).unwrap_err().is_out_of_range());
        assert!(p.linear_of(9).unwrap_err().is_out_of_range());
        assert!(p.number_at_linear(9).unwrap_err().is_out_of_range());
    }

    #[test]
    fn build_is_deterministic() {
        let a = PlacementPolicy::build(3, 4).unwrap();
        let b = PlacementPolicy::build(3, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn width_one_has_single_block() {
        let p = PlacementPolicy::build(3, 1).unwrap();
        assert_eq!(p.capacity(), 1);
        assert_eq!(p.coordinate_of(0).unwrap(), &Coordinate::origin(3));
    }

    proptest! {
        #[test]
        fn numbering_is_a_shell_ordered_bijection(dim in 2usize..5, width in 1usize..5) {
            let p = PlacementPolicy::build(dim, width).unwrap();
            let space = *p.space();

            let seen: HashSet<&Coordinate> = p.iter().collect();
            prop_assert_eq!(seen.len(), space.capacity());
            prop_assert_eq!(p.iter().count(), space.capacity());

            let mut last_sum = 0;
            for (number, coordinate) in p.iter().enumerate() {
                prop_assert!(coordinate.sum() >= last_sum);
                last_sum = coordinate.sum();

                let linear = space.linear_of(coordinate).unwrap();
                prop_assert_eq!(p.linear_of(number).unwrap(), linear);
                prop_assert_eq!(p.number_of(coordinate).unwrap(), number);
                prop_assert_eq!(p.number_at_linear(linear).unwrap(), number);
            }
        }
    }
}
