use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of one cell in an N-dimensional grid, one entry per axis.
///
/// Axis 0 is the most significant axis. The same type is used for the
/// `dim_count - 1` fixed coordinates that identify a line.
///
/// Ordering is lexicographic, which is the order lines are enumerated and
/// locked in.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate(Vec<usize>);

impl Coordinate {
    pub fn new(components: Vec<usize>) -> Self {
        Self(components)
    }

    /// The all-zero coordinate with `len` axes.
    pub fn origin(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Component on `axis`, if the axis exists.
    pub fn get(&self, axis: usize) -> Option<usize> {
        self.0.get(axis).copied()
    }

    /// Sum of all components (the "shell" a cell lies on).
    pub fn sum(&self) -> usize {
        self.0.iter().sum()
    }

    /// Drop `axis`, yielding the fixed coordinates of the line through this
    /// cell along that axis.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= self.len()`.
    pub fn without_axis(&self, axis: usize) -> Self {
        let mut fixed = self.0.clone();
        fixed.remove(axis);
        Self(fixed)
    }

    /// Insert `value` at position `axis`; the inverse of [`without_axis`].
    ///
    /// # Panics
    ///
    /// Panics if `axis > self.len()`.
    ///
    /// [`without_axis`]: Coordinate::without_axis
    pub fn with_axis(&self, axis: usize, value: usize) -> Self {
        let mut full = self.0.clone();
        full.insert(axis, value);
        Self(full)
    }

    /// A copy with the component on `axis` incremented by one.
    pub fn incremented(&self, axis: usize) -> Self {
        let mut next = self.0.clone();
        next[axis] += 1;
        Self(next)
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

impl From<Vec<usize>> for Coordinate {
    fn from(components: Vec<usize>) -> Self {
        Self(components)
    }
}

impl From<&[usize]> for Coordinate {
    fn from(components: &[usize]) -> Self {
        Self(components.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Coordinate {
    fn from(components: [usize; N]) -> Self {
        Self(components.to_vec())
    }
}

impl fmt::Debug for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinate{self}")
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_and_with_axis_are_inverse() {
        let c = Coordinate::from([2, 0, 1]);
        for axis in 0..3 {
            let fixed = c.without_axis(axis);
            assert_eq!(fixed.len(), 2);
            assert_eq!(fixed.with_axis(axis, c.get(axis).unwrap()), c);
        }
    }

    #[test]
    fn without_axis_keeps_order() {
        let c = Coordinate::from([4, 5, 6]);
        assert_eq!(c.without_axis(1), Coordinate::from([4, 6]));
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Coordinate::from([0, 2]) < Coordinate::from([1, 0]));
        assert!(Coordinate::from([1, 0]) < Coordinate::from([1, 1]));
    }

    #[test]
    fn origin_and_sum() {
        let o = Coordinate::origin(4);
        assert_eq!(o.as_slice(), &[0, 0, 0, 0]);
        assert_eq!(o.sum(), 0);
        assert_eq!(o.incremented(2).sum(), 1);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Coordinate::from([1, 2, 3])), "(1, 2, 3)");
        assert_eq!(format!("{}", Coordinate::origin(0)), "()");
    }
}
