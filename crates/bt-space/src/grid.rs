use bt_types::Coordinate;

use crate::error::SpaceResult;
use crate::space::CoordinateSpace;

/// Backing storage for one value per cell of a [`CoordinateSpace`].
///
/// The size is fixed at construction; values are addressed by linear index
/// or by coordinate, and a line can be read as an ordered view.
#[derive(Clone, Debug)]
pub struct Grid<T> {
    space: CoordinateSpace,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Fill every cell with `f(linear_index)`.
    pub fn from_fn(space: CoordinateSpace, f: impl FnMut(usize) -> T) -> Self {
        let cells = (0..space.capacity()).map(f).collect();
        Self { space, cells }
    }

    /// Wrap existing cells, which must be in linear-index order.
    ///
    /// Returns `None` if `cells.len()` is not the space's capacity.
    pub fn from_cells(space: CoordinateSpace, cells: Vec<T>) -> Option<Self> {
        (cells.len() == space.capacity()).then_some(Self { space, cells })
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at `linear`, or `None` past the end.
    pub fn get(&self, linear: usize) -> Option<&T> {
        self.cells.get(linear)
    }

    pub fn get_mut(&mut self, linear: usize) -> Option<&mut T> {
        self.cells.get_mut(linear)
    }

    /// Cell at `coordinate`.
    pub fn at(&self, coordinate: &Coordinate) -> SpaceResult<&T> {
        let linear = self.space.linear_of(coordinate)?;
        Ok(&self.cells[linear])
    }

    /// The `width` cells of a line, in axis-position order.
    pub fn line(&self, axis: usize, fixed: &Coordinate) -> SpaceResult<impl Iterator<Item = &T> + '_> {
        let indices = self.space.line(axis, fixed)?;
        Ok(indices.into_iter().map(move |i| &self.cells[i]))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.cells.iter()
    }
}

impl<'a, T> IntoIterator for &'a Grid<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
