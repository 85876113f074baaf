//! Tensor extents

use std::fmt::{self, Display};
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Ordered tensor extents, outermost first (`[N, C, H, W]`, `[K, C, R, S]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimension {
    dims: Vec<usize>,
}

impl Dimension {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self { dims: dims.into() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Product of the extents; `None` when it does not fit in `usize`.
    pub fn total_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Every extent is non-zero and there is at least one of them.
    pub fn is_valid(&self) -> bool {
        !self.dims.is_empty() && self.dims.iter().all(|&d| d > 0)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.dims
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.dims.iter()
    }

    /// Fully packed row-major strides, in elements; `None` on overflow.
    pub fn packed_strides(&self) -> Option<Vec<usize>> {
        let mut strides = vec![1usize; self.dims.len()];
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1].checked_mul(self.dims[i + 1])?;
        }
        Some(strides)
    }

    /// Copy of these extents with trailing unit extents up to `rank`.
    pub fn padded_to(&self, rank: usize) -> Dimension {
        let mut dims = self.dims.clone();
        while dims.len() < rank {
            dims.push(1);
        }
        Dimension { dims }
    }
}

impl From<Vec<usize>> for Dimension {
    fn from(dims: Vec<usize>) -> Self {
        Self { dims }
    }
}

impl<const N: usize> From<[usize; N]> for Dimension {
    fn from(dims: [usize; N]) -> Self {
        Self { dims: dims.to_vec() }
    }
}

impl Index<usize> for Dimension {
    type Output = usize;

    fn index(&self, index: usize) -> &usize {
        &self.dims[index]
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.dims.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_basics() {
        let dim = Dimension::from([8, 3, 32, 32]);
        assert_eq!(dim.rank(), 4);
        assert_eq!(dim.total_elements(), Some(8 * 3 * 32 * 32));
        assert_eq!(dim[1], 3);
        assert_eq!(dim.to_string(), "[8, 3, 32, 32]");
        assert!(dim.is_valid());
    }

    #[test]
    fn test_packed_strides() {
        let dim = Dimension::from([8, 3, 32, 32]);
        assert_eq!(dim.packed_strides(), Some(vec![3 * 32 * 32, 32 * 32, 32, 1]));
        assert_eq!(Dimension::from([5]).packed_strides(), Some(vec![1]));
    }

    #[test]
    fn test_overflowing_extents() {
        let dim = Dimension::from([1 << 20; 5]);
        assert!(dim.iter().all(|&d| d <= i32::MAX as usize));
        assert_eq!(dim.total_elements(), None);
        assert_eq!(dim.packed_strides(), None);
    }

    #[test]
    fn test_padding_and_validity() {
        let dim = Dimension::from([4, 7]);
        assert_eq!(dim.padded_to(4).as_slice(), &[4, 7, 1, 1]);
        assert_eq!(Dimension::from([1, 2, 3, 4, 5]).padded_to(4).rank(), 5);
        assert!(!Dimension::from([4, 0, 2]).is_valid());
        assert!(!Dimension::default().is_valid());
    }
}
