//! Candidate points and the blocks they are submitted in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// One candidate solution: a fixed-dimension vector of coordinates.
///
/// Points are immutable once created. Cloning is cheap (the coordinates are
/// shared), which lets the engine keep references after a block is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct Point {
    coords: Arc<[f64]>,
}

impl Point {
    pub fn new(coords: impl Into<Vec<f64>>) -> Self {
        let coords: Vec<f64> = coords.into();
        Self {
            coords: coords.into(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.coords.len()
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.coords.iter()
    }

    /// Euclidean norm of the point.
    pub fn norm(&self) -> f64 {
        self.coords.iter().map(|c| c * c).sum::<f64>().sqrt()
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Self::new(coords)
    }
}

impl From<Point> for Vec<f64> {
    fn from(point: Point) -> Self {
        point.coords.to_vec()
    }
}

impl From<&[f64]> for Point {
    fn from(coords: &[f64]) -> Self {
        Self::new(coords.to_vec())
    }
}

impl Index<usize> for Point {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.coords[index]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

/// An ordered batch of points submitted together for evaluation.
///
/// `sequence` is the engine's running block counter, used for logging only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub sequence: u64,
    points: Vec<Point>,
}

impl Block {
    pub fn new(sequence: u64, points: Vec<Point>) -> Self {
        Self { sequence, points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }
}

impl<'a> IntoIterator for &'a Block {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_accessors() {
        let p = Point::new(vec![3.0, 4.0]);
        assert_eq!(p.dimension(), 2);
        assert_eq!(p[1], 4.0);
        assert_eq!(p.norm(), 5.0);
        assert_eq!(p.to_string(), "(3 4)");
    }

    #[test]
    fn clones_share_coordinates() {
        let p = Point::new(vec![1.0, 2.0, 3.0]);
        let q = p.clone();
        assert_eq!(p, q);
        assert!(std::ptr::eq(p.coords().as_ptr(), q.coords().as_ptr()));
    }

    #[test]
    fn block_preserves_order() {
        let block = Block::new(
            7,
            vec![Point::new(vec![1.0]), Point::new(vec![2.0]), Point::new(vec![3.0])],
        );
        let firsts: Vec<f64> = block.iter().map(|p| p[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
        assert_eq!(block.len(), 3);
        assert_eq!(block.sequence, 7);
    }
}
