//! Dense row-major population matrix and flat vector helpers.
use std::convert::TryFrom;

use crate::error::{EvoError, Result};

/// A batch of candidates, one row per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPopulation")]
pub struct Population {
    popsize: usize,
    num_dims: usize,
    data: Vec<f32>,
}

// Unchecked wire form of a population
#[derive(Deserialize)]
struct RawPopulation {
    popsize: usize,
    num_dims: usize,
    data: Vec<f32>,
}

impl TryFrom<RawPopulation> for Population {
    type Error = EvoError;

    fn try_from(raw: RawPopulation) -> Result<Self> {
        Population::from_vec(raw.popsize, raw.num_dims, raw.data)
    }
}

impl Population {
    /// Returns a population filled with zeros
    pub fn zeros(popsize: usize, num_dims: usize) -> Self {
        Population {
            popsize: popsize,
            num_dims: num_dims,
            data: vec![0f32; popsize * num_dims],
        }
    }

    /// Wraps a flat row-major buffer
    pub fn from_vec(popsize: usize, num_dims: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != popsize * num_dims {
            return Err(EvoError::BatchMismatch {
                what: "population buffer",
                expected: popsize * num_dims,
                got: data.len(),
            });
        }
        Ok(Population {
            popsize: popsize,
            num_dims: num_dims,
            data: data,
        })
    }

    /// Builds a population from a set of equally sized rows
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let num_dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * num_dims);
        for row in rows {
            if row.len() != num_dims {
                return Err(EvoError::DimensionMismatch {
                    what: "population row",
                    expected: num_dims,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Population::from_vec(rows.len(), num_dims, data)
    }

    /// Number of members
    #[inline]
    pub fn popsize(&self) -> usize {
        self.popsize
    }

    /// Dimensionality of each member
    #[inline]
    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    /// Gets a member
    #[inline]
    pub fn row(&self, idx: usize) -> &[f32] {
        &self.data[idx * self.num_dims..(idx + 1) * self.num_dims]
    }

    /// Gets a member mutably
    #[inline]
    pub fn row_mut(&mut self, idx: usize) -> &mut [f32] {
        &mut self.data[idx * self.num_dims..(idx + 1) * self.num_dims]
    }

    /// Iterates over members in order
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.num_dims.max(1)).take(self.popsize)
    }

    /// Flat row-major view
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the population, returning the flat buffer
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Mean over members, per dimension
    pub fn column_mean(&self) -> Vec<f32> {
        let mut out = vec![0f32; self.num_dims];
        for row in self.rows() {
            add_vec(&mut out, row);
        }
        scale(&mut out, 1. / self.popsize.max(1) as f32);
        out
    }

    /// Checks the population was drawn for `popsize` members of `num_dims`.
    pub fn check_shape(&self, popsize: usize, num_dims: usize) -> Result<()> {
        if self.popsize != popsize {
            return Err(EvoError::BatchMismatch {
                what: "candidates",
                expected: popsize,
                got: self.popsize,
            });
        }
        if self.num_dims != num_dims {
            return Err(EvoError::DimensionMismatch {
                what: "candidates",
                expected: num_dims,
                got: self.num_dims,
            });
        }
        Ok(())
    }
}

/// Draws the antithetic population `[z; -z]` from a block of `popsize / 2`
/// positive samples laid out row-major.
pub(crate) fn mirror(z_plus: &[f32], popsize: usize, num_dims: usize) -> Population {
    let half = popsize / 2;
    debug_assert_eq!(z_plus.len(), half * num_dims);
    let mut data = Vec::with_capacity(popsize * num_dims);
    data.extend_from_slice(z_plus);
    data.extend(z_plus.iter().map(|v| -v));
    Population {
        popsize: popsize,
        num_dims: num_dims,
        data: data,
    }
}

/// Adds `v2` into `v1`
#[inline]
pub fn add_vec(v1: &mut [f32], v2: &[f32]) {
    assert_eq!(v1.len(), v2.len());
    for (a, b) in v1.iter_mut().zip(v2) {
        *a += *b;
    }
}

/// Scales a vector inplace
#[inline]
pub fn scale(v: &mut [f32], f: f32) {
    for vi in v.iter_mut() {
        *vi *= f;
    }
}

/// Dot product
#[inline]
pub fn dot(v1: &[f32], v2: &[f32]) -> f32 {
    assert_eq!(v1.len(), v2.len());
    v1.iter().zip(v2).map(|(a, b)| a * b).sum()
}

/// Euclidean norm
#[inline]
pub fn l2norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Clamps every element into `[floor, ..)`
#[inline]
pub fn floor_at(v: &mut [f32], floor: f32) {
    for vi in v.iter_mut() {
        *vi = vi.max(floor);
    }
}
