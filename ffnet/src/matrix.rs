use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, MulAssign, SubAssign};
use std::{
    borrow::Borrow,
    ops::{AddAssign, Index, IndexMut, Mul},
};

use rayon::prelude::*;

pub type MatrixIterMut<'a, T> = rayon::slice::IterMut<'a, T>;

pub type MatrixIter<'a, T> = rayon::slice::Iter<'a, T>;

// Row-major, heap-backed. Shapes are runtime values because the network's
// layer widths are only known at construction time.
#[derive(Serialize, Deserialize, Clone)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

pub type FMatrix = Matrix<f32>;

impl<TA: Debug> Debug for Matrix<TA> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_list();
        for i in 0..self.rows {
            dbg.entry(&&self.data[i * self.cols..(i * self.cols) + self.cols]);
        }
        dbg.finish()
    }
}

impl<TA: Default + Copy> Matrix<TA> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![TA::default(); rows * cols],
        }
    }
}

impl<TA> Index<(usize, usize)> for Matrix<TA> {
    type Output = TA;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (r, c) = index;
        assert!(r < self.rows);
        assert!(c < self.cols);

        &self.data[r * self.cols + c]
    }
}

impl<TA> IndexMut<(usize, usize)> for Matrix<TA> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (r, c) = index;
        assert!(r < self.rows);
        assert!(c < self.cols);

        &mut self.data[r * self.cols + c]
    }
}

impl<TA: Default + Copy, const R: usize, const C: usize> From<[[TA; C]; R]> for Matrix<TA> {
    fn from(value: [[TA; C]; R]) -> Self {
        let mut out = Self::zeros(R, C);

        for r in 0..R {
            for c in 0..C {
                out[(r, c)] = value[r][c];
            }
        }

        out
    }
}

impl<TA: PartialEq> PartialEq for Matrix<TA> {
    fn eq(&self, other: &Matrix<TA>) -> bool {
        if self.rows != other.rows || self.cols != other.cols {
            return false;
        }

        let mut res = true;

        for i in 0..self.data.len() {
            res = res && (self.data[i] == other.data[i]);
        }

        res
    }
}

impl<TA: PartialEq> Eq for Matrix<TA> {}

impl<TA> Matrix<TA>
where
    TA: Default
        + Copy
        + Add<Output = TA>
        + Mul<Output = TA>
        + AddAssign
        + SubAssign
        + MulAssign
        + Send
        + Sync,
{
    pub fn add_ip<RHS: Borrow<Self>>(&mut self, rhs: RHS) {
        let rhs = rhs.borrow();
        assert_eq!(self.shape(), rhs.shape());

        self.data
            .par_iter_mut()
            .zip(&rhs.data)
            .for_each(|(lhs_elem, rhs_elem)| {
                *lhs_elem += *rhs_elem;
            });
    }

    pub fn sub_ip<RHS: Borrow<Self>>(&mut self, rhs: RHS) {
        let rhs = rhs.borrow();
        assert_eq!(self.shape(), rhs.shape());

        self.data
            .par_iter_mut()
            .zip(&rhs.data)
            .for_each(|(lhs_elem, rhs_elem)| {
                *lhs_elem -= *rhs_elem;
            });
    }

    pub fn hadamard_ip<RHS: Borrow<Self>>(&mut self, rhs: RHS) {
        let rhs = rhs.borrow();
        assert_eq!(self.shape(), rhs.shape());

        self.data
            .par_iter_mut()
            .zip(&rhs.data)
            .for_each(|(lhs_elem, rhs_elem)| {
                *lhs_elem *= *rhs_elem;
            });
    }

    pub fn scalar_mul_ip(&mut self, scalar: TA) {
        self.data.par_iter_mut().for_each(|el| {
            *el *= scalar;
        });
    }

    pub fn mul<RHS: Borrow<Self>>(&self, rhs: RHS) -> Self {
        let rhs = rhs.borrow();
        let mut out = Self::zeros(self.rows, rhs.cols);
        self.mul_mut(rhs, &mut out);
        out
    }

    pub fn mul_mut<RHS: Borrow<Self>>(&self, rhs: RHS, out: &mut Self) {
        let rhs = rhs.borrow();
        assert_eq!(self.cols, rhs.rows);
        assert_eq!(out.rows, self.rows);
        assert_eq!(out.cols, rhs.cols);

        // A zero dimension leaves nothing to accumulate.
        if self.data.is_empty() || rhs.data.is_empty() {
            return;
        }

        let d = rhs.cols;
        let out_row_iterator = out.data.par_chunks_mut(d);
        let self_row_iterator = self.data.par_chunks(self.cols);

        let rhsdata = &rhs.data;

        out_row_iterator
            .zip(self_row_iterator)
            .for_each(|(out_row, self_row)| {
                self_row
                    .iter()
                    .zip(rhsdata.chunks_exact(d))
                    .for_each(|(self_elem, rhs_row)| {
                        out_row
                            .iter_mut()
                            .zip(rhs_row.iter())
                            .for_each(|(out_elem, rhs_elem)| {
                                *out_elem += (*self_elem) * (*rhs_elem);
                            });
                    });
            });
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        self.transpose_mut(&mut out);
        out
    }

    pub fn transpose_mut(&self, out: &mut Self) {
        assert_eq!(out.rows, self.cols);
        assert_eq!(out.cols, self.rows);

        const BLOCK_SIZE: usize = 128; //Completely arbitrary

        for ii in (0..self.rows).step_by(BLOCK_SIZE) {
            for jj in (0..self.cols).step_by(BLOCK_SIZE) {
                for i in ii..(ii + BLOCK_SIZE).min(self.rows) {
                    for j in jj..(jj + BLOCK_SIZE).min(self.cols) {
                        out[(j, i)] = self[(i, j)];
                    }
                }
            }
        }
    }

    pub fn copy_from(&mut self, other: &Matrix<TA>) {
        assert_eq!(self.shape(), other.shape());
        self.data.copy_from_slice(other.data.as_slice());
    }
}

impl<TA: Send + Sync> Matrix<TA> {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn par_iter_mut(&mut self) -> MatrixIterMut<'_, TA> {
        self.data.par_iter_mut()
    }

    pub fn par_iter(&self) -> MatrixIter<'_, TA> {
        self.data.par_iter()
    }
}
