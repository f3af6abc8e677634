use std::ops::Range;

use proptest::collection::vec;
use proptest::prelude::*;

use crate::matrix::FMatrix;

pub fn random_fmatrix(
    rows: usize,
    cols: usize,
    range: Range<f32>,
) -> impl Strategy<Value = FMatrix> {
    vec(range, rows * cols).prop_map(move |v| {
        let mut m = FMatrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                m[(i, j)] = v[i * cols + j];
            }
        }
        m
    })
}

//https://stats.stackexchange.com/a/201864
pub fn rdp(a: f32, b: f32) -> f32 {
    (a - b).abs() / (a.abs() + b.abs()).max(1e-2)
}
