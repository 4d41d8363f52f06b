//! Plaintext group-by used as ground truth for the oblivious scans

#![allow(dead_code)]

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random table with integral values so both backends can run it
pub struct Dataset {
    pub outer: Vec<f64>,
    pub inner: Vec<f64>,
    pub values: Vec<f64>,
}

impl Dataset {
    pub fn random(seed: u64, rows: usize, k1: usize, k2: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Dataset {
            outer: (0..rows).map(|_| rng.gen_range(0..k1) as f64).collect(),
            inner: (0..rows).map(|_| rng.gen_range(0..k2) as f64).collect(),
            values: (0..rows).map(|_| rng.gen_range(-50..=50) as f64).collect(),
        }
    }
}

/// Ordinary group-by over cleartext rows
pub struct ReferenceOracle {
    n_cells: usize,
    k2: usize,
    groups: BTreeMap<usize, Vec<f64>>,
}

impl ReferenceOracle {
    pub fn single(keys: &[f64], values: &[f64], k1: usize) -> Self {
        Self::build(keys.iter().map(|k| *k as usize), values, k1, 1)
    }

    pub fn pair(outer: &[f64], inner: &[f64], values: &[f64], k1: usize, k2: usize) -> Self {
        let cells = outer
            .iter()
            .zip(inner)
            .map(|(o, i)| *o as usize * k2 + *i as usize);
        Self::build(cells, values, k1, k2)
    }

    fn build(cells: impl Iterator<Item = usize>, values: &[f64], k1: usize, k2: usize) -> Self {
        let mut groups: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for (cell, value) in cells.zip(values) {
            groups.entry(cell).or_default().push(*value);
        }
        ReferenceOracle {
            n_cells: k1 * k2,
            k2,
            groups,
        }
    }

    fn members(&self, cell: usize) -> &[f64] {
        self.groups.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sums(&self) -> Vec<f64> {
        (0..self.n_cells).map(|c| self.members(c).iter().sum()).collect()
    }

    pub fn counts(&self) -> Vec<u64> {
        (0..self.n_cells)
            .map(|c| self.members(c).len() as u64)
            .collect()
    }

    pub fn averages(&self) -> Vec<Option<f64>> {
        (0..self.n_cells)
            .map(|c| {
                let m = self.members(c);
                if m.is_empty() {
                    None
                } else {
                    Some(m.iter().sum::<f64>() / m.len() as f64)
                }
            })
            .collect()
    }

    pub fn std_devs(&self, ddof: usize) -> Vec<Option<f64>> {
        (0..self.n_cells)
            .map(|c| {
                let m = self.members(c);
                if m.len() <= ddof {
                    return None;
                }
                let mean = m.iter().sum::<f64>() / m.len() as f64;
                let ss: f64 = m.iter().map(|v| (v - mean).powi(2)).sum();
                Some((ss / (m.len() - ddof) as f64).sqrt())
            })
            .collect()
    }

    /// Most frequent inner category per outer category, last one on ties
    pub fn modes(&self) -> Vec<u64> {
        self.counts()
            .chunks(self.k2)
            .map(|row| {
                let max = row.iter().copied().max().unwrap_or(0);
                row.iter().rposition(|c| *c == max).unwrap_or(0) as u64
            })
            .collect()
    }
}

/// Bin index under the `edges[i] < x <= edges[i + 1]` rule, clamped at both ends
pub fn reference_bin(value: f64, edges: &[f64]) -> usize {
    let bins = edges.len() - 1;
    (1..edges.len())
        .find(|i| value <= edges[*i])
        .map(|i| i - 1)
        .unwrap_or(bins - 1)
}

pub fn reference_histogram(a: &[f64], b: &[f64], edges_x: &[f64], edges_y: &[f64]) -> Vec<u64> {
    let bins_y = edges_y.len() - 1;
    let mut counts = vec![0u64; (edges_x.len() - 1) * bins_y];
    for (x, y) in a.iter().zip(b) {
        counts[reference_bin(*x, edges_x) * bins_y + reference_bin(*y, edges_y)] += 1;
    }
    counts
}

pub fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "cell {}: {} vs {}", i, a, e),
            (None, None) => {}
            _ => panic!("cell {}: {:?} vs {:?}", i, a, e),
        }
    }
}
