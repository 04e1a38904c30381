//! Seeded isolation forest over one-dimensional series.
//!
//! Score convention: `0.5 - s(x)` where `s` is the standard anomaly score
//! `2^(-E[h(x)] / c(n))`. Negative scores are outliers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::anomaly::detector::{AnomalyDetector, DetectorSignal};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy)]
pub struct IsolationDetector {
    trees: usize,
    max_samples: usize,
    /// Below this many points the detector stays neutral.
    min_points: usize,
    seed: u64,
}

impl IsolationDetector {
    pub fn new(trees: usize, max_samples: usize, min_points: usize, seed: u64) -> Self {
        Self {
            trees: trees.max(1),
            max_samples: max_samples.max(2),
            min_points,
            seed,
        }
    }

    /// Outlier score per value; all zeros when the forest is not fit.
    pub fn scores(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n < self.min_points || n < 2 {
            return vec![0.0; n];
        }
        let (lo, hi) = min_max(values);
        if hi - lo <= f64::EPSILON {
            return vec![0.0; n];
        }

        let forest = Forest::fit(values, self.trees, self.max_samples.min(n), self.seed);
        values.iter().map(|x| 0.5 - forest.anomaly_score(*x)).collect()
    }
}

impl Default for IsolationDetector {
    fn default() -> Self {
        Self::new(100, 256, 11, 42)
    }
}

impl AnomalyDetector for IsolationDetector {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn evaluate(&self, values: &[f64]) -> Vec<DetectorSignal> {
        self.scores(values)
            .into_iter()
            .map(|score| {
                let severity = 1.0 - score;
                if score < 0.0 {
                    DetectorSignal {
                        flagged: true,
                        severity,
                        reason: Some(format!("isolation score {score:.3} below 0")),
                    }
                } else {
                    DetectorSignal::quiet(severity)
                }
            })
            .collect()
    }
}

enum Node {
    Leaf { size: usize },
    Split { at: f64, left: Box<Node>, right: Box<Node> },
}

struct Forest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl Forest {
    fn fit(values: &[f64], trees: usize, sample_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..trees)
            .map(|_| {
                let sample: Vec<f64> = rand::seq::index::sample(&mut rng, values.len(), sample_size)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                build(&sample, 0, max_depth, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    fn anomaly_score(&self, x: f64) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|t| path_length(t, x, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path(self.sample_size);
        if norm <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / norm)
    }
}

fn build(sample: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }
    let (lo, hi) = min_max(sample);
    if hi - lo <= f64::EPSILON {
        return Node::Leaf { size: sample.len() };
    }

    // `at` lies in [lo, hi), so both sides are non-empty.
    let at = lo + (hi - lo) * rng.gen_range(0.0..1.0);
    let (left, right): (Vec<f64>, Vec<f64>) = sample.iter().copied().partition(|v| *v <= at);
    Node::Split {
        at,
        left: Box::new(build(&left, depth + 1, max_depth, rng)),
        right: Box::new(build(&right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, x: f64, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path(*size),
        Node::Split { at, left, right } => {
            if x <= *at {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}
