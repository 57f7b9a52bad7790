//! CART regression trees grown on variance reduction

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Growth limits for one regression tree
#[derive(Debug, Clone)]
pub struct TreeParams {
    /// Maximum depth (None = grow until leaves are pure or too small)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each child
    pub min_samples_leaf: usize,
    /// Features tried at each split
    pub max_features: usize,
    /// Weighted impurity decrease a split must reach
    pub min_impurity_decrease: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Best split found for a node
struct Candidate {
    feature: usize,
    threshold: f64,
    /// Sum of squared errors of both children
    child_sse: f64,
}

/// Fitted regression tree
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

/// Borrowed training data shared by every node of one tree
struct Grower<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a TreeParams,
    /// Total samples at the root, used to weight impurity decreases
    root_samples: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `sample` (repeats allowed).
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        sample: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let grower = Grower {
            features,
            targets,
            params,
            root_samples: sample.len() as f64,
        };
        let root = grower.grow(sample.to_vec(), 0, rng);
        Self { root }
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Depth of the deepest leaf, a lone leaf has depth 0
    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

impl<'a> Grower<'a> {
    fn grow(&self, indices: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let n = indices.len();
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let y = self.targets[i];
            (s + y, sq + y * y)
        });
        let value = if n > 0 { sum / n as f64 } else { 0.0 };
        let sse = (sum_sq - sum * sum / n.max(1) as f64).max(0.0);

        let depth_reached = self.params.max_depth.map_or(false, |max| depth >= max);
        if depth_reached
            || n < self.params.min_samples_split
            || n < self.params.min_samples_leaf.saturating_mul(2)
            || sse <= 1e-12
        {
            return Node::Leaf { value };
        }

        let Some(best) = self.best_split(&indices, rng) else {
            return Node::Leaf { value };
        };

        // (N_t / N) * (impurity - weighted child impurity)
        let decrease = (sse - best.child_sse) / self.root_samples;
        if decrease < self.params.min_impurity_decrease {
            return Node::Leaf { value };
        }

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    fn best_split(&self, indices: &[usize], rng: &mut ChaCha8Rng) -> Option<Candidate> {
        let n_features = self.features.first().map_or(0, |row| row.len());
        let mut feature_order: Vec<usize> = (0..n_features).collect();
        feature_order.shuffle(rng);
        feature_order.truncate(self.params.max_features.clamp(1, n_features.max(1)));

        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = indices.len();
        let mut best: Option<Candidate> = None;

        for feature in feature_order {
            let mut sorted: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (self.features[i][feature], self.targets[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total_sum: f64 = sorted.iter().map(|(_, y)| y).sum();
            let total_sq: f64 = sorted.iter().map(|(_, y)| y * y).sum();
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for split in 1..n {
                let (x_prev, y_prev) = sorted[split - 1];
                left_sum += y_prev;
                left_sq += y_prev * y_prev;

                let x_next = sorted[split].0;
                if x_prev == x_next || split < min_leaf || n - split < min_leaf {
                    continue;
                }

                let n_left = split as f64;
                let n_right = (n - split) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let child_sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);

                if best.as_ref().map_or(true, |b| child_sse < b.child_sse) {
                    best = Some(Candidate {
                        feature,
                        threshold: (x_prev + x_next) / 2.0,
                        child_sse,
                    });
                }
            }
        }

        best
    }
}
