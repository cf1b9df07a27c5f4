//! Random forest classifier (CART trees, Gini impurity, bootstrap sampling)

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub min_samples_split: usize,
    /// Features considered per split; `None` means `floor(sqrt(n_features))`
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            min_samples_split: 2,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict_proba(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Fitting context shared by every node of one tree
struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    min_samples_split: usize,
}

impl TreeBuilder<'_> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    fn leaf(counts: &[usize]) -> Node {
        let total: usize = counts.iter().sum();
        let proba = counts
            .iter()
            .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect();
        Node::Leaf { proba }
    }

    /// Grow a tree over `samples` until leaves are pure or too small to split.
    fn build(&self, samples: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        let mut nodes = vec![Node::Leaf { proba: Vec::new() }];
        let mut stack = vec![(0usize, samples)];

        while let Some((id, samples)) = stack.pop() {
            let counts = self.class_counts(&samples);
            let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

            if pure || samples.len() < self.min_samples_split {
                nodes[id] = Self::leaf(&counts);
                continue;
            }

            let Some((feature, threshold)) = self.best_split(&samples, &counts, rng) else {
                nodes[id] = Self::leaf(&counts);
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&s| self.x[s][feature] <= threshold);

            let left_id = nodes.len();
            nodes.push(Node::Leaf { proba: Vec::new() });
            let right_id = nodes.len();
            nodes.push(Node::Leaf { proba: Vec::new() });

            nodes[id] = Node::Split {
                feature,
                threshold,
                left: left_id,
                right: right_id,
            };
            stack.push((left_id, left));
            stack.push((right_id, right));
        }

        DecisionTree { nodes }
    }

    /// Best (feature, threshold) by weighted Gini impurity.
    ///
    /// Features are drawn in random order. The search keeps going past
    /// `max_features` until at least one valid split has been found.
    fn best_split(
        &self,
        samples: &[usize],
        parent_counts: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f64)> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let n = samples.len() as f64;
        let mut best: Option<(f64, usize, f64)> = None;
        let mut visited = 0;

        for feature in features {
            if visited >= self.max_features && best.is_some() {
                break;
            }

            let mut pairs: Vec<(f64, usize)> = samples
                .iter()
                .map(|&s| (self.x[s][feature], self.y[s]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            if pairs.first().map(|p| p.0) == pairs.last().map(|p| p.0) {
                // constant within this node
                continue;
            }
            visited += 1;

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent_counts.to_vec();

            for i in 0..pairs.len() - 1 {
                let (value, class) = pairs[i];
                left[class] += 1;
                right[class] -= 1;

                let next = pairs[i + 1].0;
                if value >= next {
                    continue;
                }

                let n_left = (i + 1) as f64;
                let n_right = n - n_left;
                let impurity =
                    n_left / n * gini(&left, n_left) + n_right / n * gini(&right, n_right);

                let improves = match best {
                    Some((b, _, _)) => impurity < b,
                    None => true,
                };
                if improves {
                    let mut threshold = value / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some((impurity, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

fn gini(counts: &[usize], total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    1.0 - counts
        .iter()
        .map(|&c| (c as f64 / total).powi(2))
        .sum::<f64>()
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Fit on row-major features `x` and class indices `y` (`< n_classes`).
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: &ForestParams) -> Self {
        let n_samples = x.len();
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1));

        let builder = TreeBuilder {
            x,
            y,
            n_classes,
            n_features,
            max_features,
            min_samples_split: params.min_samples_split.max(2),
        };

        let mut master = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(master.random());
                let bootstrap: Vec<usize> = (0..n_samples)
                    .map(|_| rng.random_range(0..n_samples))
                    .collect();
                builder.build(bootstrap, &mut rng)
            })
            .collect();

        RandomForest { trees, n_classes }
    }

    /// Class probabilities averaged over all trees.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Most probable class; ties go to the lowest index.
    pub fn predict(&self, row: &[f64]) -> usize {
        let proba = self.predict_proba(row);
        let mut best = 0;
        for (i, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = i;
            }
        }
        best
    }
}
