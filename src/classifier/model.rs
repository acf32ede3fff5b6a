//! Pre-trained decision forest: loading, structural validation, inference.
//!
//! The model file is JSON with per-tree node arrays (`feature_index`,
//! `threshold`, `left_child`, `right_child`, `leaf_class_counts`) and the
//! global `labels`, `feature_names`, `scaler_mean`, `scaler_scale`. The
//! scikit-learn export names (`feature`, `children_left`, `children_right`,
//! `value`) are accepted as aliases. A single-output scikit-learn `value`
//! array (`[node][1][class]`) is flattened to `[node][class]`; multi-output
//! trees are rejected.
//!
//! Any structural inconsistency is rejected at load time so inference itself
//! cannot fail.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{canonical_feature_name, SegmentFeatures, SegmentLabel, EPSILON};

/// Child index marking a leaf node.
pub const LEAF: i64 = -1;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    Invalid(String),

    #[error("Model references unknown feature '{0}'")]
    UnknownFeature(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTree {
    #[serde(alias = "feature")]
    pub feature_index: Vec<i64>,
    pub threshold: Vec<f64>,
    #[serde(alias = "children_left")]
    pub left_child: Vec<i64>,
    #[serde(alias = "children_right")]
    pub right_child: Vec<i64>,
    #[serde(alias = "value", deserialize_with = "leaf_counts")]
    pub leaf_class_counts: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LeafCounts {
    PerNode(Vec<Vec<f64>>),
    PerOutput(Vec<Vec<Vec<f64>>>),
}

fn leaf_counts<'de, D>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    match LeafCounts::deserialize(deserializer)? {
        LeafCounts::PerNode(counts) => Ok(counts),
        LeafCounts::PerOutput(nodes) => nodes
            .into_iter()
            .enumerate()
            .map(|(i, mut outputs)| match outputs.len() {
                1 => Ok(outputs.remove(0)),
                n => Err(serde::de::Error::custom(format!(
                    "node {i} has {n} outputs, only single-output trees are supported"
                ))),
            })
            .collect(),
    }
}

/// Serialized form of the forest, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawForest {
    pub labels: Vec<String>,
    pub feature_names: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub trees: Vec<RawTree>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_raw(
        raw: &RawTree,
        index: usize,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        let n = raw.threshold.len();
        let invalid = |msg: String| ModelError::Invalid(format!("tree {index}: {msg}"));

        if n == 0 {
            return Err(invalid("has no nodes".into()));
        }
        for (name, len) in [
            ("feature_index", raw.feature_index.len()),
            ("left_child", raw.left_child.len()),
            ("right_child", raw.right_child.len()),
            ("leaf_class_counts", raw.leaf_class_counts.len()),
        ] {
            if len != n {
                return Err(invalid(format!("{name} has {len} entries, threshold has {n}")));
            }
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (raw.left_child[i], raw.right_child[i]);
            if left == LEAF {
                let counts = &raw.leaf_class_counts[i];
                if counts.len() != n_classes {
                    return Err(invalid(format!(
                        "leaf {i} has {} class counts, model has {n_classes} labels",
                        counts.len()
                    )));
                }
                nodes.push(Node::Leaf {
                    class: argmax(counts),
                });
                continue;
            }

            // Children must come after their parent, which rules out cycles
            let child = |c: i64, side: &str| -> Result<usize, ModelError> {
                usize::try_from(c)
                    .ok()
                    .filter(|&c| c > i && c < n)
                    .ok_or_else(|| invalid(format!("node {i} has invalid {side} child {c}")))
            };
            let left = child(left, "left")?;
            let right = child(right, "right")?;
            let feature = usize::try_from(raw.feature_index[i])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| {
                    invalid(format!(
                        "node {i} splits on feature {} of {n_features}",
                        raw.feature_index[i]
                    ))
                })?;
            let threshold = raw.threshold[i];
            if !threshold.is_finite() {
                return Err(invalid(format!("node {i} has non-finite threshold")));
            }

            nodes.push(Node::Split {
                feature,
                threshold,
                left,
                right,
            });
        }
        Ok(Self { nodes })
    }

    fn predict(&self, scaled: &[f64]) -> usize {
        let mut node = 0;
        loop {
            match self.nodes[node] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if scaled[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Index of the first maximum; 0 for an empty slice.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Validated, immutable decision forest.
#[derive(Debug, Clone)]
pub struct DecisionForest {
    labels: Vec<SegmentLabel>,
    raw_labels: Vec<String>,
    feature_names: Vec<&'static str>,
    scaler_mean: Vec<f64>,
    scaler_scale: Vec<f64>,
    trees: Vec<Tree>,
}

impl DecisionForest {
    /// Load and validate a model file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let forest = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            trees = forest.tree_count(),
            labels = forest.labels.len(),
            features = forest.feature_names.len(),
            "Decision forest loaded"
        );
        Ok(forest)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let raw: RawForest = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawForest) -> Result<Self, ModelError> {
        if raw.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".into()));
        }
        if raw.labels.is_empty() {
            return Err(ModelError::Invalid("forest has no labels".into()));
        }
        let n_features = raw.feature_names.len();
        if n_features == 0 {
            return Err(ModelError::Invalid("forest has no features".into()));
        }
        if raw.scaler_mean.len() != n_features || raw.scaler_scale.len() != n_features {
            return Err(ModelError::Invalid(format!(
                "scaler has {} means and {} scales for {n_features} features",
                raw.scaler_mean.len(),
                raw.scaler_scale.len()
            )));
        }

        let feature_names = raw
            .feature_names
            .iter()
            .map(|name| {
                canonical_feature_name(name).ok_or_else(|| ModelError::UnknownFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let labels: Vec<SegmentLabel> = raw
            .labels
            .iter()
            .map(|name| {
                let label = SegmentLabel::from_model_label(name);
                if label == SegmentLabel::Unclassified && !name.eq_ignore_ascii_case("unclassified") {
                    warn!(
                        label = %name,
                        "Model label has no SegmentLabel counterpart, predictions map to Unclassified"
                    );
                }
                label
            })
            .collect();

        let trees = raw
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| Tree::from_raw(t, i, n_features, labels.len()))
            .collect::<Result<Vec<_>, _>>()?;

        // Zero scale would blow up the division
        let scaler_scale = raw
            .scaler_scale
            .iter()
            .map(|s| if s.abs() < EPSILON || !s.is_finite() { 1.0 } else { *s })
            .collect();

        Ok(Self {
            labels,
            raw_labels: raw.labels,
            feature_names,
            scaler_mean: raw.scaler_mean,
            scaler_scale,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn labels(&self) -> &[SegmentLabel] {
        &self.labels
    }

    /// Label strings exactly as they appear in the model file.
    pub fn raw_labels(&self) -> &[String] {
        &self.raw_labels
    }

    pub fn feature_names(&self) -> &[&'static str] {
        &self.feature_names
    }

    /// Raw (unscaled) model input vector for a segment.
    pub fn feature_vector(&self, features: &SegmentFeatures) -> Vec<f64> {
        self.feature_names
            .iter()
            .map(|name| features.value(name).unwrap_or(0.0))
            .collect()
    }

    fn scale(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .zip(self.scaler_mean.iter().zip(&self.scaler_scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    /// Majority-vote class index for a raw feature vector. Ties go to the
    /// lowest class index.
    pub fn predict_class(&self, raw: &[f64]) -> usize {
        let mut scaled = self.scale(raw);
        scaled.resize(self.feature_names.len(), 0.0);

        let mut votes = vec![0.0; self.labels.len()];
        for tree in &self.trees {
            votes[tree.predict(&scaled)] += 1.0;
        }
        argmax(&votes)
    }

    pub fn predict_label(&self, features: &SegmentFeatures) -> SegmentLabel {
        let class = self.predict_class(&self.feature_vector(features));
        self.labels[class]
    }
}
