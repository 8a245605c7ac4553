//! Coarse quantizer training.
//!
//! This module provides seeded k-means clustering used to train the coarse
//! quantizer of an IVF index: `num_lists` centroids over the embedding
//! space, with assignment by nearest centroid under squared L2.
//!
//! Training is deterministic for a fixed seed, which makes independently
//! trained quantizers comparable in tests and across processes.

use crate::distance::l2_squared;
use crate::error::VectorError;

/// Configuration for k-means training.
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Maximum number of Lloyd iterations.
    pub max_iterations: usize,
    /// Convergence threshold (stop once the largest centroid movement falls
    /// below it).
    pub convergence_threshold: f32,
    /// Random seed for reproducible training.
    pub seed: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self { max_iterations: 25, convergence_threshold: 1e-6, seed: None }
    }
}

impl KMeansConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the convergence threshold.
    #[must_use]
    pub const fn with_convergence_threshold(mut self, threshold: f32) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A trained coarse quantizer: a flat table of centroids searched
/// exhaustively under squared L2.
#[derive(Debug, Clone)]
pub struct FlatQuantizer {
    centroids: Vec<Vec<f32>>,
    dim: usize,
}

impl FlatQuantizer {
    /// Train a quantizer with `num_lists` centroids on the given data.
    ///
    /// # Arguments
    ///
    /// - `dim`: Dimensionality of the embedding space
    /// - `num_lists`: Number of centroids to produce
    /// - `data`: Training vectors, each of dimension `dim`
    /// - `config`: Training configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `num_lists` is zero, there are fewer training
    /// points than centroids, or a training vector has the wrong dimension.
    pub fn train(
        dim: usize,
        num_lists: usize,
        data: &[&[f32]],
        config: &KMeansConfig,
    ) -> Result<Self, VectorError> {
        if num_lists == 0 {
            return Err(VectorError::InvalidParameter("num_lists must be positive"));
        }
        if data.len() < num_lists {
            return Err(VectorError::NotEnoughTraining { points: data.len(), lists: num_lists });
        }
        for v in data {
            if v.len() != dim {
                return Err(VectorError::DimensionMismatch { expected: dim, actual: v.len() });
            }
        }

        let mut rng_state = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(42)
        });
        // Xorshift state must be non-zero.
        if rng_state == 0 {
            rng_state = 0x9E37_79B9_7F4A_7C15;
        }

        let mut centroids = Self::plus_plus_init(data, num_lists, &mut rng_state);
        let mut assignments = vec![0usize; data.len()];

        for _ in 0..config.max_iterations {
            Self::assign_clusters(data, &centroids, &mut assignments);
            let new_centroids = Self::update_centroids(data, &assignments, num_lists, dim);
            let max_movement = Self::max_centroid_movement(&centroids, &new_centroids);
            centroids = new_centroids;

            if max_movement < config.convergence_threshold {
                break;
            }
        }

        Ok(Self { centroids, dim })
    }

    /// Build a quantizer from pre-computed centroids.
    ///
    /// # Errors
    ///
    /// Returns an error if the centroid list is empty or the centroids have
    /// inconsistent dimensions.
    pub fn from_centroids(centroids: Vec<Vec<f32>>) -> Result<Self, VectorError> {
        let dim = match centroids.first() {
            Some(c) => c.len(),
            None => return Err(VectorError::InvalidParameter("centroid list is empty")),
        };
        for c in &centroids {
            if c.len() != dim {
                return Err(VectorError::DimensionMismatch { expected: dim, actual: c.len() });
            }
        }
        Ok(Self { centroids, dim })
    }

    /// The dimensionality of the quantized space.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The number of centroids (inverted lists).
    #[must_use]
    pub fn num_lists(&self) -> usize {
        self.centroids.len()
    }

    /// A centroid by index.
    #[must_use]
    pub fn centroid(&self, list_no: usize) -> Option<&[f32]> {
        self.centroids.get(list_no).map(Vec::as_slice)
    }

    /// Assign a vector to its nearest centroid.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] if the vector does not
    /// have the quantizer's dimension.
    pub fn assign(&self, vector: &[f32]) -> Result<usize, VectorError> {
        if vector.len() != self.dim {
            return Err(VectorError::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }

        let mut min_dist = f32::MAX;
        let mut min_idx = 0;
        for (i, centroid) in self.centroids.iter().enumerate() {
            let dist = l2_squared(vector, centroid);
            if dist < min_dist {
                min_dist = dist;
                min_idx = i;
            }
        }
        Ok(min_idx)
    }

    /// The `count` centroids nearest to the vector, by ascending distance
    /// (ties broken by centroid index).
    #[must_use]
    pub(crate) fn nearest_lists(&self, vector: &[f32], count: usize) -> Vec<usize> {
        let mut scored: Vec<(f32, usize)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (l2_squared(vector, c), i))
            .collect();
        scored.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(count);
        scored.into_iter().map(|(_, i)| i).collect()
    }

    /// K-means++ initialization: select initial centroids with probability
    /// proportional to squared distance from existing centroids.
    fn plus_plus_init(data: &[&[f32]], k: usize, rng_state: &mut u64) -> Vec<Vec<f32>> {
        let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);

        let first_idx = random_index(rng_state, data.len());
        centroids.push(data[first_idx].to_vec());

        for _ in 1..k {
            let mut distances: Vec<f32> = Vec::with_capacity(data.len());
            let mut total_dist = 0.0f32;

            for point in data {
                let min_dist = centroids
                    .iter()
                    .map(|c| l2_squared(point, c))
                    .fold(f32::MAX, f32::min);
                distances.push(min_dist);
                total_dist += min_dist;
            }

            if total_dist <= 0.0 {
                // All points coincide with existing centroids.
                let idx = random_index(rng_state, data.len());
                centroids.push(data[idx].to_vec());
            } else {
                let threshold = random_f32(rng_state) * total_dist;
                let mut cumsum = 0.0f32;
                let mut selected_idx = data.len() - 1;

                for (i, &d) in distances.iter().enumerate() {
                    cumsum += d;
                    if cumsum >= threshold {
                        selected_idx = i;
                        break;
                    }
                }

                centroids.push(data[selected_idx].to_vec());
            }
        }

        centroids
    }

    /// Assign each data point to its nearest centroid.
    fn assign_clusters(data: &[&[f32]], centroids: &[Vec<f32>], assignments: &mut [usize]) {
        for (i, point) in data.iter().enumerate() {
            let mut min_dist = f32::MAX;
            let mut min_idx = 0;
            for (j, centroid) in centroids.iter().enumerate() {
                let dist = l2_squared(point, centroid);
                if dist < min_dist {
                    min_dist = dist;
                    min_idx = j;
                }
            }
            assignments[i] = min_idx;
        }
    }

    /// Update centroids to the mean of their assigned points.
    fn update_centroids(
        data: &[&[f32]],
        assignments: &[usize],
        k: usize,
        dim: usize,
    ) -> Vec<Vec<f32>> {
        let mut new_centroids = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];

        for (point, &cluster) in data.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (j, &val) in point.iter().enumerate() {
                new_centroids[cluster][j] += val;
            }
        }

        for (centroid, &count) in new_centroids.iter_mut().zip(counts.iter()) {
            if count > 0 {
                let count_f32 = count as f32;
                for val in centroid.iter_mut() {
                    *val /= count_f32;
                }
            }
        }

        // Reseed empty clusters from the data so every list stays usable.
        for (i, centroid) in new_centroids.iter_mut().enumerate() {
            if counts[i] == 0 && !data.is_empty() {
                centroid.copy_from_slice(data[i % data.len()]);
            }
        }

        new_centroids
    }

    /// Largest centroid movement between two iterations.
    fn max_centroid_movement(old: &[Vec<f32>], new: &[Vec<f32>]) -> f32 {
        old.iter()
            .zip(new.iter())
            .map(|(o, n)| l2_squared(o, n).sqrt())
            .fold(0.0f32, f32::max)
    }
}

/// Simple xorshift64 PRNG.
#[inline]
fn random_u64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// Random index in `[0, max)`.
#[inline]
fn random_index(state: &mut u64, max: usize) -> usize {
    (random_u64(state) as usize) % max
}

/// Random f32 in `[0, 1)`.
#[inline]
fn random_f32(state: &mut u64) -> f32 {
    (random_u64(state) as f64 / u64::MAX as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_obvious_clusters() {
        let data: Vec<Vec<f32>> = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![0.2, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
            vec![10.2, 10.0],
        ];
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();

        let q = FlatQuantizer::train(2, 2, &refs, &KMeansConfig::new().with_seed(42))
            .expect("train");

        assert_eq!(q.num_lists(), 2);
        assert_eq!(q.dim(), 2);

        let near = q.assign(&[0.05, 0.05]).expect("assign");
        let far = q.assign(&[10.05, 10.05]).expect("assign");
        assert_ne!(near, far);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let data: Vec<Vec<f32>> =
            (0..32).map(|i| vec![i as f32, (i * 7 % 13) as f32, (i * 3 % 5) as f32]).collect();
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        let config = KMeansConfig::new().with_seed(7);

        let a = FlatQuantizer::train(3, 4, &refs, &config).expect("train a");
        let b = FlatQuantizer::train(3, 4, &refs, &config).expect("train b");

        for i in 0..4 {
            assert_eq!(a.centroid(i), b.centroid(i));
        }
        for v in &refs {
            assert_eq!(a.assign(v).expect("assign"), b.assign(v).expect("assign"));
        }
    }

    #[test]
    fn rejects_undersized_training_set() {
        let data: Vec<Vec<f32>> = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();

        assert!(matches!(
            FlatQuantizer::train(2, 10, &refs, &KMeansConfig::new().with_seed(42)),
            Err(VectorError::NotEnoughTraining { points: 2, lists: 10 })
        ));
    }

    #[test]
    fn rejects_wrong_dimension() {
        let data: Vec<Vec<f32>> = vec![vec![1.0, 2.0], vec![3.0, 4.0, 5.0]];
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();

        assert!(matches!(
            FlatQuantizer::train(2, 1, &refs, &KMeansConfig::new()),
            Err(VectorError::DimensionMismatch { expected: 2, actual: 3 })
        ));

        let q = FlatQuantizer::from_centroids(vec![vec![0.0, 0.0]]).expect("build");
        assert!(q.assign(&[1.0]).is_err());
    }

    #[test]
    fn nearest_lists_ordered_by_distance() {
        let q = FlatQuantizer::from_centroids(vec![
            vec![0.0, 0.0],
            vec![5.0, 0.0],
            vec![1.0, 0.0],
        ])
        .expect("build");

        assert_eq!(q.nearest_lists(&[0.4, 0.0], 3), vec![0, 2, 1]);
        assert_eq!(q.nearest_lists(&[0.4, 0.0], 2), vec![0, 2]);
    }
}
