//! Fitness shaping applied by a driver before `tell`.
//!
//! Strategies minimize raw fitness.  Shaping transforms the raw batch into
//! a better conditioned signal: rank transforms are invariant to monotone
//! rescaling of the objective, z-scoring keeps magnitudes but removes scale.
extern crate float_ord;

use self::float_ord::FloatOrd;

use crate::population::Population;

/// Settings for fitness shaping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessShaper {
    /// Replaces fitness by its centered rank in `[-0.5, 0.5]`
    pub centered_rank: bool,

    /// Whitens the fitness.  Ignored when `centered_rank` is set.
    pub z_score: bool,

    /// Adds `weight_decay * mean(x^2)` per member
    pub weight_decay: f32,

    /// Negates the fitness so that larger raw values are preferred
    pub maximize: bool,
}

impl Default for FitnessShaper {
    fn default() -> Self {
        FitnessShaper {
            centered_rank: false,
            z_score: false,
            weight_decay: 0.0,
            maximize: false,
        }
    }
}

impl FitnessShaper {
    /// Shapes a batch.  The result is to be minimized.
    pub fn apply(&self, x: &Population, fitness: &[f32]) -> Vec<f32> {
        let mut scores: Vec<f32> = if self.maximize {
            fitness.iter().map(|f| -f).collect()
        } else {
            fitness.to_vec()
        };

        if self.weight_decay != 0. {
            for (s, row) in scores.iter_mut().zip(x.rows()) {
                let l2 = row.iter().map(|v| v * v).sum::<f32>() / row.len().max(1) as f32;
                *s += self.weight_decay * l2;
            }
        }

        if self.centered_rank {
            centered_ranks(&mut scores);
        } else if self.z_score {
            z_score(&mut scores);
        }
        scores
    }
}

// Replaces each score with its rank, scaled into [-0.5, 0.5].  The lowest
// score maps to -0.5.
fn centered_ranks(scores: &mut [f32]) {
    let len = scores.len();
    if len < 2 {
        for s in scores.iter_mut() {
            *s = 0.;
        }
        return;
    }
    let mut i_scores: Vec<(usize, f32)> = scores.iter().cloned().enumerate().collect();
    i_scores.sort_by_key(|(_i, s)| FloatOrd(*s));
    let denom = (len - 1) as f32;
    for (rank, (i, _s)) in i_scores.into_iter().enumerate() {
        scores[i] = rank as f32 / denom - 0.5;
    }
}

// Whitens the scores
fn z_score(scores: &mut [f32]) {
    let n_scores = scores.len() as f32;
    if n_scores == 0. {
        return;
    }

    let mu = scores.iter().sum::<f32>() / n_scores;
    let var: f32 = scores.iter().map(|v| (v - mu).powi(2)).sum::<f32>() / n_scores;
    let std = var.sqrt();

    // If everything is the same, nothing is preferred
    if std == 0f32 {
        for s in scores.iter_mut() {
            *s = 0f32;
        }
    } else {
        let denom = std + 1e-10;
        for s in scores.iter_mut() {
            *s = (*s - mu) / denom;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> Population {
        Population::zeros(n, 2)
    }

    #[test]
    fn test_identity() {
        let shaper = FitnessShaper::default();
        let scores = shaper.apply(&batch(3), &[3., -1., 2.]);
        assert_eq!(scores, vec![3., -1., 2.]);
    }

    #[test]
    fn test_znorm() {
        let shaper = FitnessShaper {
            z_score: true,
            ..FitnessShaper::default()
        };
        let scores = shaper.apply(&batch(3), &[-1.0, 0.0, 0.5]);
        let predicted = vec![-1.33630621, 0.26726124, 1.06904497];
        for i in 0..scores.len() {
            assert!((scores[i] - predicted[i]).abs() < 1e-5);
        }

        let flat = shaper.apply(&batch(2), &[4., 4.]);
        assert_eq!(flat, vec![0., 0.]);
    }

    #[test]
    fn test_centered_rank() {
        let shaper = FitnessShaper {
            centered_rank: true,
            ..FitnessShaper::default()
        };
        let scores = shaper.apply(&batch(5), &[0., 0.1, 0.05, 0.7, 0.2]);
        assert_eq!(scores, vec![-0.5, 0., -0.25, 0.5, 0.25]);
    }

    #[test]
    fn test_maximize_rank() {
        let shaper = FitnessShaper {
            centered_rank: true,
            maximize: true,
            ..FitnessShaper::default()
        };
        let scores = shaper.apply(&batch(3), &[1., 3., 2.]);
        assert_eq!(scores, vec![0.5, -0.5, 0.]);
    }

    #[test]
    fn test_weight_decay() {
        let x = Population::from_rows(&[vec![1., 1.], vec![2., 0.]]).unwrap();
        let shaper = FitnessShaper {
            weight_decay: 0.5,
            ..FitnessShaper::default()
        };
        let scores = shaper.apply(&x, &[0., 1.]);
        assert_eq!(scores, vec![0.5, 2.]);
    }
}
