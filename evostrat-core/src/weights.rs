//! Rank-based recombination weights.
//!
//! Weights are indexed by rank: index 0 belongs to the member with the lowest
//! fitness.

/// Log-rank weights `max(0, ln(P/2 + 1) - ln(rank))`, normalized to sum to one
/// and optionally shifted by the `1/P` baseline so that they sum to zero.
pub fn snes_weights(popsize: usize, use_baseline: bool) -> Vec<f32> {
    let log_len = (popsize as f32 / 2. + 1.).ln();
    let noms: Vec<f32> = (1..=popsize)
        .map(|rank| (0f32).max(log_len - (rank as f32).ln()))
        .collect();

    let sum: f32 = noms.iter().sum();
    let baseline = if use_baseline {
        1. / popsize as f32
    } else {
        0.
    };
    noms.into_iter().map(|n| n / sum - baseline).collect()
}

/// Temperature-sharpened rank weights of the discovered ES family.  Ranks are
/// spread over `u` in `[-0.5, 0.5]` and the weights are
/// `softmax(-20 * sigmoid(temperature * u))`, so larger temperatures put more
/// mass on the best members.  The weights sum to one.
pub fn temperature_weights(popsize: usize, temperature: f32) -> Vec<f32> {
    if popsize <= 1 {
        return vec![1f32; popsize];
    }
    let denom = (popsize - 1) as f32;
    let logits: Vec<f32> = (0..popsize)
        .map(|r| {
            let u = r as f32 / denom - 0.5;
            -20. / (1. + (-temperature * u).exp())
        })
        .collect();
    // Shifted by the largest logit before exponentiating
    let top = logits.iter().cloned().fold(std::f32::MIN, f32::max);
    let sharpened: Vec<f32> = logits.iter().map(|l| (l - top).exp()).collect();
    let sum: f32 = sharpened.iter().sum();
    sharpened.into_iter().map(|w| w / sum).collect()
}
