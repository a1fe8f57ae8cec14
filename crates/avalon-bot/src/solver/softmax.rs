//! Turning move values into move probabilities.

/// Relative tolerance within which two values count as tied.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// Quantal response: `exp(beta * v)` normalised, computed with the maximum
/// subtracted. `beta = inf` gives a best response.
pub fn softmax(values: &[f64], beta: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    if beta.is_infinite() {
        return best_response(values);
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = values.iter().map(|v| (beta * (v - max)).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Uniform over the maximisers, zero elsewhere.
pub fn best_response(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let slack = TIE_TOLERANCE * max.abs().max(1.0);
    let winners = values.iter().filter(|v| max - **v <= slack).count();
    values
        .iter()
        .map(|v| {
            if max - *v <= slack {
                1.0 / winners as f64
            } else {
                0.0
            }
        })
        .collect()
}

/// Trembling hand: mixes `probs` with the uniform distribution.
pub fn tremble(probs: &mut [f64], epsilon: f64) {
    if epsilon <= 0.0 || probs.is_empty() {
        return;
    }
    let floor = epsilon / probs.len() as f64;
    for p in probs.iter_mut() {
        *p = (1.0 - epsilon) * *p + floor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn zero_beta_is_uniform() {
        assert!(close(&softmax(&[1.0, 5.0, -3.0], 0.0), &[1.0 / 3.0; 3]));
    }

    #[test]
    fn softmax_survives_large_values() {
        let probs = softmax(&[1000.0, 1000.0, -1000.0], 1.0);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!(probs[2] < 1e-300);
    }

    #[test]
    fn softmax_matches_closed_form() {
        let probs = softmax(&[0.0, 2f64.ln()], 1.0);
        assert!(close(&probs, &[1.0 / 3.0, 2.0 / 3.0]));
    }

    #[test]
    fn best_response_splits_ties() {
        assert!(close(&softmax(&[2.0, 1.0, 2.0], f64::INFINITY), &[0.5, 0.0, 0.5]));
        assert!(close(&best_response(&[-1.0]), &[1.0]));
    }

    #[test]
    fn tremble_mixes_with_uniform() {
        let mut probs = vec![1.0, 0.0];
        tremble(&mut probs, 0.2);
        assert!(close(&probs, &[0.9, 0.1]));
        let mut untouched = vec![0.3, 0.7];
        tremble(&mut untouched, 0.0);
        assert!(close(&untouched, &[0.3, 0.7]));
    }
}
