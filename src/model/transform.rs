//! Turning raw margins into class probabilities.

/// Probabilities from a single margin: `[1 - p, p]`.
pub fn binary_probabilities(margin: f64) -> Vec<f64> {
    let p = sigmoid(margin);
    vec![1.0 - p, p]
}

/// Sigmoid clamped to [-500, 500] so `exp` cannot overflow.
pub fn sigmoid(x: f64) -> f64 {
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

/// Softmax in place, shifted by the row max.
///
/// Margins that overflowed to `+inf` split all the mass between
/// themselves. A row with no margin above `-inf` comes out uniform.
pub fn softmax_inplace(row: &mut [f64]) {
    if row.is_empty() {
        return;
    }

    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        let top = row.iter().filter(|x| **x == max).count() as f64;
        for x in row.iter_mut() {
            *x = if *x == max { 1.0 / top } else { 0.0 };
        }
        return;
    }

    let mut sum = 0.0;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }

    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}
