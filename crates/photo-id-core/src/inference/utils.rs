//! Shared inference utilities.

/// Numerically stable two-class softmax, returning the probability of
/// the second class.
#[inline]
pub fn softmax2(background: f32, face: f32) -> f32 {
    let max = background.max(face);
    let eb = (background - max).exp();
    let ef = (face - max).exp();
    ef / (eb + ef)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax2_symmetric() {
        assert!((softmax2(1.0, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax2_dominant_face() {
        assert!(softmax2(-5.0, 5.0) > 0.999);
        assert!(softmax2(5.0, -5.0) < 0.001);
    }

    #[test]
    fn test_softmax2_large_logits_stable() {
        let p = softmax2(1000.0, 1001.0);
        assert!(p.is_finite());
        assert!(p > 0.5);
    }
}
