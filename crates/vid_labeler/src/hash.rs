//! Deterministic hash primitives
//!
//! Every probabilistic decision in a model is driven by these functions, so they
//! must agree bit-for-bit with every other labeler implementation:
//! - `fingerprint64`: FarmHash Fingerprint64 of the UTF-8 bytes
//! - `unit_hash`: fingerprint mapped into `[0, 1]`
//! - `exp_hash`: `-ln(unit_hash)`, an Exp(1) variate

/// FarmHash Fingerprint64 of `s`.
pub fn fingerprint64(s: &str) -> u64 {
    farmhash::fingerprint64(s.as_bytes())
}

/// Maps `fingerprint64(s)` uniformly into `[0, 1]`.
pub fn unit_hash(s: &str) -> f64 {
    fingerprint64(s) as f64 / u64::MAX as f64
}

/// Exponentially distributed hash of `s`.
pub fn exp_hash(s: &str) -> f64 {
    -unit_hash(s).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_of_empty_string_is_farmhash_constant() {
        assert_eq!(fingerprint64(""), 0x9ae1_6a3b_2f90_404f);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint64("seed-1"), fingerprint64("seed-1"));
        assert_ne!(fingerprint64("seed-1"), fingerprint64("seed-2"));
    }

    #[test]
    fn unit_hash_in_range() {
        for i in 0..1000 {
            let v = unit_hash(&i.to_string());
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn exp_hash_is_non_negative_with_unit_mean() {
        let n = 10_000;
        let sum: f64 = (0..n).map(|i| exp_hash(&format!("exp-{i}"))).sum();
        let mean = sum / n as f64;
        assert!(mean > 0.95 && mean < 1.05, "mean = {mean}");
    }
}
