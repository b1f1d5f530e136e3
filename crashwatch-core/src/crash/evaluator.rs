/// True iff the change is known and at or below the (negative) threshold.
///
/// An unavailable or NaN change never triggers: a missing figure must not
/// deploy a tranche.
pub fn evaluate(percent_change: Option<f64>, threshold: f64) -> bool {
    match percent_change {
        Some(p) if !p.is_nan() => p <= threshold,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_at_and_below_threshold() {
        assert!(evaluate(Some(-4.0), -3.0));
        assert!(evaluate(Some(-3.0), -3.0));
        assert!(!evaluate(Some(-2.99), -3.0));
        assert!(!evaluate(Some(1.5), -3.0));
    }

    #[test]
    fn unavailable_never_triggers() {
        assert!(!evaluate(None, -3.0));
        assert!(!evaluate(Some(f64::NAN), -3.0));
    }
}
