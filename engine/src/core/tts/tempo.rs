//! Pitch-preserving speed change through chained `atempo` stages.
//!
//! A single `atempo` stage accepts factors in [0.5, 2.0]. Larger or smaller
//! factors are reached by multiplying stages.

const MAX_STAGE: f64 = 2.0;
const MIN_STAGE: f64 = 0.5;

/// Per-stage factors whose product equals `speed`
pub fn atempo_stages(speed: f64) -> Vec<f64> {
    if !speed.is_finite() || speed <= 0.0 {
        return Vec::new();
    }

    let mut stages = Vec::new();
    let mut remaining = speed;
    while remaining > MAX_STAGE {
        stages.push(MAX_STAGE);
        remaining /= MAX_STAGE;
    }
    while remaining < MIN_STAGE {
        stages.push(MIN_STAGE);
        remaining /= MIN_STAGE;
    }
    stages.push(remaining);
    stages
}

/// FFmpeg filter string for `speed`, or `None` when no change is needed
pub fn atempo_filter(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() < f64::EPSILON {
        return None;
    }

    let stages = atempo_stages(speed);
    match stages.as_slice() {
        [] => None,
        [single] => Some(format!("atempo={}", single)),
        [chained @ .., last] => {
            let mut parts: Vec<String> = chained
                .iter()
                .map(|stage| format!("atempo={:.1}", stage))
                .collect();
            parts.push(format!("atempo={:.4}", last));
            Some(parts.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_stage() {
        assert_eq!(atempo_filter(1.5).as_deref(), Some("atempo=1.5"));
        assert_eq!(atempo_filter(0.75).as_deref(), Some("atempo=0.75"));
    }

    #[test]
    fn test_unit_speed_is_noop() {
        assert_eq!(atempo_filter(1.0), None);
    }

    #[test]
    fn test_chain_above_two() {
        assert_eq!(
            atempo_filter(3.0).as_deref(),
            Some("atempo=2.0,atempo=1.5000")
        );
        assert_eq!(
            atempo_filter(5.0).as_deref(),
            Some("atempo=2.0,atempo=2.0,atempo=1.2500")
        );
    }

    #[test]
    fn test_chain_below_half() {
        assert_eq!(
            atempo_filter(0.25).as_deref(),
            Some("atempo=0.5,atempo=0.5000")
        );
    }

    #[test]
    fn test_stage_product_matches_speed() {
        for speed in [0.3, 0.5, 1.25, 2.0, 2.5, 4.0, 7.3] {
            let stages = atempo_stages(speed);
            let product: f64 = stages.iter().product();
            assert!((product - speed).abs() < 1e-9, "speed {}", speed);
            assert!(stages.iter().all(|s| (MIN_STAGE..=MAX_STAGE).contains(s)));
        }
    }

    #[test]
    fn test_invalid_speed() {
        assert!(atempo_stages(0.0).is_empty());
        assert!(atempo_filter(-1.0).is_none());
    }
}
