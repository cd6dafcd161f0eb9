use crate::{DiffError, NumericComparator};
use nrtest_domain::duration_deviation;
use nrtest_types::Deviation;

/// Wall-clock regression of a test run. A speed-up never counts against the
/// candidate.
#[derive(Debug)]
pub struct DurationDiff {
    value: f64,
}

impl DurationDiff {
    pub fn new(candidate_s: f64, reference_s: f64) -> Result<Self, DiffError> {
        Ok(Self {
            value: duration_deviation(candidate_s, reference_s)?,
        })
    }
}

impl NumericComparator for DurationDiff {
    fn deviation(&self) -> Deviation {
        Deviation {
            max: self.value,
            min: self.value,
            mean: self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slowdown_is_reported_as_fraction() {
        let d = DurationDiff::new(12.0, 10.0).unwrap().deviation();
        assert!((d.max - 0.2).abs() < 1e-12);
        assert_eq!(d.max, d.min);
        assert_eq!(d.max, d.mean);
    }

    #[test]
    fn speedup_is_zero() {
        assert_eq!(DurationDiff::new(5.0, 10.0).unwrap().deviation().max, 0.0);
    }

    #[test]
    fn zero_reference_is_rejected() {
        assert!(matches!(
            DurationDiff::new(1.0, 0.0),
            Err(DiffError::Domain(_))
        ));
    }
}
