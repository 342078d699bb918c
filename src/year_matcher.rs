//! Inclusive year ranges with open/symbolic bounds, used to gate whether an
//! [`crate::operation::Operation`] applies in a given simulation year.

use serde::{Deserialize, Serialize};

/// One bound of a [`YearMatcher`] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearBound {
    /// A concrete year.
    Year(i64),
    /// `beginning`: no lower bound.
    Beginning,
    /// `onwards`: no upper bound.
    Onwards,
}

/// An inclusive `[start, end]` range over integer years.
///
/// Either bound may be absent (unbounded) or carry the symbolic markers
/// `beginning`/`onwards` from the DSL, both of which collapse to "no bound"
/// here. Construction normalizes the pair so that when both bounds are
/// concrete, `start <= end` always holds (swapped otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearMatcher {
    start: Option<i64>,
    end: Option<i64>,
}

impl YearMatcher {
    /// Builds a matcher from two optional bounds, normalizing symbolic
    /// markers to `None` and swapping concrete bounds that arrive inverted.
    pub fn new(start: Option<YearBound>, end: Option<YearBound>) -> Self {
        let start = match start {
            Some(YearBound::Year(y)) => Some(y),
            Some(YearBound::Beginning) | None => None,
            Some(YearBound::Onwards) => None,
        };
        let end = match end {
            Some(YearBound::Year(y)) => Some(y),
            Some(YearBound::Onwards) | None => None,
            Some(YearBound::Beginning) => None,
        };
        match (start, end) {
            (Some(s), Some(e)) if s > e => Self { start: Some(e), end: Some(s) },
            _ => Self { start, end },
        }
    }

    /// A matcher with no constraint on either end — matches every year.
    pub fn unbounded() -> Self {
        Self { start: None, end: None }
    }

    /// A matcher built directly from concrete bounds (convenience for tests
    /// and callers that already normalized their input).
    pub fn range(start: i64, end: i64) -> Self {
        if start <= end {
            Self { start: Some(start), end: Some(end) }
        } else {
            Self { start: Some(end), end: Some(start) }
        }
    }

    pub fn start(&self) -> Option<i64> {
        self.start
    }

    pub fn end(&self) -> Option<i64> {
        self.end
    }

    /// Whether `year` falls within `[start, end]`, treating an absent bound
    /// as unconstrained on that side.
    pub fn in_range(&self, year: i64) -> bool {
        self.start.is_none_or(|s| year >= s) && self.end.is_none_or(|e| year <= e)
    }
}

impl Default for YearMatcher {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_matches_everything() {
        let m = YearMatcher::unbounded();
        assert!(m.in_range(1900));
        assert!(m.in_range(3000));
    }

    #[test]
    fn concrete_range_is_inclusive() {
        let m = YearMatcher::range(2025, 2030);
        assert!(m.in_range(2025));
        assert!(m.in_range(2030));
        assert!(!m.in_range(2024));
        assert!(!m.in_range(2031));
    }

    #[test]
    fn inverted_bounds_are_swapped_on_construction() {
        let m = YearMatcher::range(2030, 2025);
        assert_eq!(m.start(), Some(2025));
        assert_eq!(m.end(), Some(2030));
    }

    #[test]
    fn symbolic_bounds_collapse_to_unbounded_side() {
        let m = YearMatcher::new(Some(YearBound::Beginning), Some(YearBound::Year(2030)));
        assert!(m.in_range(1900));
        assert!(m.in_range(2030));
        assert!(!m.in_range(2031));

        let m = YearMatcher::new(Some(YearBound::Year(2020)), Some(YearBound::Onwards));
        assert!(!m.in_range(2019));
        assert!(m.in_range(2020));
        assert!(m.in_range(9999));
    }

    /// Property #5: monotone containment under bound widening.
    #[test]
    fn in_range_is_monotone_under_widening() {
        let narrow = YearMatcher::range(2025, 2030);
        let wide = YearMatcher::range(2020, 2035);
        for y in 2020..=2035 {
            if narrow.in_range(y) {
                assert!(wide.in_range(y), "widened range must still contain {y}");
            }
        }
    }
}
