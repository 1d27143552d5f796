//! Canonical orders of special values and version gated valid ranges.
//!
//! Generated lookup and validity code must not change between runs over the
//! same schema, so every order here is total and independent of the order
//! the values were declared in.

use commsdsl_parse::{EnumValue, NOT_YET_DEPRECATED, SpecialValue, ValidRange};
use std::cmp::Ordering;

/// Rank of a floating point value: NaN, then +inf, then -inf, then finite values.
fn float_rank(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else if value == f64::INFINITY {
        1
    } else if value == f64::NEG_INFINITY {
        2
    } else {
        3
    }
}

/// Compares floating point values in canonical order.
#[must_use]
pub fn cmp_float_values(a: f64, b: f64) -> Ordering {
    let (rank_a, rank_b) = (float_rank(a), float_rank(b));
    if rank_a != rank_b || rank_a < 3 {
        return rank_a.cmp(&rank_b);
    }
    a.total_cmp(&b)
}

/// Value type of valid ranges.
pub trait RangeValue: Copy {
    /// Compares two values in canonical order.
    fn cmp_value(&self, other: &Self) -> Ordering;
}

impl RangeValue for i128 {
    fn cmp_value(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl RangeValue for f64 {
    fn cmp_value(&self, other: &Self) -> Ordering {
        cmp_float_values(*self, *other)
    }
}

fn sorted_indices<T>(items: &[T], cmp: impl Fn(&T, &T) -> Ordering) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.sort_by(|a, b| cmp(&items[*a], &items[*b]));
    indices
}

/// Order of special values: canonical value order, then name.
#[must_use]
pub fn sort_specials<T: RangeValue>(specials: &[SpecialValue<T>]) -> Vec<usize> {
    sorted_indices(specials, |a, b| {
        a.value
            .cmp_value(&b.value)
            .then_with(|| a.name.cmp(&b.name))
    })
}

/// Order of enum values: ascending value, then name.
#[must_use]
pub fn sort_enum_values(values: &[EnumValue]) -> Vec<usize> {
    sorted_indices(values, |a, b| {
        a.value.cmp(&b.value).then_with(|| a.name.cmp(&b.name))
    })
}

/// Versions a group of ranges is valid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionGuard {
    /// Valid in versions before the given one.
    Until(u32),
    /// Valid from the given version on.
    From(u32),
    /// Valid in `[from, until)`.
    Between {
        /// First valid version.
        from: u32,
        /// First version the ranges are no longer valid in.
        until: u32,
    },
}

impl VersionGuard {
    fn new(since: u32, deprecated: u32) -> Self {
        if since == 0 {
            Self::Until(deprecated)
        } else if deprecated == NOT_YET_DEPRECATED {
            Self::From(since)
        } else {
            Self::Between {
                from: since,
                until: deprecated,
            }
        }
    }

    /// Returns true if the guard admits `version`.
    #[must_use]
    pub fn admits(&self, version: u32) -> bool {
        match *self {
            Self::Until(until) => version < until,
            Self::From(from) => from <= version,
            Self::Between { from, until } => from <= version && version < until,
        }
    }
}

/// Valid ranges sharing one version interval.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeGroup<T> {
    pub guard: VersionGuard,
    pub ranges: Vec<ValidRange<T>>,
}

/// Valid ranges split into version independent and version gated parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRangeGroups<T> {
    /// Ranges valid whenever the field exists.
    pub independent: Vec<ValidRange<T>>,
    /// Ranges valid in some versions only, in canonical order.
    pub gated: Vec<RangeGroup<T>>,
}

impl<T> Default for ValidRangeGroups<T> {
    fn default() -> Self {
        Self {
            independent: Vec::new(),
            gated: Vec::new(),
        }
    }
}

impl<T> ValidRangeGroups<T> {
    /// Returns true if validity depends on the version.
    #[must_use]
    pub fn is_version_dependent(&self) -> bool {
        !self.gated.is_empty()
    }
}

/// Splits the valid ranges of a field living in `[since, deprecated)`.
///
/// Without `check_version`, or when every range covers the field's own
/// interval, all ranges are version independent and keep their order.
#[must_use]
pub fn group_valid_ranges<T: RangeValue>(
    ranges: &[ValidRange<T>],
    since: u32,
    deprecated: u32,
    check_version: bool,
) -> ValidRangeGroups<T> {
    let own_interval =
        |r: &ValidRange<T>| r.since_version == since && r.deprecated_since == deprecated;
    if !check_version || ranges.iter().all(own_interval) {
        return ValidRangeGroups {
            independent: ranges.to_vec(),
            gated: Vec::new(),
        };
    }

    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| {
        a.since_version
            .cmp(&b.since_version)
            .then_with(|| b.deprecated_since.cmp(&a.deprecated_since))
            .then_with(|| a.min.cmp_value(&b.min))
            .then_with(|| a.max.cmp_value(&b.max))
    });

    let (independent, rest): (Vec<_>, Vec<_>) = sorted.into_iter().partition(own_interval);
    let mut gated: Vec<RangeGroup<T>> = Vec::new();
    for range in rest {
        let guard = VersionGuard::new(range.since_version, range.deprecated_since);
        match gated.last_mut() {
            Some(group) if group.guard == guard => group.ranges.push(range),
            _ => gated.push(RangeGroup {
                guard,
                ranges: vec![range],
            }),
        }
    }

    ValidRangeGroups { independent, gated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn special<T>(name: &str, value: T) -> SpecialValue<T> {
        SpecialValue {
            name: name.to_string(),
            value,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            description: String::new(),
            display_name: String::new(),
        }
    }

    fn range<T>(min: T, max: T, since: u32, deprecated: u32) -> ValidRange<T> {
        ValidRange {
            min,
            max,
            since_version: since,
            deprecated_since: deprecated,
        }
    }

    fn names<T>(specials: &[SpecialValue<T>], order: &[usize]) -> Vec<String> {
        order.iter().map(|i| specials[*i].name.clone()).collect()
    }

    #[test]
    fn test_float_special_order() {
        let specials = vec![
            special("Two", 2.0),
            special("Low", f64::NEG_INFINITY),
            special("B", f64::NAN),
            special("One", 1.0),
            special("High", f64::INFINITY),
            special("A", f64::NAN),
            special("AlsoOne", 1.0),
        ];
        let order = sort_specials(&specials);
        assert_eq!(
            names(&specials, &order),
            vec!["A", "B", "High", "Low", "AlsoOne", "One", "Two"]
        );
    }

    #[test]
    fn test_special_order_is_deterministic() {
        let first = vec![special("X", 5_i128), special("Y", -1), special("Z", 5)];
        let second = vec![special("Z", 5_i128), special("X", 5), special("Y", -1)];
        assert_eq!(
            names(&first, &sort_specials(&first)),
            names(&second, &sort_specials(&second))
        );
        assert_eq!(names(&first, &sort_specials(&first)), vec!["Y", "X", "Z"]);
    }

    #[test]
    fn test_enum_value_order() {
        let value = |name: &str, v: i128| EnumValue {
            name: name.to_string(),
            value: v,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            description: String::new(),
            display_name: String::new(),
        };
        let values = vec![value("C", 3), value("A", 1), value("B", 1)];
        assert_eq!(sort_enum_values(&values), vec![1, 2, 0]);
    }

    #[test]
    fn test_from_version_group() {
        let ranges = vec![
            range(0_i128, 10, 0, NOT_YET_DEPRECATED),
            range(20, 30, 2, NOT_YET_DEPRECATED),
        ];
        let groups = group_valid_ranges(&ranges, 0, NOT_YET_DEPRECATED, true);
        assert_eq!(groups.independent, vec![ranges[0]]);
        assert_eq!(groups.gated.len(), 1);
        assert_eq!(groups.gated[0].guard, VersionGuard::From(2));
        assert_eq!(groups.gated[0].ranges, vec![ranges[1]]);
        assert!(groups.is_version_dependent());
    }

    #[test]
    fn test_guards_and_adjacent_grouping() {
        let ranges = vec![
            range(50_i128, 60, 3, 5),
            range(0, 10, 0, NOT_YET_DEPRECATED),
            range(40, 45, 0, 4),
            range(30, 35, 0, 4),
            range(70, 80, 3, 5),
        ];
        let groups = group_valid_ranges(&ranges, 0, NOT_YET_DEPRECATED, true);
        assert_eq!(groups.independent.len(), 1);
        assert_eq!(groups.gated.len(), 2);
        assert_eq!(groups.gated[0].guard, VersionGuard::Until(4));
        assert_eq!(
            groups.gated[0].ranges.iter().map(|r| r.min).collect::<Vec<_>>(),
            vec![30, 40]
        );
        assert_eq!(groups.gated[1].guard, VersionGuard::Between { from: 3, until: 5 });
        assert_eq!(groups.gated[1].ranges.len(), 2);
        assert!(groups.gated[1].guard.admits(4));
        assert!(!groups.gated[1].guard.admits(5));
    }

    #[test]
    fn test_version_check_disabled() {
        let ranges = vec![
            range(20_i128, 30, 2, NOT_YET_DEPRECATED),
            range(0, 10, 0, NOT_YET_DEPRECATED),
        ];
        let groups = group_valid_ranges(&ranges, 0, NOT_YET_DEPRECATED, false);
        assert_eq!(groups.independent, ranges);
        assert!(!groups.is_version_dependent());
    }

    #[test]
    fn test_float_bounds_order() {
        let ranges = vec![
            range(1.0, 2.0, 1, NOT_YET_DEPRECATED),
            range(f64::INFINITY, f64::INFINITY, 1, NOT_YET_DEPRECATED),
        ];
        let groups = group_valid_ranges(&ranges, 0, NOT_YET_DEPRECATED, true);
        assert!(groups.independent.is_empty());
        let mins: Vec<f64> = groups.gated[0].ranges.iter().map(|r| r.min).collect();
        assert_eq!(mins, vec![f64::INFINITY, 1.0]);
    }
}
