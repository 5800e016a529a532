//! Top-percentile selection by population
//!
//! For `N` cities and percentile `P` the cutoff rank is `k = ceil(P * N / 100)`.
//! The population of the k-th most populous city is the cutoff and every city
//! at or above it is kept, so ties at the boundary are all retained.
//! `P = 0` keeps nothing and `P = 100` keeps everything.

use crate::models::City;
use crate::{Result, TransitRatioError};

/// Reject percentiles outside `[0, 100]`
pub fn validate_percentile(percentile: f64) -> Result<()> {
    if !percentile.is_finite() || !(0.0..=100.0).contains(&percentile) {
        return Err(TransitRatioError::validation(format!(
            "percentile must be between 0 and 100, got {percentile}"
        )));
    }
    Ok(())
}

/// Number of cities the cutoff rank covers
#[must_use]
pub fn cutoff_rank(count: usize, percentile: f64) -> usize {
    let exact = percentile * count as f64 / 100.0;
    // drop float noise (2.2 * 1500 / 100 = 33.000000000000004) before rounding up
    let rank = ((exact * 1e9).round() / 1e9).ceil() as usize;
    rank.min(count)
}

/// Population a city needs to be kept, `None` when nothing is kept
#[must_use]
pub fn population_cutoff(cities: &[City], percentile: f64) -> Option<u64> {
    let k = cutoff_rank(cities.len(), percentile);
    if k == 0 {
        return None;
    }

    let mut populations: Vec<u64> = cities.iter().map(|c| c.population).collect();
    populations.sort_unstable_by(|a, b| b.cmp(a));
    Some(populations[k - 1])
}

/// Cities in the top `percentile` by population, in input order
pub fn top_percentile(cities: &[City], percentile: f64) -> Result<Vec<City>> {
    validate_percentile(percentile)?;

    let Some(cutoff) = population_cutoff(cities, percentile) else {
        return Ok(Vec::new());
    };

    Ok(cities
        .iter()
        .filter(|city| city.population >= cutoff)
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use rstest::rstest;

    fn city(name: &str, population: u64) -> City {
        City::new(
            name.to_string(),
            "ES".to_string(),
            GeoPoint::new(40.0, -3.0).unwrap(),
            population,
        )
    }

    fn ranked(n: u64) -> Vec<City> {
        (0..n).map(|i| city(&format!("city-{i}"), (n - i) * 1_000)).collect()
    }

    #[rstest]
    #[case(100, 5.0, 5)]
    #[case(100, 7.0, 7)]
    #[case(30, 5.0, 2)]
    #[case(10, 20.0, 2)]
    #[case(3, 50.0, 2)]
    #[case(7, 100.0, 7)]
    #[case(7, 0.0, 0)]
    #[case(1500, 2.2, 33)]
    #[case(750, 4.4, 33)]
    #[case(375, 8.8, 33)]
    #[case(1000, 0.15, 2)]
    #[case(0, 50.0, 0)]
    fn test_cutoff_rank(#[case] count: usize, #[case] percentile: f64, #[case] expected: usize) {
        assert_eq!(cutoff_rank(count, percentile), expected);
    }

    #[test]
    fn test_cutoff_rank_matches_integer_arithmetic() {
        for tenths in 1..1000usize {
            let percentile = tenths as f64 / 10.0;
            for count in 1..=2000usize {
                assert_eq!(
                    cutoff_rank(count, percentile),
                    (tenths * count).div_ceil(1000),
                    "{percentile}% of {count}"
                );
            }
        }
    }

    #[test]
    fn test_top_five_percent_of_distinct_populations() {
        let cities = ranked(100);
        let top = top_percentile(&cities, 5.0).unwrap();
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].name, "city-0");
        assert_eq!(top[4].name, "city-4");
    }

    #[test]
    fn test_zero_keeps_nothing_and_hundred_keeps_all() {
        let cities = ranked(12);
        assert!(top_percentile(&cities, 0.0).unwrap().is_empty());
        assert_eq!(top_percentile(&cities, 100.0).unwrap(), cities);
    }

    #[test]
    fn test_ties_at_cutoff_are_kept() {
        let cities = vec![
            city("a", 900),
            city("b", 500),
            city("c", 500),
            city("d", 100),
        ];
        // k = ceil(0.5 * 4) = 2 -> cutoff 500, both "b" and "c" qualify
        let top = top_percentile(&cities, 50.0).unwrap();
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_input_order_is_preserved() {
        let cities = vec![city("small", 10), city("big", 1_000), city("mid", 500)];
        let top = top_percentile(&cities, 66.0).unwrap();
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["big", "mid"]);
    }

    #[test]
    fn test_retained_dominate_dropped() {
        let populations = [12, 7, 7, 3, 99, 41, 41, 41, 8, 0, 5, 64];
        let cities: Vec<City> = populations
            .iter()
            .enumerate()
            .map(|(i, p)| city(&format!("c{i}"), *p))
            .collect();

        for percentile in [1.0, 10.0, 25.0, 33.3, 50.0, 75.0, 99.0] {
            let kept = top_percentile(&cities, percentile).unwrap();
            let dropped: Vec<&City> = cities.iter().filter(|c| !kept.contains(c)).collect();
            let min_kept = kept.iter().map(|c| c.population).min().unwrap();
            let max_dropped = dropped.iter().map(|c| c.population).max().unwrap_or(0);
            assert!(min_kept >= max_dropped, "percentile {percentile}");
            assert!(kept.len() >= cutoff_rank(cities.len(), percentile));
        }
    }

    #[rstest]
    #[case(-1.0)]
    #[case(101.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_invalid_percentile(#[case] percentile: f64) {
        let err = top_percentile(&ranked(3), percentile).unwrap_err();
        assert!(matches!(err, TransitRatioError::Validation { .. }));
    }
}
