//! Interval and annualized change intensity

use super::interval::IntervalChange;
use serde::{Deserialize, Serialize};

/// Endpoint years of one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearInterval {
    pub start: i32,
    pub end: i32,
}

impl YearInterval {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn years(&self) -> i32 {
        self.end - self.start
    }
}

/// One line of the change-intensity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityRow {
    pub start_year: i32,
    pub end_year: i32,
    pub interval_years: i32,
    pub changed_pixels: u64,
    pub total_pixels: u64,
    /// changed / total, 0.0 for an empty interval
    pub interval_intensity: f64,
    /// interval intensity per year, 0.0 when both years are equal
    pub annualized_intensity: f64,
}

/// Turn finished interval results into intensity rates.
pub fn compute_intensity_rows<'a, I>(intervals: I) -> Vec<IntensityRow>
where
    I: IntoIterator<Item = (YearInterval, &'a IntervalChange)>,
{
    intervals
        .into_iter()
        .map(|(years, result)| {
            let changed = result.changed_pixels;
            let total = result.total_valid_pixels;
            let interval_intensity = if total == 0 { 0.0 } else { changed as f64 / total as f64 };
            let annualized_intensity = match years.years() {
                0 => 0.0,
                span => interval_intensity / span as f64,
            };

            IntensityRow {
                start_year: years.start,
                end_year: years.end,
                interval_years: years.years(),
                changed_pixels: changed,
                total_pixels: total,
                interval_intensity,
                annualized_intensity,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn result(changed: u64, total: u64) -> IntervalChange {
        IntervalChange {
            max_class: 0,
            gain: vec![0],
            loss: vec![0],
            matrix: Array2::zeros((1, 1)),
            changed_pixels: changed,
            total_valid_pixels: total,
        }
    }

    #[test]
    fn test_rates() {
        let a = result(25, 100);
        let rows = compute_intensity_rows([(YearInterval::new(2000, 2005), &a)]);
        assert_relative_eq!(rows[0].interval_intensity, 0.25);
        assert_relative_eq!(rows[0].annualized_intensity, 0.05);
        assert_eq!(rows[0].interval_years, 5);
    }

    #[test]
    fn test_zero_guards() {
        let empty = result(0, 0);
        let same_year = result(10, 20);
        let rows = compute_intensity_rows([
            (YearInterval::new(2000, 2010), &empty),
            (YearInterval::new(2010, 2010), &same_year),
        ]);
        assert_eq!(rows[0].interval_intensity, 0.0);
        assert_relative_eq!(rows[1].interval_intensity, 0.5);
        assert_eq!(rows[1].annualized_intensity, 0.0);
    }
}
