//! Ranked transitions and transition tables

use super::area::percent;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One off-diagonal conversion of a transition matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTransitionRow {
    pub from_class: usize,
    pub to_class: usize,
    pub pixel_count: u64,
    pub area: f64,
    /// Share of all off-diagonal pixels of the matrix, 0-100
    pub percent_of_change: f64,
}

/// Rank every nonzero off-diagonal cell of `matrix` by area.
///
/// The sort is stable, so equal areas keep row-then-column order. Percentages
/// are 0.0 when the matrix has no off-diagonal pixels.
pub fn build_top_transitions(matrix: &Array2<u64>, cell_area: f64) -> Vec<TopTransitionRow> {
    build_top_transitions_excluding(matrix, cell_area, None)
}

/// Like [`build_top_transitions`], with the row and column of `excluded`
/// removed before ranking and before the percent denominator is summed.
pub fn build_top_transitions_excluding(
    matrix: &Array2<u64>,
    cell_area: f64,
    excluded: Option<usize>,
) -> Vec<TopTransitionRow> {
    let mut working = matrix.clone();
    working.diag_mut().fill(0);
    if let Some(class) = excluded {
        if class < working.nrows() {
            working.row_mut(class).fill(0);
        }
        if class < working.ncols() {
            working.column_mut(class).fill(0);
        }
    }

    let total_change = working.sum();
    let cell_area = cell_area.abs();

    let mut rows: Vec<TopTransitionRow> = working
        .indexed_iter()
        .filter(|&(_, &count)| count > 0)
        .map(|((from_class, to_class), &count)| TopTransitionRow {
            from_class,
            to_class,
            pixel_count: count,
            area: count as f64 * cell_area,
            percent_of_change: percent(count, total_change),
        })
        .collect();

    rows.sort_by(|a, b| b.area.partial_cmp(&a.area).unwrap_or(Ordering::Equal));
    rows
}

/// Class id left out of transition tables when both dates share it as NoData.
///
/// This is a presentation filter: the class was still accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodataClassPolicy {
    pub excluded: Option<usize>,
}

impl NodataClassPolicy {
    /// Keep every class
    pub fn include_all() -> Self {
        Self { excluded: None }
    }

    /// Exclusion applies only when both sentinels are present, equal, integral
    /// and non-negative, and the caller did not ask to keep the class.
    pub fn resolve(nodata0: Option<f64>, nodata1: Option<f64>, include_nodata_class: bool) -> Self {
        if include_nodata_class {
            return Self::include_all();
        }
        let excluded = match (nodata0, nodata1) {
            (Some(a), Some(b)) if a == b && a.is_finite() && a.fract() == 0.0 && a >= 0.0 => Some(a as usize),
            _ => None,
        };
        Self { excluded }
    }

    pub fn keeps(&self, class_id: usize) -> bool {
        self.excluded != Some(class_id)
    }
}

/// Transition matrix restricted to the classes a policy keeps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    /// Class id of each row and column
    pub classes: Vec<usize>,
    pub counts: Array2<u64>,
}

/// Drop the excluded class row and column from `matrix`.
pub fn transition_table(matrix: &Array2<u64>, policy: NodataClassPolicy) -> TransitionTable {
    let classes: Vec<usize> = (0..matrix.nrows()).filter(|&c| policy.keeps(c)).collect();
    let counts = Array2::from_shape_fn((classes.len(), classes.len()), |(i, j)| {
        matrix[[classes[i], classes[j]]]
    });
    TransitionTable { classes, counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_ranking_skips_diagonal() {
        let matrix = array![[5u64, 2, 0], [6, 9, 2], [0, 0, 4]];
        let rows = build_top_transitions(&matrix, 10.0);

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.from_class != r.to_class));
        assert_eq!((rows[0].from_class, rows[0].to_class), (1, 0));
        assert_relative_eq!(rows[0].area, 60.0);
        assert_relative_eq!(rows[0].percent_of_change, 60.0);

        // Ties keep matrix order
        assert_eq!((rows[1].from_class, rows[1].to_class), (0, 1));
        assert_eq!((rows[2].from_class, rows[2].to_class), (1, 2));

        let total: f64 = rows.iter().map(|r| r.percent_of_change).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_diagonal_matrix() {
        let matrix = array![[3u64, 0], [0, 7]];
        assert!(build_top_transitions(&matrix, 1.0).is_empty());
    }

    #[test]
    fn test_negative_pixel_area_uses_magnitude() {
        let matrix = array![[0u64, 4], [0, 0]];
        let rows = build_top_transitions(&matrix, -2.5);
        assert_relative_eq!(rows[0].area, 10.0);
    }

    #[test]
    fn test_exclusion_changes_denominator() {
        let matrix = array![[0u64, 3, 1], [1, 0, 0], [0, 0, 0]];
        let rows = build_top_transitions_excluding(&matrix, 1.0, Some(0));
        assert!(rows.is_empty());

        let rows = build_top_transitions_excluding(&matrix, 1.0, Some(2));
        assert_eq!(rows.len(), 2);
        assert_relative_eq!(rows[0].percent_of_change, 75.0);
    }

    #[test]
    fn test_policy_eligibility() {
        assert_eq!(NodataClassPolicy::resolve(Some(0.0), Some(0.0), false).excluded, Some(0));
        assert_eq!(NodataClassPolicy::resolve(Some(255.0), Some(255.0), true).excluded, None);
        assert_eq!(NodataClassPolicy::resolve(Some(255.0), Some(0.0), false).excluded, None);
        assert_eq!(NodataClassPolicy::resolve(Some(-9999.0), Some(-9999.0), false).excluded, None);
        assert_eq!(NodataClassPolicy::resolve(Some(1.5), Some(1.5), false).excluded, None);
        assert_eq!(NodataClassPolicy::resolve(None, Some(0.0), false).excluded, None);
    }

    #[test]
    fn test_transition_table_drops_class() {
        let matrix = array![[1u64, 2, 3], [4, 5, 6], [7, 8, 9]];
        let table = transition_table(&matrix, NodataClassPolicy { excluded: Some(1) });
        assert_eq!(table.classes, vec![0, 2]);
        assert_eq!(table.counts, array![[1, 3], [7, 9]]);

        let full = transition_table(&matrix, NodataClassPolicy::include_all());
        assert_eq!(full.counts, matrix);
    }
}
