//! Pairwise Pearson correlation over the merged table.
//!
//! Every pair is computed over the dates where *both* columns have a value,
//! so different pairs can rest on different sample sizes.

use crate::aggregator::MergedTable;

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    labels: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(col)).copied().flatten()
    }
}

/// Pearson coefficient over the positions where both series have a value.
/// `None` with fewer than two such positions or a flat series.
pub fn pairwise_pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if is_flat(var_a, mean_a, n) || is_flat(var_b, mean_b, n) {
        return None;
    }

    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Sum of squared deviations indistinguishable from rounding noise at the
/// series' own magnitude.
fn is_flat(sum_sq_dev: f64, mean: f64, n: f64) -> bool {
    sum_sq_dev <= f64::EPSILON * f64::EPSILON * n * mean * mean
}

/// Full square matrix in the table's column order.
///
/// The diagonal is exactly 1.0 for any column with at least two values.
pub fn correlation_matrix(table: &MergedTable) -> CorrelationMatrix {
    let labels = table.columns().to_vec();
    let columns: Vec<Vec<Option<f64>>> =
        (0..labels.len()).map(|i| table.column_values(i)).collect();

    let n = labels.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        let present = columns[i].iter().flatten().filter(|v| v.is_finite()).count();
        values[i][i] = (present >= 2).then_some(1.0);

        for j in (i + 1)..n {
            let r = pairwise_pearson(&columns[i], &columns[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix { labels, values }
}
