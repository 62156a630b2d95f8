//! Chart spec to category-indexed rows

use crate::protocol::ChartSpec;

/// One series' value at a category; `None` when the series is too short
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesValue {
    pub series: String,
    pub value: Option<f64>,
}

/// All series values for one category, in series order
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub category: String,
    pub values: Vec<SeriesValue>,
}

/// Row `i` holds `x[i]` and `series[s].data[i]` for every series. Series of
/// the wrong length produce gaps or drop their extra points; indexes never
/// shift.
pub fn chart_rows(spec: &ChartSpec) -> Vec<ChartRow> {
    if let Err(errors) = spec.validate() {
        for error in &errors {
            tracing::debug!(title = %spec.title, %error, "Chart series length mismatch");
        }
    }

    spec.x
        .iter()
        .enumerate()
        .map(|(i, category)| ChartRow {
            category: category.clone(),
            values: spec
                .series
                .iter()
                .map(|series| SeriesValue {
                    series: series.name.clone(),
                    value: series.data.get(i).copied(),
                })
                .collect(),
        })
        .collect()
}

/// Largest magnitude across all rows, for scaling
pub fn max_magnitude(rows: &[ChartRow]) -> f64 {
    rows.iter()
        .flat_map(|row| row.values.iter().filter_map(|v| v.value))
        .map(f64::abs)
        .fold(0.0, f64::max)
}
