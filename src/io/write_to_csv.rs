use std::path::Path;

use csv::Writer;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct SeriesRow {
    pub step: usize,
    pub time: f64,
    pub fishing_ground_total: f64,
}

/// Writes one row per step; step `i` ends at time `(i + 1) * delta_t`.
pub fn write_series(
    series: &[f64],
    delta_t: f64,
    filename: impl AsRef<Path>,
) -> Result<(), csv::Error> {
    let mut writer = Writer::from_path(filename)?;
    for (step, &fishing_ground_total) in series.iter().enumerate() {
        writer.serialize(SeriesRow {
            step,
            time: (step + 1) as f64 * delta_t,
            fishing_ground_total,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_write_series() {
        let path = std::env::temp_dir().join(format!("series_{}.csv", std::process::id()));
        write_series(&[0.5, 0.25, 0.125], 0.1, &path).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            vec!["step", "time", "fishing_ground_total"]
        );
        let rows: Vec<SeriesRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].step, 2);
        assert_relative_eq!(rows[2].time, 0.3, epsilon = 1e-12);
        assert_relative_eq!(rows[1].fishing_ground_total, 0.25);
        std::fs::remove_file(&path).unwrap();
    }
}
