use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::sample::Sample;
use crate::{EstimatorError, Result};

const HEADER: &str = "area,construction_type,region,cimento,areia,tijolos";

/// Writes the dataset as delimited text, one row per sample.
///
/// The file is written to a temporary sibling and atomically renamed into
/// place, so a concurrent reader never observes a partial dataset.
pub fn write_dataset(path: &Path, samples: &[Sample]) -> Result<()> {
    let tmp = path.with_extension("tmp");

    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        writeln!(w, "{HEADER}")?;
        for s in samples {
            writeln!(
                w,
                "{},{},{},{},{},{}",
                s.area,
                s.construction_type.as_str(),
                s.region.as_str(),
                s.cement,
                s.sand,
                s.bricks
            )?;
        }
        w.flush()?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a dataset previously written by `write_dataset`.
///
/// # Errors
/// Returns `EstimatorError::Parse` on a malformed header or row, with the
/// offending line number.
pub fn read_dataset(path: &Path) -> Result<Vec<Sample>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EstimatorError::ArtifactMissing { path: path.to_path_buf() },
        _ => EstimatorError::Io(e),
    })?;
    let reader = BufReader::new(file);

    let parse_err = |line: usize, msg: String| EstimatorError::Parse {
        path: path.to_path_buf(),
        line,
        msg,
    };

    let mut samples = Vec::new();
    for (i, row) in reader.lines().enumerate() {
        let row = row?;
        let line = i + 1;

        if i == 0 {
            if row.trim() != HEADER {
                return Err(parse_err(line, format!("unexpected header {row:?}")));
            }
            continue;
        }
        if row.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = row.split(',').collect();
        if fields.len() != 6 {
            return Err(parse_err(line, format!("expected 6 fields, got {}", fields.len())));
        }

        let num = |idx: usize| -> Result<f32> {
            fields[idx]
                .trim()
                .parse::<f32>()
                .map_err(|e| parse_err(line, format!("field {}: {e}", idx + 1)))
        };

        samples.push(Sample {
            area: num(0)?,
            construction_type: fields[1]
                .trim()
                .parse()
                .map_err(|e| parse_err(line, format!("field 2: {e}")))?,
            region: fields[2]
                .trim()
                .parse()
                .map_err(|e| parse_err(line, format!("field 3: {e}")))?,
            cement: num(3)?,
            sand: num(4)?,
            bricks: num(5)?,
        });
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Variant;
    use crate::synth::{SynthConfig, synthesize};
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("estimator-csv-{}-{name}", std::process::id()));
        p
    }

    #[test]
    fn write_then_read_round_trips() {
        let samples = synthesize(&SynthConfig::new(64, 3, Variant::Categorical)).unwrap();
        let path = scratch_path("roundtrip.csv");

        write_dataset(&path, &samples).unwrap();
        let back = read_dataset(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(samples, back);
    }

    #[test]
    fn malformed_row_reports_line_number() {
        let path = scratch_path("bad.csv");
        fs::write(&path, format!("{HEADER}\n10.0,residential,urban,1.0,2.0\n")).unwrap();

        let err = read_dataset(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        match err {
            EstimatorError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let err = read_dataset(Path::new("/nonexistent/dataset.csv")).unwrap_err();
        assert!(matches!(err, EstimatorError::ArtifactMissing { .. }));
    }
}
