use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use faer::{Mat, MatRef};

use crate::{error::CpdError, utils::PointMatrix};

/// Parse a point matrix from text, one point per line.
///
/// Values are separated by whitespace or commas. Blank lines and lines starting with `#`
/// are skipped. Every row must have the same number of values.
///
/// Example:
///
/// ```
/// use kornia_cpd::io::parse_points;
///
/// let points = parse_points("0 0\n1.5, 2\n# comment\n3 4\n").unwrap();
/// assert_eq!(points.nrows(), 3);
/// assert_eq!(points.ncols(), 2);
/// ```
pub fn parse_points(text: &str) -> Result<PointMatrix, CpdError> {
    parse_lines(text.lines().map(|line| Ok(line.to_string())))
}

/// Read a point matrix from a text file. See [`parse_points`] for the format.
pub fn read_points_txt(path: impl AsRef<Path>) -> Result<PointMatrix, CpdError> {
    // open the file and create a buffered reader
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    parse_lines(reader.lines())
}

/// Write a point matrix to a text file, one space separated point per line.
pub fn write_points_txt(path: impl AsRef<Path>, points: MatRef<'_, f64>) -> Result<(), CpdError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for i in 0..points.nrows() {
        let row = (0..points.ncols())
            .map(|j| points.read(i, j).to_string())
            .collect::<Vec<_>>();
        writeln!(writer, "{}", row.join(" "))?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_lines(
    lines: impl Iterator<Item = std::io::Result<String>>,
) -> Result<PointMatrix, CpdError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let row = trimmed
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>().map_err(|e| CpdError::Parse {
                    line: idx + 1,
                    message: format!("{s:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(CpdError::RaggedRow {
                    line: idx + 1,
                    expected: first.len(),
                    actual: row.len(),
                });
            }
        }
        rows.push(row);
    }

    let ncols = rows.first().map_or(0, |row| row.len());
    Ok(Mat::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::points_from_rows;

    #[test]
    fn test_parse_points() -> Result<(), CpdError> {
        let points = parse_points("  1 2 3\n\n# header\n4,5,6\n-1e-3\t0 7\n")?;
        assert_eq!(points.nrows(), 3);
        assert_eq!(points.ncols(), 3);
        assert_eq!(points.read(1, 1), 5.0);
        assert_eq!(points.read(2, 0), -1e-3);
        Ok(())
    }

    #[test]
    fn test_parse_points_empty() -> Result<(), CpdError> {
        let points = parse_points("\n# nothing\n")?;
        assert_eq!(points.nrows(), 0);
        Ok(())
    }

    #[test]
    fn test_parse_points_errors() {
        assert!(matches!(
            parse_points("1 2\n3 x\n"),
            Err(CpdError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_points("1 2\n\n3 4 5\n"),
            Err(CpdError::RaggedRow {
                line: 3,
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_write_read_points() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("points.txt");

        let points = points_from_rows(&[[0.5, -1.25], [3.0, 1e-7], [2.0, 4.0]]);
        write_points_txt(&path, points.as_ref())?;
        let read = read_points_txt(&path)?;

        assert_eq!(read.nrows(), 3);
        assert_eq!(read.ncols(), 2);
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(read.read(i, j), points.read(i, j));
            }
        }
        Ok(())
    }

    #[test]
    fn test_read_points_missing_file() {
        assert!(matches!(
            read_points_txt("/definitely/not/here.txt"),
            Err(CpdError::Io(_))
        ));
    }
}
