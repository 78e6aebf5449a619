/// Error types for the registration pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CpdError {
    /// No comparer is registered under the requested name.
    #[error("Unknown comparer: {0}")]
    UnknownComparer(String),

    /// The fixed and moving point sets have a different number of columns.
    #[error("Mismatched point dimensions: fixed ({fixed}) != moving ({moving})")]
    DimensionMismatch {
        /// Number of columns of the fixed point set.
        fixed: usize,
        /// Number of columns of the moving point set.
        moving: usize,
    },

    /// One of the point sets has no points or no columns.
    #[error("The {0} point set is empty")]
    EmptyPointSet(&'static str),

    /// Both point sets collapse to a single point and cannot be normalized.
    #[error("Point sets are degenerate, the normalization scale is not positive")]
    DegeneratePointSets,

    /// A runner configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error reading or writing a point file.
    #[error("error reading or writing file")]
    Io(#[from] std::io::Error),

    /// A value in a point file could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// Description of the failure.
        message: String,
    },

    /// A row in a point file has a different width than the first row.
    #[error("Row at line {line} has {actual} values, expected {expected}")]
    RaggedRow {
        /// One-based line number.
        line: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },
}
