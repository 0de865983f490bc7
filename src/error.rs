use thiserror::Error;

/// Format violations reported by [`crate::cigar::check_cigar`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CigarCheckError {
    #[error("Illegal line found in cigar file at line {line}: {content:?}")]
    IllegalLine { line: usize, content: String },

    #[error("Cigar file is empty.")]
    Empty,
}

/// Invalid test configuration, raised before any fixture is generated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown batch system '{0}' (expected singleMachine, parasol or gridEngine)")]
    UnknownBatchSystem(String),

    #[error("unknown test length '{0}' (expected SHORT, MEDIUM, LONG or VERY_LONG)")]
    UnknownTestSize(String),

    #[error("malformed database conf: {0}")]
    MalformedDatabaseConf(String),

    #[error("{dataset} region {region} out of range (0..{limit})")]
    RegionOutOfRange {
        dataset: &'static str,
        region: usize,
        limit: usize,
    },

    #[error("environment variable {0} is not set; it must point at the test datasets")]
    MissingDatasetRoot(&'static str),
}
