use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Outcome of a single assembly phase.
///
/// The numeric values double as process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblyStatus {
    Ok,
    TooManyPathsFromRoot,
    TooManyContigs,
    StoppedOnRepeat,
    TooManyNodes,
}

impl AssemblyStatus {
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::TooManyPathsFromRoot => -1,
            Self::TooManyContigs => -2,
            Self::StoppedOnRepeat => -3,
            Self::TooManyNodes => -4,
        }
    }

    /// Whether this status ends the run. Running out of paths from a root only
    /// stops the search for that root; the contigs found so far are kept.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Ok | Self::TooManyPathsFromRoot)
    }
}

impl Display for AssemblyStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::Ok => "ok",
            Self::TooManyPathsFromRoot => "too many paths from root",
            Self::TooManyContigs => "too many contigs",
            Self::StoppedOnRepeat => "stopped on repeat",
            Self::TooManyNodes => "too many nodes",
        };

        write!(f, "{msg} ({})", self.code())
    }
}

#[derive(Debug)]
pub enum AssemblyError {
    /// The first byte of a record was neither `'0'` nor `'1'`
    InvalidStrand { record: usize, byte: u8 },

    /// The read buffer holds fewer bytes than a single record
    RecordBufferTooShort { len: usize, record_len: usize },

    /// The reference FASTA did not contain what we expected
    InvalidReference(String),

    /// A line in a V/J anchor index could not be parsed
    InvalidAnchorIndex { path: PathBuf, line: usize },

    /// Inconsistent run parameters
    InvalidConfig(String),

    /// A hard ceiling (node count, contigs, paths) was hit
    Capacity(AssemblyStatus),

    /// Contig enumeration for a root ended with a fatal status
    Aborted { root: String, status: AssemblyStatus },

    /// Error variant when writing JSON output failed
    Serialization { source: serde_json::Error },

    /// Other IO errors
    IOError(io::Error),
}

impl AssemblyError {
    /// Exit code the binary terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Capacity(status) | Self::Aborted { status, .. } => status.code(),
            _ => -1,
        }
    }
}

impl Error for AssemblyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            Self::Serialization { ref source } => Some(source),
            Self::IOError(ref source) => Some(source),
            _ => None
        }
    }
}

impl From<io::Error> for AssemblyError {
    fn from(value: io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<serde_json::Error> for AssemblyError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            source: value
        }
    }
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStrand { record, byte } =>
                write!(f, "Initial char of record {record} is invalid: {:?}", char::from(*byte)),
            Self::RecordBufferTooShort { len, record_len } =>
                write!(f, "Read buffer of {len} bytes does not hold a single record of {record_len} bytes!"),
            Self::InvalidReference(msg) =>
                write!(f, "Invalid reference sequence: {msg}"),
            Self::InvalidAnchorIndex { path, line } =>
                write!(f, "Could not parse line {line} of anchor index {path:?}"),
            Self::InvalidConfig(msg) =>
                write!(f, "Invalid parameters: {msg}"),
            Self::Capacity(status) =>
                write!(f, "Assembly exceeded a capacity limit: {status}"),
            Self::Aborted { root, status } =>
                write!(f, "Contig enumeration from root {root} aborted: {status}"),
            Self::Serialization { .. } =>
                write!(f, "Could not serialize output to JSON!"),
            Self::IOError(err) =>
                err.fmt(f),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AssemblyStatus::Ok.code(), 0);
        assert_eq!(AssemblyStatus::TooManyPathsFromRoot.code(), -1);
        assert_eq!(AssemblyStatus::TooManyContigs.code(), -2);
        assert_eq!(AssemblyStatus::StoppedOnRepeat.code(), -3);
        assert_eq!(AssemblyStatus::TooManyNodes.code(), -4);

        assert!(!AssemblyStatus::Ok.is_fatal());
        assert!(!AssemblyStatus::TooManyPathsFromRoot.is_fatal());
        assert!(AssemblyStatus::TooManyContigs.is_fatal());
        assert!(AssemblyStatus::StoppedOnRepeat.is_fatal());
        assert!(AssemblyStatus::TooManyNodes.is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        let err = AssemblyError::Capacity(AssemblyStatus::TooManyNodes);
        assert_eq!(err.exit_code(), -4);

        let err = AssemblyError::InvalidStrand { record: 3, byte: b'x' };
        assert_eq!(err.exit_code(), -1);
        assert!(err.to_string().contains("record 3"));
    }
}
