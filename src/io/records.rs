use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::AssemblyError;
use crate::external::{ReadBuffers, ReadSource};
use crate::io::fasta::open_reader;

/// Load a record-encoded read buffer from disk, plain or gzipped.
pub fn load_record_buffer(path: &Path) -> Result<Vec<u8>, AssemblyError> {
    let mut data = Vec::new();
    open_reader(path)?.read_to_end(&mut data)?;

    info!(path = %path.display(), bytes = data.len(), "Loaded read buffer");

    Ok(data)
}

/// Pre-extracted aligned and unaligned read buffers stored as files.
#[derive(Debug, Clone)]
pub struct RecordFiles {
    pub aligned: PathBuf,
    pub unaligned: PathBuf,
}

impl RecordFiles {
    pub fn new(aligned: impl Into<PathBuf>, unaligned: impl Into<PathBuf>) -> Self {
        RecordFiles {
            aligned: aligned.into(),
            unaligned: unaligned.into(),
        }
    }
}

impl ReadSource for RecordFiles {
    fn extract(&self) -> Result<ReadBuffers, AssemblyError> {
        Ok(ReadBuffers {
            aligned: load_record_buffer(&self.aligned)?,
            unaligned: load_record_buffer(&self.unaligned)?,
        })
    }
}
