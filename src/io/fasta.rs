use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::fasta::{self as fasta, record::{Definition, Sequence}, Record};

use crate::errors::AssemblyError;

/// Open a file for reading, transparently decompressing it when the name ends in `.gz`.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, AssemblyError> {
    let is_gzipped = path
        .file_name()
        .map(|v| v.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false);

    let reader: Box<dyn BufRead + Send> = if is_gzipped {
        Box::new(File::open(path).map(MultiGzDecoder::new).map(BufReader::new)?)
    } else {
        Box::new(File::open(path).map(BufReader::new)?)
    };

    Ok(reader)
}

/// All `(name, sequence)` records of a FASTA file.
pub fn read_fasta_records(path: &Path) -> Result<Vec<(String, Vec<u8>)>, AssemblyError> {
    let mut reader = fasta::io::Reader::new(open_reader(path)?);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name = String::from_utf8_lossy(record.name()).into_owned();
        let seq: &[u8] = record.sequence().as_ref();

        records.push((name, seq.to_ascii_uppercase()));
    }

    Ok(records)
}

/// Load a reference FASTA that has to hold exactly one record.
pub fn load_reference(path: &Path) -> Result<Vec<u8>, AssemblyError> {
    let mut records = read_fasta_records(path)?;

    match records.len() {
        1 => Ok(records.pop().map(|(_, seq)| seq).unwrap_or_default()),
        n => Err(AssemblyError::InvalidReference(
            format!("expected a single record in {}, found {n}", path.display()))),
    }
}

/// Name of the `n`-th (1-based) output window.
pub fn window_name(n: usize) -> String {
    format!("vjf_{n}")
}

/// Write accepted windows as FASTA, numbered from 1 in the given order.
pub fn write_windows<W: Write>(windows: &[Vec<u8>], output: W) -> Result<(), AssemblyError> {
    let mut writer = fasta::io::Writer::new(output);

    for (ix, window) in windows.iter().enumerate() {
        let header = Definition::new(window_name(ix + 1), None);
        let record = Record::new(header, Sequence::from(window.clone()));

        writer.write_record(&record)?;
    }

    Ok(())
}
