//! Read buffers in the flat record encoding produced by read extraction.
//!
//! Each record is `2 * read_length + 1` bytes: a strand byte (`'0'` or `'1'`), the read
//! bases, then the Phred+33 base qualities. All k-mers in the graph borrow from these
//! buffers, so a [`ReadArena`] must outlive every graph built from it.

use tracing::{debug, warn};

use crate::errors::AssemblyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Self::Forward),
            b'1' => Some(Self::Reverse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub strand: Strand,
    pub sequence: &'a [u8],
    pub quality: &'a [u8],
}

#[inline]
pub fn phred33(ch: u8) -> u8 {
    ch.saturating_sub(b'!')
}

/// A validated buffer of fixed-size read records.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    data: Vec<u8>,
    read_length: usize,
    num_records: usize,
}

impl RecordBuffer {
    pub fn new(data: Vec<u8>, read_length: usize) -> Result<Self, AssemblyError> {
        let record_len = 2 * read_length + 1;
        let num_records = data.len() / record_len;
        let trailing = &data[num_records * record_len..];

        if !trailing.iter().all(|c| c.is_ascii_whitespace() || *c == 0) {
            if num_records == 0 {
                return Err(AssemblyError::RecordBufferTooShort { len: data.len(), record_len });
            }

            warn!(trailing = trailing.len(), "Ignoring partial record at end of read buffer");
        }

        for record in 0..num_records {
            let byte = data[record * record_len];
            if Strand::from_byte(byte).is_none() {
                return Err(AssemblyError::InvalidStrand { record, byte });
            }
        }

        debug!(input_len = data.len(), record_len, num_records, "Loaded read buffer");

        Ok(RecordBuffer { data, read_length, num_records })
    }

    pub fn len(&self) -> usize {
        self.num_records
    }

    pub fn is_empty(&self) -> bool {
        self.num_records == 0
    }

    pub fn read_length(&self) -> usize {
        self.read_length
    }

    pub fn record(&self, ix: usize) -> Record<'_> {
        let record_len = 2 * self.read_length + 1;
        let rec = &self.data[ix * record_len..(ix + 1) * record_len];

        Record {
            // Strand bytes were checked on construction
            strand: Strand::from_byte(rec[0]).unwrap_or(Strand::Forward),
            sequence: &rec[1..=self.read_length],
            quality: &rec[self.read_length + 1..],
        }
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.num_records).map(|ix| self.record(ix))
    }
}

/// Owner of both read categories for the lifetime of an assembly.
#[derive(Debug, Default)]
pub struct ReadArena {
    /// Reads placed in the targeted region; used to seed roots
    pub aligned: RecordBuffer,

    /// Remaining reads; only extend the graph
    pub unaligned: RecordBuffer,
}

impl ReadArena {
    pub fn new(aligned: Vec<u8>, unaligned: Vec<u8>, read_length: usize) -> Result<Self, AssemblyError> {
        Ok(ReadArena {
            aligned: RecordBuffer::new(aligned, read_length)?,
            unaligned: RecordBuffer::new(unaligned, read_length)?,
        })
    }

    pub fn num_reads(&self) -> usize {
        self.aligned.len() + self.unaligned.len()
    }
}

/// Encode reads into the record format. Used to build buffers in tests and tools.
pub fn encode_records<'a>(reads: impl IntoIterator<Item = (Strand, &'a [u8], &'a [u8])>) -> Vec<u8> {
    let mut buf = Vec::new();
    for (strand, seq, qual) in reads {
        buf.push(match strand {
            Strand::Forward => b'0',
            Strand::Reverse => b'1',
        });
        buf.extend_from_slice(seq);
        buf.extend_from_slice(qual);
    }

    buf
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let buf = encode_records([
            (Strand::Forward, &b"ACGTA"[..], &b"IIIII"[..]),
            (Strand::Reverse, &b"TTTTT"[..], &b"#####"[..]),
        ]);
        let records = RecordBuffer::new(buf, 5).unwrap();

        assert_eq!(records.len(), 2);
        let r1 = records.record(1);
        assert_eq!(r1.strand, Strand::Reverse);
        assert_eq!(r1.sequence, b"TTTTT");
        assert_eq!(r1.quality, b"#####");
        assert_eq!(phred33(r1.quality[0]), 2);
        assert_eq!(phred33(b'I'), 40);
    }

    #[test]
    fn test_arena_counts_both_categories() {
        let aligned = encode_records([(Strand::Forward, &b"ACG"[..], &b"III"[..])]);
        let unaligned = encode_records([
            (Strand::Forward, &b"CCA"[..], &b"III"[..]),
            (Strand::Reverse, &b"GTT"[..], &b"III"[..]),
        ]);

        let arena = ReadArena::new(aligned, unaligned, 3).unwrap();
        assert_eq!(arena.num_reads(), 3);
        assert_eq!(arena.unaligned.record(1).sequence, b"GTT");
    }

    #[test]
    fn test_invalid_strand() {
        let mut buf = encode_records([
            (Strand::Forward, &b"ACG"[..], &b"III"[..]),
            (Strand::Forward, &b"ACG"[..], &b"III"[..]),
        ]);
        buf[7] = b'2';

        match RecordBuffer::new(buf, 3) {
            Err(AssemblyError::InvalidStrand { record, byte }) => {
                assert_eq!(record, 1);
                assert_eq!(byte, b'2');
            },
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_trailing_newline_ignored() {
        let mut buf = encode_records([(Strand::Forward, &b"ACG"[..], &b"III"[..])]);
        buf.push(b'\n');

        let records = RecordBuffer::new(buf, 3).unwrap();
        assert_eq!(records.len(), 1);

        assert!(matches!(
            RecordBuffer::new(b"0AC".to_vec(), 3),
            Err(AssemblyError::RecordBufferTooShort { .. })
        ));
        assert!(RecordBuffer::new(Vec::new(), 3).unwrap().is_empty());
    }
}
