pub mod fasta;
pub mod graph;
pub mod records;

pub use fasta::{load_reference, read_fasta_records, write_windows};
pub use graph::dump_graph;
pub use records::{load_record_buffer, RecordFiles};
