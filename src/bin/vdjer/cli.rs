use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use vdjer::config::{Chain, FailurePolicy};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Set verbosity level. Use multiple times to increase the verbosity level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<CliSubcommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliSubcommand {
    /// Assemble V(D)J junction contigs and write validated windows
    Assemble(AssembleArgs),

    /// Build the k-mer graph only, and write it with node/edge/root statistics
    Graph(GraphArgs),
}

#[derive(Args, Debug)]
pub struct ReadInputs {
    /// Record-encoded reads placed in the V-C region; these seed roots
    #[arg(long)]
    #[clap(help_heading = "Inputs")]
    pub aligned: PathBuf,

    /// Record-encoded remaining reads; these only extend the graph
    #[arg(long)]
    #[clap(help_heading = "Inputs")]
    pub unaligned: PathBuf,

    /// Read length of every record
    #[arg(short = 'r', long)]
    #[clap(help_heading = "Inputs")]
    pub read_length: usize,
}

#[derive(Args, Debug)]
pub struct GraphOptions {
    /// K-mer size
    #[arg(short = 'k', long = "kmer", default_value = "35")]
    #[clap(help_heading = "Graph construction")]
    pub kmer_size: usize,

    /// Min node frequency
    #[arg(long = "mf", default_value = "3")]
    #[clap(help_heading = "Graph construction")]
    pub min_node_freq: u16,

    /// Min accumulated base quality at every k-mer position
    #[arg(long = "mq", default_value = "90")]
    #[clap(help_heading = "Graph construction")]
    pub min_base_quality: u8,

    /// Hard ceiling on the number of graph nodes
    #[arg(long, default_value = "900000000")]
    #[clap(help_heading = "Graph construction")]
    pub max_nodes: usize,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    #[command(flatten)]
    pub reads: ReadInputs,

    /// Directory holding v_index, j_index and v_region.fa
    #[arg(long)]
    #[clap(help_heading = "Reference")]
    pub ref_dir: Option<PathBuf>,

    /// V anchor index (overrides the reference directory)
    #[arg(long = "vf")]
    #[clap(help_heading = "Reference")]
    pub v_anchors: Option<PathBuf>,

    /// J anchor index (overrides the reference directory)
    #[arg(long = "jf")]
    #[clap(help_heading = "Reference")]
    pub j_anchors: Option<PathBuf>,

    /// Single-record V-region FASTA used for root homology (overrides the reference directory)
    #[arg(long = "vr")]
    #[clap(help_heading = "Reference")]
    pub v_region: Option<PathBuf>,

    /// Chain to assemble; sets the conserved J amino acid and V-J window bounds
    #[arg(value_enum, long, default_value = "IGH")]
    #[clap(help_heading = "Reference")]
    pub chain: Chain,

    #[command(flatten)]
    pub graph: GraphOptions,

    /// Min contig score
    #[arg(long = "mcs", default_value = "-5.0", allow_hyphen_values = true)]
    #[clap(help_heading = "Contig enumeration")]
    pub min_contig_score: f64,

    /// Max contig length
    #[arg(long, default_value = "600")]
    #[clap(help_heading = "Contig enumeration")]
    pub max_contig_len: usize,

    /// Times a node may be passed on one path before it is called a repeat
    #[arg(long, default_value = "5")]
    #[clap(help_heading = "Contig enumeration")]
    pub max_node_visits: u32,

    /// Max contigs emitted from a single root
    #[arg(long, default_value = "50000000")]
    #[clap(help_heading = "Contig enumeration")]
    pub max_contigs: usize,

    /// Max paths followed from a single root
    #[arg(long, default_value = "500000000")]
    #[clap(help_heading = "Contig enumeration")]
    pub max_paths: usize,

    /// Stop a root's search at its first repeat
    #[arg(long)]
    #[clap(help_heading = "Contig enumeration")]
    pub stop_on_repeat: bool,

    /// V-region sub-k-mer size used for root homology. Values <= 1 disable the check.
    #[arg(long = "vk", default_value = "15")]
    #[clap(help_heading = "Roots")]
    pub root_seed_len: usize,

    /// Min root homology score
    #[arg(long = "mrs", default_value = "30")]
    #[clap(help_heading = "Roots")]
    pub min_root_score: i32,

    /// Insert length
    #[arg(long = "ins")]
    #[clap(help_heading = "Window validation")]
    pub insert_len: usize,

    /// Anchor mismatches
    #[arg(long = "am", default_value = "4")]
    #[clap(help_heading = "Window validation")]
    pub anchor_mismatches: u32,

    /// 1-based start of the coverage eval window
    #[arg(long = "e0", default_value = "52")]
    #[clap(help_heading = "Window validation")]
    pub eval_start: usize,

    /// 1-based stop of the coverage eval window
    #[arg(long = "e1", default_value = "411")]
    #[clap(help_heading = "Window validation")]
    pub eval_stop: usize,

    /// Min overlap of a read with the eval window
    #[arg(long = "rs", default_value = "35")]
    #[clap(help_heading = "Window validation")]
    pub read_span: usize,

    /// Min read depth at every eval window position
    #[arg(long = "rf", default_value = "1")]
    #[clap(help_heading = "Window validation")]
    pub read_floor: usize,

    /// Number of worker threads
    #[arg(short = 't', long, default_value = "1")]
    #[clap(help_heading = "Execution")]
    pub threads: usize,

    /// What to do when enumeration from a root fails
    #[arg(value_enum, long, default_value = "abort")]
    #[clap(help_heading = "Execution")]
    pub failure_policy: FailurePolicy,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    #[clap(help_heading = "Outputs")]
    pub output_dir: PathBuf,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    #[clap(help_heading = "Outputs")]
    pub summary: Option<PathBuf>,

    /// Write the effective configuration as JSON to this file
    #[arg(long)]
    #[clap(help_heading = "Outputs")]
    pub write_config: Option<PathBuf>,

    /// Do not write graph.dot
    #[arg(long)]
    #[clap(help_heading = "Outputs")]
    pub no_graph_dump: bool,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub reads: ReadInputs,

    #[command(flatten)]
    pub graph: GraphOptions,

    /// Single-record V-region FASTA; when given, roots are traced back and filtered
    #[arg(long = "vr")]
    #[clap(help_heading = "Roots")]
    pub v_region: Option<PathBuf>,

    /// V-region sub-k-mer size used for root homology
    #[arg(long = "vk", default_value = "15")]
    #[clap(help_heading = "Roots")]
    pub root_seed_len: usize,

    /// Output graph file
    #[arg(short, long, default_value = "graph.dot")]
    #[clap(help_heading = "Outputs")]
    pub output: PathBuf,
}
