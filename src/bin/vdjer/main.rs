use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

use vdjer::assembler::roots::{traceback, ReferenceIndex};
use vdjer::assembler::{build_graph, Assembler, Collaborators, OutputOptions};
use vdjer::config::{
    AnchorParams, AssemblerConfig, DriverParams, EnumerationLimits, GraphParams, ReferenceFiles, RootParams,
    WindowParams,
};
use vdjer::errors::AssemblyError;
use vdjer::external::{ReadCoverageValidator, ReadSeedMapper, ReadSource, SeqScorer, VjAnchorFinder};
use vdjer::graphs::AssemblyGraph;
use vdjer::io::{dump_graph, load_reference, RecordFiles};
use vdjer::reads::ReadArena;

mod cli;

/// Stderr logging. `RUST_LOG` wins over the verbosity flag when set.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_log = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_filter(filter_layer);

    Registry::default().with(stderr_log).init();
}

fn graph_params(reads: &cli::ReadInputs, opts: &cli::GraphOptions) -> GraphParams {
    GraphParams {
        read_length: reads.read_length,
        kmer_size: opts.kmer_size,
        min_node_freq: opts.min_node_freq,
        min_base_quality: opts.min_base_quality,
        max_nodes: opts.max_nodes,
        ..Default::default()
    }
}

fn assembler_config(args: &cli::AssembleArgs) -> AssemblerConfig {
    let anchors = AnchorParams {
        max_mismatches: args.anchor_mismatches,
        ..AnchorParams::for_chain(args.chain)
    };

    AssemblerConfig {
        graph: graph_params(&args.reads, &args.graph),
        enumeration: EnumerationLimits {
            min_contig_score: args.min_contig_score,
            max_node_visits: args.max_node_visits,
            max_contigs: args.max_contigs,
            max_paths_from_root: args.max_paths,
            max_contig_len: args.max_contig_len,
            stop_on_repeat: args.stop_on_repeat,
            hold_output: false,
        },
        roots: RootParams {
            seed_len: args.root_seed_len,
            min_homology_score: args.min_root_score,
            ..Default::default()
        },
        driver: DriverParams {
            threads: args.threads,
            failure_policy: args.failure_policy,
            ..Default::default()
        },
        windows: WindowParams {
            eval_start: args.eval_start,
            eval_stop: args.eval_stop,
            read_span: args.read_span,
            insert_len: args.insert_len,
            read_floor: args.read_floor,
            ..Default::default()
        },
        anchors,
        ..Default::default()
    }
}

/// Resolve reference files from the reference directory, with per-file overrides.
fn reference_files(args: &cli::AssembleArgs) -> Result<ReferenceFiles> {
    let defaults = args.ref_dir.as_deref().map(ReferenceFiles::from_dir);
    let pick = |explicit: &Option<std::path::PathBuf>, from_dir: Option<&std::path::PathBuf>, name: &str| {
        explicit.clone()
            .or_else(|| from_dir.cloned())
            .with_context(|| format!("No {name} given and no --ref-dir to find it in."))
    };

    let files = ReferenceFiles {
        v_anchors: pick(&args.v_anchors, defaults.as_ref().map(|d| &d.v_anchors), "V anchor index")?,
        j_anchors: pick(&args.j_anchors, defaults.as_ref().map(|d| &d.j_anchors), "J anchor index")?,
        v_region: pick(&args.v_region, defaults.as_ref().map(|d| &d.v_region), "V-region FASTA")?,
    };

    let missing = files.missing();
    if !missing.is_empty() {
        return Err(AssemblyError::InvalidReference(format!("missing reference files: {missing:?}")))
            .context("Could not resolve reference files");
    }

    Ok(files)
}

fn load_arena(reads: &cli::ReadInputs) -> Result<ReadArena> {
    let buffers = RecordFiles::new(&reads.aligned, &reads.unaligned)
        .extract()
        .context("Could not load read buffers")?;

    let arena = ReadArena::new(buffers.aligned, buffers.unaligned, reads.read_length)?;
    info!(
        reads = arena.num_reads(),
        aligned = arena.aligned.len(),
        unaligned = arena.unaligned.len(),
        "Loaded reads"
    );

    Ok(arena)
}

fn assemble_subcommand(args: &cli::AssembleArgs) -> Result<()> {
    let config = assembler_config(args).validate()?;

    if let Some(path) = &args.write_config {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &config)?;
    }

    let files = reference_files(args)?;
    let v_region = load_reference(&files.v_region)
        .with_context(|| format!("Could not load V-region reference {}", files.v_region.display()))?;

    let reference = ReferenceIndex::new(&v_region, config.roots.seed_len);
    let scorer = SeqScorer::new(config.graph.kmer_size, config.roots.seed_len, vec![v_region]);
    let finder = VjAnchorFinder::from_files(&files.v_anchors, &files.j_anchors, config.anchors.clone())
        .context("Could not load anchor indices")?;

    let arena = load_arena(&args.reads)?;
    let mapper = ReadSeedMapper::new(&arena, config.mapper.clone());
    let validator = ReadCoverageValidator;

    fs::create_dir_all(&args.output_dir)?;
    let output = OutputOptions {
        output_dir: args.output_dir.clone(),
        dump_graph: !args.no_graph_dump,
    };

    let collaborators = Collaborators {
        scorer: &scorer,
        finder: &finder,
        mapper: &mapper,
        validator: &validator,
    };

    let summary = Assembler::new(&config, &reference, collaborators).run(&arena, &output)?;

    if let Some(path) = &args.summary {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &summary)?;
    }

    if summary.roots_failed > 0 {
        warn!(roots_failed = summary.roots_failed, "Some roots failed to enumerate");
    }

    Ok(())
}

fn graph_subcommand(args: &cli::GraphArgs) -> Result<()> {
    let params = graph_params(&args.reads, &args.graph).validate()?;
    let roots_params = RootParams {
        seed_len: args.root_seed_len,
        ..Default::default()
    };

    let reference = match &args.v_region {
        Some(path) => ReferenceIndex::new(&load_reference(path)?, roots_params.seed_len),
        None => ReferenceIndex::disabled(),
    };

    let arena = load_arena(&args.reads)?;
    let build = build_graph(&arena, &params)?;
    let roots = traceback(&build.graph, &build.root_candidates, &reference, roots_params.traceback_max_hops);

    let mut writer = BufWriter::new(File::create(&args.output)
        .with_context(|| format!("Could not create {}", args.output.display()))?);
    dump_graph(&build.graph, &mut writer)?;

    info!(
        admitted_kmers = build.admitted_kmers,
        nodes = build.graph.node_count(),
        edges = build.graph.edge_count(),
        root_candidates = build.root_candidates.len(),
        roots = roots.len(),
        path = %args.output.display(),
        "Wrote graph"
    );

    Ok(())
}

fn run(args: &cli::CliArgs) -> Result<()> {
    match &args.command {
        Some(cli::CliSubcommand::Assemble(v)) => assemble_subcommand(v),
        Some(cli::CliSubcommand::Graph(v)) => graph_subcommand(v),
        None => Err(AssemblyError::InvalidConfig("no subcommand given".to_string()))
            .context("No subcommand given."),
    }
}

fn main() {
    let args = cli::CliArgs::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        error!("{e:#}");

        let code = e.downcast_ref::<AssemblyError>()
            .map(AssemblyError::exit_code)
            .unwrap_or(-1);

        process::exit(code);
    }
}
