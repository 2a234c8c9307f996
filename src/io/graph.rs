//! Text dump of an assembly graph.

use std::io::Write;

use crate::errors::AssemblyError;
use crate::graphs::AssemblyGraph;

/// Write the graph as a directed graph listing, edges first, then vertices. Nodes are
/// labeled by their k-mer.
pub fn dump_graph<G, W>(graph: &G, writer: &mut W) -> Result<(), AssemblyError>
where
    G: AssemblyGraph,
    W: Write,
{
    writeln!(writer, "digraph vdjician {{")?;

    writeln!(writer, "// Edges")?;
    for node in graph.all_nodes() {
        let kmer = graph.kmer_string(node);
        for succ in graph.successors(node) {
            writeln!(writer, "\t{} -> {};", kmer, graph.kmer_string(succ))?;
        }
    }

    writeln!(writer, "// Vertices")?;
    for node in graph.all_nodes() {
        writeln!(writer, "\t{};", graph.kmer_string(node))?;
    }

    writeln!(writer, "}}")?;

    Ok(())
}
