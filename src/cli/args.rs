//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Morphology analysis for reconstructed neuron skeletons
#[derive(Parser, Debug)]
#[command(name = "neurite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Local config file (overrides the global one)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Process neurons one after another
    #[arg(long, global = true)]
    pub sequential: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where to write the augmented tables.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write result tables (JSON) to this file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Label nodes as root/slab/branch/end
    Classify {
        /// Neuron table file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Strahler index per node
    Strahler {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// standard | greedy
        #[arg(short, long)]
        method: Option<String>,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Arbor confidence per node
    Confidence {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Synapse flow centrality
    Flow {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// centrifugal | centripetal | sum | bending
        #[arg(short, long)]
        method: Option<String>,
        /// Weight presynapses by partner count
        #[arg(long)]
        polypre: bool,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Bending flow at branch points
    Bending {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long)]
        polypre: bool,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Split into axon, dendrite and primary neurite
    Split {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Flow method used to find the cut
        #[arg(short, long)]
        method: Option<String>,
        /// Only report the cut point
        #[arg(long)]
        cut_only: bool,
        /// Do not separate the primary neurite
        #[arg(long)]
        no_primary_neurite: bool,
        /// Keep the current root even if a soma is tagged
        #[arg(long)]
        no_reroot: bool,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Remove nodes by Strahler index
    Prune {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Indices to remove, e.g. 1,2
        #[arg(short, long, value_delimiter = ',', conflicts_with_all = ["min", "keep_top"])]
        indices: Vec<u32>,
        /// Lowest index to remove (with --max)
        #[arg(long, requires = "max")]
        min: Option<u32>,
        /// Highest index to remove (with --min)
        #[arg(long, requires = "min")]
        max: Option<u32>,
        /// Keep only the N highest indices
        #[arg(long, conflicts_with = "min")]
        keep_top: Option<usize>,
        /// Move connectors of removed nodes to the nearest surviving ancestor
        #[arg(long)]
        relocate: bool,
        /// Recompute Strahler indices even if present
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Merge fragments into one neuron
    Stitch {
        /// Neuron table files, first one is the base
        #[arg(num_args = 1.., required = true, value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
        /// all | leafs | none
        #[arg(short, long)]
        method: Option<String>,
        /// Node ids to prefer as join points
        #[arg(long, value_delimiter = ',')]
        prefer: Vec<i64>,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Segregation index of a neuron (or of the fragments in a file)
    Segregation {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Cable length and distance to root
    Cable {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },

    /// Show the collapsed root/branch/end topology
    Topology {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective config
    Show,
    /// Show config file locations
    Path,
    /// Print a commented template
    Template,
}
