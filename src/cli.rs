use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Kubehop - resolve Kubernetes contexts scattered across kubeconfig stores
#[derive(Parser, Debug)]
#[command(name = "kubehop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.kube/kubehop.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Directory for persisted indexes and caches (default: ~/.kube/kubehop-state)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_directory: Option<PathBuf>,

    /// Additional kubeconfig path(s), colon-separated like $KUBECONFIG
    #[arg(long, global = true, value_name = "PATHS")]
    pub kubeconfig_path: Option<String>,

    /// Skip persisted indexes and query every store directly
    #[arg(long, global = true)]
    pub no_index: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the contexts reachable through the configured stores
    List {
        /// Glob-style pattern (`*` and `?`) narrowing the listing
        #[arg(value_name = "PATTERN")]
        pattern: Option<String>,

        /// Also print the store each context comes from
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the kubeconfig of one context to stdout
    Get {
        /// Context name as printed by `list`
        #[arg(value_name = "CONTEXT")]
        context: String,
    },

    /// Delete all persisted indexes and caches
    Clean,
}
