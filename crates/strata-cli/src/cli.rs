use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    about = "strata: layered hash chains, Merkle proofs and integrity manifests",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a layered hash chain over some content
    Hash(HashArgs),
    /// Verify every chain stored in the state file
    VerifyLog,
    /// Generate an integrity report for a directory
    Report(ReportArgs),
    /// Write a file manifest for a directory
    Manifest(ManifestArgs),
    /// Check a directory against a stored manifest
    Check(CheckArgs),
    /// Build a Merkle tree and optionally prove an item
    Merkle(MerkleArgs),
    /// Cross-reference key=value pairs into one digest
    Xref(XrefArgs),
    /// Create a time-locked commitment
    Lock(LockArgs),
    /// Verify a time-locked commitment
    Unlock(UnlockArgs),
    /// Run a walkthrough of every operation
    Demo,
}

#[derive(Args, Debug)]
pub struct HashArgs {
    pub content: String,
    /// Number of layers (defaults to the configured depth)
    #[arg(short, long)]
    pub depth: Option<usize>,
    /// Do not append the chain to the state file
    #[arg(long)]
    pub no_persist: bool,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ManifestArgs {
    pub dir: PathBuf,
    #[arg(short, long, default_value = "manifest.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    pub manifest: PathBuf,
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct MerkleArgs {
    #[arg(required = true)]
    pub items: Vec<String>,
    /// Item to produce an inclusion proof for
    #[arg(long)]
    pub prove: Option<String>,
}

#[derive(Args, Debug)]
pub struct XrefArgs {
    #[arg(required = true, value_parser = parse_pair)]
    pub pairs: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    pub content: String,
    /// Unlock time, RFC 3339 (e.g. 2026-12-31T00:00:00Z)
    #[arg(long)]
    pub until: String,
    /// Write the commitment to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UnlockArgs {
    pub commitment: PathBuf,
    pub content: String,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{s}`")),
    }
}
