use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "taxbook",
    version,
    about = "Local casebook structure extraction and chunking tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Structure(StructureArgs),
    Ingest(IngestArgs),
    Pages(PagesArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StructureArgs {
    /// Plain-text casebook with embedded page markers.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = ".cache/taxbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Plain-text casebook with embedded page markers.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = ".cache/taxbook")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    /// Defaults to the sanitized input file stem.
    #[arg(long)]
    pub textbook_id: Option<String>,

    #[arg(long, default_value = "Fundamentals of Corporate Taxation")]
    pub title: String,
}

#[derive(Args, Debug, Clone)]
pub struct PagesArgs {
    /// Plain-text casebook with embedded page markers.
    #[arg(long)]
    pub input: PathBuf,

    /// First logical book page of the window (inclusive).
    #[arg(long)]
    pub start_page: u32,

    /// Last logical book page of the window (inclusive).
    #[arg(long)]
    pub end_page: u32,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/taxbook")]
    pub cache_root: PathBuf,
}
