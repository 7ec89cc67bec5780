//! Command-line driver for `bintpl-core`: runs a binary template against a
//! file on disk and prints the data-type/comment annotations it produces.

use anyhow::{Context, Result};
use bintpl_core::context::RunConfig;
use bintpl_core::host::Host;
use bintpl_core::TemplateError;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

/// Run a binary template against a file and print its annotations.
#[derive(Parser, Debug)]
#[command(name = "bintpl", version, about)]
struct Args {
    /// Path to the `.bt` template file.
    template: PathBuf,

    /// Path to the target buffer the template is executed against.
    target: PathBuf,

    /// Statements between cooperative yield checks.
    #[arg(long, default_value_t = RunConfig::default().yield_every)]
    yield_every: u32,

    /// Struct/function recursion depth ceiling.
    #[arg(long, default_value_t = RunConfig::default().max_recursion_depth)]
    max_depth: usize,

    /// Start in big-endian mode (templates may still toggle this at runtime).
    #[arg(long)]
    big_endian: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// A `Host` backed by an in-memory copy of a file on disk. Annotations are
/// printed to stdout in the order they're received, standing in for the
/// document model of the embedding hex-editor this crate was extracted from.
struct FileHost {
    buffer: Vec<u8>,
}

impl Host for FileHost {
    fn set_data_type(&mut self, offset: u64, length: u64, code: &str) {
        println!("data_type  {offset:#010x}..{:#010x}  {code}", offset + length);
    }

    fn set_comment(&mut self, offset: u64, length: u64, text: &str) {
        println!("comment    {offset:#010x}..{:#010x}  {text}", offset + length);
    }

    fn read_data(&mut self, offset: u64, length: usize) -> Vec<u8> {
        let offset = offset as usize;
        if offset >= self.buffer.len() {
            return Vec::new();
        }
        let end = (offset + length).min(self.buffer.len());
        self.buffer[offset..end].to_vec()
    }

    fn file_length(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn print(&mut self, s: &str) {
        println!("print      {s}");
    }

    fn yield_now(&mut self) -> Result<(), TemplateError> {
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let buffer = fs::read(&args.target)
        .with_context(|| format!("reading target buffer {}", args.target.display()))?;
    let mut host = FileHost { buffer };

    let config = RunConfig {
        yield_every: args.yield_every,
        max_recursion_depth: args.max_depth,
        big_endian: args.big_endian,
    };

    bintpl_core::run_template(&args.template, &mut host, config)
        .with_context(|| format!("running template {}", args.template.display()))?;

    Ok(())
}
