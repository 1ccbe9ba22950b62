use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reassemble a byte stream and print the decoded messages.
    Decode(DecodeArgs),
    /// Encode one JSON message onto a byte stream.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding the byte stream. Reads stdin when omitted or "-".
    pub input: Option<PathBuf>,
    /// Bytes handed to the reassembler per read (at most 1 MiB).
    #[arg(
        long,
        default_value = "8192",
        value_parser = clap::value_parser!(u64).range(1..=decode::MAX_CHUNK_SIZE)
    )]
    pub chunk_size: u64,
    /// Largest message length a header may declare.
    #[arg(long, env = "WIREQUEUE_MAX_MESSAGE_SIZE")]
    pub max_message_size: Option<usize>,
    /// Exit after printing N records.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Message id (up to 48 bits).
    #[arg(long)]
    pub id: u64,
    /// Mark the message as expecting a reply.
    #[arg(long)]
    pub receptive: bool,
    /// JSON body.
    #[arg(long, conflicts_with_all = ["text", "file"])]
    pub json: Option<String>,
    /// String body (encoded as a JSON string).
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub text: Option<String>,
    /// Read the JSON body from a file.
    #[arg(long, conflicts_with_all = ["json", "text"])]
    pub file: Option<PathBuf>,
    /// Write to this file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    /// Append to the output file instead of truncating it.
    #[arg(long, requires = "output")]
    pub append: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
