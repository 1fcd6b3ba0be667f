use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use anyhow::Result;

use profsym::Addr;

use clap::ArgAction;
use clap::Parser;


/// Parse an address from a string.
fn parse_addr(s: &str) -> Result<Addr> {
    // In our world addresses are always represented in hex, with or without 0x
    // prefix.
    Addr::from_str_radix(s.trim_start_matches("0x"), 16)
        .with_context(|| format!("failed to parse address: {s}"))
}

/// Parse a timeout in seconds.
fn parse_timeout(s: &str) -> Result<Duration> {
    let secs = s
        .parse::<u64>()
        .with_context(|| format!("failed to parse timeout: {s}"))?;
    Ok(Duration::from_secs(secs))
}


/// Symbolize addresses inside a binary, the way a profile taken of it
/// would be.
///
/// Addresses are interpreted as file offsets into the binary. The
/// result is printed in the form of a profile.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    /// The binary to symbolize addresses in.
    pub binary: PathBuf,
    /// The addresses to symbolize.
    #[arg(required = true, value_parser = parse_addr)]
    pub addrs: Vec<Addr>,
    /// The symbolization directive to use, of the form
    /// `[local|fastlocal|remote|none][:force][:demangle=[none|full|templates|default]]`.
    #[arg(short, long)]
    pub mode: Option<String>,
    /// A symbol service to fall back to if local symbolization is not
    /// possible (can be supplied multiple times).
    #[arg(short, long = "url")]
    pub urls: Vec<String>,
    /// The timeout for symbol service requests, in seconds.
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
    /// Increase verbosity (can be supplied multiple times).
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbosity: u8,
}
