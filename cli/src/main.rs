#![allow(clippy::let_and_return, clippy::let_unit_value)]

mod args;

use std::io::stderr;

use anyhow::Context;
use anyhow::Result;

use profsym::HttpTransport;
use profsym::Mapping;
use profsym::MappingSources;
use profsym::Mode;
use profsym::Profile;
use profsym::Symbolizer;

use clap::Parser as _;

use tracing::subscriber::set_global_default as set_global_subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::FmtSubscriber;


/// Create a profile with a single mapping spanning the entire binary
/// and one location per address.
fn profile(args: &args::Args) -> Profile {
    let mut profile = Profile::new();
    let main = profile.add_mapping(Mapping {
        start: 0,
        limit: u64::MAX,
        offset: 0,
        file: args.binary.display().to_string(),
        ..Default::default()
    });
    for addr in &args.addrs {
        let _idx = profile.add_location(Some(main), *addr);
    }
    profile
}

/// The handler for symbolizing the addresses given on the command line.
fn symbolize(args: args::Args) -> Result<()> {
    let mut sources = MappingSources::new();
    for url in &args.urls {
        let () = sources.add(args.binary.display().to_string(), url);
    }

    let transport = match args.timeout {
        Some(timeout) => HttpTransport::with_timeout(timeout),
        None => HttpTransport::new(),
    }
    .context("failed to create HTTP transport")?;

    let symbolizer = Symbolizer::builder()
        .set_sources(sources)
        .set_transport(transport)
        .build();

    let mut profile = profile(&args);
    let report = match &args.mode {
        Some(directive) => symbolizer.symbolize(directive, &mut profile),
        None => symbolizer.symbolize_with(&Mode::default(), &mut profile),
    }
    .context("failed to symbolize addresses")?;

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    print!("{profile}");
    Ok(())
}


fn main() -> Result<()> {
    let args = args::Args::parse();
    let level = match args.verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_span_events(FmtSpan::FULL)
        .with_timer(SystemTime)
        .with_writer(stderr)
        .finish();

    let () =
        set_global_subscriber(subscriber).with_context(|| "failed to set tracing subscriber")?;

    symbolize(args)
}
