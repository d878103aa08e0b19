use std::{
    fs,
    io::{self, IsTerminal},
    process::ExitCode,
    str::FromStr,
};

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use owo_colors::OwoColorize;
use simple_logger::SimpleLogger;

use crate::{
    api::Client,
    cli::{Cli, Command},
    config::ApiConfig,
    enrich::Crossref,
    ingest::IngestOptions,
    report::{Dashboard, ReportOptions, Templates},
    snapshot::{JournalCache, Snapshot},
};

mod aggregate;
mod api;
mod cli;
mod config;
mod enrich;
mod ingest;
mod normalize;
mod preprint;
mod progress;
mod report;
mod snapshot;

fn main() -> ExitCode {
    let args = Cli::parse();
    let use_color = io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();

    let level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("invalid log level {:?}, defaulting to INFO", args.log_level);
        LevelFilter::Info
    });
    if let Err(e) = SimpleLogger::new()
        .with_level(level)
        .with_colors(use_color)
        .init()
    {
        eprintln!("cannot initialise logging: {e}");
    }

    match run(args.command, use_color) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if use_color {
                eprintln!("{} {e}", "error:".red().bold());
            } else {
                eprintln!("error: {e}");
            }
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, use_color: bool) -> anyhow::Result<()> {
    match command {
        Command::Download {
            api,
            data,
            page_size,
            strip,
            no_enrich,
            crossref_url,
        } => {
            let client = Client::new(&ApiConfig::from_args(&api)?)?;
            let options = IngestOptions::new(page_size, strip);
            // Nothing is written unless the whole listing came through.
            let snapshot = ingest::download(&client, &options)?;

            fs::create_dir_all(&data.data_dir)
                .with_context(|| format!("cannot create {}", data.data_dir.display()))?;
            snapshot.save(&data.snapshot_path())?;
            snapshot.doi_index().save(&data.index_path())?;
            log::info!(
                "saved {} preprints to {}",
                snapshot.len(),
                data.snapshot_path().display()
            );

            if no_enrich {
                return Ok(());
            }
            let journals_path = data.journals_path();
            let mut cache = JournalCache::load_or_default(&journals_path)?;
            let crossref = Crossref::new(&crossref_url)
                .with_context(|| format!("invalid DOI service URL {crossref_url:?}"))?;
            let stats = enrich::enrich(&snapshot, &mut cache, &crossref);
            cache.save(&journals_path)?;

            if use_color {
                eprintln!(
                    "{} {} journals added  {} {} lookups failed",
                    "✓".green(),
                    stats.added,
                    "✗".red(),
                    stats.failed
                );
            } else {
                eprintln!(
                    "{} journals added, {} lookups failed",
                    stats.added, stats.failed
                );
            }
        }
        Command::Report {
            data,
            head,
            foot,
            top,
            table_rows,
            min_journal,
            output,
        } => {
            let snapshot = Snapshot::load(&data.snapshot_path())?;
            let cache = JournalCache::load_or_default(&data.journals_path())?;
            let templates = Templates::load(&head, &foot)?;

            let summary = aggregate::Summary::of(&snapshot);
            let monthly = aggregate::monthly(&snapshot);
            if monthly.undated > 0 {
                log::warn!("{} preprints left out of the monthly chart", monthly.undated);
            }
            let countries = aggregate::countries(&snapshot);
            let journals = aggregate::journals(&cache);
            let page = report::render(
                &Dashboard {
                    summary: &summary,
                    monthly: &monthly,
                    countries: &countries,
                    journals: &journals,
                },
                &templates,
                &ReportOptions {
                    top_countries: top,
                    country_rows: table_rows,
                    min_journal,
                },
            );

            match output {
                Some(path) => fs::write(&path, page)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => print!("{page}"),
            }
        }
        Command::Count { api } => {
            let client = Client::new(&ApiConfig::from_args(&api)?)?;
            println!("{}", client.total_count()?);
        }
        Command::Show { api, id } => {
            let client = Client::new(&ApiConfig::from_args(&api)?)?;
            let record = client.preprint(&id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Country { names } => {
            for name in names {
                println!("{}", normalize::country(&name));
            }
        }
    }
    Ok(())
}
