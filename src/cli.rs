use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    api::{DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE},
    enrich::CROSSREF_BASE_URL,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum level of log messages written to stderr
    #[arg(short, long, global = true, default_value = "INFO", value_name = "LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download all preprint metadata and look up the journals of published versions
    Download {
        #[command(flatten)]
        api: ApiArgs,
        #[command(flatten)]
        data: DataArgs,
        /// Records requested per listing page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
        /// Extra top-level field removed from every record (repeatable); `metrics` is always
        /// removed
        #[arg(long = "strip", value_name = "FIELD")]
        strip: Vec<String>,
        /// Skip the journal lookup step
        #[arg(long)]
        no_enrich: bool,
        /// Base URL of the DOI metadata service
        #[arg(long, default_value = CROSSREF_BASE_URL, value_name = "URL")]
        crossref_url: String,
    },
    /// Render the HTML dashboard from previously downloaded data
    Report {
        #[command(flatten)]
        data: DataArgs,
        /// Fragment written before the generated sections
        #[arg(long, default_value = "static/include_head.html")]
        head: PathBuf,
        /// Fragment written after the generated sections
        #[arg(long, default_value = "static/include_foot.html")]
        foot: PathBuf,
        /// Countries shown individually in the pie chart
        #[arg(long, default_value_t = 20)]
        top: usize,
        /// Rows of the country table
        #[arg(long, default_value_t = 30)]
        table_rows: usize,
        /// Minimum number of papers for a journal to be listed
        #[arg(long, default_value_t = 3)]
        min_journal: usize,
        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the number of preprints the server reports
    Count {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Print the raw record of one preprint
    Show {
        #[command(flatten)]
        api: ApiArgs,
        /// Preprint identifier
        id: String,
    },
    /// Print the canonical form of country names
    Country {
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Base URL of the preprint metadata API
    #[arg(long, default_value = DEFAULT_BASE_URL, value_name = "URL")]
    pub base_url: String,
    /// File holding the API token
    #[arg(long, value_name = "PATH")]
    pub token_file: Option<PathBuf>,
    /// Fail instead of falling back to anonymous access
    #[arg(long)]
    pub require_token: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Directory holding the downloaded data files
    #[arg(long, default_value = "data", value_name = "DIR")]
    pub data_dir: PathBuf,
    /// Snapshot file name; a `.gz` suffix enables compression
    #[arg(long, default_value = "snapshot.json", value_name = "FILE")]
    pub snapshot: String,
    /// DOI index file name
    #[arg(long, default_value = "index.json", value_name = "FILE")]
    pub index: String,
    /// Journal cache file name
    #[arg(long, default_value = "doi_journal.json", value_name = "FILE")]
    pub journals: String,
}

impl DataArgs {
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index)
    }

    pub fn journals_path(&self) -> PathBuf {
        self.data_dir.join(&self.journals)
    }
}
