//! CLI command definitions and parsing
use crate::error::{Result, SrpaError};
use crate::retrieval::{Pagination, QueryParams, SearchQuery};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "srpa",
    version,
    about = "Registry, search and tag suggestion for parliamentary questions",
    long_about = "srpa stores parliamentary question/answer records tagged by report, author, \
                  answer author, topic and subtopic, and searches them by structured filters or \
                  by text similarity. Queries are given as key=value parameters, e.g. \
                  `srpa search ministerio=salud orden=date-desc`."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/srpa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search records by filters and/or text similarity
    Search {
        /// Query parameters as key=value (q, pregunta, ministerio, fecha, orden, pagina, ...)
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Delete every record matched by a query
    DeleteMatching {
        /// Query parameters as key=value
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Actually delete; without it only the matches are listed
        #[arg(long)]
        confirm: bool,
    },

    /// Show one record
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Records similar to an existing one
    Similar {
        id: i64,

        /// Extra query parameters (buscar-usando, buscar-dentro-de, filters, ...)
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Suggest topics or subtopics for a record
    Suggest {
        /// topic (ministerio) or subtopic (area)
        dimension: String,

        id: i64,
    },

    /// Add a record from a JSON file
    Add {
        /// JSON object with number, body, report and optional fields
        file: PathBuf,
    },

    /// Replace a record with the contents of a JSON file
    Edit { id: i64, file: PathBuf },

    /// Set the topic and/or subtopic of a record (empty value clears it)
    Tag {
        id: i64,

        #[arg(short, long)]
        topic: Option<String>,

        #[arg(short, long)]
        subtopic: Option<String>,
    },

    /// Delete one record
    Remove { id: i64 },

    /// List the values each category filter can take
    Filters {
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the similarity index and classifiers
    Reindex,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// `key=value` arguments into query parameters; later keys win
pub fn parse_params(pairs: &[String]) -> Result<QueryParams> {
    let mut params = QueryParams::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(SrpaError::validation(
                pair.as_str(),
                "expected a key=value parameter",
            ));
        };
        params.insert(key.trim().to_string(), value.to_string());
    }
    Ok(params)
}

/// Arguments reproducing `query` for the page after the current one
pub fn next_page_args(query: &SearchQuery, pagination: &Pagination) -> Option<String> {
    if pagination.current_page >= pagination.total_pages {
        return None;
    }

    let args: Vec<String> = query
        .to_params(Some(pagination.current_page + 1))
        .into_iter()
        .map(|(key, value)| {
            if value.chars().any(char::is_whitespace) {
                format!("{}='{}'", key, value.replace('\'', "'\\''"))
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect();
    Some(args.join(" "))
}
