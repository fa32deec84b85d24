use srpa::cli::{next_page_args, parse_params, Cli, Commands, ConfigAction};
use srpa::config::Config;
use srpa::error::{Result, SrpaError};
use srpa::index::RefreshOutcome;
use srpa::records::{NewQuestion, Question, TagDimension};
use srpa::retrieval::{SearchQuery, SearchResultPage, Searcher, SeedSource};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Search { params, json } => {
            cmd_search(cli.config, &params, json)?;
        }
        Commands::DeleteMatching { params, confirm } => {
            cmd_delete_matching(cli.config, &params, confirm)?;
        }
        Commands::Show { id, json } => {
            cmd_show(cli.config, id, json)?;
        }
        Commands::Similar { id, params, json } => {
            cmd_similar(cli.config, id, &params, json)?;
        }
        Commands::Suggest { dimension, id } => {
            cmd_suggest(cli.config, &dimension, id)?;
        }
        Commands::Add { file } => {
            cmd_add(cli.config, &file)?;
        }
        Commands::Edit { id, file } => {
            cmd_edit(cli.config, id, &file)?;
        }
        Commands::Tag {
            id,
            topic,
            subtopic,
        } => {
            cmd_tag(cli.config, id, topic, subtopic)?;
        }
        Commands::Remove { id } => {
            cmd_remove(cli.config, id)?;
        }
        Commands::Filters { json } => {
            cmd_filters(cli.config, json)?;
        }
        Commands::Reindex => {
            cmd_reindex(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "srpa=debug" } else { "srpa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_searcher(config_path: Option<PathBuf>) -> Result<Searcher> {
    let config = load_config(config_path)?;
    Searcher::open(&config)
}

fn cmd_search(config_path: Option<PathBuf>, params: &[String], json: bool) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    let query = searcher.parse_query(&parse_params(params)?)?;
    let page = searcher.search(&query)?;
    print_page(&page, &query, json)
}

fn cmd_delete_matching(
    config_path: Option<PathBuf>,
    params: &[String],
    confirm: bool,
) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    let params = parse_params(params)?;

    if !confirm {
        let page = searcher.search_params(&params)?;
        println!(
            "{} records match. Re-run with --confirm to delete them.",
            page.pagination.total_results
        );
        return Ok(());
    }

    if searcher.delete_by_query(&params)? {
        println!("✓ Matching records deleted");
    }
    Ok(())
}

fn cmd_show(config_path: Option<PathBuf>, id: i64, json: bool) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    let question = searcher.get_question(id)?;

    if json {
        println!("{}", to_json(&question)?);
        return Ok(());
    }

    println!("{}", headline(&question));
    if let Some(date) = question.question_date {
        println!("Date: {}", date);
    }
    for (label, value) in [
        ("Author", &question.author),
        ("Answered by", &question.answer_author),
        ("Topic", &question.topic),
        ("Subtopic", &question.subtopic),
    ] {
        if let Some(category) = value {
            println!("{}: {}", label, category.name);
        }
    }
    if !question.context.is_empty() {
        println!("\n{}", question.context);
    }
    println!("\n{}", question.body);
    if !question.answer.is_empty() {
        println!("\nAnswer:\n{}", question.answer);
    }
    Ok(())
}

fn cmd_similar(
    config_path: Option<PathBuf>,
    id: i64,
    params: &[String],
    json: bool,
) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    let params = parse_params(params)?;
    let page = searcher.similar_to(id, &params)?;

    let mut query = searcher.parse_query(&params)?;
    query.seed = Some(SeedSource::Record(id));
    print_page(&page, &query, json)
}

fn cmd_suggest(config_path: Option<PathBuf>, dimension: &str, id: i64) -> Result<()> {
    let dimension: TagDimension = dimension.parse()?;
    let searcher = open_searcher(config_path)?;
    for name in searcher.suggest_tags(dimension, id)? {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_add(config_path: Option<PathBuf>, file: &Path) -> Result<()> {
    let question = read_question(file)?;
    let searcher = open_searcher(config_path)?;
    let id = searcher.create_question(&question)?;
    println!("✓ Created question {}", id);
    Ok(())
}

fn cmd_edit(config_path: Option<PathBuf>, id: i64, file: &Path) -> Result<()> {
    let question = read_question(file)?;
    let searcher = open_searcher(config_path)?;
    searcher.edit_question(id, &question)?;
    println!("✓ Updated question {}", id);
    Ok(())
}

fn cmd_tag(
    config_path: Option<PathBuf>,
    id: i64,
    topic: Option<String>,
    subtopic: Option<String>,
) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    searcher.retag_question(id, topic.as_deref(), subtopic.as_deref())?;
    let question = searcher.get_question(id)?;
    println!(
        "✓ Question {}: topic={} subtopic={}",
        id,
        question.topic.map(|c| c.name).unwrap_or_else(|| "-".to_string()),
        question.subtopic.map(|c| c.name).unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}

fn cmd_remove(config_path: Option<PathBuf>, id: i64) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    searcher.delete_question(id)?;
    println!("✓ Deleted question {}", id);
    Ok(())
}

fn cmd_filters(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let searcher = open_searcher(config_path)?;
    let options = searcher.list_filter_options()?;

    if json {
        println!("{}", to_json(&options)?);
        return Ok(());
    }

    for (key, names) in &options {
        println!("{} ({}):", key, names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn cmd_reindex(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = srpa::storage::SqliteStore::open(&config.database_path()?)?;
    let searcher = Searcher::new(std::sync::Arc::new(store), &config);

    match searcher.refresh_index() {
        RefreshOutcome::Installed {
            documents,
            classifiers,
        } => {
            println!("✓ Indexed {} record sides", documents);
            println!("  Classifiers: {}", classifiers.join(", "));
        }
        RefreshOutcome::KeptPrevious => {
            println!("⚠ Nothing to index");
        }
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            println!("{}", to_json(&config)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SrpaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'srpa config init' to create one."
        );
        return Config::from_env();
    }

    Config::load(&path)
}

fn read_question(file: &Path) -> Result<NewQuestion> {
    let content = std::fs::read_to_string(file).map_err(|e| SrpaError::Io {
        source: e,
        context: format!("Failed to read record file: {:?}", file),
    })?;
    serde_json::from_str(&content).map_err(|e| SrpaError::Json {
        source: e,
        context: format!("Invalid record in {:?}", file),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SrpaError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}

fn headline(question: &Question) -> String {
    format!(
        "[{}] {} #{}",
        question.id, question.report.name, question.number
    )
}

fn print_page(page: &SearchResultPage, query: &SearchQuery, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(page)?);
        return Ok(());
    }

    let p = &page.pagination;
    println!(
        "Page {}/{} ({} results)\n",
        p.current_page, p.total_pages, p.total_results
    );

    for hit in &page.items {
        let summary: String = hit.question.body.chars().take(100).collect();
        match hit.distance {
            Some(distance) => println!("{}  d={:.3}", headline(&hit.question), distance),
            None => println!("{}", headline(&hit.question)),
        }
        println!("  {}", summary);
        if !hit.matched_terms.is_empty() {
            println!("  terms: {}", hit.matched_terms.join(", "));
        }
    }
    if let Some(args) = next_page_args(query, p) {
        println!("\nNext page: srpa search {}", args);
    }
    Ok(())
}
