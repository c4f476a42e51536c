//! PromptDaemon - CLI entry point
//!
//! Manages stored prompts and renders them in the sandbox.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, error, info};

use promptdaemon::PromptError;
use promptdaemon::cli::{Cli, Command, MessageArgs, OutputFormat, get_log_path};
use promptdaemon::config::Config;
use promptdaemon::domain::PromptTemplate;
use promptdaemon::service::PromptService;
use promptdaemon::state::StateManager;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level from the config file, before the full config load
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(storage = %config.storage.path.display(), "PromptDaemon loaded config");

    if let Err(err) = run(cli.command, &config).await {
        error!("{:#}", err);
        // PromptError messages already include their cause
        let (code, message) = match err.downcast_ref::<PromptError>() {
            Some(prompt_err) => (prompt_err.exit_code(), prompt_err.to_string()),
            None => (1, format!("{:#}", err)),
        };
        eprintln!("{} {}", "error:".red().bold(), message);
        std::process::exit(code);
    }
    Ok(())
}

async fn run(command: Command, config: &Config) -> Result<()> {
    debug!(?command, "run: called");
    match command {
        // check needs no store
        Command::Check { file } => {
            debug!("run: matched Check command");
            cmd_check(&file)
        }
        Command::List { parent, format } => {
            debug!(?parent, ?format, "run: matched List command");
            with_service(config, async move |service: &PromptService| {
                cmd_list(service, parent.as_deref(), format).await
            })
            .await
        }
        Command::Show { path, format } => {
            debug!(%path, ?format, "run: matched Show command");
            with_service(config, async move |service: &PromptService| cmd_show(service, &path, format).await).await
        }
        Command::Put { path, messages } => {
            debug!(%path, "run: matched Put command");
            with_service(config, async move |service: &PromptService| cmd_put(service, &path, messages).await).await
        }
        Command::Delete { path } => {
            debug!(%path, "run: matched Delete command");
            with_service(config, async move |service: &PromptService| cmd_delete(service, &path).await).await
        }
        Command::Render {
            path,
            params,
            params_file,
        } => {
            debug!(%path, "run: matched Render command");
            with_service(config, async move |service: &PromptService| {
                cmd_render(service, &path, params, params_file).await
            })
            .await
        }
    }
}

/// Open the store, run `f` against the service, then shut the store down
async fn with_service<F>(config: &Config, f: F) -> Result<()>
where
    F: AsyncFnOnce(&PromptService) -> Result<()>,
{
    let state = StateManager::spawn(&config.storage.path).context("Failed to open prompt store")?;
    let service = PromptService::new(config, state.clone())?;
    let result = f(&service).await;
    state.shutdown().await?;
    result
}

async fn cmd_list(service: &PromptService, parent: Option<&str>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let prompts = service.list(parent).await?;
            println!("{}", serde_json::to_string_pretty(&prompts)?);
        }
        OutputFormat::Html => println!("{}", service.index_html(parent).await?),
        OutputFormat::Text => {
            let prompts = service.list(parent).await?;
            if prompts.is_empty() {
                println!("No prompts stored");
            }
            for prompt in &prompts {
                let marker = if prompt.system_message.is_some() { "S" } else { " " };
                println!("{} {}", marker.dimmed(), prompt.path.cyan());
            }
        }
    }
    Ok(())
}

async fn cmd_show(service: &PromptService, path: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let prompt = service.get(path).await?;
            println!("{}", serde_json::to_string_pretty(&prompt)?);
        }
        OutputFormat::Html => println!("{}", service.prompt_html(path).await?),
        OutputFormat::Text => print_prompt(&service.get(path).await?),
    }
    Ok(())
}

fn print_prompt(prompt: &PromptTemplate) {
    println!("{}", prompt.path.cyan().bold());
    println!("{}", "system:".yellow());
    match &prompt.system_message {
        Some(system) => println!("{}", system),
        None => println!("{}", "(none)".dimmed()),
    }
    println!("{}", "user:".yellow());
    println!("{}", prompt.user_message);
}

fn read_source(inline: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

async fn cmd_put(service: &PromptService, path: &str, messages: MessageArgs) -> Result<()> {
    let user = read_source(messages.user, messages.user_file)?.unwrap_or_default();
    let system = read_source(messages.system, messages.system_file)?;
    let prompt = service.put(path, system, user).await?;
    println!("{} Stored prompt: {}", "✓".green(), prompt.path.cyan());
    Ok(())
}

async fn cmd_delete(service: &PromptService, path: &str) -> Result<()> {
    if service.delete(path).await? {
        println!("{} Deleted prompt: {}", "✓".green(), path.cyan());
    } else {
        println!("No prompt at {}", path.cyan());
    }
    Ok(())
}

async fn cmd_render(
    service: &PromptService,
    path: &str,
    params: Option<String>,
    params_file: Option<PathBuf>,
) -> Result<()> {
    let params = read_source(params, params_file)?.unwrap_or_default();
    let rendered = service.render(path, &params).await?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

fn cmd_check(file: &Path) -> Result<()> {
    let source = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    match stencil::compile(&source) {
        Ok(_) => {
            println!("{} {} compiles", "✓".green(), file.display());
            Ok(())
        }
        Err(err) => Err(eyre::eyre!(
            "{}:{}:{}: {}",
            file.display(),
            err.line,
            err.column,
            err.message
        )),
    }
}
