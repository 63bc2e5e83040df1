use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jarvis::config::{JarvisConfig, ProviderKind};
use jarvis::server::JarvisServer;
use jarvis::ui::App;
use jarvis::voice::{create_listener, create_speaker, Speaker};
use jarvis::{Brain, JarvisError, Runtime};

#[derive(Parser)]
#[command(name = "jarvis", version, about = "Terminal voice assistant")]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat backend, overrides the config file and AI_PROVIDER
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderKind>,

    /// Model for the selected backend
    #[arg(long, global = true)]
    model: Option<String>,

    /// Log at INFO
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log at DEBUG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the assistant window (default)
    Ui,

    /// Process one command and print the reply
    Ask {
        /// Command text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Also speak the reply
        #[arg(long)]
        speak: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Listen port, overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List the command table
    Commands,

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config (API key masked)
    Show,
    /// Print the config file location
    Path,
    /// Write the defaults to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(cli: &Cli, to_file: bool) {
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    // The window owns the terminal, so its logs go to a file
    let log_file = to_file
        .then(JarvisConfig::log_path)
        .flatten()
        .and_then(|path| {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).ok()?;
            }
            OpenOptions::new().create(true).append(true).open(path).ok()
        });

    match (to_file, log_file) {
        (true, Some(file)) => builder.with_writer(Mutex::new(file)).init(),
        (true, None) => builder.with_writer(std::io::sink).init(),
        (false, _) => builder.with_writer(std::io::stderr).init(),
    }
}

/// Print the error with guidance and exit with status 1
#[allow(clippy::print_stderr)]
fn fatal(err: &JarvisError) -> ! {
    eprintln!("Error: {err}");
    eprintln!("{}", err.guidance());
    process::exit(1);
}

fn load_config(cli: &Cli) -> Result<JarvisConfig, JarvisError> {
    let mut config = JarvisConfig::load(cli.config.as_deref())?;

    if let Some(provider) = cli.provider {
        config.ai.provider = provider;
    }
    if let Some(model) = &cli.model {
        config.ai.set_active_model(model);
    }

    Ok(config)
}

/// Validate, build and initialize the brain; any failure is fatal
async fn start_brain(config: &JarvisConfig) -> Brain {
    let brain = config.validate().and_then(|()| Brain::from_config(config));
    let mut brain = match brain {
        Ok(brain) => brain,
        Err(e) => fatal(&e),
    };

    if let Err(e) = brain.initialize().await {
        fatal(&e);
    }

    tracing::info!(
        "Using {} with model {}",
        brain.conversation().provider_name(),
        brain.conversation().model()
    );
    brain
}

fn runtime(config: &JarvisConfig, brain: Brain) -> Runtime {
    Runtime::new(
        brain,
        create_listener(&config.voice),
        create_speaker(&config.voice),
    )
}

async fn run_ui(config: JarvisConfig) -> anyhow::Result<()> {
    let brain = start_brain(&config).await;
    let label = format!(
        "{}:{}",
        brain.conversation().provider_name(),
        brain.conversation().model()
    );
    let app = App::new(runtime(&config, brain), &config, label);

    // The draw loop blocks on terminal input
    tokio::task::block_in_place(|| jarvis::ui::run(app))
        .map_err(|e| anyhow::anyhow!("{e:?}"))
}

#[allow(clippy::print_stdout)]
async fn run_ask(config: JarvisConfig, text: &[String], speak: bool) -> anyhow::Result<()> {
    let brain = start_brain(&config).await;
    let runtime = runtime(&config, brain);

    let reply = runtime.process(&text.join(" ")).await;
    println!("{}", reply.text);

    if speak {
        create_speaker(&config.voice)
            .speak(&reply.text)
            .await
            .map_err(JarvisError::from)?;
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_serve(mut config: JarvisConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let brain = start_brain(&config).await;
    let runtime = runtime(&config, brain);
    let voice_enabled = runtime.voice_enabled();

    let server = match JarvisServer::start(runtime, &config.server).await {
        Ok(server) => server,
        Err(e) => fatal(&e),
    };

    println!("Server running at: http://{}", server.addr());
    println!(
        "Voice features: {}",
        if voice_enabled { "Enabled" } else { "Disabled" }
    );

    tokio::select! {
        result = server.wait() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}

/// `config path` and `config init` work before any config file exists
#[allow(clippy::print_stdout)]
fn run_config(cli: &Cli, action: Option<&ConfigAction>) -> anyhow::Result<()> {
    let path = cli.config.clone().or_else(JarvisConfig::config_path);

    match action.unwrap_or(&ConfigAction::Show) {
        ConfigAction::Show => {
            let mut shown = match load_config(cli) {
                Ok(config) => config,
                Err(e) => fatal(&e),
            };
            if shown.ai.gemini_api_key.is_some() {
                shown.ai.gemini_api_key = Some("********".to_string());
            }
            print!("{}", shown.to_toml()?);
        }
        ConfigAction::Path => {
            let path = path.context("Could not determine config path")?;
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            let path = path.context("Could not determine config path")?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            JarvisConfig::sensible_defaults().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_commands(config: &JarvisConfig) {
    print!("{}", config.command_table().describe());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Commands::Ui);

    init_logging(&cli, matches!(command, Commands::Ui));
    tracing::info!("Starting jarvis version {}", env!("CARGO_PKG_VERSION"));

    if let Commands::Config { action } = &command {
        return run_config(&cli, action.as_ref());
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fatal(&e),
    };

    match command {
        Commands::Ui => run_ui(config).await,
        Commands::Ask { text, speak } => run_ask(config, &text, speak).await,
        Commands::Serve { port } => run_serve(config, port).await,
        Commands::Commands => {
            run_commands(&config);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}
