use std::env;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use log::LevelFilter;
use tokio::net::TcpListener;
use tracing::{debug, info};

use joist::api;
use joist::config::AppConfig;
use joist::db::{Database, PgChangeSource};
use joist::relay::{Relay, SubscriptionRegistry};
use joist::ws::{BroadcastForwarder, WsHub};

const APP_NAME: &str = "joist";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(&ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("config file: {}", ctx.config_file.display());

    match cli.command {
        Command::Serve(cmd) => async_main(ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Joist - real-time PostgreSQL change relay.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON logs
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay server
    Serve(ServeCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Override the bind host
    #[arg(long)]
    host: Option<String>,
    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    config_file: PathBuf,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let config_file = resolve_config_file(common.config.clone())?;
        if !config_file.exists() {
            write_default_config(&config_file)?;
        }
        let config = AppConfig::load(&config_file)?;
        Ok(Self {
            common,
            config_file,
            config,
        })
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            return LevelFilter::Trace;
        }
        if self.common.debug || self.common.verbose >= 1 {
            return LevelFilter::Debug;
        }
        self.config
            .logging
            .level
            .parse()
            .unwrap_or(LevelFilter::Info)
    }

    fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("joist={level},tower_http={level}")));

        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .ok();
        } else {
            let disable_color = env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_ansi(!disable_color))
                .try_init()
                .ok();
        }

        Ok(())
    }
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }

    // Storage pool first; the relay and the handlers both depend on it.
    let db = Database::new(&config.database).await?;

    let hub = Arc::new(WsHub::new());
    let registry = Arc::new(SubscriptionRegistry::new());
    registry.subscribe(
        &config.relay.channel,
        Arc::new(BroadcastForwarder::new(hub.clone())),
    );

    // The relay must be listening before any subscriber can connect, so the
    // server socket is bound only after start() returns.
    let mut relay = Relay::new(registry);
    let source = PgChangeSource::new(&config.database.url);
    relay
        .start(source, std::slice::from_ref(&config.relay.channel))
        .await
        .context("starting change relay")?;

    let state = api::AppState::new(
        db.clone(),
        hub.clone(),
        relay.state(),
        config.cors.origins.clone(),
    );
    let app = api::create_router(state);

    let addr: SocketAddr = config.bind_addr().parse().context("invalid address")?;

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    // Reverse startup order on shutdown: cancel the pump (which releases
    // the source connection), close the subscriber connections so the server
    // can drain, and close the pool last.
    let shutdown_signal = {
        let hub = hub.clone();
        async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install signal handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }

            info!("Shutdown signal received");

            relay.shutdown().await;
            hub.close_all();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("running server")?;

    db.close().await;

    info!("Shutdown complete");
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let toml = toml::to_string_pretty(&ctx.config)
                .context("serializing configuration to TOML")?;
            print!("{toml}");
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.config_file.display());
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

fn resolve_config_file(override_path: Option<PathBuf>) -> Result<PathBuf> {
    let config_file = match override_path {
        Some(path) => {
            let expanded = expand_path(path)?;
            if expanded.is_dir() {
                expanded.join("config.toml")
            } else {
                expanded
            }
        }
        None => default_config_dir()?.join("config.toml"),
    };

    if config_file.parent().is_none() {
        return Err(anyhow!("invalid config file path: {config_file:?}"));
    }

    Ok(config_file)
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push('\n');
    body.push_str("# File: ");
    body.push_str(&path.display().to_string());
    body.push('\n');
    body.push('\n');
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        let expanded = shellexpand::full(text).context("expanding path")?;
        Ok(PathBuf::from(expanded.to_string()))
    } else {
        Ok(path)
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}
