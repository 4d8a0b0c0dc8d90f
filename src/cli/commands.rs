use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use crate::browser::FileBrowser;
use crate::echo::{register_demo_routes, register_demo_rpcs};
use crate::router::{Router, RpcRegistry};
use crate::rpc::{client, RpcConfig, RpcServer};
use crate::runtime_config::{normalize_prefix, RuntimeConfig};
use crate::server::{AppService, HttpConfig, HttpServer};
use crate::service_loop::ServiceLoop;

/// Command-line interface for edgeserve
#[derive(Parser, Debug)]
#[command(name = "edgeserve", version)]
#[command(about = "Small HTTP server, file browser and UDP JSON-RPC endpoint", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP and RPC servers
    Serve(ServeArgs),
    /// Send one RPC request and print the reply
    Fire(FireArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// JSON-lines configuration file
    #[arg(long, env = "EDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP listen address (e.g. 0.0.0.0:8080)
    #[arg(long)]
    pub http: Option<String>,

    /// RPC listen address (e.g. 0.0.0.0:5001)
    #[arg(long)]
    pub rpc: Option<String>,

    /// Directory exposed by the file browser
    #[arg(long)]
    pub browse_root: Option<PathBuf>,

    /// URL prefix of the file browser
    #[arg(long)]
    pub browse_prefix: Option<String>,

    /// Do not start the HTTP server
    #[arg(long, default_value_t = false)]
    pub no_http: bool,

    /// Do not start the RPC server
    #[arg(long, default_value_t = false)]
    pub no_rpc: bool,
}

impl ServeArgs {
    /// Flags win over every other configuration source.
    pub fn apply(&self, config: &mut RuntimeConfig) {
        if let Some(addr) = &self.http {
            config.http_addr = addr.clone();
        }
        if let Some(addr) = &self.rpc {
            config.rpc_addr = addr.clone();
        }
        if let Some(root) = &self.browse_root {
            config.browse_root = Some(root.clone());
        }
        if let Some(prefix) = &self.browse_prefix {
            config.browse_prefix = normalize_prefix(prefix);
        }
    }
}

#[derive(Args, Debug)]
pub struct FireArgs {
    /// RPC server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// RPC server port
    #[arg(long, default_value_t = 5001)]
    pub port: u16,

    /// Method to call
    #[arg(default_value = "listall")]
    pub method: String,

    /// Parameters as JSON; a non-array value becomes a single argument
    #[arg(long)]
    pub params: Option<String>,

    /// How long to wait for the reply
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,
}

impl FireArgs {
    pub fn parsed_params(&self) -> Result<Vec<Value>> {
        match &self.params {
            None => Ok(Vec::new()),
            Some(raw) => {
                let value: Value = serde_json::from_str(raw)
                    .with_context(|| format!("--params is not valid JSON: {raw}"))?;
                Ok(client::params_from_value(value))
            }
        }
    }
}

/// Parse the process arguments and run the selected command.
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(&args),
        Commands::Fire(args) => fire(&args),
    }
}

/// Bind the configured servers, without running them.
pub(crate) fn build_service_loop(config: &RuntimeConfig, args: &ServeArgs) -> Result<ServiceLoop> {
    if args.no_http && args.no_rpc {
        bail!("--no-http and --no-rpc leave nothing to serve");
    }
    let mut service_loop = ServiceLoop::new(config.tick());

    if !args.no_http {
        let router = Router::new();
        register_demo_routes(&router);
        let mut service = AppService::new(router);
        if let Some(root) = &config.browse_root {
            let browser = FileBrowser::new(root, &config.browse_prefix)
                .with_context(|| format!("cannot serve browse root {}", root.display()))?
                .with_chunk_size(config.chunk_size);
            service = service.with_browser(browser);
        }
        let http = HttpServer::bind(config.http_addr.as_str(), service)
            .with_context(|| format!("cannot bind HTTP server to {}", config.http_addr))?
            .with_config(HttpConfig {
                recv_buffer: config.http_recv_buffer,
                ..HttpConfig::default()
            });
        service_loop = service_loop.with_http(http);
    }

    if !args.no_rpc {
        let registry = RpcRegistry::new();
        registry.install_introspection();
        register_demo_rpcs(&registry);
        let rpc = RpcServer::bind(config.rpc_addr.as_str(), registry)
            .with_context(|| format!("cannot bind RPC server to {}", config.rpc_addr))?
            .with_config(RpcConfig {
                buffer_size: config.rpc_buffer_size,
                expose_fndoc: config.expose_fndoc,
                ..RpcConfig::default()
            });
        service_loop = service_loop.with_rpc(rpc);
    }

    Ok(service_loop)
}

fn install_signal_handlers(stop: &Arc<AtomicBool>) -> Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(stop))
                .with_context(|| format!("cannot install handler for signal {signal}"))?;
        }
    }
    #[cfg(not(unix))]
    let _ = stop;
    Ok(())
}

fn serve(args: &ServeArgs) -> Result<()> {
    let mut config = RuntimeConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    info!(config = ?config, "Starting edgeserve");

    let mut service_loop = build_service_loop(&config, args)?;
    let stop = Arc::new(AtomicBool::new(false));
    install_signal_handlers(&stop)?;
    service_loop.run_until(&stop);
    Ok(())
}

fn fire(args: &FireArgs) -> Result<()> {
    let params = args.parsed_params()?;
    let target = (args.host.as_str(), args.port);
    let reply = client::fire(
        target,
        &args.method,
        params,
        Duration::from_millis(args.timeout_ms),
    )
    .with_context(|| format!("no reply from {}:{}", args.host, args.port))?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
