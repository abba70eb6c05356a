//! HTTP/JSON gateway in front of a gRPC upstream.
//!
//! ```text
//! # Serve with a config file, overriding the upstream
//! tonic-transcode-gateway serve --config gateway.yaml --upstream http://10.0.0.7:50051
//!
//! # Print the route table derived from a descriptor set
//! tonic-transcode-gateway routes --descriptor-set descriptors.bin
//! ```
//!
//! Produce the descriptor set with
//! `protoc --include_imports --descriptor_set_out=descriptors.bin ...` or
//! `buf build --as-file-descriptor-set -o descriptors.bin`.

#![forbid(unsafe_code)]

mod config;

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tonic::transport::{Channel, Endpoint};
use tonic_transcode::{Gateway, GatewayBuilder};
use tracing_subscriber::EnvFilter;

use crate::config::GatewayConfig;

/// HTTP/JSON to gRPC transcoding gateway.
#[derive(Parser)]
#[command(name = "tonic-transcode-gateway", version, about)]
enum Cli {
    /// Start the gateway.
    Serve(ServeArgs),

    /// Print the routes the gateway would serve, in match order.
    Routes(SourceArgs),
}

#[derive(Parser)]
struct SourceArgs {
    /// Path to a gateway config YAML file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serialized `FileDescriptorSet`. Overrides `descriptor_set` from the config file.
    #[arg(short, long)]
    descriptor_set: Option<PathBuf>,

    /// Comma-separated services to expose. Overrides `services` from the config file.
    #[arg(long, value_delimiter = ',')]
    services: Vec<String>,

    /// Expose annotated methods at `POST /{service}/{method}` too.
    #[arg(long)]
    native_paths: bool,
}

#[derive(Parser)]
struct ServeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Address to listen on. Overrides `listen` from the config file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// gRPC upstream URI. Overrides `upstream` from the config file.
    #[arg(short, long)]
    upstream: Option<String>,
}

impl SourceArgs {
    /// Load the config file (or defaults) and apply the CLI overrides.
    fn load(&self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => GatewayConfig::default(),
        };
        if let Some(path) = &self.descriptor_set {
            config.descriptor_set.clone_from(path);
        }
        if !self.services.is_empty() {
            config.services.clone_from(&self.services);
        }
        if self.native_paths {
            config.transcoding.native_paths = true;
        }
        Ok(config)
    }
}

fn builder(config: &GatewayConfig) -> anyhow::Result<GatewayBuilder> {
    let path = &config.descriptor_set;
    let descriptors = fs::read(path)
        .with_context(|| format!("Failed to read descriptor set: {}", path.display()))?;
    Ok(config
        .services
        .iter()
        .fold(Gateway::builder(descriptors), |builder, service| builder.service(service))
        .config(config.transcoding.clone()))
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse() {
        Cli::Serve(args) => run_serve(&args).await,
        Cli::Routes(args) => run_routes(&args),
    }
}

async fn run_serve(args: &ServeArgs) -> anyhow::Result<()> {
    let mut config = args.source.load()?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(upstream) = &args.upstream {
        config.upstream.clone_from(upstream);
        config.validate().context("Invalid --upstream")?;
    }
    init_tracing(&config.log_filter);

    // Connect on first use so the gateway can start before the upstream.
    let channel: Channel = Endpoint::from_shared(config.upstream.clone())
        .with_context(|| format!("Invalid upstream URI: {}", config.upstream))?
        .connect_lazy();
    let gateway = builder(&config)?
        .build(channel)
        .context("Failed to build routes")?;

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    tracing::info!(
        listen = %config.listen,
        upstream = %config.upstream,
        routes = gateway.routes().len(),
        "gateway listening"
    );

    axum::serve(listener, gateway.into_router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn run_routes(args: &SourceArgs) -> anyhow::Result<()> {
    let config = args.load()?;
    let channel = Endpoint::from_static("http://127.0.0.1:50051").connect_lazy();
    let gateway = builder(&config)?
        .build(channel)
        .context("Failed to build routes")?;

    println!("{} routes", gateway.routes().len());
    for rule in gateway.routes().iter() {
        match rule.response_body() {
            Some(field) => println!("  {rule} ({}, response_body: {field})", rule.kind()),
            None => println!("  {rule} ({})", rule.kind()),
        }
    }
    Ok(())
}
