//! 'main' for the Strata omnibus process

use anyhow::Result;
use caryatid_process::Process;
use clap::Parser;
use config::{Config, Environment, File};
use std::sync::Arc;
use strata_common::messages::Message;
use tracing::info;

// External modules
use strata_module_chain_selection::ChainSelection;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{filter, fmt, EnvFilter, Registry};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long, value_name = "PATH", default_values_t = vec!["omnibus".to_string()])]
    config: Vec<String>,
}

/// Standard main
#[tokio::main]
pub async fn main() -> Result<()> {
    let args = Args::parse();

    // Standard logging using RUST_LOG for log levels
    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());

    // Only turn on tracing if some OTEL environment variables exist
    if std::env::vars().any(|(name, _)| name.starts_with("OTEL_")) {
        // Send span tracing to opentelemetry
        // Should pick up standard OTEL_* environment variables
        let otel_exporter = SpanExporter::builder().with_tonic().build()?;
        let otel_tracer = SdkTracerProvider::builder()
            .with_batch_exporter(otel_exporter)
            .build()
            .tracer("rust-otel-otlp");
        let otel_layer = OpenTelemetryLayer::new(otel_tracer)
            .with_filter(
                EnvFilter::from_default_env().add_directive(filter::LevelFilter::INFO.into()),
            )
            .with_filter(filter::filter_fn(|meta| meta.is_span()));
        Registry::default().with(fmt_layer).with(otel_layer).init();
    } else {
        Registry::default().with(fmt_layer).init();
    }

    info!("Strata omnibus process");

    // Read the config
    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file));
    }
    let config = Arc::new(builder.add_source(Environment::with_prefix("STRATA")).build()?);

    // Create the process
    let mut process = Process::<Message>::create(config).await;

    // Register modules
    ChainSelection::register(&mut process);

    // Run it
    process.run().await?;

    // Bye!
    info!("Exiting");

    Ok(())
}
