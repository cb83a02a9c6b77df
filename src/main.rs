// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multilocator Aggregator
//!
//! Correlates Bluetooth AoA angle reports arriving from several locators
//! over MQTT, keyed by per-tag sliding windows of sequence numbers, and
//! republishes estimated tag positions once enough locators have reported
//! on a given CTE:
//! - Indirect (server-side) AoA positioning behind a single aggregator
//! - Environments where each locator publishes independently to a broker
//! - Deployments that tolerate occasional dropped locator reports
//!
//! # Usage
//!
//! ```bash
//! # Start with a config file
//! aoa-multilocator --config multilocator.json
//!
//! # Override the broker address from the config
//! aoa-multilocator --config multilocator.json --broker mqtt.example.com:1883
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod dispatcher;
mod error;
mod estimator;
mod publisher;
mod registry;
mod schedule;
mod sequence;
mod transport;
mod window;

use config::MultilocatorConfig;
use dispatcher::Dispatcher;
use error::AppError;
use estimator::GeometricEstimator;
use transport::Transport;

/// Multilocator Aggregator - correlates per-locator AoA angle reports into
/// estimated tag positions.
#[derive(Parser, Debug)]
#[command(name = "aoa-multilocator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: PathBuf,

    /// MQTT broker address (HOST or HOST:PORT), overrides any value implied
    /// by the config file
    #[arg(short = 'm', long)]
    broker: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_broker_arg(broker: &str) -> (String, u16) {
    match broker.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (broker.to_string(), 1883),
        },
        None => (broker.to_string(), 1883),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(path = ?args.config, "loading configuration");
    let config = MultilocatorConfig::from_file(&args.config).map_err(AppError::from)?;
    config.validate().map_err(AppError::from)?;

    let (broker_host, broker_port) = args
        .broker
        .as_deref()
        .map(parse_broker_arg)
        .unwrap_or_else(|| ("localhost".to_string(), 1883));

    info!("+----------------------------------------------------+");
    info!("|  AoA Multilocator Aggregator v{}             |", env!("CARGO_PKG_VERSION"));
    info!("+----------------------------------------------------+");
    info!("|  Instance: {:39} |", config.multilocator_id);
    info!("|  Broker:   {:39} |", format!("{broker_host}:{broker_port}"));
    info!("|  Locators: {:39} |", config.locators.len());
    info!("|  Max tags: {:39} |", config.max_tags);
    info!("+----------------------------------------------------+");

    let mut transport = Transport::connect(
        &config.multilocator_id,
        &broker_host,
        broker_port,
        &config.angle_topic_prefix,
    )
    .await
    .map_err(AppError::from)?;

    let mut dispatcher: Dispatcher<GeometricEstimator> = Dispatcher::new(&config);

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping");
                break;
            }
            incoming = transport.next_angle() => {
                let incoming = incoming.map_err(AppError::from)?;
                match dispatcher.handle_angle(&incoming.locator_id, &incoming.tag_id, &incoming.payload) {
                    Ok(positions) => {
                        for published in positions {
                            let topic = transport::position_topic(
                                &config.position_topic_prefix,
                                &config.multilocator_id,
                                &published.tag_id,
                            );
                            transport
                                .publish_position(&topic, published.position.to_json_bytes())
                                .await
                                .map_err(AppError::from)?;
                        }
                    }
                    Err(e) => {
                        warn!(locator = %incoming.locator_id, tag = %incoming.tag_id, error = %e, "dropping angle report");
                    }
                }
            }
        }
    }

    info!("multilocator aggregator stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_broker_with_explicit_port() {
        assert_eq!(parse_broker_arg("mqtt.example.com:8883"), ("mqtt.example.com".to_string(), 8883));
    }

    #[test]
    fn defaults_to_1883_without_port() {
        assert_eq!(parse_broker_arg("mqtt.example.com"), ("mqtt.example.com".to_string(), 1883));
    }

    #[test]
    fn falls_back_to_default_port_on_unparsable_suffix() {
        assert_eq!(parse_broker_arg("mqtt.example.com:not-a-port"), ("mqtt.example.com:not-a-port".to_string(), 1883));
    }
}
