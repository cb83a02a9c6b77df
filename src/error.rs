// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error types.
//!
//! `Config` and `Transport` are fatal: they propagate out of `main` and end
//! the process with a non-zero exit code. `Parse` and `Estimator` are
//! per-event: the dispatcher logs them and drops the offending message,
//! leaving tag state intact for the next event.

use std::fmt;

use crate::config::ConfigError;
use crate::estimator::EstimatorError;

/// Top-level error type returned from fatal paths (`main`, startup).
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Transport(TransportError),
    Parse(String),
    Estimator(EstimatorError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Parse(s) => write!(f, "parse error: {s}"),
            Self::Estimator(e) => write!(f, "estimator error: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Parse(_) => None,
            Self::Estimator(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<EstimatorError> for AppError {
    fn from(e: EstimatorError) -> Self {
        Self::Estimator(e)
    }
}

/// MQTT transport failures: broker connection, (un)subscribe, publish.
#[derive(Debug)]
pub enum TransportError {
    Client(rumqttc::ClientError),
    Connection(rumqttc::ConnectionError),
    InvalidBrokerAddr(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(e) => write!(f, "MQTT client error: {e}"),
            Self::Connection(e) => write!(f, "MQTT connection error: {e}"),
            Self::InvalidBrokerAddr(s) => write!(f, "invalid broker address: {s}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(e) => Some(e),
            Self::Connection(e) => Some(e),
            Self::InvalidBrokerAddr(_) => None,
        }
    }
}

impl From<rumqttc::ClientError> for TransportError {
    fn from(e: rumqttc::ClientError) -> Self {
        Self::Client(e)
    }
}

impl From<rumqttc::ConnectionError> for TransportError {
    fn from(e: rumqttc::ConnectionError) -> Self {
        Self::Connection(e)
    }
}

/// Recoverable errors raised while processing a single ingress message.
/// Logged by the dispatcher and dropped; never propagated to `main`.
#[derive(Debug, Clone, PartialEq)]
pub enum IngressError {
    MalformedTopic(String),
    MalformedPayload(String),
    UnknownLocator(String),
    TagCapacityExceeded(String),
    Estimator(String),
}

impl fmt::Display for IngressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedTopic(t) => write!(f, "malformed angle topic: {t}"),
            Self::MalformedPayload(s) => write!(f, "malformed angle payload: {s}"),
            Self::UnknownLocator(id) => write!(f, "unknown locator id: {id}"),
            Self::TagCapacityExceeded(id) => write!(f, "tag capacity exceeded, dropping tag {id}"),
            Self::Estimator(s) => write!(f, "estimator error: {s}"),
        }
    }
}

impl std::error::Error for IngressError {}
