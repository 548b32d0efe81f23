// bifrost-broker/src/fanout.rs
// ============================================================================
// Module: Sink Fan-out Builder
// Description: Builds the proxy's sink list from declared configuration.
// Purpose: Turn a list of `SinkDeclaration`s into constructed, validated,
//          event-filtered `Sink` trait objects.
// Dependencies: bifrost_core::{interfaces, model}, crate::sinks
// ============================================================================

//! ## Overview
//! [`CompositeSinkFanoutBuilder`] is a named-registry lookup: each
//! [`SinkDeclaration`] names a `type` (`stdout`, `webhook`, `otlp`) and the
//! builder constructs the matching concrete sink, wraps it so only the
//! declared decision classes reach it, and hands the whole set back as the
//! `Vec<Arc<dyn Sink>>` a [`bifrost_core::BifrostProxy`] fans rune emission
//! out to.

use std::sync::Arc;

use bifrost_core::Sink;
use bifrost_core::SinkError;
use bifrost_core::model::Rune;
use bifrost_core::model::SinkDeclaration;
use bifrost_core::model::WardDecision;
use thiserror::Error;

use crate::sinks::OtlpSpanSink;
use crate::sinks::StdoutSink;
use crate::sinks::WebhookSink;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building the sink fan-out from configuration.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// A declared sink's `type` is not one this broker knows how to build.
    #[error("sink '{0}' has unknown type '{1}'")]
    UnknownType(String, String),
    /// A `webhook` sink was declared without a `url`.
    #[error("sink '{0}' is type webhook but has no url")]
    MissingUrl(String),
    /// An `otlp` sink was declared without an `endpoint`.
    #[error("sink '{0}' is type otlp but has no endpoint")]
    MissingEndpoint(String),
    /// The underlying HTTP transport could not be constructed.
    #[error("sink '{0}' failed to initialize transport: {1}")]
    Transport(String, String),
}

// ============================================================================
// SECTION: Event-Filtered Sink
// ============================================================================

/// Wraps a sink so [`Sink::emit`] is a no-op for decision classes outside
/// the declared filter. An empty filter passes every decision.
struct FilteredSink {
    inner: Arc<dyn Sink>,
    events: Vec<WardDecision>,
}

impl Sink for FilteredSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn emit(&self, rune: &Rune) -> Result<(), SinkError> {
        if self.events.is_empty() || self.events.contains(&rune.decision) {
            self.inner.emit(rune)
        } else {
            Ok(())
        }
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush()
    }

    fn close(&self) {
        self.inner.close();
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the fan-out sink list for one `bifrost.toml`'s `sinks` section.
#[derive(Default)]
pub struct CompositeSinkFanoutBuilder {
    sinks: Vec<Arc<dyn Sink>>,
}

impl CompositeSinkFanoutBuilder {
    /// Starts an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink built directly from a declaration, dispatching on its
    /// `type` field.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError`] if the declaration's type is unknown, a
    /// required field is missing, or the sink's transport cannot be
    /// initialized. Declarations are expected to have already passed
    /// `bifrost-config`'s load-time validation, so these are defensive
    /// checks rather than the primary validation path.
    pub fn add_declaration(mut self, declaration: &SinkDeclaration) -> Result<Self, FanoutError> {
        let built: Arc<dyn Sink> = match declaration.sink_type.as_str() {
            "stdout" => Arc::new(StdoutSink::new(declaration.name.clone())),
            "webhook" => {
                let url = declaration
                    .url
                    .clone()
                    .ok_or_else(|| FanoutError::MissingUrl(declaration.name.clone()))?;
                Arc::new(
                    WebhookSink::new(declaration.name.clone(), url)
                        .map_err(|err| FanoutError::Transport(declaration.name.clone(), err.to_string()))?,
                )
            }
            "otlp" => {
                let endpoint = declaration
                    .endpoint
                    .clone()
                    .ok_or_else(|| FanoutError::MissingEndpoint(declaration.name.clone()))?;
                Arc::new(
                    OtlpSpanSink::new(declaration.name.clone(), endpoint)
                        .map_err(|err| FanoutError::Transport(declaration.name.clone(), err.to_string()))?,
                )
            }
            other => {
                return Err(FanoutError::UnknownType(declaration.name.clone(), other.to_string()));
            }
        };
        self.sinks.push(Arc::new(FilteredSink { inner: built, events: declaration.events.clone() }));
        Ok(self)
    }

    /// Adds every declaration in order, short-circuiting on the first
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`FanoutError`] encountered.
    pub fn add_all(mut self, declarations: &[SinkDeclaration]) -> Result<Self, FanoutError> {
        for declaration in declarations {
            self = self.add_declaration(declaration)?;
        }
        Ok(self)
    }

    /// Finishes the builder, producing the sink list a [`bifrost_core::BifrostProxy`]
    /// fans rune emission out to.
    #[must_use]
    pub fn build(self) -> CompositeSinkFanout {
        CompositeSinkFanout { sinks: self.sinks }
    }
}

/// The constructed, ready-to-use sink fan-out list.
pub struct CompositeSinkFanout {
    sinks: Vec<Arc<dyn Sink>>,
}

impl CompositeSinkFanout {
    /// Builds the fan-out directly from a declaration list.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError`] under the same conditions as
    /// [`CompositeSinkFanoutBuilder::add_declaration`].
    pub fn from_declarations(declarations: &[SinkDeclaration]) -> Result<Self, FanoutError> {
        Ok(CompositeSinkFanoutBuilder::new().add_all(declarations)?.build())
    }

    /// Consumes the fan-out, returning its sink list for
    /// [`bifrost_core::BifrostProxy::new`].
    #[must_use]
    pub fn into_sinks(self) -> Vec<Arc<dyn Sink>> {
        self.sinks
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]
    #![allow(clippy::expect_used, reason = "Tests use expect for explicit failure messages.")]
    use super::*;

    fn declaration(sink_type: &str) -> SinkDeclaration {
        SinkDeclaration {
            name: "test-sink".to_string(),
            sink_type: sink_type.to_string(),
            events: Vec::new(),
            url: None,
            endpoint: None,
        }
    }

    #[test]
    fn builds_a_stdout_sink_with_no_extra_fields() {
        let fanout = CompositeSinkFanout::from_declarations(&[declaration("stdout")]).expect("build");
        assert_eq!(fanout.into_sinks().len(), 1);
    }

    #[test]
    fn rejects_unknown_sink_type() {
        let err = CompositeSinkFanout::from_declarations(&[declaration("carrier-pigeon")]).unwrap_err();
        assert!(matches!(err, FanoutError::UnknownType(_, _)));
    }

    #[test]
    fn rejects_webhook_without_url() {
        let err = CompositeSinkFanout::from_declarations(&[declaration("webhook")]).unwrap_err();
        assert!(matches!(err, FanoutError::MissingUrl(_)));
    }

    #[test]
    fn rejects_otlp_without_endpoint() {
        let err = CompositeSinkFanout::from_declarations(&[declaration("otlp")]).unwrap_err();
        assert!(matches!(err, FanoutError::MissingEndpoint(_)));
    }
}
