// bifrost-broker/src/lib.rs
// ============================================================================
// Module: Bifrost Broker Library
// Description: Sink fan-out for the Bifrost runechain.
// Purpose: Dispatch inscribed runes to every configured audit destination.
// Dependencies: bifrost-core, reqwest
// ============================================================================

//! ## Overview
//! A rune is inscribed exactly once but may need to reach several audit
//! destinations: a local file, a webhook, an OTLP collector. This crate
//! provides [`fanout::CompositeSinkFanout`], which owns a set of
//! [`bifrost_core::Sink`] implementations and dispatches to all of them,
//! and the concrete sinks in [`sinks`] that a `bifrost.toml` can declare.

pub mod fanout;
pub mod sinks;

pub use fanout::CompositeSinkFanout;
pub use fanout::CompositeSinkFanoutBuilder;
pub use fanout::FanoutError;
pub use sinks::OtlpSpanSink;
pub use sinks::StdoutSink;
pub use sinks::WebhookSink;
