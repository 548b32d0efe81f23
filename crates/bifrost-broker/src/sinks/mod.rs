// bifrost-broker/src/sinks/mod.rs
// ============================================================================
// Module: Bifrost Sinks
// Description: Concrete `Sink` implementations a `bifrost.toml` may declare.
// Purpose: Provide the stdout, webhook, and OTLP destinations named in the
//          specification's sink fan-out.
// Dependencies: bifrost_core::interfaces
// ============================================================================

//! ## Overview
//! Every sink here is fire-and-forget: construction can fail (a malformed
//! URL, an unreachable endpoint resolved lazily at send time), but `emit`
//! failures are always reported back as a [`bifrost_core::SinkError`] rather
//! than panicking, since the proxy treats sink failure as non-fatal.

mod otlp;
mod stdout;
mod webhook;

pub use otlp::OtlpSpanSink;
pub use stdout::StdoutSink;
pub use webhook::WebhookSink;
