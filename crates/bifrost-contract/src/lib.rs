// bifrost-contract/src/lib.rs
// ============================================================================
// Module: Bifrost Contract Library
// Description: Concrete JSON-RPC-over-pipe framing for the downstream and
//              upstream halves of the Bifrost proxy.
// Purpose: Implement the abstract "client/server port" the specification
//          leaves framing-agnostic, as a stdio child-process transport.
// Dependencies: bifrost-core
// ============================================================================

//! ## Overview
//! `bifrost_core` defines the [`bifrost_core::DownstreamClient`] trait and
//! leaves its wire framing to an integrating crate. This crate is that
//! integration: [`downstream::StdioDownstreamClient`] implements the trait
//! by speaking line-delimited JSON-RPC to a spawned child process, and
//! [`upstream::serve`] is the matching agent-facing half, reading the same
//! framing from an arbitrary byte stream (in practice, the proxy process's
//! own stdin/stdout) and driving a `BifrostProxy` to answer it.

pub mod downstream;
pub mod jsonrpc;
pub mod upstream;

pub use downstream::StdioDownstreamClient;
pub use upstream::serve;
