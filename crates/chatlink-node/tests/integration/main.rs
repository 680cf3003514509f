//! Integration test entry point for chatlink-node.
//!
//! Run with: cargo test --test integration

mod harness;
mod chain;
mod window;
mod wire;
mod room;
