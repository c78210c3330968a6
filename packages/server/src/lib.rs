// GeoPress - automated content pipeline core
//
// This crate drives the multi-tenant article pipeline: for every website the
// platform manages, it schedules generation runs, picks or mints a topic,
// generates an article with an LLM provider, scores it, and publishes it to
// the tenant's own article database.
//
// Layering follows kernel (infrastructure) / domains (business logic) /
// server (HTTP surface); the kernel never calls upward.

pub mod common;
pub mod domains;
pub mod kernel;
pub mod server;

pub use common::config::Config;
