//! WhatsApp session gateway.
//!
//! Owns one WhatsApp Web session through a bridge process, exposes it over a
//! small authenticated HTTP API, and sends a scheduled daily report to team
//! members read from a PostgREST data store.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod datastore;
pub mod gateway;
pub mod heartbeat;
pub mod logging;
pub mod whatsapp;
