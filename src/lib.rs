//! CRUD Board
//!
//! Filtered, sorted lists kept live by a change feed, for five small
//! domains (todos, food reviews, pokemon, photos, markdown notes), with
//! threaded reviews under foods and pokemon. Runs against a hosted
//! PostgREST-style backend or a local SQLite store.

pub mod board;
pub mod commands;
pub mod components;
pub mod config;
pub mod domain;
pub mod markdown;
pub mod notice;
pub mod repository;
pub mod session;
pub mod store;
pub mod sync;

pub use board::Board;
pub use config::{AppConfig, ConfigError};
