//! adtracker - ad click tracking and analytics backend
//!
//! Records pixel hits against registered ads and serves time-bucketed
//! visit statistics over a small HTTP API.
//!
//! # Architecture
//! - `analytics`: bucket calendar and series alignment
//! - `storage`: SeaORM storage backend (SQLite / MySQL / PostgreSQL)
//! - `services`: business logic (ads, tracking ingest, stats)
//! - `api`: HTTP handlers and DTOs
//! - `config`: configuration management
//! - `system`: logging setup

pub mod analytics;
pub mod api;
pub mod config;
pub mod errors;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
