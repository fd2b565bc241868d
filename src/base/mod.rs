//! Core components, types, and utilities for herald-bot.
//!
//! This module contains the building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The TTL cache backing entity lookups.
//! - Domain entities and events.
//! - Common result types and named errors.

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod types;
