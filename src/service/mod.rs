//! Service integrations for the chat platform.
//!
//! This module contains:
//! - The platform client trait and its Discord implementation
//! - The [`ports::Reader`] / [`ports::Responder`] seams the core talks through
//! - The caching entity resolver that sits in front of the platform
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod platform;
pub mod ports;
pub mod resolver;

// Mocks.
