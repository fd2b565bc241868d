//! Event handling between the gateway and the behaviours.
//!
//! This module provides:
//! - Normalization of raw gateway payloads into resolved events
//! - Dispatch of those events to every registered listener

pub mod dispatcher;
pub mod normalizer;
