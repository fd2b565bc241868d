//! The bot's behaviours, each registered with the dispatcher as a listener.
//!
//! - `dice`: rolls dice on `!roll`
//! - `ping`: acknowledges `!ping`
//! - `activity`: logs voice channel transitions of opted-in users

pub mod activity;
pub mod dice;
pub mod ping;
pub mod reply;
