//! Study streaks for a voice-channel accountability community.
//!
//! Hooter watches one "study" voice channel. Every day a member spends at least
//! `minimum_minutes` in it extends their streak; skipping a day resets it.
//!
//! | Last credited | Today is | Result |
//! |---------------|----------|--------|
//! | never | any day | streak starts at 1 |
//! | yesterday | next day | streak + 1 |
//! | today | same day | unchanged |
//! | 2+ days ago | later | streak back to 1 |
//!
//! "Day" always means the calendar day in the configured reference timezone.
//!
//! # Architecture
//!
//! - **Storage**: one JSON file, replaced atomically (temp file, fsync, rename,
//!   read-back verification)
//! - **Serialization**: a single task owns every read-modify-write cycle
//! - **Transport**: newline-delimited JSON over stdio; the chat gateway is a
//!   separate process
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`presence`]: inbound presence feed and the study-channel boundary
//! - [`streak`]: records, store, state machine, sessions, daily rollup
//! - [`server`]: stdio event loop wiring it all together

pub mod config;
pub mod presence;
pub mod server;
pub mod streak;
