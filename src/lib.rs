//! Recruit bot — replies to a GitHub profile URL or username with the
//! account's commit email.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod github;
pub mod logging;
pub mod lookup;
