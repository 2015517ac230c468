//! A Discord bot that answers music links with their equivalents on other
//! streaming platforms, looked up through Songlink/Odesli.
//!
//! Wire types ([`types`], [`events`]) compile everywhere. Everything that
//! touches the network sits behind the `io` feature.

pub mod events;
pub mod types;

#[cfg(feature = "io")]
pub mod bot;
#[cfg(feature = "io")]
pub mod config;
#[cfg(feature = "io")]
pub mod gateway;
#[cfg(feature = "io")]
pub mod handlers;
#[cfg(feature = "io")]
pub mod http;
#[cfg(feature = "io")]
pub mod songlink;
