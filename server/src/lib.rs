pub mod config;
pub mod engine;
pub mod irc;
pub mod slack;
