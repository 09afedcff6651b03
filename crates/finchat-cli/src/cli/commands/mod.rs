//! Command handlers.

pub mod ask;
pub mod chat;
pub mod config;
pub mod dataset;
pub mod turn_io;
