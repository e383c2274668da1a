pub mod api;
pub mod assignment;
pub mod config;
pub mod directory;
pub mod download;
pub mod humanize;
pub mod ledger;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod watcher;
