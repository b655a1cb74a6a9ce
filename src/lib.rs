pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod eumetsat;
pub mod fetch;
pub mod fs_util;
pub mod integrity;
pub mod job;
pub mod output;
pub mod parser;
pub mod time;
