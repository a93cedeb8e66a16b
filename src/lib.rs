pub mod analysis;
pub mod application;
pub mod archive;
pub mod commands;
pub mod config;
pub mod download;
pub mod http;
pub mod interrupt;
pub mod manifest;
pub mod package;
pub mod report;
pub mod runtime;
