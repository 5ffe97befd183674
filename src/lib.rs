pub mod catalog;
pub mod client;
pub mod config;
pub mod download;
pub mod form;
pub mod payload;
