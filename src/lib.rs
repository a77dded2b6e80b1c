pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod feeds;
pub mod handlers;
pub mod models;
pub mod sync;
