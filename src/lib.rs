pub mod api;
pub mod auth;
pub mod config;
pub mod consts;
pub mod gcp;
pub mod reporter;
