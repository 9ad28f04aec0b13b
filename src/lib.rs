//! Client for a remote file-storage http api: directory navigation, uploads
//! with progress tracking, and rename/delete/mkdir/download operations.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod path;
pub mod presenter;
pub mod shell;
pub mod state;
pub mod transfer;
pub mod utils;
