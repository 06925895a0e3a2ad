use std::sync::Arc;

use crate::models::git_operations::GitHost;

/// Shared by every worker; the git host is the only state the service holds.
pub struct AppState {
    pub git_host: Arc<dyn GitHost>,
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
