//! Helpers behind the `setup_cli` binary.

use rand::RngCore;

use crate::config::Config;

pub const SESSION_SECRET_BYTES: usize = 64;

/// A fresh hex-encoded secret for `DRAFT_ADMIN_SECRET`.
pub fn generate_session_secret() -> String {
    let mut bytes = [0u8; SESSION_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One line of `config check` output.
#[derive(Debug, PartialEq, Eq)]
pub struct SettingStatus {
    pub name: &'static str,
    pub is_set: bool,
}

pub fn check_settings(config: &Config) -> Vec<SettingStatus> {
    let missing = config.missing_secrets();
    ["DRAFT_ADMIN_SECRET", "DRAFT_ADMIN_USER", "DRAFT_ADMIN_PASS", "GITHUB_PAT"]
        .into_iter()
        .map(|name| SettingStatus { name, is_set: !missing.contains(&name) })
        .collect()
}
