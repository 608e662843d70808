// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./kurir.toml` > `~/.config/kurir/kurir.toml` > `/etc/kurir/kurir.toml`,
//! with `KURIR_` environment variables overriding all files.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::KurirConfig;

/// Sections that environment variables may target.
const ENV_SECTIONS: &[&str] = &["gateway", "storage", "session", "engine"];

const SYSTEM_CONFIG: &str = "/etc/kurir/kurir.toml";
const LOCAL_CONFIG: &str = "kurir.toml";

fn user_config() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("kurir/kurir.toml"))
        .unwrap_or_default()
}

/// Build the full Figment (defaults, files, env) without extracting it.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KurirConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load configuration from the standard lookup paths with env overrides.
pub fn load_config() -> Result<KurirConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<KurirConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KurirConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<KurirConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KurirConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Paths consulted by [`load_config`], lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(SYSTEM_CONFIG), user_config(), PathBuf::from(LOCAL_CONFIG)]
}

/// Maps `KURIR_SESSION_CONNECT_WAIT_SECS` to `session.connect_wait_secs`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("KURIR_").map(|key| {
        let key_str = key.as_str();
        for section in ENV_SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("KURIR_SESSION_CONNECT_WAIT_SECS", "9");
            jail.set_env("KURIR_STORAGE_DATABASE_PATH", "/tmp/env.db");
            let config: KurirConfig = Figment::new()
                .merge(Serialized::defaults(KurirConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.session.connect_wait_secs, 9);
            assert_eq!(config.storage.database_path, "/tmp/env.db");
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "kurir.toml",
                r#"
[gateway]
name = "jail"
"#,
            )?;
            let config = load_config()?;
            assert_eq!(config.gateway.name, "jail");
            assert_eq!(config.session.shutdown_timeout_secs, 30);
            Ok(())
        });
    }
}
