// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Kurir device gateway.
//!
//! TOML files and `KURIR_` environment variables are merged with Figment,
//! unknown keys are rejected, and every problem is reported as a miette
//! diagnostic.
//!
//! ```no_run
//! let config = kurir_config::load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::KurirConfig;

/// Load from the standard lookup paths, then validate.
pub fn load_and_validate() -> Result<KurirConfig, Vec<ConfigError>> {
    finish(loader::load_config(), read_sources(&loader::config_paths()))
}

/// Load from one explicit file (plus env), then validate.
pub fn load_and_validate_path(path: &Path) -> Result<KurirConfig, Vec<ConfigError>> {
    finish(
        loader::load_config_from_path(path),
        read_sources(&[path.to_path_buf()]),
    )
}

/// Load from an inline TOML string, then validate.
pub fn load_and_validate_str(toml_content: &str) -> Result<KurirConfig, Vec<ConfigError>> {
    finish(
        loader::load_config_from_str(toml_content),
        vec![("<inline>".to_string(), toml_content.to_string())],
    )
}

fn finish(
    loaded: Result<KurirConfig, figment::Error>,
    sources: Vec<(String, String)>,
) -> Result<KurirConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources)),
    }
}

/// Read whichever config files exist so diagnostics can show source spans.
fn read_sources(paths: &[std::path::PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            Some((absolute.display().to_string(), content))
        })
        .collect()
}
