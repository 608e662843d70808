// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kurir - a multi-tenant messaging device gateway.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod loopback;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Kurir - a multi-tenant messaging device gateway.
#[derive(Parser, Debug)]
#[command(name = "kurir", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway until interrupted.
    Serve,
    /// List registered devices.
    Devices,
    /// Register a new device.
    Register {
        /// Display name for the device.
        #[arg(long)]
        name: String,
        /// Mobile number of the account that will be linked.
        #[arg(long)]
        mobile: String,
    },
    /// Print a device's pending pairing code as a QR code.
    Qr {
        /// Device identifier.
        device_id: String,
    },
    /// Validate and print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => kurir_config::load_and_validate_path(path),
        None => kurir_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            kurir_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.gateway.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Devices) => commands::list_devices(&config).await,
        Some(Commands::Register { name, mobile }) => {
            commands::register(&config, &name, &mobile).await
        }
        Some(Commands::Qr { device_id }) => commands::show_qr(&config, &device_id).await,
        Some(Commands::Config) => commands::print_config(&config),
        None => {
            println!("kurir: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn register_requires_name_and_mobile() {
        let cli = Cli::try_parse_from(["kurir", "register", "--name", "Sales", "--mobile", "6281"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Register { ref name, ref mobile }) if name == "Sales" && mobile == "6281"
        ));
        assert!(Cli::try_parse_from(["kurir", "register", "--name", "Sales"]).is_err());
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            kurir_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.gateway.name, "kurir");
        assert_eq!(config.engine.kind, "loopback");
    }
}
