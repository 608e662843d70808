// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot administrative subcommands.

use kurir_config::KurirConfig;
use kurir_core::types::Device;
use kurir_core::{KurirError, StorageAdapter};

use crate::serve::build_stack;

pub async fn list_devices(config: &KurirConfig) -> Result<(), KurirError> {
    let stack = build_stack(config).await?;
    let devices = stack.service.list_devices().await?;
    if devices.is_empty() {
        println!("no devices registered");
    }
    for device in &devices {
        println!("{}", device_line(device));
    }
    stack.storage.close().await
}

pub async fn register(config: &KurirConfig, name: &str, mobile: &str) -> Result<(), KurirError> {
    let stack = build_stack(config).await?;
    let device = stack.service.register_device(name, mobile).await?;
    println!("{}", device.id);
    stack.storage.close().await
}

pub async fn show_qr(config: &KurirConfig, device_id: &str) -> Result<(), KurirError> {
    let stack = build_stack(config).await?;
    match stack.service.pairing_qr(device_id).await? {
        Some(qr) => println!("{qr}"),
        None => println!("device {device_id} has no pending pairing code"),
    }
    stack.storage.close().await
}

pub fn print_config(config: &KurirConfig) -> Result<(), KurirError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| KurirError::Config(format!("cannot render configuration: {e}")))?;
    print!("{rendered}");
    Ok(())
}

fn device_line(device: &Device) -> String {
    let state = if device.is_connected {
        "connected"
    } else if device.pairing_code.is_some() {
        "awaiting-scan"
    } else if device.is_paired() {
        "paired"
    } else {
        "unpaired"
    };
    format!(
        "{}\t{}\t{}\t{}",
        device.id, device.display_name, device.mobile_number, state
    )
}
