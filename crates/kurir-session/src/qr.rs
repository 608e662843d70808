// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing codes.

use kurir_core::KurirError;
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;

/// Render a pairing payload as a QR code made of half-block characters.
pub fn render_pairing_code(payload: &str) -> Result<String, KurirError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| KurirError::Internal(format!("cannot encode pairing code: {e}")))?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiline_block() {
        let rendered = render_pairing_code("2@ABC123,XYZ,QWE").unwrap();
        assert!(rendered.lines().count() > 10);
        assert!(rendered.chars().any(|c| c == '█' || c == '▀' || c == '▄'));
    }
}
