// SPDX-FileCopyrightText: 2026 Kurir Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat identifier helpers.

/// Server suffix used by group chats.
pub const GROUP_SERVER: &str = "@g.us";

/// Server suffix appended to bare phone numbers.
pub const USER_SERVER: &str = "@s.whatsapp.net";

/// Whether a chat identifier addresses a group.
pub fn is_group(chat_id: &str) -> bool {
    chat_id.ends_with(GROUP_SERVER)
}

/// Turn a caller-supplied recipient into a full chat identifier.
///
/// `+62812` and `62812` both become `62812@s.whatsapp.net`; anything that
/// already carries a server part passes through untouched.
pub fn normalize_recipient(recipient: &str) -> String {
    let trimmed = recipient.trim();
    let bare = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if bare.contains('@') {
        bare.to_string()
    } else {
        format!("{bare}{USER_SERVER}")
    }
}
