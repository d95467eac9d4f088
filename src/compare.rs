//! Structural equality used to gate inbound updates.
//!
//! Only inbound values pass through this gate. Outbound sends happen on
//! every commit; a value that comes back from the channel unchanged is
//! absorbed here, which is what stops a receive/send/receive loop.

use crate::schema::SettingsValue;

/// Deep equality of two settings values, independent of key insertion order.
pub fn equal(a: &SettingsValue, b: &SettingsValue) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}
