//! Toast notification log.
//!
//! A newest-first list of notifications. Entries never change once added;
//! they are only removed, explicitly or when their timeout has elapsed.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visual style of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastStyle {
    Primary,
    Secondary,
    Success,
    Danger,
    Warning,
    Info,
    Light,
    Dark,
}

/// A toast as submitted by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToast {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    /// `body` is HTML rather than plain text.
    #[serde(default)]
    pub body_html: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<ToastStyle>,
}

impl NewToast {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn html(mut self) -> Self {
        self.body_html = true;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn css(mut self, style: ToastStyle) -> Self {
        self.css = Some(style);
        self
    }
}

/// A toast in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    /// Unique for the life of the process, increasing in creation order.
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub toast: NewToast,
}

impl Toast {
    /// Whether the timeout (if any) has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(timeout) = self.toast.timeout_ms else {
            return false;
        };
        let elapsed = now.signed_duration_since(self.timestamp).num_milliseconds();
        u64::try_from(elapsed).is_ok_and(|elapsed| elapsed >= timeout)
    }
}

static TOAST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Newest-first list of toasts.
#[derive(Debug, Default)]
pub struct ToastLog {
    toasts: Vec<Toast>,
}

impl ToastLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a toast at the front of the list, stamped now.
    pub fn add(&mut self, toast: NewToast) -> &Toast {
        self.add_at(toast, Utc::now())
    }

    /// Add a toast with an explicit timestamp.
    pub fn add_at(&mut self, toast: NewToast, timestamp: DateTime<Utc>) -> &Toast {
        let entry = Toast {
            id: TOAST_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            timestamp,
            toast,
        };
        self.toasts.insert(0, entry);
        &self.toasts[0]
    }

    /// All toasts, newest first.
    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn get(&self, id: u64) -> Option<&Toast> {
        self.toasts.iter().find(|t| t.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Toast> {
        let pos = self.toasts.iter().position(|t| t.id == id)?;
        Some(self.toasts.remove(pos))
    }

    /// Remove and return every toast whose timeout has elapsed at `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Toast> {
        let (expired, kept): (Vec<Toast>, Vec<Toast>) =
            self.toasts.drain(..).partition(|t| t.is_expired(now));
        self.toasts = kept;
        expired
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    /// Drop every toast.
    pub fn reset(&mut self) {
        self.toasts.clear();
    }
}
