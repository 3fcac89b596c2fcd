//! Best-effort user notifications
//!
//! Toasts are a side channel: they are sent after the state change they
//! describe has been written, on a detached task whose outcome is dropped.

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub variant: ToastVariant,
    pub duration: Duration,
}

impl Toast {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        variant: ToastVariant,
        duration: Duration,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            variant,
            duration,
        }
    }
}

/// Something that can show a toast to the user. May fail, e.g. before the UI is up.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, toast: Toast) -> impl Future<Output = Result<()>> + Send;
}

/// Renders toasts through the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, toast: Toast) -> Result<()> {
        let duration_ms = toast.duration.as_millis() as u64;
        match toast.variant {
            ToastVariant::Info | ToastVariant::Success => {
                info!(title = %toast.title, duration_ms, "{}", toast.message)
            }
            ToastVariant::Warning => warn!(title = %toast.title, duration_ms, "{}", toast.message),
            ToastVariant::Error => error!(title = %toast.title, duration_ms, "{}", toast.message),
        }
        Ok(())
    }
}

/// Send `toast` on a detached task. Never blocks and never reports failure.
pub fn fire_and_forget<N: Notifier>(notifier: &Arc<N>, toast: Toast) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(toast).await {
            debug!(error = %e, "Notification dropped");
        }
    });
}
