//! User-facing notices.
//!
//! Stores emit transient success/error notifications through an unbounded
//! channel; the UI layer drains the receiver and renders toasts. A missing
//! sink silently drops notices, which keeps the stores usable in tests.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

pub type NoticeSender = mpsc::UnboundedSender<Notice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

pub fn notice_channel() -> (NoticeSender, NoticeReceiver) {
    mpsc::unbounded_channel()
}

pub(crate) fn emit(sink: &Option<NoticeSender>, notice: Notice) {
    if let Some(tx) = sink {
        // A closed receiver just means the UI is gone.
        let _ = tx.send(notice);
    }
}

pub(crate) fn success(sink: &Option<NoticeSender>, message: impl Into<String>) {
    emit(sink, Notice::Success(message.into()));
}

pub(crate) fn error(sink: &Option<NoticeSender>, message: impl Into<String>) {
    emit(sink, Notice::Error(message.into()));
}
