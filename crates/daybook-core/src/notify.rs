use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message.into());
    }

    fn push(&self, level: NoticeLevel, message: String) {
        debug!(?level, message = %message, "notice");
        let _ = self.tx.send(Notice { level, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_arrive_in_order_with_levels() {
        let (notifier, mut notices) = Notifier::channel();
        notifier.success("Task created successfully");
        notifier.error("Task returned");

        let first = notices.try_recv().expect("first notice");
        assert_eq!(first.level, NoticeLevel::Success);
        assert_eq!(first.message, "Task created successfully");

        let second = notices.try_recv().expect("second notice");
        assert_eq!(second.level, NoticeLevel::Error);
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn sending_without_a_receiver_is_harmless() {
        let (notifier, notices) = Notifier::channel();
        drop(notices);
        notifier.success("nobody listening");
    }
}
