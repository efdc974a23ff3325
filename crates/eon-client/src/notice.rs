use std::time::Duration;

use tokio::time::Instant;

use eon_types::views::{NoticeKind, NoticeView};

/// How long a notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Holds at most one auto-dismissing message. Showing a new one replaces
/// whatever was there.
#[derive(Debug, Default)]
pub struct NoticeSlot {
    current: Option<(NoticeView, Instant)>,
}

impl NoticeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.show(NoticeKind::Error, message.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.show(NoticeKind::Success, message.into());
    }

    fn show(&mut self, kind: NoticeKind, message: String) {
        self.current = Some((NoticeView { kind, message }, Instant::now()));
    }

    /// The live notice, if it has not expired yet.
    pub fn current(&self) -> Option<NoticeView> {
        self.current
            .as_ref()
            .filter(|(_, shown_at)| shown_at.elapsed() < NOTICE_TTL)
            .map(|(notice, _)| notice.clone())
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn notice_expires_after_three_seconds() {
        let mut slot = NoticeSlot::new();
        slot.error("Failed to load posts");

        tokio::time::advance(Duration::from_millis(2900)).await;
        assert_eq!(
            slot.current().map(|n| n.message),
            Some("Failed to load posts".to_string())
        );

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(slot.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notice_replaces_and_restarts_the_clock() {
        let mut slot = NoticeSlot::new();
        slot.error("first");
        tokio::time::advance(Duration::from_secs(2)).await;
        slot.success("second");
        tokio::time::advance(Duration::from_secs(2)).await;

        let notice = slot.current().unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.message, "second");
    }
}
