use async_trait::async_trait;
use fieldx::fxstruct;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::StoreObserver;
use crate::types::NoticeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id:         u64,
    pub kind:       NoticeKind,
    pub message:    String,
    pub expires_at: Instant,
}

/// Transient messages for the user, a.k.a. toasts. A notice stays active for `ttl` after it is shown unless
/// dismissed earlier.
#[derive(Debug)]
#[fxstruct(sync, no_new, builder, get(off))]
pub struct NoticeBoard {
    /// Time to show a notice including its fade-out.
    #[fieldx(get(copy), default(Duration::from_millis(3000)))]
    ttl: Duration,

    #[fieldx(builder(off), default(AtomicU64::new(1)))]
    next_id: AtomicU64,

    #[fieldx(inner_mut, private, get, get_mut, builder(off), default(Vec::new()))]
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn show<S: Into<String>>(&self, kind: NoticeKind, message: S) -> u64 {
        let message = message.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Notice #{id} ({kind}): {message}");

        let mut notices = self.notices_mut();
        notices.retain(|n| n.expires_at > Instant::now());
        notices.push(Notice {
            id,
            kind,
            message,
            expires_at: Instant::now() + self.ttl(),
        });
        id
    }

    /// Returns `false` if the notice is unknown or has already expired.
    pub fn dismiss(&self, id: u64) -> bool {
        let now = Instant::now();
        let mut notices = self.notices_mut();
        let live = notices.iter().any(|n| n.id == id && n.expires_at > now);
        notices.retain(|n| n.id != id && n.expires_at > now);
        live
    }

    /// Notices that haven't expired yet, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut notices = self.notices_mut();
        notices.retain(|n| n.expires_at > now);
        notices.clone()
    }

    pub fn clear(&self) {
        self.notices_mut().clear();
    }
}

#[async_trait]
impl StoreObserver for NoticeBoard {
    async fn on_notice(&self, kind: NoticeKind, message: &str) {
        self.show(kind, message);
    }

    async fn on_error(&self, error: &StoreError) {
        self.show(NoticeKind::Error, error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> NoticeBoard {
        NoticeBoard::builder().ttl(Duration::from_secs(3)).build().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn notices_expire() {
        let board = board();
        let first = board.show(NoticeKind::Success, "Velvet Sofa added to wishlist");
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = board.show(NoticeKind::Info, "Wishlist cleared");

        assert_eq!(board.active().iter().map(|n| n.id).collect::<Vec<_>>(), vec![first, second]);

        tokio::time::advance(Duration::from_millis(1500)).await;
        let active = board.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Wishlist cleared");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(board.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_live_only() {
        let board = board();
        let first = board.show(NoticeKind::Info, "one");
        let second = board.show(NoticeKind::Info, "two");
        assert_ne!(first, second);

        assert!(board.dismiss(first));
        assert!(!board.dismiss(first));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!board.dismiss(second), "expired notices can't be dismissed");
        assert!(!board.dismiss(12345));
    }

    #[tokio::test]
    async fn observer_errors_become_error_notices() {
        let board = board();
        board.on_error(&StoreError::EmptyCart).await;
        board.on_notice(NoticeKind::Success, "done").await;

        let active = board.active();
        assert_eq!(active[0].kind, NoticeKind::Error);
        assert_eq!(active[0].message, "Cart is empty");
        assert_eq!(active[1].kind, NoticeKind::Success);

        board.clear();
        assert!(board.active().is_empty());
    }
}
