//! One-shot deadline tasks.
//!
//! A deadline never touches actor state. When it fires it posts a message to
//! the owning actor's inbox; when its [`CancellationToken`] is cancelled first
//! it exits silently. The actor holds only a [`mpsc::WeakSender`], so a
//! pending deadline does not keep a stopped actor's inbox alive.

use tokio::{sync::mpsc, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

/// Post `message` to `target` after `delay` unless `token` is cancelled first
///
/// # Arguments
///
/// * `delay` - Time to wait
/// * `token` - Cancels the deadline
/// * `target` - Inbox of the owning actor
/// * `message` - Message posted on expiry
///
/// # Returns
///
/// * `JoinHandle<()>` - Handle of the spawned task
pub fn schedule<M>(
    delay: Duration,
    token: CancellationToken,
    target: mpsc::WeakSender<M>,
    message: M,
) -> JoinHandle<()>
where
    M: Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                if let Some(sender) = target.upgrade() {
                    let _ = sender.send(message).await;
                }
            }
        }
    })
}

/// Duration until a Unix timestamp in seconds, zero if already past
pub fn delay_until(unix_secs: i64) -> Duration {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let target_ms = unix_secs.saturating_mul(1000);
    Duration::from_millis(u64::try_from(target_ms - now_ms).unwrap_or(0))
}

/// [`schedule`] at an absolute Unix timestamp
pub fn schedule_at<M>(
    unix_secs: i64,
    token: CancellationToken,
    target: mpsc::WeakSender<M>,
    message: M,
) -> JoinHandle<()>
where
    M: Send + 'static,
{
    schedule(delay_until(unix_secs), token, target, message)
}
