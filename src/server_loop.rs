use crate::types::GenericBoxedStream;

use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::info;

/// Flips to `true` once shutdown is requested. The value is sticky, so a task
/// that starts listening late still sees it.
pub type ShutdownReceiver = watch::Receiver<bool>;

pub fn shutdown_channel() -> (watch::Sender<bool>, ShutdownReceiver) {
    watch::channel(false)
}

/// Resolve once shutdown has been requested.
///
/// A dropped sender means shutdown can no longer be requested, so this then
/// never resolves.
pub async fn shutdown_requested(mut shutdown: ShutdownReceiver) {
    let requested = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}

/// Hand every item of `stream` to `handler` until the stream ends or
/// shutdown is requested.
///
/// The handler is expected to spawn, so a slow connection never holds up the
/// next accept.
pub async fn serve_stream<T>(
    mut stream: GenericBoxedStream<T>,
    shutdown: ShutdownReceiver,
    handler: impl Fn(T) -> tokio::task::JoinHandle<()> + Send + Sync + 'static,
) {
    let shutdown_signal = shutdown_requested(shutdown);
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(item) => {
                    handler(item);
                }
                None => {
                    info!("Stream ended");
                    break;
                }
            },
            _ = &mut shutdown_signal => {
                info!("Shutdown requested");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn hands_every_item_to_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let items: GenericBoxedStream<usize> = Box::pin(stream::iter(vec![1, 2, 3]));
        let (_stop_tx, stop_rx) = shutdown_channel();

        serve_stream(items, stop_rx, {
            let seen = seen.clone();
            move |n| {
                seen.fetch_add(n, Ordering::SeqCst);
                tokio::spawn(async {})
            }
        })
        .await;

        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let (stop_tx, stop_rx) = shutdown_channel();
        let pending: GenericBoxedStream<()> = Box::pin(stream::pending());

        let handle = tokio::spawn(serve_stream(pending, stop_rx, |_| tokio::spawn(async {})));

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send_replace(true);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_sent_before_start_is_not_lost() {
        let (stop_tx, stop_rx) = shutdown_channel();
        stop_tx.send_replace(true);

        let pending: GenericBoxedStream<()> = Box::pin(stream::pending());
        let served = tokio::spawn(serve_stream(pending, stop_rx, |_| tokio::spawn(async {})));

        tokio::time::timeout(Duration::from_secs(5), served)
            .await
            .expect("serve loop ignored an earlier shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_sender_does_not_trigger_shutdown() {
        let (stop_tx, stop_rx) = shutdown_channel();
        drop(stop_tx);

        let waited =
            tokio::time::timeout(Duration::from_millis(50), shutdown_requested(stop_rx)).await;
        assert!(waited.is_err());
    }
}
