//! Segment timing and dub-track assembly.
//!
//! [`TempoAligner`] decides how fast each clip plays, [`TrackComposer`]
//! folds the clips into a full-length canvas and [`Mixer`] lays the canvas
//! over the attenuated original audio.

pub mod composer;
pub mod mixer;
pub mod tempo;

pub use composer::{ComposedCanvas, TrackComposer};
pub use mixer::Mixer;
pub use tempo::{TempoAligner, TempoBounds};

use crate::error::Result;
use std::future::Future;
use tracing::warn;

/// Runs `op`, retrying exactly once on failure.
///
/// Used for the single-shot steps (canvas creation, mixing) where a second
/// attempt can ride out transient resource contention.
pub(crate) async fn with_one_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(step = what, error = %first, "retrying once");
            op().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DubError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        let calls = AtomicUsize::new(0);
        let result = with_one_retry("test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DubError::Other("transient".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_two_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_one_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DubError::Other("persistent".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
