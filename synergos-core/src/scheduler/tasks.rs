//! Task multiplexing for the async run mode
//!
//! Many independent, unbounded iteration sequences share one thread of
//! control via explicit suspension points. The drive loop polls every task
//! each round until all have completed - no sibling is dropped
//! mid-iteration - and the first error (in task order) is reported after
//! the last task finishes.

use core::future::{poll_fn, Future};
use core::pin::Pin;
use core::task::Poll;

use heapless::Vec;

use crate::config::MAX_TASKS;

/// One pinned, type-erased task future for
/// [`MainLoop::run_async`](super::MainLoop::run_async).
///
/// Build the future with [`MainLoop::task`](super::MainLoop::task) (or any
/// future honoring the same contract) and pin it with `core::pin::pin!`.
pub type TaskHandle<'a, E> = Pin<&'a mut dyn Future<Output = Result<(), E>>>;

/// Poll every task to completion, then report the first error.
pub(super) async fn drive_all<E>(tasks: &mut [TaskHandle<'_, E>]) -> Result<(), E> {
    let mut outcomes: Vec<Option<Result<(), E>>, MAX_TASKS> = Vec::new();
    for _ in 0..tasks.len() {
        let _ = outcomes.push(None);
    }

    poll_fn(|cx| {
        let mut pending = false;
        for (task, outcome) in tasks.iter_mut().zip(outcomes.iter_mut()) {
            if outcome.is_none() {
                match task.as_mut().poll(cx) {
                    Poll::Ready(result) => *outcome = Some(result),
                    Poll::Pending => pending = true,
                }
            }
        }
        if pending {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    })
    .await;

    for outcome in outcomes {
        if let Some(Err(error)) = outcome {
            return Err(error);
        }
    }
    Ok(())
}
