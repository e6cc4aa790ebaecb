use std::{
    future::Future,
    sync::Arc,
    task::{Context, Poll},
    thread::{self, Thread},
    time::Duration,
};

use futures::task::{waker, ArcWake};

use crate::{model::fs::FSError, util::cancel::CancellationToken};

const PARK_INTERVAL: Duration = Duration::from_millis(10);

struct ThreadWaker {
    thread: Thread,
}

impl ArcWake for ThreadWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.thread.unpark();
    }
}

/// Drives `future` to completion, dropping it as soon as `cancel` fires.
///
/// The token is checked before the first poll and after every wakeup.
pub fn poll_until_cancelled<Fut>(future: Fut, cancel: &CancellationToken) -> Result<Fut::Output, FSError>
where
    Fut: Future,
{
    let mut future = Box::pin(future);
    let waker = waker(Arc::new(ThreadWaker {
        thread: thread::current(),
    }));
    let mut context = Context::from_waker(&waker);

    loop {
        if cancel.is_cancelled() {
            return Err(FSError::Cancelled);
        }

        match future.as_mut().poll(&mut context) {
            Poll::Ready(result) => {
                return Ok(result);
            }
            Poll::Pending => {
                thread::park_timeout(PARK_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future;

    use super::*;
    use crate::util::cancel::CancellationSource;

    #[test]
    fn test_poll_ready() {
        let cases = vec![0, 1, 42];

        for expected in cases {
            let result =
                poll_until_cancelled(future::ready(expected), &CancellationToken::none()).unwrap();
            assert_eq!(result, expected, "failed for case: {}", expected);
        }
    }

    #[test]
    fn test_poll_pending_then_ready() {
        let mut polls = 0;
        let fut = future::poll_fn(move |cx| {
            polls += 1;
            if polls < 3 {
                cx.waker().wake_by_ref();
                Poll::Pending
            } else {
                Poll::Ready(polls)
            }
        });

        assert_eq!(
            poll_until_cancelled(fut, &CancellationToken::none()).unwrap(),
            3
        );
    }

    #[test]
    fn test_poll_cancelled_before_start() {
        let source = CancellationSource::new();
        source.cancel();

        let result = poll_until_cancelled(future::ready(1), &source.token());
        assert!(matches!(result, Err(FSError::Cancelled)));
    }

    #[test]
    fn test_poll_cancelled_while_pending() {
        let source = CancellationSource::new();
        let token = source.token();
        let fut = future::poll_fn(move |_cx| {
            source.cancel();
            Poll::<()>::Pending
        });

        let result = poll_until_cancelled(fut, &token);
        assert!(matches!(result, Err(FSError::Cancelled)));
    }
}
