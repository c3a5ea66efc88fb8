//! Multi-frame operations
//!
//! Work that spans several frames is an explicit state object polled once
//! per `on_update`. The scheduler knows nothing about these; a component
//! stores one in a field and polls it with the frame's timing:
//!
//! ```
//! use std::task::Poll;
//! use frame_engine::ecs::resumable::{Resumable, WaitFrames};
//! use frame_engine::foundation::time::FrameTime;
//!
//! let mut wait = WaitFrames::new(2);
//! let time = FrameTime::default();
//! assert!(wait.poll(&time).is_pending());
//! assert!(wait.poll(&time).is_pending());
//! assert_eq!(wait.poll(&time), Poll::Ready(()));
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::task::Poll;

use crate::foundation::time::FrameTime;

/// A state object advanced once per frame
pub trait Resumable {
    /// Value produced on completion
    type Output;

    /// Advance by one frame
    fn poll(&mut self, time: &FrameTime) -> Poll<Self::Output>;

    /// Fail with [`OperationError::TimedOut`] if not finished within
    /// `seconds` of frame time
    fn with_timeout(self, seconds: f32) -> Timeout<Self>
    where
        Self: Sized,
    {
        Timeout::new(self, seconds)
    }
}

/// Errors produced by multi-frame operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// The completer was dropped without completing
    #[error("operation abandoned")]
    Abandoned,

    /// The producer reported a failure
    #[error("operation failed: {0}")]
    Failed(String),

    /// The deadline passed first
    #[error("operation timed out after {0} s")]
    TimedOut(f32),

    /// The result was already taken by an earlier poll
    #[error("operation result already taken")]
    AlreadyTaken,
}

/// Completes after a number of frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitFrames {
    remaining: u32,
}

impl WaitFrames {
    /// Wait `frames` polls; `WaitFrames::new(1)` is "wait one frame"
    pub fn new(frames: u32) -> Self {
        Self { remaining: frames }
    }
}

impl Resumable for WaitFrames {
    type Output = ();

    fn poll(&mut self, _time: &FrameTime) -> Poll<()> {
        if self.remaining == 0 {
            Poll::Ready(())
        } else {
            self.remaining -= 1;
            Poll::Pending
        }
    }
}

/// Completes after an amount of frame time has passed
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSeconds {
    remaining: f32,
}

impl WaitSeconds {
    /// Wait `seconds` of accumulated frame delta
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }

    /// Time still to wait
    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }
}

impl Resumable for WaitSeconds {
    type Output = ();

    fn poll(&mut self, time: &FrameTime) -> Poll<()> {
        self.remaining -= time.delta;
        if self.remaining <= 0.0 {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Deadline wrapper created by [`Resumable::with_timeout`]
#[derive(Debug)]
pub struct Timeout<R> {
    inner: R,
    limit: f32,
    elapsed: f32,
}

impl<R> Timeout<R> {
    /// Wrap `inner` with a deadline of `seconds`
    pub fn new(inner: R, seconds: f32) -> Self {
        Self {
            inner,
            limit: seconds,
            elapsed: 0.0,
        }
    }
}

impl<R: Resumable> Resumable for Timeout<R> {
    type Output = Result<R::Output, OperationError>;

    fn poll(&mut self, time: &FrameTime) -> Poll<Self::Output> {
        if let Poll::Ready(output) = self.inner.poll(time) {
            return Poll::Ready(Ok(output));
        }
        self.elapsed += time.delta;
        if self.elapsed >= self.limit {
            Poll::Ready(Err(OperationError::TimedOut(self.limit)))
        } else {
            Poll::Pending
        }
    }
}

enum Slot<T> {
    Pending,
    Ready(Result<T, OperationError>),
    Taken,
}

/// Consumer side of an asynchronous request
pub struct OperationHandle<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

/// Producer side of an asynchronous request. Dropping it without
/// completing resolves the handle with [`OperationError::Abandoned`].
pub struct Completer<T> {
    slot: Rc<RefCell<Slot<T>>>,
    done: bool,
}

/// Create a linked handle/completer pair
pub fn operation<T>() -> (OperationHandle<T>, Completer<T>) {
    let slot = Rc::new(RefCell::new(Slot::Pending));
    (
        OperationHandle { slot: slot.clone() },
        Completer { slot, done: false },
    )
}

impl<T> OperationHandle<T> {
    /// Whether the producer has finished
    pub fn is_ready(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Ready(_))
    }
}

impl<T> Resumable for OperationHandle<T> {
    type Output = Result<T, OperationError>;

    fn poll(&mut self, _time: &FrameTime) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Pending => {
                *slot = Slot::Pending;
                Poll::Pending
            }
            Slot::Ready(result) => Poll::Ready(result),
            Slot::Taken => Poll::Ready(Err(OperationError::AlreadyTaken)),
        }
    }
}

impl<T> Completer<T> {
    /// Resolve the operation with a value
    pub fn complete(mut self, value: T) {
        self.finish(Ok(value));
    }

    /// Resolve the operation with a failure
    pub fn fail(mut self, reason: impl Into<String>) {
        self.finish(Err(OperationError::Failed(reason.into())));
    }

    fn finish(&mut self, result: Result<T, OperationError>) {
        *self.slot.borrow_mut() = Slot::Ready(result);
        self.done = true;
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.done {
            self.finish(Err(OperationError::Abandoned));
        }
    }
}
