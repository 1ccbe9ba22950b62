use std::fmt;

use crate::error::FrameError;

type Resolve<V> = Box<dyn FnOnce(V) + Send>;
type Reject = Box<dyn FnOnce(FrameError) + Send>;

/// Continuations for a request awaiting its correlated response.
///
/// Stored in [`Queue::pending_mut`](crate::Queue::pending_mut) under the id of
/// the outgoing message. Exactly one of the continuations runs.
pub struct PendingCall<V> {
    resolve: Resolve<V>,
    reject: Reject,
}

impl<V> PendingCall<V> {
    /// Wrap the two continuations of an outstanding call.
    pub fn new<R, E>(resolve: R, reject: E) -> Self
    where
        R: FnOnce(V) + Send + 'static,
        E: FnOnce(FrameError) + Send + 'static,
    {
        Self {
            resolve: Box::new(resolve),
            reject: Box::new(reject),
        }
    }

    /// Complete the call with a response value.
    pub fn resolve(self, value: V) {
        (self.resolve)(value);
    }

    /// Fail the call.
    pub fn reject(self, err: FrameError) {
        (self.reject)(err);
    }
}

impl<V> fmt::Debug for PendingCall<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall").finish_non_exhaustive()
    }
}
