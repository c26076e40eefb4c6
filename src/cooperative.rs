// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Cooperative scheduling helpers.

Everything in this crate runs on the thread that owns the native context.  Operations that
have to wait on the GPU (async pipeline compilation, readback, queue completion) poll the
context and then give the executor a turn with [`yield_now`].  They never block the thread.
*/

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Returns `Pending` once, waking itself, then completes.
#[derive(Debug, Default)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Gives the executor a turn before continuing.
pub fn yield_now() -> YieldNow {
    YieldNow::default()
}

/**
A flag the caller sets to abandon a pending operation.

Clones share the flag.  Operations check it between polls, so cancellation takes effect at the
next suspension point, not immediately.

```
use descriptor_bridge::cooperative::CancellationToken;
let token = CancellationToken::new();
let handle = token.clone();
handle.cancel();
assert!(token.is_cancelled());
```
*/
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.set(true);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}
