//! Cancellation and deadlines for dial operations.
//!
//! A [`Context`] ties a dial to a reactor and tells it when to give up. It is
//! cheap to clone; clones observe the same deadline and cancellation signals.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{self, Either, Shared};
use futures::sync::oneshot;
use futures::Future;
use tokio_core::reactor::{Handle, Timeout};

use crate::error::Error;
use crate::socks_helpers::FutureExt;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CancelReason::Canceled => f.write_str("context canceled"),
            CancelReason::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

#[derive(Clone)]
struct Signal {
    fired: Arc<AtomicBool>,
    rx: Shared<oneshot::Receiver<()>>,
}

#[derive(Clone)]
pub struct Context {
    handle: Handle,
    deadline: Option<Instant>,
    signals: Vec<Signal>,
}

/// Fires the cancellation signal of the context it was created with.
///
/// May be moved to and used from any thread.
pub struct Canceller {
    fired: Arc<AtomicBool>,
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.fired.store(true, Ordering::SeqCst);
        let tx = match self.tx.lock() {
            Ok(mut tx) => tx.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = tx {
            tx.send(()).ok();
        }
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background(handle: &Handle) -> Context {
        Context {
            handle: handle.clone(),
            deadline: None,
            signals: Vec::new(),
        }
    }

    /// Derives a context that expires at `deadline`, or earlier if the
    /// parent already has a sooner one.
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Context {
            handle: self.handle.clone(),
            deadline: Some(deadline),
            signals: self.signals.clone(),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a cancellable context. Cancelling the parent cancels the child
    /// as well.
    pub fn with_cancel(&self) -> (Context, Canceller) {
        let (tx, rx) = oneshot::channel();
        let fired = Arc::new(AtomicBool::new(false));
        let mut signals = self.signals.clone();
        signals.push(Signal {
            fired: fired.clone(),
            rx: rx.shared(),
        });
        let ctx = Context {
            handle: self.handle.clone(),
            deadline: self.deadline,
            signals,
        };
        let canceller = Canceller {
            fired,
            tx: Mutex::new(Some(tx)),
        };
        (ctx, canceller)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True when nothing can ever stop this context.
    pub fn is_background(&self) -> bool {
        self.deadline.is_none() && self.signals.is_empty()
    }

    /// The reason this context has stopped, or `None` while it is live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.signals.iter().any(|s| s.fired.load(Ordering::SeqCst)) {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context stops. Never resolves for a background
    /// context.
    pub fn done(&self) -> Box<Future<Item = CancelReason, Error = io::Error>> {
        let mut watchers: Vec<Box<Future<Item = CancelReason, Error = io::Error>>> = Vec::new();

        for signal in &self.signals {
            // A dropped canceller without a cancel() call never fires.
            let watcher = signal.rx.clone().then(|res| match res {
                Ok(_) => future::ok::<_, io::Error>(CancelReason::Canceled).into_box(),
                Err(_) => future::empty::<CancelReason, io::Error>().into_box(),
            });
            watchers.push(watcher.into_box());
        }

        if let Some(deadline) = self.deadline {
            match Timeout::new_at(deadline, &self.handle) {
                Ok(timeout) => {
                    watchers.push(timeout.map(|_| CancelReason::DeadlineExceeded).into_box())
                }
                Err(e) => return future::err::<CancelReason, _>(e).into_box(),
            }
        }

        if watchers.is_empty() {
            return future::empty::<CancelReason, io::Error>().into_box();
        }
        future::select_all(watchers)
            .map(|(reason, _, _)| reason)
            .map_err(|(e, _, _)| e)
            .into_box()
    }

    /// Runs `work` until it finishes or the context stops, whichever comes
    /// first.
    ///
    /// When the context wins, `work` is dropped on the spot together with any
    /// transport it owns, which unblocks whatever read or write it was parked
    /// on. The result is then `Cancelled`, never the I/O error the abandoned
    /// work might have produced.
    pub fn bound<F>(&self, work: F) -> Box<Future<Item = F::Item, Error = Error>>
    where
        F: Future + 'static,
        F::Item: 'static,
        F::Error: Into<Error> + 'static,
    {
        if let Some(reason) = self.err() {
            drop(work);
            return future::err::<F::Item, _>(Error::Cancelled(reason)).into_box();
        }
        if self.is_background() {
            return work.map_err(Into::<Error>::into).into_box();
        }
        work.select2(self.done())
            .then(|res| match res {
                Ok(Either::A((item, _))) => Ok(item),
                Ok(Either::B((reason, pending))) => {
                    drop(pending);
                    Err(Error::Cancelled(reason))
                }
                Err(Either::A((e, _))) => Err(e.into()),
                Err(Either::B((e, _))) => Err(Error::Io(e)),
            })
            .into_box()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("signals", &self.signals.len())
            .finish()
    }
}
