use std::sync::{Arc, Mutex};

/// One-shot counted latch aggregating reporter completion signals into a
/// single downstream callback.
///
/// The gate expects a fixed number of signals, decided at construction.
/// Signals may arrive in any order, from any thread, including re-entrant
/// synchronous calls made before the caller of [`signal`](Self::signal)
/// returns. When the count of signals reaches the expected count the
/// callback fires exactly once with the failure count; further signals are
/// no-ops. There is no timeout: a signaler that never arrives means the
/// callback never fires.
#[derive(Clone)]
pub struct CompletionGate {
    state: Arc<Mutex<GateState>>,
}

struct GateState {
    remaining: usize,
    failures: u32,
    callback: Option<Box<dyn FnOnce(u32) + Send>>,
}

impl CompletionGate {
    pub fn new(expected: usize, failures: u32, callback: impl FnOnce(u32) + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState {
                remaining: expected,
                failures,
                callback: Some(Box::new(callback)),
            })),
        }
    }

    /// Record one completion. Fires the callback when this is the last
    /// expected signal; the callback runs outside the lock, so it may call
    /// back into the gate without deadlocking or double-firing.
    pub fn signal(&self) {
        let fire = {
            let mut state = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.remaining = state.remaining.saturating_sub(1);
            if state.remaining == 0 {
                state.callback.take().map(|cb| (cb, state.failures))
            } else {
                None
            }
        };

        if let Some((callback, failures)) = fire {
            callback(failures);
        }
    }
}
