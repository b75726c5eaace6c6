//! Ref-counted preview session coordinating the shared output state.
//!
//! The first preview voice unmutes the output (awaiting "start audio") and
//! silences the live synth; the last one to finish puts both back. Nested
//! acquisitions only bump the count.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use tracing::{debug, warn};

use super::backend::SynthBackend;
use super::nodes::LiveSynth;

type PendingUnmute = Shared<LocalBoxFuture<'static, bool>>;

/// Proof of one outstanding acquisition; hand it back to `release`
#[must_use = "a session token must be passed back to PreviewSession::release"]
#[derive(Debug)]
pub struct SessionToken {
    audible: bool,
}

impl SessionToken {
    /// Whether output was unmuted (or already live) for this acquisition
    pub fn is_audible(&self) -> bool {
        self.audible
    }
}

#[derive(Default)]
struct SessionState {
    /// Outstanding tokens
    active: usize,
    /// Mute flag seen by the outermost acquisition
    was_muted: bool,
    /// Live synth gain captured when it was silenced
    saved_live_gain: Option<f32>,
    /// In-flight (or finished) unmute shared by every acquisition
    unmute: Option<PendingUnmute>,
}

/// Shared preview session
pub struct PreviewSession<B: SynthBackend> {
    backend: Rc<B>,
    state: RefCell<SessionState>,
}

impl<B: SynthBackend + 'static> PreviewSession<B> {
    pub fn new(backend: Rc<B>) -> Self {
        Self {
            backend,
            state: RefCell::new(SessionState::default()),
        }
    }

    /// Number of outstanding acquisitions
    pub fn active_count(&self) -> usize {
        self.state.borrow().active
    }

    /// Register a preview voice, unmuting output on the first one
    ///
    /// Concurrent acquisitions while the unmute is pending all await the
    /// same operation. A failed unmute still yields a token (marked not
    /// audible) so the count stays balanced.
    pub async fn acquire(&self, live: Option<&LiveSynth<B>>) -> SessionToken {
        let pending = {
            let mut state = self.state.borrow_mut();
            state.active += 1;

            if state.active == 1 {
                state.was_muted = self.backend.is_muted();
                state.saved_live_gain = None;
                state.unmute = None;

                if state.was_muted {
                    if let Some(live) = live {
                        state.saved_live_gain = Some(live.gain());
                        live.silence();
                    }
                    debug!("Preview session opened, unmuting output");
                    state.unmute = Some(self.unmute());
                } else {
                    debug!("Preview session opened on live output");
                }
            }

            state.unmute.clone()
        };

        let mut abandoned = AbandonedAcquire {
            session: self,
            live,
            armed: true,
        };
        let audible = match pending {
            Some(unmute) => unmute.await,
            None => true,
        };
        abandoned.armed = false;
        SessionToken { audible }
    }

    /// Hand back a token; the last one restores mute and live gain
    pub fn release(&self, _token: SessionToken, live: Option<&LiveSynth<B>>) {
        self.leave(live);
    }

    fn leave(&self, live: Option<&LiveSynth<B>>) {
        let mut state = self.state.borrow_mut();
        if state.active == 0 {
            return;
        }
        state.active -= 1;
        if state.active > 0 {
            return;
        }

        if state.was_muted {
            self.backend.set_muted(true);
        }
        if let (Some(gain), Some(live)) = (state.saved_live_gain.take(), live) {
            live.restore_gain(gain);
        }
        state.unmute = None;
        debug!("Preview session closed (muted: {})", state.was_muted);
    }

    fn unmute(&self) -> PendingUnmute {
        let backend = Rc::clone(&self.backend);
        async move {
            match backend.start_audio().await {
                Ok(()) => {
                    backend.set_muted(false);
                    true
                }
                Err(e) => {
                    warn!("Audio start failed, preview will be silent: {}", e);
                    false
                }
            }
        }
        .boxed_local()
        .shared()
    }
}

/// Gives the count back when an `acquire` future is dropped mid-unmute
struct AbandonedAcquire<'a, B: SynthBackend + 'static> {
    session: &'a PreviewSession<B>,
    live: Option<&'a LiveSynth<B>>,
    armed: bool,
}

impl<B: SynthBackend + 'static> Drop for AbandonedAcquire<'_, B> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Preview session acquisition abandoned");
            self.session.leave(self.live);
        }
    }
}
