// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hand-off between component callback threads and the driving loop.
//!
//! Callbacks post a [`Signal`] into a [`Mailbox`], a channel with room for
//! exactly one pending signal. Posting replaces whatever the driving loop
//! has not picked up yet, so the loop only ever acts on the most recent
//! state the component reported. A pending component error is the one
//! exception: it is kept over later non-error signals so it can not be
//! lost when signals collapse.

use crate::{
    bridge::CompletionBridge,
    buffer::{BufferHeader, Owner},
    component::{Callbacks, Command, ComponentEvent, ComponentState},
    error::Status,
};
use kanal::{Receiver, Sender};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, error, trace, warn};

/// Event recorded for the driving loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The component confirmed a state transition.
    StateConfirmed(ComponentState),
    /// The component returned the input buffer.
    InputConsumed,
    /// The component reported an error.
    ComponentError(Status),
}

impl Signal {
    pub fn is_error(&self) -> bool {
        matches!(self, Signal::ComponentError(_))
    }
}

/// Capacity-1, latest-wins channel of [`Signal`]s.
pub struct Mailbox {
    tx: Sender<Signal>,
    rx: Receiver<Signal>,
    post: Mutex<()>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        let (tx, rx) = kanal::bounded(1);
        Self {
            tx,
            rx,
            post: Mutex::new(()),
        }
    }

    /// Records `signal`, displacing a signal still pending. Never blocks
    /// on the driving loop.
    pub fn post(&self, signal: Signal) {
        // Posters are serialised so the drained slot is still free when we
        // send; only the driving loop takes from the other side.
        let _guard = self.post.lock().unwrap_or_else(PoisonError::into_inner);

        let mut signal = signal;
        while let Ok(Some(pending)) = self.rx.try_recv() {
            if pending.is_error() && !signal.is_error() {
                trace!("keeping pending {:?} over {:?}", pending, signal);
                signal = pending;
            } else {
                trace!("{:?} replaced by {:?}", pending, signal);
            }
        }

        match self.tx.try_send(signal) {
            Ok(true) => {}
            Ok(false) => warn!("mailbox full, {:?} dropped", signal),
            Err(e) => debug!("mailbox closed, {:?} dropped: {}", signal, e),
        }
    }

    /// Blocks until a signal is available.
    pub fn wait(&self) -> Option<Signal> {
        self.rx.recv().ok()
    }

    /// Blocks until a signal is available or `timeout` expires.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Signal> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Takes the pending signal, if any, without blocking.
    pub fn try_take(&self) -> Option<Signal> {
        self.rx.try_recv().ok().flatten()
    }
}

/// Translates component callbacks into mailbox signals and output
/// deliveries.
///
/// Buffers returned by a callback are handed back to the session before
/// anything else looks at them.
pub struct EventAdapter {
    mailbox: Arc<Mailbox>,
    bridge: Arc<CompletionBridge>,
}

impl EventAdapter {
    pub fn new(mailbox: Arc<Mailbox>, bridge: Arc<CompletionBridge>) -> Self {
        Self { mailbox, bridge }
    }
}

impl Callbacks for EventAdapter {
    fn on_event(&self, event: ComponentEvent) {
        match event {
            ComponentEvent::CommandComplete(Command::StateSet(state)) => match state {
                ComponentState::Loaded | ComponentState::Idle | ComponentState::Executing => {
                    debug!("component state changed to {:?}", state);
                    self.mailbox.post(Signal::StateConfirmed(state));
                }
                ComponentState::Invalid => trace!("component state changed to Invalid"),
            },
            ComponentEvent::CommandComplete(command) => trace!("{} complete", command),
            ComponentEvent::Error(status) => {
                error!("component reported an error: {}", status);
                self.mailbox.post(Signal::ComponentError(status));
            }
        }
    }

    fn on_input_consumed(&self, buffer: &BufferHeader) {
        buffer.set_owner(Owner::Session);
        trace!("input buffer {} consumed", buffer.id());
        self.mailbox.post(Signal::InputConsumed);
    }

    fn on_output_filled(&self, buffer: &BufferHeader) {
        buffer.set_owner(Owner::Session);
        debug!(
            "output buffer {} filled: {} bytes",
            buffer.id(),
            buffer.filled_len()
        );
        self.bridge.deliver(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_signal_wins() {
        let mailbox = Mailbox::new();
        mailbox.post(Signal::InputConsumed);
        mailbox.post(Signal::StateConfirmed(ComponentState::Idle));
        assert_eq!(
            mailbox.wait(),
            Some(Signal::StateConfirmed(ComponentState::Idle))
        );
        assert_eq!(mailbox.try_take(), None);
    }

    #[test]
    fn pending_error_is_kept() {
        let mailbox = Mailbox::new();
        mailbox.post(Signal::ComponentError(Status::Hardware));
        mailbox.post(Signal::StateConfirmed(ComponentState::Idle));
        assert_eq!(mailbox.wait(), Some(Signal::ComponentError(Status::Hardware)));

        mailbox.post(Signal::ComponentError(Status::Hardware));
        mailbox.post(Signal::ComponentError(Status::StreamCorrupt));
        assert_eq!(
            mailbox.wait(),
            Some(Signal::ComponentError(Status::StreamCorrupt))
        );
    }

    #[test]
    fn wait_timeout_expires() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn posts_from_other_threads() {
        let mailbox = Arc::new(Mailbox::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mailbox = mailbox.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        mailbox.post(Signal::InputConsumed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(mailbox.try_take(), Some(Signal::InputConsumed));
        assert_eq!(mailbox.try_take(), None);
    }
}
