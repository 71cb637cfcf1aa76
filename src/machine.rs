// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Event-driven driving loop of a decode session.
//!
//! The component runs on its own threads and reports progress through the
//! [`Mailbox`]. The loop blocks on the mailbox, records the reported state
//! together with the state it acted on before, and submits the next
//! command. A failed submission or a component error routes the session
//! into [`SessionState::Error`], which always tears the session down.
//!
//! | State         | Previous      | Action                                   |
//! |---------------|---------------|------------------------------------------|
//! | Idle          | Loaded        | request Executing                        |
//! | Idle          | InputConsumed | request Loaded, disable ports, free bufs |
//! | Idle          | other         | error                                    |
//! | Executing     | Idle          | fill input, submit input, request output |
//! | Executing     | other         | error                                    |
//! | InputConsumed |               | request Idle                             |
//! | Loaded, Error |               | release component, deinit, exit          |

use crate::{
    component::{ComponentState, Port},
    error::{Error, Result, Status},
    mailbox::{Mailbox, Signal},
    session::Session,
    stream::ByteStream,
};
use std::{fmt, time::Duration};
use tracing::{debug, error, trace, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Loaded,
    Idle,
    Executing,
    InputConsumed,
    Error,
    Exited,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<ComponentState> for SessionState {
    fn from(state: ComponentState) -> Self {
        match state {
            ComponentState::Loaded => SessionState::Loaded,
            ComponentState::Idle => SessionState::Idle,
            ComponentState::Executing => SessionState::Executing,
            ComponentState::Invalid => SessionState::Error,
        }
    }
}

/// Drives one configured session from Loaded to Exited.
///
/// The session must have both buffers allocated and the Idle transition
/// already requested when the machine starts.
pub struct StateMachine<'a, 'c, S: ByteStream + ?Sized> {
    session: &'a mut Session<'c>,
    mailbox: &'a Mailbox,
    stream: &'a mut S,
    watchdog: Option<Duration>,
    state: SessionState,
    last_state: SessionState,
    error: Option<Error>,
    history: Vec<SessionState>,
}

impl<'a, 'c, S: ByteStream + ?Sized> StateMachine<'a, 'c, S> {
    pub fn new(session: &'a mut Session<'c>, mailbox: &'a Mailbox, stream: &'a mut S) -> Self {
        Self {
            session,
            mailbox,
            stream,
            watchdog: None,
            state: SessionState::Loaded,
            last_state: SessionState::Loaded,
            error: None,
            history: vec![SessionState::Loaded],
        }
    }

    /// Bounds every wait on the mailbox. Expiry enters the error path.
    pub fn with_watchdog(mut self, watchdog: Option<Duration>) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_state(&self) -> SessionState {
        self.last_state
    }

    /// Runs until the session exits. Returns the first error recorded on
    /// the way, after teardown has completed.
    pub fn run(mut self) -> Result<Vec<SessionState>> {
        loop {
            // The error state is handled straight away, without waiting for
            // another signal.
            if self.state != SessionState::Error {
                self.wait();
            }
            self.step();
            if self.state == SessionState::Exited {
                break;
            }
        }
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(self.history),
        }
    }

    fn enter(&mut self, state: SessionState) {
        self.last_state = self.state;
        self.state = state;
        self.history.push(state);
        debug!("state {} (last {})", self.state, self.last_state);
    }

    fn fail(&mut self, e: Error) {
        error!("{} in state {}", e, self.state);
        if self.error.is_none() {
            self.error = Some(e);
        }
        self.enter(SessionState::Error);
    }

    fn wait(&mut self) {
        let signal = match self.watchdog {
            Some(timeout) => self.mailbox.wait_timeout(timeout).ok_or(Error::Timeout(timeout)),
            None => self
                .mailbox
                .wait()
                .ok_or(Error::ComponentReportedError(Status::Undefined)),
        };
        trace!("signal {:?}", signal);

        match signal {
            Ok(Signal::StateConfirmed(ComponentState::Invalid)) => {
                self.fail(Error::ComponentReportedError(Status::InvalidState))
            }
            Ok(Signal::StateConfirmed(state)) => self.enter(state.into()),
            Ok(Signal::InputConsumed) => self.enter(SessionState::InputConsumed),
            Ok(Signal::ComponentError(status)) => {
                // Force the component out of whatever it is doing; the
                // outcome does not change the teardown that follows.
                if let Err(e) = self.session.request_state(ComponentState::Invalid) {
                    warn!("{}", e);
                }
                self.fail(Error::ComponentReportedError(status));
            }
            Err(e) => self.fail(e),
        }
    }

    fn step(&mut self) {
        let res = match self.state {
            SessionState::Idle => match self.last_state {
                SessionState::Loaded => self.session.request_state(ComponentState::Executing),
                SessionState::InputConsumed => self.unload(),
                from => Err(Error::UnexpectedTransition {
                    from,
                    to: SessionState::Idle,
                }),
            },
            SessionState::Executing => match self.last_state {
                SessionState::Idle => self.transfer(),
                from => Err(Error::UnexpectedTransition {
                    from,
                    to: SessionState::Executing,
                }),
            },
            SessionState::InputConsumed => self.session.request_state(ComponentState::Idle),
            SessionState::Loaded | SessionState::Error => {
                self.session.release();
                self.enter(SessionState::Exited);
                Ok(())
            }
            SessionState::Exited => Ok(()),
        };

        if let Err(e) = res {
            self.fail(e);
        }
    }

    /// Fills the input buffer with the whole stream and starts both
    /// transfers.
    fn transfer(&mut self) -> Result<()> {
        let n = self.session.fill_input(&mut *self.stream)?;
        debug!("input buffer filled: {} bytes", n);
        self.session.submit_input()?;
        self.session.request_output()
    }

    /// Moves the component back to Loaded and gives back its resources.
    fn unload(&mut self) -> Result<()> {
        self.session.request_state(ComponentState::Loaded)?;
        self.session.disable_port(Port::Input)?;
        self.session.disable_port(Port::Output)?;
        self.session.free_buffer(Port::Input)?;
        self.session.free_buffer(Port::Output)
    }
}
