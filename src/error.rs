// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::component::Port;
use crate::machine::SessionState;
use std::io;

/// Status codes returned by the external decode component.
///
/// Every call into a [`Component`](crate::component::Component) or
/// [`ComponentCore`](crate::component::ComponentCore) returns
/// `Result<T, Status>`; `Ok` is the success status.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[error("insufficient resources")]
    InsufficientResources,

    #[error("bad parameter")]
    BadParameter,

    #[error("unsupported index")]
    UnsupportedIndex,

    #[error("unsupported setting")]
    UnsupportedSetting,

    #[error("component not found")]
    ComponentNotFound,

    #[error("incorrect state operation")]
    IncorrectStateOperation,

    #[error("invalid state")]
    InvalidState,

    #[error("stream corrupt")]
    StreamCorrupt,

    #[error("hardware failure")]
    Hardware,

    #[error("undefined error")]
    Undefined,
}

/// Errors surfaced to the caller of a decode request.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),

    #[error("no image data in stream")]
    NoImageData,

    #[error("component {name} unavailable: {status}")]
    ComponentUnavailable { name: String, status: Status },

    #[error("{port} port rejected configuration: {status}")]
    InvalidPortConfig { port: Port, status: Status },

    #[error("capability {name} unsupported: {status}")]
    CapabilityUnsupported { name: String, status: Status },

    #[error("{port} buffer allocation of {size} bytes failed: {status}")]
    BufferAllocationFailed {
        port: Port,
        size: usize,
        status: Status,
    },

    #[error("command {command} failed: {status}")]
    CommandSubmissionFailed { command: String, status: Status },

    #[error("component reported error: {0}")]
    ComponentReportedError(Status),

    /// An Idle confirmation arrived after a state with no valid follow-up.
    #[error("unexpected transition from {from} to {to}")]
    UnexpectedTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("component never returned the output buffer")]
    OutputMissing,

    #[error("no event from component within {0:?}")]
    Timeout(std::time::Duration),

    #[error("unsupported scale factor {0}")]
    UnsupportedScale(u32),

    #[error("stream error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
