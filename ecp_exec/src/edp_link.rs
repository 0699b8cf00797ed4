//! # EDP link
//!
//! Client side of the robot's effector driver. Each request is answered with the status of all
//! axes, or with the reason it was refused or failed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use thiserror::Error;

use comms_if::{
    eqpt::edp::{EdpCommand, EdpResponse, EdpStatus},
    net::{self, zmq, MonitoredSocket, MonitoredSocketError, NetError, SocketOptions},
};

use crate::params::EcpExecParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait EdpLink {
    /// Send a command and wait for the EDP's answer.
    fn request(&mut self, cmd: &EdpCommand) -> Result<EdpStatus, EdpLinkError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ZmqEdpLink {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EdpLinkError {
    #[error("The EDP refused the command: {0}")]
    Invalid(String),

    #[error("The command failed on the EDP: {0}")]
    Failed(String),

    #[error("No response from the EDP")]
    NoResponse,

    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Network error: {0}")]
    NetError(#[from] NetError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqEdpLink {
    pub fn new(ctx: &zmq::Context, params: &EcpExecParams) -> Result<Self, EdpLinkError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            req_correlate: true,
            req_relaxed: true,
            recv_timeout: params.edp_timeout_ms,
            send_timeout: 1000,
            linger: 0,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, &params.edp_endpoint)?;

        Ok(Self { socket })
    }
}

impl EdpLink for ZmqEdpLink {
    fn request(&mut self, cmd: &EdpCommand) -> Result<EdpStatus, EdpLinkError> {
        trace!("EDP request {:?}", cmd);

        net::send_json(&self.socket, cmd)?;

        match net::recv_json(&self.socket)? {
            Some(response) => response_to_result(response),
            None => Err(EdpLinkError::NoResponse),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Turn an EDP response into the status it carries or the matching error.
pub fn response_to_result(response: EdpResponse) -> Result<EdpStatus, EdpLinkError> {
    match response {
        EdpResponse::Ok(status) => Ok(status),
        EdpResponse::Invalid { reason } => Err(EdpLinkError::Invalid(reason)),
        EdpResponse::Failed { reason } => Err(EdpLinkError::Failed(reason)),
    }
}
