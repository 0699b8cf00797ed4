//! # MP link
//!
//! The ECP pulls commands from the MP and pushes its notifications back. The MP binds both
//! sockets, every ECP connects to them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

use comms_if::{
    net::{self, zmq, MonitoredSocket, MonitoredSocketError, NetError, SocketOptions},
    task::{EcpNotification, MpCommand},
};

use crate::params::EcpExecParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait MpLink {
    /// Receive the next command, `Ok(None)` if none arrived within the link's timeout.
    fn recv_command(&mut self) -> Result<Option<MpCommand>, MpLinkError>;

    fn notify(&mut self, notification: &EcpNotification) -> Result<(), MpLinkError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ZmqMpLink {
    command_socket: MonitoredSocket,
    notification_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MpLinkError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Network error: {0}")]
    NetError(#[from] NetError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqMpLink {
    pub fn new(ctx: &zmq::Context, params: &EcpExecParams) -> Result<Self, MpLinkError> {
        let command_socket_options = SocketOptions {
            block_on_first_connect: false,
            recv_timeout: 200,
            ..Default::default()
        };

        let command_socket = MonitoredSocket::new(
            ctx,
            zmq::PULL,
            command_socket_options,
            &params.mp_command_endpoint,
        )?;

        let notification_socket_options = SocketOptions {
            block_on_first_connect: false,
            send_timeout: 1000,
            ..Default::default()
        };

        let notification_socket = MonitoredSocket::new(
            ctx,
            zmq::PUSH,
            notification_socket_options,
            &params.mp_notification_endpoint,
        )?;

        Ok(Self {
            command_socket,
            notification_socket,
        })
    }
}

impl MpLink for ZmqMpLink {
    fn recv_command(&mut self) -> Result<Option<MpCommand>, MpLinkError> {
        Ok(net::recv_json(&self.command_socket)?)
    }

    fn notify(&mut self, notification: &EcpNotification) -> Result<(), MpLinkError> {
        Ok(net::send_json(&self.notification_socket, notification)?)
    }
}
