//! # Effector Driver Server
//!
//! Networking side of the effector driver. The ECP of the robot connects a REQ socket to the
//! server's REP socket and sends one [`EdpCommand`] at a time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::edp::{EdpCommand, EdpResponse},
    net::{self, zmq, MonitoredSocket, MonitoredSocketError, NetError, SocketOptions},
};

use crate::params::EdpExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct EdpServer {
    /// REP socket which accepts commands from the ECP
    command_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum EdpServerError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Network error: {0}")]
    NetError(#[from] NetError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EdpServer {
    /// Bind the command socket. Does not wait for the ECP to connect.
    pub fn new(ctx: &zmq::Context, params: &EdpExecParams) -> Result<Self, EdpServerError> {
        let command_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 200,
            send_timeout: 10,
            ..Default::default()
        };

        let command_socket = MonitoredSocket::new(
            ctx,
            zmq::REP,
            command_socket_options,
            &params.command_endpoint,
        )?;

        Ok(Self { command_socket })
    }

    /// Receive a command from the ECP.
    ///
    /// `Ok(None)` is returned if nothing arrived within the receive timeout. After a command is
    /// received [`EdpServer::send_response`] must be called before the next one.
    pub fn get_command(&mut self) -> Result<Option<EdpCommand>, EdpServerError> {
        Ok(net::recv_json(&self.command_socket)?)
    }

    pub fn send_response(&mut self, response: &EdpResponse) -> Result<(), EdpServerError> {
        Ok(net::send_json(&self.command_socket, response)?)
    }

    pub fn connected(&self) -> bool {
        self.command_socket.connected()
    }
}
