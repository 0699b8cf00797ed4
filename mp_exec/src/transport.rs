//! # ECP transport
//!
//! Carries commands from the MP to each robot's ECP and notifications back. The MP binds one PUSH
//! socket per robot and a single PULL socket all ECPs push their notifications to.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use std::collections::HashMap;
use thiserror::Error;

use comms_if::{
    net::{self, zmq, MonitoredSocket, MonitoredSocketError, NetError, SocketOptions},
    task::{EcpNotification, MpCommand},
};

use crate::params::MpExecParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait EcpTransport {
    fn send(&mut self, robot: &str, cmd: &MpCommand) -> Result<(), TransportError>;

    /// Receive one notification, `Ok(None)` if nothing usable arrived within the timeout.
    fn recv(&mut self) -> Result<Option<EcpNotification>, TransportError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ZmqTransport {
    command_sockets: HashMap<String, MonitoredSocket>,
    notification_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No command socket for robot {0:?}")]
    NoSuchRobot(String),

    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Network error: {0}")]
    NetError(#[from] NetError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqTransport {
    pub fn new(ctx: &zmq::Context, params: &MpExecParams) -> Result<Self, TransportError> {
        let mut command_sockets = HashMap::new();

        for robot in params.robots.iter() {
            let options = SocketOptions {
                bind: true,
                block_on_first_connect: false,
                send_timeout: 1000,
                linger: 1000,
                ..Default::default()
            };

            let socket =
                MonitoredSocket::new(ctx, zmq::PUSH, options, &robot.command_endpoint)?;
            command_sockets.insert(robot.name.clone(), socket);
        }

        let notification_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 200,
            ..Default::default()
        };

        let notification_socket = MonitoredSocket::new(
            ctx,
            zmq::PULL,
            notification_options,
            &params.notification_endpoint,
        )?;

        Ok(Self {
            command_sockets,
            notification_socket,
        })
    }
}

impl EcpTransport for ZmqTransport {
    fn send(&mut self, robot: &str, cmd: &MpCommand) -> Result<(), TransportError> {
        let socket = self
            .command_sockets
            .get(robot)
            .ok_or_else(|| TransportError::NoSuchRobot(robot.to_string()))?;

        Ok(net::send_json(socket, cmd)?)
    }

    fn recv(&mut self) -> Result<Option<EcpNotification>, TransportError> {
        match net::recv_json(&self.notification_socket) {
            Ok(n) => Ok(n),
            Err(NetError::DeserializeError(e)) => {
                warn!("Discarding unreadable notification: {}", e);
                Ok(None)
            }
            Err(NetError::NonUtf8Message) => {
                warn!("Discarding non UTF-8 notification");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
