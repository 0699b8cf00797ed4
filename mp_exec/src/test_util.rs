//! In-memory stand-in for the ECPs.

use std::collections::{HashMap, VecDeque};

use comms_if::task::{EcpNotification, EcpReply, MpCommand};

use crate::transport::{EcpTransport, TransportError};

/// Records what the MP sends and hands back queued notifications.
///
/// A replying instance queues one notification for every next-state command it is sent, taking
/// the reply from the robot's scripted replies and completing once they run out.
#[derive(Default)]
pub struct FakeEcps {
    pub sent: Vec<(String, MpCommand)>,
    inbox: VecDeque<EcpNotification>,
    replies: HashMap<String, VecDeque<EcpReply>>,
    replying: bool,
}

impl FakeEcps {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn replying() -> Self {
        Self {
            replying: true,
            ..Default::default()
        }
    }

    /// Queue the replies the robot gives to its next commands.
    pub fn script(mut self, robot: &str, replies: Vec<EcpReply>) -> Self {
        self.replies.insert(robot.to_string(), replies.into());
        self
    }

    pub fn push(&mut self, notification: EcpNotification) {
        self.inbox.push_back(notification);
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Names of the commands sent to a robot, in order.
    pub fn commands_to(&self, robot: &str) -> Vec<String> {
        self.sent
            .iter()
            .filter(|(r, _)| r == robot)
            .map(|(_, c)| match c {
                MpCommand::NextState(n) => n.name.clone(),
                MpCommand::Terminate => "terminate".to_string(),
            })
            .collect()
    }
}

impl EcpTransport for FakeEcps {
    fn send(&mut self, robot: &str, cmd: &MpCommand) -> Result<(), TransportError> {
        self.sent.push((robot.to_string(), cmd.clone()));

        if self.replying {
            if let MpCommand::NextState(_) = cmd {
                let reply = self
                    .replies
                    .get_mut(robot)
                    .and_then(|r| r.pop_front())
                    .unwrap_or(EcpReply::Completed);

                self.inbox.push_back(EcpNotification {
                    robot: robot.to_string(),
                    reply,
                    elapsed_s: 0.01,
                    num_steps: 1,
                });
            }
        }

        Ok(())
    }

    fn recv(&mut self) -> Result<Option<EcpNotification>, TransportError> {
        Ok(self.inbox.pop_front())
    }
}
