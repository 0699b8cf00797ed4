//! # MP task
//!
//! Sequences commands to the robots and synchronises them. Commands to different robots are sent
//! in program order without waiting for each other, [`MpTask::wait_for_task_termination`] is the
//! only point at which the MP waits for the robots.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

use comms_if::task::{EcpNotification, EcpReply, MpCommand, NextStateCmd};
use util::{session, time::Ticker};

use crate::{
    transport::{EcpTransport, TransportError},
    workers::{Update, WorkerStatus, WorkersStatus},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Period of the MP's delay ticks.
pub const WAIT_TICK_MS: u64 = 20;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MpTask<T: EcpTransport> {
    transport: T,
    workers: WorkersStatus,
    num_barriers: usize,
}

/// A robot which failed its command.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Nack {
    pub robot: String,
    pub reason: String,
}

/// What is archived for every barrier.
#[derive(Serialize, Debug, Clone)]
struct BarrierRecord {
    index: usize,
    robots: Vec<String>,
    success: bool,
    nacked: Vec<Nack>,
    duration_s: f64,
    notifications: Vec<EcpNotification>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Outcome of a barrier. A failure must be handled by the caller.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum BarrierOutcome {
    /// Every robot completed its command
    Success,

    /// Every robot is idle again, but at least one of them failed its command
    Failure { nacked: Vec<Nack> },
}

#[derive(Debug, Error)]
pub enum MpError {
    #[error("Robot {0:?} is not part of this task")]
    UnknownRobot(String),

    #[error("Robot {0:?} is still running a command")]
    RobotBusy(String),

    #[error("Could not build the command payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: EcpTransport> MpTask<T> {
    pub fn new<S: AsRef<str>>(transport: T, robots: &[S]) -> Self {
        Self {
            transport,
            workers: WorkersStatus::new(robots),
            num_barriers: 0,
        }
    }

    pub fn workers(&self) -> &WorkersStatus {
        &self.workers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a next-state command to an idle robot.
    pub fn set_next_ecp_state(
        &mut self,
        robot: &str,
        name: &str,
        variant: i32,
        payload: Vec<u8>,
    ) -> Result<(), MpError> {
        self.send_next_state(NextStateCmd::new(robot, name, variant, payload))
    }

    /// Send a next-state command whose payload is the JSON encoding of `payload`.
    pub fn set_next_ecp_state_json<P: Serialize>(
        &mut self,
        robot: &str,
        name: &str,
        variant: i32,
        payload: &P,
    ) -> Result<(), MpError> {
        self.send_next_state(NextStateCmd::with_json(robot, name, variant, payload)?)
    }

    pub fn send_next_state(&mut self, cmd: NextStateCmd) -> Result<(), MpError> {
        self.workers.dispatch(&cmd)?;

        info!(
            "{} <- {} (variant {})",
            cmd.robot, cmd.name, cmd.variant
        );

        let robot = cmd.robot.clone();
        if let Err(e) = self.transport.send(&robot, &MpCommand::NextState(cmd)) {
            // The robot never got the command, so it is not running it
            self.workers.on_notification(EcpNotification {
                robot: robot.clone(),
                reply: EcpReply::Nack {
                    reason: e.to_string(),
                },
                elapsed_s: 0.0,
                num_steps: 0,
            });
            return Err(e.into());
        }

        Ok(())
    }

    /// Send the last command of a robot again.
    pub fn resend_last(&mut self, robot: &str) -> Result<(), MpError> {
        let cmd = self
            .workers
            .get(robot)
            .and_then(|w| w.last_command.clone())
            .ok_or_else(|| MpError::UnknownRobot(robot.to_string()))?;

        self.send_next_state(cmd)
    }

    /// Wait until every named robot is idle.
    ///
    /// Notifications are processed one at a time as they arrive, including those of robots which
    /// are not part of the barrier. If any named robot failed its command the outcome is a
    /// failure, whatever the other robots reported.
    pub fn wait_for_task_termination<S: AsRef<str>>(
        &mut self,
        robots: &[S],
    ) -> Result<BarrierOutcome, MpError> {
        let start = Instant::now();
        self.num_barriers += 1;

        let mut names = Vec::with_capacity(robots.len());
        for r in robots {
            let r = r.as_ref();
            self.workers.status(r)?;
            names.push(r.to_string());
        }

        let mut pending: Vec<String> = names
            .iter()
            .filter(|r| self.workers.status(r).ok() == Some(WorkerStatus::Busy))
            .cloned()
            .collect();

        debug!("Barrier {}: waiting for {:?}", self.num_barriers, pending);

        let mut nacked = Vec::new();
        let mut notifications = Vec::new();

        while !pending.is_empty() {
            let notification = match self.transport.recv()? {
                Some(n) => n,
                None => continue,
            };

            let notification = match self.workers.on_notification(notification) {
                Update::Finished(n) => n,
                Update::Stray => continue,
            };

            match &notification.reply {
                EcpReply::Completed => info!(
                    "{} completed in {:.3} s ({} steps)",
                    notification.robot, notification.elapsed_s, notification.num_steps
                ),
                EcpReply::Nack { reason } => error!("{} failed: {}", notification.robot, reason),
            }

            if let Some(i) = pending.iter().position(|r| *r == notification.robot) {
                pending.swap_remove(i);

                if let EcpReply::Nack { reason } = &notification.reply {
                    nacked.push(Nack {
                        robot: notification.robot.clone(),
                        reason: reason.clone(),
                    });
                }
                notifications.push(notification);
            }
        }

        let duration_s = start.elapsed().as_secs_f64();

        session::save_with_timestamp(
            format!("barriers/barrier_{:03}.json", self.num_barriers),
            BarrierRecord {
                index: self.num_barriers,
                robots: names,
                success: nacked.is_empty(),
                nacked: nacked.clone(),
                duration_s,
                notifications,
            },
        );

        if nacked.is_empty() {
            info!("Barrier {} passed in {:.3} s", self.num_barriers, duration_s);
            Ok(BarrierOutcome::Success)
        } else {
            warn!(
                "Barrier {} failed in {:.3} s: {:?}",
                self.num_barriers, duration_s, nacked
            );
            Ok(BarrierOutcome::Failure { nacked })
        }
    }

    /// Block for the given time in 20 ms ticks. Notifications are not processed meanwhile.
    pub fn wait_ms(&self, ms: u64) {
        let mut ticker = Ticker::from_millis(WAIT_TICK_MS);
        let ticks = (ms + WAIT_TICK_MS - 1) / WAIT_TICK_MS;

        for _ in 0..ticks {
            ticker.wait();
        }
    }

    /// Ask every ECP to end its task.
    pub fn terminate_all(&mut self) {
        let names: Vec<String> = self.workers.names().iter().map(|n| n.to_string()).collect();

        for robot in names {
            if self.workers.status(&robot).ok() == Some(WorkerStatus::Busy) {
                warn!("{} is still busy, it will terminate after its command", robot);
            }
            match self.transport.send(&robot, &MpCommand::Terminate) {
                Ok(()) => info!("{} <- terminate", robot),
                Err(e) => warn!("Could not terminate {}: {}", robot, e),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::FakeEcps;
    use std::time::Duration;

    fn nack(robot: &str) -> EcpNotification {
        EcpNotification {
            robot: robot.into(),
            reply: EcpReply::Nack {
                reason: "axes in fault: joint_2".into(),
            },
            elapsed_s: 0.5,
            num_steps: 2,
        }
    }

    fn done(robot: &str) -> EcpNotification {
        EcpNotification {
            robot: robot.into(),
            reply: EcpReply::Completed,
            elapsed_s: 1.0,
            num_steps: 10,
        }
    }

    #[test]
    fn test_barrier_success() {
        let mut task = MpTask::new(FakeEcps::replying(), &["R1", "R2"]);

        task.set_next_ecp_state("R1", "sleep", 0, b"10".to_vec()).unwrap();
        task.set_next_ecp_state("R2", "sleep", 0, b"10".to_vec()).unwrap();

        assert_eq!(
            task.wait_for_task_termination(&["R1", "R2"]).unwrap(),
            BarrierOutcome::Success
        );
        assert!(task.workers().busy().is_empty());
    }

    #[test]
    fn test_nack_is_not_masked() {
        let mut task = MpTask::new(FakeEcps::silent(), &["R1", "R2"]);

        task.set_next_ecp_state("R1", "epos_joint_command", 0, vec![]).unwrap();
        task.set_next_ecp_state("R2", "epos_joint_command", 0, vec![]).unwrap();

        // R2 fails before R1 completes
        task.transport.push(nack("R2"));
        task.transport.push(done("R1"));

        assert_eq!(
            task.wait_for_task_termination(&["R1", "R2"]).unwrap(),
            BarrierOutcome::Failure {
                nacked: vec![Nack {
                    robot: "R2".into(),
                    reason: "axes in fault: joint_2".into()
                }]
            }
        );
        assert!(task.workers().busy().is_empty());
    }

    #[test]
    fn test_barrier_waits_for_all() {
        let mut task = MpTask::new(FakeEcps::silent(), &["R1", "R2", "R3"]);

        task.set_next_ecp_state("R1", "sleep", 0, vec![]).unwrap();
        task.set_next_ecp_state("R2", "sleep", 0, vec![]).unwrap();
        task.set_next_ecp_state("R3", "sleep", 0, vec![]).unwrap();

        // Strays and robots outside the barrier don't end it
        task.transport.push(done("R9"));
        task.transport.push(done("R3"));
        task.transport.push(done("R1"));
        task.transport.push(done("R1"));
        task.transport.push(done("R2"));

        assert_eq!(
            task.wait_for_task_termination(&["R1", "R2"]).unwrap(),
            BarrierOutcome::Success
        );
        assert_eq!(task.transport.pending(), 0);
        assert!(task.workers().busy().is_empty());
    }

    #[test]
    fn test_dispatch_errors() {
        let mut task = MpTask::new(FakeEcps::silent(), &["R1"]);

        task.set_next_ecp_state("R1", "sleep", 0, vec![]).unwrap();
        assert!(matches!(
            task.set_next_ecp_state("R1", "sleep", 0, vec![]),
            Err(MpError::RobotBusy(_))
        ));
        assert!(matches!(
            task.set_next_ecp_state("R7", "sleep", 0, vec![]),
            Err(MpError::UnknownRobot(_))
        ));
        assert!(matches!(
            task.wait_for_task_termination(&["R7"]),
            Err(MpError::UnknownRobot(_))
        ));

        // Only the first command went out
        assert_eq!(task.transport.sent.len(), 1);
    }

    #[test]
    fn test_wait_ms() {
        let task = MpTask::new(FakeEcps::silent(), &["R1"]);

        let start = Instant::now();
        task.wait_ms(50);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_terminate_all() {
        let mut task = MpTask::new(FakeEcps::silent(), &["R1", "R2"]);
        task.terminate_all();

        assert_eq!(
            task.transport.sent,
            vec![
                ("R1".to_string(), MpCommand::Terminate),
                ("R2".to_string(), MpCommand::Terminate)
            ]
        );
    }
}
