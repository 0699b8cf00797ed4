//! # Workers status
//!
//! The MP's view of every robot: whether its ECP is running a command, the last command it was
//! given, and the last notification it sent. The table is only changed by the MP's control
//! thread, on dispatch and on the arrival of each notification.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

use comms_if::task::{EcpNotification, NextStateCmd};

use crate::task::MpError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct WorkersStatus {
    workers: BTreeMap<String, Worker>,
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub status: WorkerStatus,
    pub last_command: Option<NextStateCmd>,
    pub last_notification: Option<EcpNotification>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// How a notification changed the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// A busy robot finished its command
    Finished(EcpNotification),

    /// The notification did not match any running command and was discarded
    Stray,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WorkersStatus {
    /// All robots start idle.
    pub fn new<S: AsRef<str>>(robots: &[S]) -> Self {
        let workers = robots
            .iter()
            .map(|r| {
                (
                    r.as_ref().to_string(),
                    Worker {
                        status: WorkerStatus::Idle,
                        last_command: None,
                        last_notification: None,
                    },
                )
            })
            .collect();

        Self { workers }
    }

    pub fn contains(&self, robot: &str) -> bool {
        self.workers.contains_key(robot)
    }

    pub fn get(&self, robot: &str) -> Option<&Worker> {
        self.workers.get(robot)
    }

    pub fn status(&self, robot: &str) -> Result<WorkerStatus, MpError> {
        self.get(robot)
            .map(|w| w.status)
            .ok_or_else(|| MpError::UnknownRobot(robot.to_string()))
    }

    /// Mark the addressed robot busy with the command.
    pub fn dispatch(&mut self, cmd: &NextStateCmd) -> Result<(), MpError> {
        let worker = self
            .workers
            .get_mut(&cmd.robot)
            .ok_or_else(|| MpError::UnknownRobot(cmd.robot.clone()))?;

        if worker.status == WorkerStatus::Busy {
            return Err(MpError::RobotBusy(cmd.robot.clone()));
        }

        worker.status = WorkerStatus::Busy;
        worker.last_command = Some(cmd.clone());

        Ok(())
    }

    /// Apply a notification. Notifications from unknown or idle robots are logged and discarded.
    pub fn on_notification(&mut self, notification: EcpNotification) -> Update {
        let worker = match self.workers.get_mut(&notification.robot) {
            Some(w) => w,
            None => {
                warn!(
                    "Discarding notification from unknown robot {:?}",
                    notification.robot
                );
                return Update::Stray;
            }
        };

        if worker.status != WorkerStatus::Busy {
            warn!(
                "Discarding notification from {}, which has no command running",
                notification.robot
            );
            return Update::Stray;
        }

        worker.status = WorkerStatus::Idle;
        worker.last_notification = Some(notification.clone());

        Update::Finished(notification)
    }

    /// Names of the busy robots.
    pub fn busy(&self) -> Vec<&str> {
        self.workers
            .iter()
            .filter(|(_, w)| w.status == WorkerStatus::Busy)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::task::EcpReply;

    fn done(robot: &str) -> EcpNotification {
        EcpNotification {
            robot: robot.into(),
            reply: EcpReply::Completed,
            elapsed_s: 0.1,
            num_steps: 3,
        }
    }

    #[test]
    fn test_dispatch_and_finish() {
        let mut workers = WorkersStatus::new(&["irp6", "spkm"]);
        let cmd = NextStateCmd::new("irp6", "sleep", 0, b"10".to_vec());

        workers.dispatch(&cmd).unwrap();
        assert_eq!(workers.busy(), vec!["irp6"]);
        assert!(matches!(workers.dispatch(&cmd), Err(MpError::RobotBusy(_))));
        assert!(matches!(
            workers.dispatch(&NextStateCmd::new("conveyor", "sleep", 0, vec![])),
            Err(MpError::UnknownRobot(_))
        ));

        // Only the busy robot's notification is accepted
        assert_eq!(workers.on_notification(done("spkm")), Update::Stray);
        assert_eq!(workers.on_notification(done("conveyor")), Update::Stray);
        assert_eq!(
            workers.on_notification(done("irp6")),
            Update::Finished(done("irp6"))
        );

        assert_eq!(workers.status("irp6").unwrap(), WorkerStatus::Idle);
        assert_eq!(
            workers.get("irp6").unwrap().last_command.as_ref(),
            Some(&cmd)
        );
    }
}
