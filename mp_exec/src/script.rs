//! # Task scripts
//!
//! A task script is a list of `keyword: json;` statements run in order by the MP:
//!
//! ```text
//! # Home both robots, then move them together
//! message: "Homing";
//! send: {"robot": "irp6", "name": "epos_homing"};
//! send: {"robot": "spkm", "name": "epos_homing"};
//! wait: {"robots": ["irp6", "spkm"], "on_failure": "abort"};
//! delay: 500;
//! send: {"robot": "irp6", "name": "poses_file_from_mp", "payload": "trj/irp6_square.json"};
//! wait: {"robots": ["irp6"], "on_failure": {"retry": 2}};
//! ```
//!
//! Lines starting with `#` are comments. The JSON of a statement may span several lines but must
//! not contain a `;`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use thiserror::Error;

use comms_if::task::NextStateCmd;

use crate::{
    task::{BarrierOutcome, MpError, MpTask, Nack},
    transport::EcpTransport,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub steps: Vec<Step>,
}

/// Send a next-state command to one robot.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SendStep {
    pub robot: String,
    pub name: String,

    #[serde(default)]
    pub variant: i32,

    /// A string is sent as its bytes, any other value as its JSON encoding, nothing as an empty
    /// payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Barrier on a set of robots.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WaitStep {
    pub robots: Vec<String>,

    #[serde(default)]
    pub on_failure: FailurePolicy,
}

/// Runs a [`Script`] on an [`MpTask`].
pub struct ScriptedTask {
    script: Script,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Message(String),
    Send(SendStep),
    Wait(WaitStep),
    Delay(u64),
}

/// What to do when a barrier fails.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// End the script
    Abort,

    /// Log the failure and go on with the next step
    Continue,

    /// Send the failed robots their last command again, at most this many times, then abort
    Retry(u32),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    Completed,
    Aborted { step: usize, nacked: Vec<Nack> },
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not load the script {0:?}: {1}")]
    ScriptLoadError(PathBuf, std::io::Error),

    #[error("The script is empty")]
    ScriptEmpty,

    #[error("Line {line}: unknown statement {keyword:?}")]
    UnknownKeyword { line: usize, keyword: String },

    #[error("Line {line}: invalid {keyword} statement: {error}")]
    InvalidStatement {
        line: usize,
        keyword: String,
        error: serde_json::Error,
    },

    #[error("Line {line}: cannot parse {text:?}")]
    Unparsed { line: usize, text: String },

    #[error("Invalid statement pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Abort
    }
}

impl SendStep {
    pub fn to_command(&self) -> Result<NextStateCmd, serde_json::Error> {
        let payload = match &self.payload {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::String(s) => s.as_bytes().to_vec(),
            v => serde_json::to_vec(v)?,
        };

        Ok(NextStateCmd::new(
            self.robot.as_str(),
            self.name.as_str(),
            self.variant,
            payload,
        ))
    }
}

impl Script {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| ScriptError::ScriptLoadError(path.as_ref().to_path_buf(), e))?;

        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        // Blank out comments so that offsets, and so line numbers, are kept
        let text: String = text
            .lines()
            .map(|l| {
                if l.trim_start().starts_with('#') {
                    " ".repeat(l.len())
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let re = RegexBuilder::new(r"([a-z_]+)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()?;

        let line_of = |offset: usize| text[..offset].matches('\n').count() + 1;

        let mut steps = Vec::new();
        let mut last_end = 0;

        for cap in re.captures_iter(&text) {
            let whole = match cap.get(0) {
                Some(m) => m,
                None => continue,
            };
            let (keyword, body) = match (cap.get(1), cap.get(2)) {
                (Some(k), Some(b)) => (k.as_str(), b.as_str()),
                _ => continue,
            };

            check_gap(&text[last_end..whole.start()], line_of(last_end))?;
            last_end = whole.end();

            let line = line_of(whole.start());
            let invalid = |error| ScriptError::InvalidStatement {
                line,
                keyword: keyword.to_string(),
                error,
            };

            let step = match keyword {
                "message" => Step::Message(serde_json::from_str(body).map_err(invalid)?),
                "send" => Step::Send(serde_json::from_str(body).map_err(invalid)?),
                "wait" => Step::Wait(serde_json::from_str(body).map_err(invalid)?),
                "delay" => Step::Delay(serde_json::from_str(body).map_err(invalid)?),
                _ => {
                    return Err(ScriptError::UnknownKeyword {
                        line,
                        keyword: keyword.to_string(),
                    })
                }
            };

            steps.push(step);
        }

        check_gap(&text[last_end..], line_of(last_end))?;

        if steps.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(Self { steps })
    }
}

impl ScriptedTask {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn num_steps(&self) -> usize {
        self.script.steps.len()
    }

    /// Run every step in order.
    ///
    /// Errors are protocol errors (dispatch to a busy or unknown robot, transport failures),
    /// failed commands are handled by the policy of the barrier which sees them.
    pub fn run<T: EcpTransport>(&self, task: &mut MpTask<T>) -> Result<ScriptOutcome, MpError> {
        let start = Instant::now();

        for (i, step) in self.script.steps.iter().enumerate() {
            match step {
                Step::Message(msg) => info!("[script] {}", msg),
                Step::Send(send) => task.send_next_state(send.to_command()?)?,
                Step::Delay(ms) => task.wait_ms(*ms),
                Step::Wait(wait) => {
                    if let Some(nacked) = Self::barrier(task, wait)? {
                        warn!("Script aborted at step {}", i);
                        return Ok(ScriptOutcome::Aborted { step: i, nacked });
                    }
                }
            }
        }

        info!(
            "Script completed in {:.3} s",
            start.elapsed().as_secs_f64()
        );

        Ok(ScriptOutcome::Completed)
    }

    /// Run a barrier and its failure policy. Returns the failed robots if the script must abort.
    fn barrier<T: EcpTransport>(
        task: &mut MpTask<T>,
        wait: &WaitStep,
    ) -> Result<Option<Vec<Nack>>, MpError> {
        let mut nacked = match task.wait_for_task_termination(&wait.robots[..])? {
            BarrierOutcome::Success => return Ok(None),
            BarrierOutcome::Failure { nacked } => nacked,
        };

        match wait.on_failure {
            FailurePolicy::Abort => Ok(Some(nacked)),
            FailurePolicy::Continue => {
                warn!("Continuing despite the failure of {:?}", nacked);
                Ok(None)
            }
            FailurePolicy::Retry(max) => {
                for attempt in 1..=max {
                    let robots: Vec<String> = nacked.iter().map(|n| n.robot.clone()).collect();
                    info!("Retry {}/{} for {:?}", attempt, max, robots);

                    for robot in robots.iter() {
                        task.resend_last(robot)?;
                    }

                    nacked = match task.wait_for_task_termination(&robots[..])? {
                        BarrierOutcome::Success => return Ok(None),
                        BarrierOutcome::Failure { nacked } => nacked,
                    };
                }

                Ok(Some(nacked))
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Text between statements must be blank.
fn check_gap(gap: &str, first_line: usize) -> Result<(), ScriptError> {
    match gap.char_indices().find(|(_, c)| !c.is_whitespace()) {
        None => Ok(()),
        Some((i, _)) => Err(ScriptError::Unparsed {
            line: first_line + gap[..i].matches('\n').count(),
            text: gap[i..].lines().next().unwrap_or("").trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::FakeEcps;
    use comms_if::task::EcpReply;

    const SCRIPT: &str = r#"
        # Home then move
        message: "Homing";
        send: {"robot": "irp6", "name": "epos_homing"};
        send: {"robot": "spkm", "name": "epos_homing", "variant": 1,
               "payload": {"axis": 0, "velocity": -100, "offset": 200}};
        wait: {"robots": ["irp6", "spkm"]};
        delay: 20;
        send: {"robot": "irp6", "name": "poses_file_from_mp", "payload": "trj/square.json"};
        wait: {"robots": ["irp6"], "on_failure": {"retry": 2}};
    "#;

    fn nack() -> EcpReply {
        EcpReply::Nack {
            reason: "joint out of range".into(),
        }
    }

    #[test]
    fn test_parse() {
        let script = Script::parse(SCRIPT).unwrap();

        assert_eq!(script.steps.len(), 7);
        assert_eq!(script.steps[0], Step::Message("Homing".into()));
        assert_eq!(script.steps[4], Step::Delay(20));

        match &script.steps[2] {
            Step::Send(s) => {
                let cmd = s.to_command().unwrap();
                assert_eq!(cmd.variant, 1);
                assert_eq!(
                    cmd.payload_json::<serde_json::Value>().unwrap()["offset"],
                    200
                );
            }
            s => panic!("Unexpected step {:?}", s),
        }

        match &script.steps[5] {
            Step::Send(s) => assert_eq!(s.to_command().unwrap().payload_str().unwrap(), "trj/square.json"),
            s => panic!("Unexpected step {:?}", s),
        }

        match &script.steps[3] {
            Step::Wait(w) => assert_eq!(w.on_failure, FailurePolicy::Abort),
            s => panic!("Unexpected step {:?}", s),
        }
        match &script.steps[6] {
            Step::Wait(w) => assert_eq!(w.on_failure, FailurePolicy::Retry(2)),
            s => panic!("Unexpected step {:?}", s),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Script::parse("# nothing\n"), Err(ScriptError::ScriptEmpty)));

        assert!(matches!(
            Script::parse("message: \"a\";\nbogus text\ndelay: 10;"),
            Err(ScriptError::Unparsed { line: 2, .. })
        ));

        assert!(matches!(
            Script::parse("delay: 10;\nwait: {\"robots\": 3};"),
            Err(ScriptError::InvalidStatement { line: 2, .. })
        ));

        assert!(matches!(
            Script::parse("jump: 10;"),
            Err(ScriptError::UnknownKeyword { line: 1, .. })
        ));

        assert!(matches!(
            Script::parse("delay: 10;\ndelay: 20"),
            Err(ScriptError::Unparsed { line: 2, .. })
        ));
    }

    #[test]
    fn test_run_with_retry() {
        let ecps = FakeEcps::replying().script("irp6", vec![EcpReply::Completed, nack(), nack()]);
        let mut task = MpTask::new(ecps, &["irp6", "spkm"]);

        let outcome = ScriptedTask::new(Script::parse(SCRIPT).unwrap())
            .run(&mut task)
            .unwrap();

        // The poses command failed twice and succeeded on its second retry
        assert_eq!(outcome, ScriptOutcome::Completed);
        assert_eq!(
            task.transport().commands_to("irp6"),
            vec![
                "epos_homing",
                "poses_file_from_mp",
                "poses_file_from_mp",
                "poses_file_from_mp"
            ]
        );
    }

    #[test]
    fn test_run_abort() {
        let ecps = FakeEcps::replying().script("spkm", vec![nack()]);
        let mut task = MpTask::new(ecps, &["irp6", "spkm"]);

        let outcome = ScriptedTask::new(Script::parse(SCRIPT).unwrap())
            .run(&mut task)
            .unwrap();

        match outcome {
            ScriptOutcome::Aborted { step, nacked } => {
                assert_eq!(step, 3);
                assert_eq!(nacked.len(), 1);
                assert_eq!(nacked[0].robot, "spkm");
            }
            o => panic!("Unexpected outcome {:?}", o),
        }

        // Nothing after the failed barrier was sent
        assert_eq!(task.transport().commands_to("irp6"), vec!["epos_homing"]);
    }

    #[test]
    fn test_run_continue() {
        let script = Script::parse(
            r#"
            send: {"robot": "irp6", "name": "sleep", "payload": 10};
            wait: {"robots": ["irp6"], "on_failure": "continue"};
            send: {"robot": "irp6", "name": "sleep", "payload": 10};
            wait: {"robots": ["irp6"]};
            "#,
        )
        .unwrap();

        let ecps = FakeEcps::replying().script("irp6", vec![nack()]);
        let mut task = MpTask::new(ecps, &["irp6"]);

        assert_eq!(
            ScriptedTask::new(script).run(&mut task).unwrap(),
            ScriptOutcome::Completed
        );
        assert_eq!(task.transport().commands_to("irp6").len(), 2);
    }

    #[test]
    fn test_busy_robot_is_an_error() {
        let script = Script::parse(
            r#"
            send: {"robot": "irp6", "name": "sleep", "payload": 10};
            send: {"robot": "irp6", "name": "sleep", "payload": 10};
            "#,
        )
        .unwrap();

        let mut task = MpTask::new(FakeEcps::replying(), &["irp6"]);
        assert!(matches!(
            ScriptedTask::new(script).run(&mut task),
            Err(MpError::RobotBusy(_))
        ));
    }
}
