//! # Task messages
//!
//! Messages exchanged between the master process (MP) and the effector control process (ECP) of
//! each robot. The MP sends one [`MpCommand`] at a time to a robot, the robot's ECP answers each
//! [`MpCommand::NextState`] with exactly one [`EcpNotification`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A next-state command for one robot.
///
/// The command names a generator or subtask registered in the robot's ECP. The `variant` and
/// `payload` are interpreted by the generator, the payload is commonly a file path or a JSON
/// document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NextStateCmd {
    /// Symbolic name of the generator or subtask to run
    pub name: String,

    /// Generator specific variant
    pub variant: i32,

    /// Opaque payload, base64 encoded on the wire
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,

    /// Name of the robot the command is addressed to
    pub robot: String,
}

/// Notification sent by an ECP once the command it was given has finished.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EcpNotification {
    /// Robot which sent the notification
    pub robot: String,

    /// Outcome of the command
    pub reply: EcpReply,

    /// Time between receiving the command and finishing it
    pub elapsed_s: f64,

    /// Number of generator steps run, including the first step
    pub num_steps: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Commands sent from the MP to an ECP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum MpCommand {
    /// Run the named generator or subtask
    NextState(NextStateCmd),

    /// End the ECP task
    Terminate,
}

/// Outcome of a command as reported by the ECP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EcpReply {
    /// The command ran to completion
    Completed,

    /// The command failed, the robot is idle again
    Nack { reason: String },
}

/// Errors decoding a command payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Payload is not valid UTF-8: {0}")]
    NotUtf8(std::str::Utf8Error),

    #[error("Payload is not valid JSON for this command: {0}")]
    InvalidJson(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NextStateCmd {
    /// Create a new command with a raw byte payload.
    pub fn new<N, R>(robot: R, name: N, variant: i32, payload: Vec<u8>) -> Self
    where
        N: Into<String>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            variant,
            payload,
            robot: robot.into(),
        }
    }

    /// Create a new command whose payload is the given value as JSON.
    pub fn with_json<N, R, T>(
        robot: R,
        name: N,
        variant: i32,
        payload: &T,
    ) -> Result<Self, serde_json::Error>
    where
        N: Into<String>,
        R: Into<String>,
        T: Serialize,
    {
        Ok(Self::new(robot, name, variant, serde_json::to_vec(payload)?))
    }

    /// Interpret the payload as a UTF-8 string, for example a file path.
    pub fn payload_str(&self) -> Result<&str, PayloadError> {
        std::str::from_utf8(&self.payload).map_err(PayloadError::NotUtf8)
    }

    /// Interpret the payload as JSON.
    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        serde_json::from_slice(&self.payload).map_err(PayloadError::InvalidJson)
    }
}

impl EcpNotification {
    pub fn is_nack(&self) -> bool {
        matches!(self.reply, EcpReply::Nack { .. })
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE MODULES
// ------------------------------------------------------------------------------------------------

mod payload_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        base64::decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_payload_on_the_wire() {
        let cmd = NextStateCmd::new("irp6", "poses_file_from_mp", 0, b"trj/home.json".to_vec());
        let json = serde_json::to_string(&MpCommand::NextState(cmd.clone())).unwrap();

        // Payloads travel as base64 so arbitrary bytes survive the JSON encoding
        assert!(json.contains("dHJqL2hvbWUuanNvbg=="));

        let back: MpCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MpCommand::NextState(cmd));
    }

    #[test]
    fn test_payload_accessors() {
        let cmd = NextStateCmd::with_json("spkm", "sleep", 0, &250u64).unwrap();
        assert_eq!(cmd.payload_str().unwrap(), "250");
        assert_eq!(cmd.payload_json::<u64>().unwrap(), 250);
        assert!(cmd.payload_json::<String>().is_err());

        let bad = NextStateCmd::new("spkm", "sleep", 0, vec![0xff, 0xfe]);
        assert!(matches!(bad.payload_str(), Err(PayloadError::NotUtf8(_))));
    }
}
