//! # CANopen gateway
//!
//! The driver never talks to a bus directly. Everything goes through a [`Gateway`], which carries
//! SDO reads and writes, segmented downloads and NMT services to the nodes on one bus. A physical
//! gateway and the [`crate::sim::SimGateway`] both implement it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::diag;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Access to the object dictionaries of the nodes on one CAN bus.
pub trait Gateway {
    /// Read an object, returning its value zero-extended to 32 bits.
    fn read_object(&mut self, node: u8, index: u16, subindex: u8) -> Result<u32, GatewayError>;

    /// Expedited write of 1 to 4 little-endian bytes.
    fn write_object(
        &mut self,
        node: u8,
        index: u16,
        subindex: u8,
        data: &[u8],
    ) -> Result<(), GatewayError>;

    /// Send an NMT service request to a node.
    fn send_nmt(&mut self, node: u8, service: NmtService) -> Result<(), GatewayError>;

    /// Start a segmented download of `length` bytes to an object.
    fn initiate_segmented_write(
        &mut self,
        node: u8,
        index: u16,
        subindex: u8,
        length: u32,
    ) -> Result<(), GatewayError>;

    /// Send one segment (at most 7 bytes) of a download started by
    /// [`Gateway::initiate_segmented_write`].
    fn segmented_write(&mut self, node: u8, data: &[u8]) -> Result<(), GatewayError>;
}

/// A value which can be stored in an object dictionary entry.
pub trait ObjectValue: Copy {
    /// Recover the value from the raw, zero-extended read result.
    fn from_raw(raw: u32) -> Self;

    /// Little-endian encoding of the value.
    fn to_bytes(self) -> Vec<u8>;
}

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// A gateway shared by the drivers of all axes on the same bus.
pub type SharedGateway<G> = Arc<Mutex<G>>;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// NMT services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NmtService {
    StartRemoteNode,
    StopRemoteNode,
    EnterPreOperational,
    ResetNode,
    ResetCommunication,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("No response from node {0}")]
    Timeout(u8),

    #[error("SDO transfer aborted with code {0:#010x} ({})", abort_description(.0))]
    Abort(u32),

    #[error("Node {0} is not on the bus")]
    NoSuchNode(u8),

    #[error("Invalid data length {0} for an expedited transfer")]
    InvalidLength(usize),

    #[error("Segmented transfer error: {0}")]
    Segmented(String),

    #[error("The gateway lock is poisoned")]
    Poisoned,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GatewayError {
    /// Whether the request may succeed if it is simply repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }
}

impl<G: Gateway> Gateway for Arc<Mutex<G>> {
    fn read_object(&mut self, node: u8, index: u16, subindex: u8) -> Result<u32, GatewayError> {
        self.lock()
            .map_err(|_| GatewayError::Poisoned)?
            .read_object(node, index, subindex)
    }

    fn write_object(
        &mut self,
        node: u8,
        index: u16,
        subindex: u8,
        data: &[u8],
    ) -> Result<(), GatewayError> {
        self.lock()
            .map_err(|_| GatewayError::Poisoned)?
            .write_object(node, index, subindex, data)
    }

    fn send_nmt(&mut self, node: u8, service: NmtService) -> Result<(), GatewayError> {
        self.lock()
            .map_err(|_| GatewayError::Poisoned)?
            .send_nmt(node, service)
    }

    fn initiate_segmented_write(
        &mut self,
        node: u8,
        index: u16,
        subindex: u8,
        length: u32,
    ) -> Result<(), GatewayError> {
        self.lock()
            .map_err(|_| GatewayError::Poisoned)?
            .initiate_segmented_write(node, index, subindex, length)
    }

    fn segmented_write(&mut self, node: u8, data: &[u8]) -> Result<(), GatewayError> {
        self.lock()
            .map_err(|_| GatewayError::Poisoned)?
            .segmented_write(node, data)
    }
}

macro_rules! impl_object_value {
    ($($ty:ty => $write:ident),+) => {
        $(
            impl ObjectValue for $ty {
                fn from_raw(raw: u32) -> Self {
                    raw as $ty
                }

                fn to_bytes(self) -> Vec<u8> {
                    let mut buf = Vec::with_capacity(std::mem::size_of::<$ty>());
                    // Writing into a Vec cannot fail
                    buf.$write::<LittleEndian>(self).ok();
                    buf
                }
            }
        )+
    };
}

impl_object_value!(
    u16 => write_u16,
    i16 => write_i16,
    u32 => write_u32,
    i32 => write_i32
);

impl ObjectValue for u8 {
    fn from_raw(raw: u32) -> Self {
        raw as u8
    }

    fn to_bytes(self) -> Vec<u8> {
        vec![self]
    }
}

impl ObjectValue for i8 {
    fn from_raw(raw: u32) -> Self {
        raw as u8 as i8
    }

    fn to_bytes(self) -> Vec<u8> {
        vec![self as u8]
    }
}

fn abort_description(code: &u32) -> &'static str {
    diag::sdo_abort_message(*code)
}

/// Widen little-endian expedited data into the raw 32 bit form returned by reads.
pub fn raw_from_bytes(data: &[u8]) -> Result<u32, GatewayError> {
    if data.is_empty() || data.len() > 4 {
        return Err(GatewayError::InvalidLength(data.len()));
    }

    Ok(data
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, b)| acc | ((*b as u32) << (8 * i))))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_object_values() {
        assert_eq!((-2i32).to_bytes(), vec![0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(0x1234u16.to_bytes(), vec![0x34, 0x12]);
        assert_eq!((-3i8).to_bytes(), vec![0xfd]);

        // Reads are zero-extended, signed types must sign-extend from their own width
        assert_eq!(i8::from_raw(0xfd), -3);
        assert_eq!(i16::from_raw(0xfffe), -2);
        assert_eq!(i32::from_raw(raw_from_bytes(&(-5i32).to_bytes()).unwrap()), -5);
        assert_eq!(u16::from_raw(raw_from_bytes(&[0x37, 0x01]).unwrap()), 0x0137);

        assert!(raw_from_bytes(&[]).is_err());
        assert!(raw_from_bytes(&[0; 5]).is_err());
    }
}
