//! # Interpolated position mode
//!
//! The device keeps a FIFO of PVT records which it interpolates between. Records are 8 bytes
//! and are sent with a segmented download to object 0x20C1.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    driver::{Epos, CW_START},
    error::{EposError, ErrorKind},
    gateway::Gateway,
    od,
    state::OperationMode,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Smallest velocity which fits in a PVT record.
pub const PVT_VELOCITY_MIN: i32 = -(1 << 23);

/// Largest velocity which fits in a PVT record.
pub const PVT_VELOCITY_MAX: i32 = (1 << 23) - 1;

/// Interpolation buffer status bits, object 0x20C4/1.
pub mod ipm_status_bits {
    pub const UNDERFLOW_WARNING: u16 = 1 << 0;
    pub const OVERFLOW_WARNING: u16 = 1 << 1;
    pub const VELOCITY_WARNING: u16 = 1 << 2;
    pub const ACCELERATION_WARNING: u16 = 1 << 3;
    pub const UNDERFLOW_ERROR: u16 = 1 << 8;
    pub const OVERFLOW_ERROR: u16 = 1 << 9;
    pub const VELOCITY_ERROR: u16 = 1 << 10;
    pub const ACCELERATION_ERROR: u16 = 1 << 11;
    pub const BUFFER_ENABLED: u16 = 1 << 14;
    pub const IP_MODE_ACTIVE: u16 = 1 << 15;

    pub const WARNING_MASK: u16 = 0x000F;
    pub const ERROR_MASK: u16 = 0x0F00;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One position, velocity, time record of the interpolation buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvtRecord {
    /// Position [qc]
    pub position: i32,

    /// Velocity [rpm], must fit in 24 bits
    pub velocity: i32,

    /// Time to reach the record from the previous one [ms]
    pub time_ms: u8,
}

/// Decoded interpolation buffer status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolationBufferStatus(pub u16);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PvtRecord {
    pub fn new(position: i32, velocity: i32, time_ms: u8) -> Self {
        Self {
            position,
            velocity,
            time_ms,
        }
    }

    pub fn is_velocity_valid(&self) -> bool {
        self.velocity >= PVT_VELOCITY_MIN && self.velocity <= PVT_VELOCITY_MAX
    }

    /// Encode the record as sent to the device: position (4 bytes), velocity (3 bytes), time.
    ///
    /// Returns `None` if the velocity doesn't fit in 24 bits.
    pub fn to_bytes(&self) -> Option<[u8; 8]> {
        if !self.is_velocity_valid() {
            return None;
        }

        let mut buf = [0u8; 8];
        LittleEndian::write_i32(&mut buf[0..4], self.position);
        LittleEndian::write_i24(&mut buf[4..7], self.velocity);
        buf[7] = self.time_ms;

        Some(buf)
    }

    pub fn from_bytes(buf: &[u8; 8]) -> Self {
        Self {
            position: LittleEndian::read_i32(&buf[0..4]),
            velocity: LittleEndian::read_i24(&buf[4..7]),
            time_ms: buf[7],
        }
    }
}

impl InterpolationBufferStatus {
    pub fn has_warning(&self) -> bool {
        self.0 & ipm_status_bits::WARNING_MASK != 0
    }

    pub fn has_error(&self) -> bool {
        self.0 & ipm_status_bits::ERROR_MASK != 0
    }

    pub fn underflow_warning(&self) -> bool {
        self.0 & ipm_status_bits::UNDERFLOW_WARNING != 0
    }

    pub fn buffer_enabled(&self) -> bool {
        self.0 & ipm_status_bits::BUFFER_ENABLED != 0
    }

    pub fn ip_mode_active(&self) -> bool {
        self.0 & ipm_status_bits::IP_MODE_ACTIVE != 0
    }

    /// Description of every flag set in the status.
    pub fn messages(&self) -> Vec<&'static str> {
        use ipm_status_bits::*;

        const FLAGS: [(u16, &str); 10] = [
            (UNDERFLOW_WARNING, "Buffer underflow warning level is reached"),
            (OVERFLOW_WARNING, "Buffer overflow warning level is reached"),
            (VELOCITY_WARNING, "IPM velocity greater than profile velocity detected"),
            (ACCELERATION_WARNING, "IPM acceleration greater than profile acceleration detected"),
            (UNDERFLOW_ERROR, "Buffer underflow error (trajectory abort)"),
            (OVERFLOW_ERROR, "Buffer overflow error (trajectory abort)"),
            (VELOCITY_ERROR, "IPM velocity greater than profile velocity (trajectory abort)"),
            (ACCELERATION_ERROR, "IPM acceleration greater than profile acceleration (trajectory abort)"),
            (BUFFER_ENABLED, "Access to the input buffer enabled"),
            (IP_MODE_ACTIVE, "Interpolated position mode active"),
        ];

        FLAGS
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, msg)| *msg)
            .collect()
    }
}

impl<G: Gateway> Epos<G> {
    /// Flush the interpolation buffer by disabling, then re-enabling, access to it.
    pub fn clear_pvt_buffer(&mut self) -> Result<(), EposError> {
        self.write(od::INTERPOLATION_BUFFER_CLEAR, 0u8)?;
        self.write(od::INTERPOLATION_BUFFER_CLEAR, 1u8)
    }

    /// Number of records waiting in the buffer.
    pub fn get_actual_buffer_size(&mut self) -> Result<u32, EposError> {
        self.read(od::INTERPOLATION_BUFFER_SIZE)
    }

    pub fn get_interpolation_buffer_position(&mut self) -> Result<u16, EposError> {
        self.read(od::INTERPOLATION_BUFFER_POSITION)
    }

    pub fn get_interpolation_buffer_status(
        &mut self,
    ) -> Result<InterpolationBufferStatus, EposError> {
        Ok(InterpolationBufferStatus(
            self.read(od::INTERPOLATION_BUFFER_STATUS)?,
        ))
    }

    pub fn get_interpolation_sub_mode(&mut self) -> Result<i16, EposError> {
        self.read(od::INTERPOLATION_SUB_MODE)
    }

    pub fn set_interpolation_sub_mode(&mut self, val: i16) -> Result<(), EposError> {
        self.write(od::INTERPOLATION_SUB_MODE, val)
    }

    pub fn get_interpolation_time_period(&mut self) -> Result<u8, EposError> {
        self.read(od::INTERPOLATION_TIME_PERIOD)
    }

    pub fn set_interpolation_time_period(&mut self, val: u8) -> Result<(), EposError> {
        self.write(od::INTERPOLATION_TIME_PERIOD, val)
    }

    pub fn get_interpolation_time_index(&mut self) -> Result<i8, EposError> {
        self.read(od::INTERPOLATION_TIME_INDEX)
    }

    pub fn set_interpolation_time_index(&mut self, val: i8) -> Result<(), EposError> {
        self.write(od::INTERPOLATION_TIME_INDEX, val)
    }

    pub fn get_buffer_underflow_warning(&mut self) -> Result<u16, EposError> {
        self.read(od::INTERPOLATION_BUFFER_UNDERFLOW_WARNING)
    }

    pub fn set_buffer_underflow_warning(&mut self, val: u16) -> Result<(), EposError> {
        self.write(od::INTERPOLATION_BUFFER_UNDERFLOW_WARNING, val)
    }

    pub fn get_buffer_overflow_warning(&mut self) -> Result<u16, EposError> {
        self.read(od::INTERPOLATION_BUFFER_OVERFLOW_WARNING)
    }

    pub fn set_buffer_overflow_warning(&mut self, val: u16) -> Result<(), EposError> {
        self.write(od::INTERPOLATION_BUFFER_OVERFLOW_WARNING, val)
    }

    /// Append one record to the interpolation buffer.
    ///
    /// The record is checked before anything is sent, an invalid record never reaches the bus.
    pub fn set_interpolation_data_record(&mut self, record: &PvtRecord) -> Result<(), EposError> {
        let bytes = match record.to_bytes() {
            Some(b) => b,
            None => return Err(self.err(ErrorKind::VelocityOutOfRange(record.velocity))),
        };

        let node = self.node_id();
        let obj = od::INTERPOLATION_DATA_RECORD;

        self.gateway
            .initiate_segmented_write(node, obj.index, obj.subindex, 8)
            .and_then(|_| self.gateway.segmented_write(node, &bytes[0..7]))
            .and_then(|_| self.gateway.segmented_write(node, &bytes[7..8]))
            .map_err(|e| {
                warn!(
                    "EPOS node {}: PVT record download failed: {}",
                    self.description(),
                    e
                );
                self.err(ErrorKind::Gateway(e))
            })
    }

    /// Switch to interpolated position mode, flush the buffer and queue a trajectory.
    ///
    /// Every record is validated before the buffer is touched.
    pub fn load_trajectory(&mut self, records: &[PvtRecord]) -> Result<(), EposError> {
        if let Some(bad) = records.iter().find(|r| !r.is_velocity_valid()) {
            return Err(self.err(ErrorKind::VelocityOutOfRange(bad.velocity)));
        }

        self.set_operation_mode(OperationMode::InterpolatedPosition)?;
        self.clear_pvt_buffer()?;

        for record in records {
            self.set_interpolation_data_record(record)?;
        }

        debug!(
            "EPOS node {}: {} PVT records queued",
            self.description(),
            records.len()
        );

        Ok(())
    }

    /// Start interpolating the buffered records.
    pub fn start_interpolated_position_motion(&mut self) -> Result<(), EposError> {
        self.set_controlword(CW_START)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{GatewayCall, SimGateway, SimTiming};

    #[test]
    fn test_pvt_encoding() {
        let rec = PvtRecord::new(-2, -1, 100);
        assert_eq!(
            rec.to_bytes().unwrap(),
            [0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 100]
        );

        let rec = PvtRecord::new(0x0102_0304, 0x0005_0607, 10);
        assert_eq!(
            rec.to_bytes().unwrap(),
            [0x04, 0x03, 0x02, 0x01, 0x07, 0x06, 0x05, 10]
        );
        assert_eq!(PvtRecord::from_bytes(&rec.to_bytes().unwrap()), rec);

        assert!(PvtRecord::new(0, PVT_VELOCITY_MIN, 1).to_bytes().is_some());
        assert!(PvtRecord::new(0, PVT_VELOCITY_MAX, 1).to_bytes().is_some());
        assert!(PvtRecord::new(0, PVT_VELOCITY_MIN - 1, 1).to_bytes().is_none());
        assert!(PvtRecord::new(0, PVT_VELOCITY_MAX + 1, 1).to_bytes().is_none());
    }

    #[test]
    fn test_buffer_status() {
        let st = InterpolationBufferStatus(0xC001);
        assert!(st.has_warning());
        assert!(!st.has_error());
        assert!(st.buffer_enabled());
        assert!(st.ip_mode_active());
        assert_eq!(st.messages().len(), 3);

        // Velocity and acceleration warnings are not errors
        assert!(!InterpolationBufferStatus(0x000C).has_error());
        assert!(InterpolationBufferStatus(0x0800).has_error());
        assert!(InterpolationBufferStatus(0x0100).has_error());
        assert!(!InterpolationBufferStatus(0x4000).has_warning());
    }

    #[test]
    fn test_ipm_parameters() {
        let mut sim = SimGateway::new(SimTiming::default());
        sim.add_node(2);
        let mut epos = Epos::new(sim, 2, "joint_2").unwrap();
        epos.gateway.clear_calls();

        epos.set_interpolation_sub_mode(-1).unwrap();
        epos.set_interpolation_time_period(10).unwrap();
        epos.set_interpolation_time_index(-3).unwrap();
        epos.set_buffer_underflow_warning(8).unwrap();
        epos.set_buffer_overflow_warning(56).unwrap();

        assert_eq!(
            epos.gateway().calls(),
            &[
                GatewayCall::write(2, 0x60C0, 0, &[0xff, 0xff]),
                GatewayCall::write(2, 0x60C2, 1, &[10]),
                GatewayCall::write(2, 0x60C2, 2, &[0xfd]),
                GatewayCall::write(2, 0x20C4, 2, &[8, 0]),
                GatewayCall::write(2, 0x20C4, 3, &[56, 0]),
            ][..]
        );

        assert_eq!(epos.get_interpolation_sub_mode().unwrap(), -1);
        assert_eq!(epos.get_interpolation_time_period().unwrap(), 10);
        assert_eq!(epos.get_interpolation_time_index().unwrap(), -3);
        assert_eq!(epos.get_buffer_underflow_warning().unwrap(), 8);
        assert_eq!(epos.get_buffer_overflow_warning().unwrap(), 56);
    }

    #[test]
    fn test_buffer_position_counts_records() {
        let mut sim = SimGateway::new(SimTiming::default());
        sim.add_node(2);
        let mut epos = Epos::new(sim, 2, "joint_2").unwrap();

        assert_eq!(epos.get_interpolation_buffer_position().unwrap(), 0);

        epos.load_trajectory(&[PvtRecord::new(10, 5, 10), PvtRecord::new(20, 5, 10)])
            .unwrap();
        assert_eq!(epos.get_interpolation_buffer_position().unwrap(), 2);
        assert_eq!(epos.gateway().calls().last(), Some(&GatewayCall::Read {
            node: 2,
            index: 0x60C4,
            subindex: 4,
        }));
    }

    #[test]
    fn test_invalid_record_never_sent() {
        let mut sim = SimGateway::new(SimTiming::default());
        sim.add_node(2);
        let mut epos = Epos::new(sim, 2, "joint_2").unwrap();
        epos.gateway.clear_calls();

        for v in [1 << 23, -(1 << 23) - 1, i32::MAX, i32::MIN].iter() {
            let err = epos
                .set_interpolation_data_record(&PvtRecord::new(0, *v, 10))
                .unwrap_err();
            assert!(matches!(err.kind, ErrorKind::VelocityOutOfRange(_)));
        }

        let traj = [PvtRecord::new(10, 5, 10), PvtRecord::new(20, 1 << 24, 10)];
        assert!(epos.load_trajectory(&traj).is_err());

        assert!(epos.gateway().calls().is_empty());
    }

    #[test]
    fn test_interpolated_motion() {
        let mut sim = SimGateway::new(SimTiming::default());
        sim.add_node(2);
        let mut epos = Epos::new(sim, 2, "joint_2").unwrap();
        epos.enable().unwrap();

        let traj = [
            PvtRecord::new(100, 50, 20),
            PvtRecord::new(300, 50, 20),
            PvtRecord::new(400, 0, 20),
        ];
        epos.load_trajectory(&traj).unwrap();

        assert_eq!(epos.get_actual_buffer_size().unwrap(), 3);
        assert_eq!(epos.gateway().pvt_buffer(2), traj.to_vec());
        assert!(epos.get_interpolation_buffer_status().unwrap().buffer_enabled());

        epos.start_interpolated_position_motion().unwrap();
        while !epos.is_target_reached().unwrap() {}

        assert_eq!(epos.get_actual_position().unwrap(), 400);
        assert_eq!(epos.get_actual_buffer_size().unwrap(), 0);
        assert!(!epos.get_interpolation_buffer_status().unwrap().has_error());

        // Starting again on an empty buffer underflows
        epos.start_interpolated_position_motion().unwrap();
        assert!(epos.get_interpolation_buffer_status().unwrap().has_error());

        epos.clear_pvt_buffer().unwrap();
        assert!(!epos.get_interpolation_buffer_status().unwrap().has_error());
    }
}
