//! # Homing
//!
//! Hardware homing with the device's own homing mode, and software homing which first drives the
//! axis against its mechanical end stop in velocity mode.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};

use util::time::Ticker;

use crate::{
    driver::{Epos, CW_START, POLL_PERIOD},
    error::{EposError, ErrorKind},
    gateway::Gateway,
    od,
    state::{status_bits, HomingMethod, OperationMode},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Speed for zero search used by every homing run [rpm].
pub const ZERO_SEARCH_SPEED: u32 = 10;

/// Current threshold for the current based homing methods [mA].
pub const HOMING_CURRENT_THRESHOLD: u16 = 1500;

/// Averaged velocity under which the axis is considered stalled on its end stop [rpm].
pub const STALL_VELOCITY: u32 = 10;

/// Number of velocity samples logged while the axis accelerates.
const ACCELERATION_SAMPLES: u32 = 10;

const CW_SWITCH_ON: u16 = 0x000F;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<G: Gateway> Epos<G> {
    pub fn set_home_offset(&mut self, val: i32) -> Result<(), EposError> {
        self.write(od::HOME_OFFSET, val)
    }

    pub fn get_home_offset(&mut self) -> Result<i32, EposError> {
        self.read(od::HOME_OFFSET)
    }

    pub fn set_home_position(&mut self, val: i32) -> Result<(), EposError> {
        self.write(od::HOME_POSITION, val)
    }

    pub fn get_home_position(&mut self) -> Result<i32, EposError> {
        self.read(od::HOME_POSITION)
    }

    pub fn set_homing_method(&mut self, method: HomingMethod) -> Result<(), EposError> {
        self.write(od::HOMING_METHOD, method.to_raw())
    }

    pub fn get_speed_for_switch_search(&mut self) -> Result<u32, EposError> {
        self.read(od::SPEED_FOR_SWITCH_SEARCH)
    }

    pub fn set_speed_for_zero_search(&mut self, val: u32) -> Result<(), EposError> {
        self.write(od::SPEED_FOR_ZERO_SEARCH, val)
    }

    pub fn get_speed_for_zero_search(&mut self) -> Result<u32, EposError> {
        self.read(od::SPEED_FOR_ZERO_SEARCH)
    }

    pub fn get_homing_acceleration(&mut self) -> Result<u32, EposError> {
        self.read(od::HOMING_ACCELERATION)
    }

    pub fn set_current_threshold_for_homing(&mut self, val: u16) -> Result<(), EposError> {
        self.write(od::CURRENT_THRESHOLD_HOMING, val)
    }

    pub fn get_current_threshold_for_homing(&mut self) -> Result<u16, EposError> {
        self.read(od::CURRENT_THRESHOLD_HOMING)
    }

    /// Homing is over when both target reached and homing attained are set. Fails if the homing
    /// error bit is set.
    pub fn is_homing_finished(&mut self) -> Result<bool, EposError> {
        let status = self.get_statusword()?;

        if status & status_bits::HOMING_ERROR != 0 {
            return Err(self.err(ErrorKind::HomingError));
        }

        Ok(status & status_bits::TARGET_REACHED != 0 && status & status_bits::HOMING_ATTAINED != 0)
    }

    /// Run the device's homing mode and wait for it to finish.
    ///
    /// The device must already be enabled. A homing error fails immediately and is never retried.
    pub fn do_homing(&mut self, method: HomingMethod, offset: i32) -> Result<(), EposError> {
        self.set_operation_mode(OperationMode::Homing)?;
        self.set_home_offset(offset)?;
        self.set_speed_for_zero_search(ZERO_SEARCH_SPEED)?;
        self.set_current_threshold_for_homing(HOMING_CURRENT_THRESHOLD)?;

        self.log_homing_parameters()?;

        self.set_homing_method(method)?;
        self.set_controlword(CW_SWITCH_ON)?;
        self.set_controlword(CW_START)?;

        info!(
            "EPOS node {}: homing with method {:?} ({}), offset {}",
            self.description(),
            method,
            method.to_raw(),
            offset
        );

        let mut ticker = Ticker::new(POLL_PERIOD);
        let mut polls = 0;

        loop {
            let tm = self.telemetry()?;
            debug!(
                "EPOS node {}: homing position {}, velocity {}, current {}, status {:#06x}",
                self.description(),
                tm.position,
                tm.velocity,
                tm.current,
                tm.statusword
            );

            if tm.statusword & status_bits::HOMING_ERROR != 0 {
                return Err(self.err(ErrorKind::HomingError));
            }

            if tm.statusword & status_bits::TARGET_REACHED != 0
                && tm.statusword & status_bits::HOMING_ATTAINED != 0
            {
                break;
            }

            polls += 1;
            if polls >= self.homing_max_polls {
                return Err(self.err(ErrorKind::Timeout("homing")));
            }

            ticker.wait();
        }

        if !self.is_referenced()? {
            return Err(self.err(ErrorKind::NotReferenced));
        }

        info!("EPOS node {}: homing done", self.description());

        Ok(())
    }

    /// Drive the axis against its end stop at `velocity`, then home on the index with `offset`,
    /// which must point away from the end stop.
    ///
    /// Position limits are disabled for the run and restored afterwards, whatever the outcome.
    /// Any failure once the end stop is reached is reported as a motor jam.
    ///
    /// # Panics
    ///
    /// If `velocity` and `offset` do not have opposite signs.
    pub fn do_software_homing(
        &mut self,
        velocity: i32,
        offset: i32,
        home_position: i32,
    ) -> Result<(), EposError> {
        assert!(
            (velocity > 0 && offset < 0) || (velocity < 0 && offset > 0),
            "software homing offset must be opposite to the velocity"
        );

        let min_limit = self.get_min_position_limit()?;
        let max_limit = self.get_max_position_limit()?;

        let result = self
            .disable_position_limits()
            .and_then(|_| self.run_software_homing(velocity, offset, home_position));

        let restore = self
            .set_min_position_limit(min_limit)
            .and_then(|_| self.set_max_position_limit(max_limit));

        // A homing failure takes precedence over a failure to restore
        result.and(restore)
    }

    fn run_software_homing(
        &mut self,
        velocity: i32,
        offset: i32,
        home_position: i32,
    ) -> Result<(), EposError> {
        self.set_operation_mode(OperationMode::Velocity)?;
        self.enable()?;

        self.set_controlword(CW_SWITCH_ON)?;
        self.set_velocity_mode_setting_value(velocity)?;

        let mut ticker = Ticker::new(POLL_PERIOD);

        for _ in 0..ACCELERATION_SAMPLES {
            ticker.wait();
            let v = self.get_actual_velocity_averaged()?;
            debug!(
                "EPOS node {}: software homing acceleration, velocity = {}",
                self.description(),
                v
            );
        }

        let mut polls = 0;
        loop {
            ticker.wait();
            let v = self.get_actual_velocity_averaged()?;

            if v.unsigned_abs() <= STALL_VELOCITY {
                break;
            }

            polls += 1;
            if polls >= self.homing_max_polls {
                self.set_velocity_mode_setting_value(0)?;
                return Err(self.err(ErrorKind::Timeout("waiting for the end stop")));
            }
        }

        info!(
            "EPOS node {}: end stop reached, homing on index",
            self.description()
        );

        self.set_velocity_mode_setting_value(0)?;
        self.enable()?;

        let method = match offset {
            o if o > 0 => HomingMethod::IndexPositiveSpeed,
            o if o < 0 => HomingMethod::IndexNegativeSpeed,
            _ => HomingMethod::ActualPosition,
        };

        self.set_home_position(home_position)
            .and_then(|_| self.do_homing(method, offset))
            .map_err(|e| self.err(ErrorKind::MotorJam(Box::new(e.kind))))
    }

    fn log_homing_parameters(&mut self) -> Result<(), EposError> {
        let max_following_error = self.get_max_following_error()?;
        let home_offset = self.get_home_offset()?;
        let max_profile_velocity = self.get_max_profile_velocity()?;
        let quick_stop_deceleration = self.get_quick_stop_deceleration()?;
        let switch_search = self.get_speed_for_switch_search()?;
        let zero_search = self.get_speed_for_zero_search()?;
        let acceleration = self.get_homing_acceleration()?;
        let threshold = self.get_current_threshold_for_homing()?;
        let home_position = self.get_home_position()?;

        debug!(
            "EPOS node {}: homing parameters:\n    \
             max following error: {}\n    \
             home offset: {}\n    \
             max profile velocity: {}\n    \
             quick stop deceleration: {}\n    \
             speed for switch search: {}\n    \
             speed for zero search: {}\n    \
             homing acceleration: {}\n    \
             current threshold for homing: {}\n    \
             home position: {}",
            self.description(),
            max_following_error,
            home_offset,
            max_profile_velocity,
            quick_stop_deceleration,
            switch_search,
            zero_search,
            acceleration,
            threshold,
            home_position
        );

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimGateway, SimTiming};

    fn node() -> Epos<SimGateway> {
        let mut sim = SimGateway::new(SimTiming {
            homing_reads: 4,
            stall_reads: 15,
            ..Default::default()
        });
        sim.add_node(3);
        Epos::new(sim, 3, "gripper").unwrap().with_homing_max_polls(200)
    }

    #[test]
    fn test_homing() {
        let mut epos = node();
        epos.enable().unwrap();

        epos.do_homing(HomingMethod::ActualPosition, 0).unwrap();
        assert!(epos.is_referenced().unwrap());
        assert!(epos.is_homing_finished().unwrap());
        assert_eq!(epos.operation_mode(), OperationMode::Homing);

        // The start homing controlword follows switch on
        let cws = epos.gateway().controlwords(3);
        assert_eq!(&cws[cws.len() - 2..], &[0x000F, 0x001F]);
    }

    #[test]
    fn test_homing_error() {
        let mut epos = node();
        epos.enable().unwrap();
        epos.gateway.set_homing_error(3, true);

        assert!(matches!(
            epos.do_homing(HomingMethod::IndexPositiveSpeed, 100).unwrap_err().kind,
            ErrorKind::HomingError
        ));
    }

    #[test]
    fn test_homing_timeout() {
        let mut epos = node().with_homing_max_polls(2);
        epos.enable().unwrap();

        assert!(matches!(
            epos.do_homing(HomingMethod::ActualPosition, 0).unwrap_err().kind,
            ErrorKind::Timeout("homing")
        ));
    }

    #[test]
    fn test_software_homing_restores_limits() {
        let mut epos = node();
        epos.set_min_position_limit(-1000).unwrap();
        epos.set_max_position_limit(5000).unwrap();

        epos.do_software_homing(-300, 200, 42).unwrap();

        assert_eq!(epos.get_min_position_limit().unwrap(), -1000);
        assert_eq!(epos.get_max_position_limit().unwrap(), 5000);
        assert_eq!(epos.get_actual_position().unwrap(), 42);
        assert!(epos.is_referenced().unwrap());
    }

    #[test]
    fn test_software_homing_failure_restores_limits() {
        let mut epos = node();
        epos.set_min_position_limit(-1000).unwrap();
        epos.set_max_position_limit(5000).unwrap();
        epos.gateway.set_homing_error(3, true);

        let err = epos.do_software_homing(300, -200, 0).unwrap_err();
        match err.kind {
            ErrorKind::MotorJam(inner) => assert!(matches!(*inner, ErrorKind::HomingError)),
            k => panic!("Expected a motor jam, got {:?}", k),
        }

        assert_eq!(epos.get_min_position_limit().unwrap(), -1000);
        assert_eq!(epos.get_max_position_limit().unwrap(), 5000);
    }

    #[test]
    fn test_software_homing_never_stalls() {
        let mut epos = node().with_homing_max_polls(20);
        epos.set_min_position_limit(-10).unwrap();
        epos.set_max_position_limit(10).unwrap();
        epos.gateway.set_stall_reads(3, u32::MAX);

        assert!(epos.do_software_homing(300, -200, 0).is_err());
        assert_eq!(epos.get_min_position_limit().unwrap(), -10);
        assert_eq!(epos.get_max_position_limit().unwrap(), 10);
    }

    #[test]
    fn test_software_homing_at_full_negative_velocity() {
        let mut epos = node().with_homing_max_polls(20);
        epos.set_min_position_limit(-10).unwrap();
        epos.set_max_position_limit(10).unwrap();
        epos.gateway.set_stall_reads(3, u32::MAX);

        let err = epos.do_software_homing(i32::MIN, 200, 0).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Timeout(_)));
        assert_eq!(epos.get_min_position_limit().unwrap(), -10);
        assert_eq!(epos.get_max_position_limit().unwrap(), 10);
    }

    #[test]
    #[should_panic]
    fn test_software_homing_same_sign() {
        let mut epos = node();
        epos.do_software_homing(300, 200, 0).ok();
    }
}
