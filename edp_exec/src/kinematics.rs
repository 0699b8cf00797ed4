//! # Kinematic models
//!
//! A kinematic model converts between external poses, joint positions and motor positions. Models
//! are stateless.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

use crate::params::AxisParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait KinematicModel {
    fn num_joints(&self) -> usize;

    /// Motor positions, in increments, for the given joint positions.
    fn joints_to_motors(&self, joints: &[f64]) -> Result<Vec<i32>, KinematicsError>;

    /// Joint positions for the given motor positions.
    fn motors_to_joints(&self, motors: &[i32]) -> Vec<f64>;

    /// Joint positions which put the effector at an external pose.
    fn pose_to_joints(&self, pose: &[f64]) -> Result<Vec<f64>, KinematicsError>;

    /// Motor positions which put the effector at an external pose.
    fn compute_motors(&self, pose: &[f64]) -> Result<Vec<i32>, KinematicsError> {
        let joints = self.pose_to_joints(pose)?;
        self.joints_to_motors(&joints)
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Independent joints, each driven through a linear transmission.
///
/// The external pose of such an effector is its joint vector.
#[derive(Debug, Clone)]
pub struct JointScaling {
    joints: Vec<ScaledJoint>,
}

#[derive(Debug, Clone)]
struct ScaledJoint {
    increments_per_unit: f64,
    motor_offset: i32,
    min: f64,
    max: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum KinematicsError {
    #[error("Expected {expected} coordinates, found {found}")]
    WrongDimension { expected: usize, found: usize },

    #[error("Joint {joint} position {value} is outside <{min}, {max}>")]
    JointOutOfRange {
        joint: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Joint {0} motor position does not fit in 32 bits")]
    MotorOverflow(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointScaling {
    pub fn new(axes: &[AxisParams]) -> Self {
        Self {
            joints: axes
                .iter()
                .map(|a| ScaledJoint {
                    increments_per_unit: a.increments_per_unit,
                    motor_offset: a.motor_offset,
                    min: a.joint_min,
                    max: a.joint_max,
                })
                .collect(),
        }
    }

    fn check_dimension(&self, found: usize) -> Result<(), KinematicsError> {
        if found != self.joints.len() {
            return Err(KinematicsError::WrongDimension {
                expected: self.joints.len(),
                found,
            });
        }
        Ok(())
    }
}

impl KinematicModel for JointScaling {
    fn num_joints(&self) -> usize {
        self.joints.len()
    }

    fn joints_to_motors(&self, joints: &[f64]) -> Result<Vec<i32>, KinematicsError> {
        self.check_dimension(joints.len())?;

        self.joints
            .iter()
            .zip(joints)
            .enumerate()
            .map(|(i, (j, value))| {
                if !(j.min..=j.max).contains(value) {
                    return Err(KinematicsError::JointOutOfRange {
                        joint: i,
                        value: *value,
                        min: j.min,
                        max: j.max,
                    });
                }

                let motor = (value * j.increments_per_unit).round() + j.motor_offset as f64;
                if motor < i32::MIN as f64 || motor > i32::MAX as f64 {
                    return Err(KinematicsError::MotorOverflow(i));
                }

                Ok(motor as i32)
            })
            .collect()
    }

    fn motors_to_joints(&self, motors: &[i32]) -> Vec<f64> {
        self.joints
            .iter()
            .zip(motors)
            .map(|(j, m)| (*m as f64 - j.motor_offset as f64) / j.increments_per_unit)
            .collect()
    }

    fn pose_to_joints(&self, pose: &[f64]) -> Result<Vec<f64>, KinematicsError> {
        self.check_dimension(pose.len())?;
        Ok(pose.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use epos::HomingMethod;

    fn axis(name: &str, node_id: u8) -> AxisParams {
        AxisParams {
            name: name.into(),
            node_id,
            homing_method: HomingMethod::ActualPosition,
            home_offset: 0,
            increments_per_unit: 1000.0,
            motor_offset: 50,
            joint_min: -2.0,
            joint_max: 2.0,
        }
    }

    #[test]
    fn test_joint_scaling() {
        let model = JointScaling::new(&[axis("a", 1), axis("b", 2)]);

        assert_eq!(model.joints_to_motors(&[0.0, -1.5]).unwrap(), vec![50, -1450]);
        assert_eq!(model.motors_to_joints(&[1050, 50]), vec![1.0, 0.0]);
        assert_eq!(model.compute_motors(&[0.0016, 0.0]).unwrap(), vec![52, 50]);

        assert_eq!(
            model.joints_to_motors(&[0.0]),
            Err(KinematicsError::WrongDimension {
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            model.compute_motors(&[0.0, 2.5]),
            Err(KinematicsError::JointOutOfRange { joint: 1, .. })
        ));
    }
}
