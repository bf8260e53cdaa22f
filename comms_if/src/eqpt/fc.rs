//! # Flight Controller Equipment Communications Module
//!
//! Messages published by the flight controller bridge (vehicle pose, link state and RC input) and
//! the setpoint message consumed by it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Index of the RC channel carrying the mode switch.
pub const RC_MODE_CHANNEL: usize = 4;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Vehicle pose as estimated by the flight controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePose {
    /// Position of the vehicle in the flight controller's local frame.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Attitude quaternion, in `[x, y, z, w]` order.
    pub attitude_q: [f64; 4],
}

/// State of the link between the bridge and the flight controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FcState {
    /// True if the bridge is connected to the flight controller
    pub connected: bool,

    /// True if the vehicle is armed
    #[serde(default)]
    pub armed: bool,

    /// Flight mode name reported by the flight controller, e.g. `"OFFBOARD"`
    #[serde(default)]
    pub mode: String,
}

/// Raw RC input channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RcIn {
    /// Channel values in microseconds
    pub channels: Vec<u16>,
}

bitflags! {
    /// Mask of the setpoint fields the flight controller shall ignore.
    ///
    /// Bit values follow the `POSITION_TARGET_TYPEMASK` definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeMask: u16 {
        const IGNORE_PX = 1 << 0;
        const IGNORE_PY = 1 << 1;
        const IGNORE_PZ = 1 << 2;
        const IGNORE_VX = 1 << 3;
        const IGNORE_VY = 1 << 4;
        const IGNORE_VZ = 1 << 5;
        const IGNORE_AFX = 1 << 6;
        const IGNORE_AFY = 1 << 7;
        const IGNORE_AFZ = 1 << 8;
        const FORCE = 1 << 9;
        const IGNORE_YAW = 1 << 10;
        const IGNORE_YAW_RATE = 1 << 11;
    }
}

/// A raw setpoint sent to the flight controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionTarget {
    /// Time at which the setpoint was issued
    pub timestamp: DateTime<Utc>,

    /// Frame in which the setpoint is expressed
    pub coordinate_frame: CoordFrame,

    /// Mask of ignored fields
    pub type_mask: TypeMask,

    /// Position demand.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Velocity demand.
    ///
    /// Units: meters/second
    pub velocity_ms: [f64; 3],

    /// Acceleration or force demand.
    ///
    /// Units: meters/second^2
    pub accel_mss: [f64; 3],

    /// Yaw demand.
    ///
    /// Units: radians
    pub yaw_rad: f64,

    /// Yaw rate demand.
    ///
    /// Units: radians/second
    pub yaw_rate_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Data published by the flight controller bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FcData {
    Pose(VehiclePose),
    State(FcState),
    RcIn(RcIn),
}

/// Coordinate frames a setpoint can be expressed in.
///
/// Serialised as the numeric frame identifier, see [`CoordFrame::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordFrame {
    /// Local frame fixed to the flight controller's origin
    LocalNed,

    /// Frame attached to the vehicle body
    BodyNed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TypeMask {
    /// Velocity and yaw are commanded, everything else is ignored.
    pub const VELOCITY_YAW: TypeMask = TypeMask::from_bits_truncate(0b1011_1100_0111);
}

impl Serialize for TypeMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for TypeMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u16::deserialize(deserializer)?;
        Ok(TypeMask::from_bits_retain(bits))
    }
}

impl CoordFrame {
    /// Numeric identifier of the frame as used by the flight controller.
    pub fn id(&self) -> u8 {
        match self {
            CoordFrame::LocalNed => 1,
            CoordFrame::BodyNed => 8,
        }
    }

    /// Get the frame with the given identifier, if it is supported.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(CoordFrame::LocalNed),
            8 => Some(CoordFrame::BodyNed),
            _ => None
        }
    }
}

impl Serialize for CoordFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.id())
    }
}

impl<'de> Deserialize<'de> for CoordFrame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = u8::deserialize(deserializer)?;
        CoordFrame::from_id(id).ok_or_else(|| {
            de::Error::custom(format!("unsupported coordinate frame {}", id))
        })
    }
}

impl PositionTarget {
    /// A neutral setpoint: every field zero, no mask, in the body frame.
    ///
    /// These are streamed before the flight controller will accept offboard commands.
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            coordinate_frame: CoordFrame::BodyNed,
            type_mask: TypeMask::empty(),
            position_m: [0.0; 3],
            velocity_ms: [0.0; 3],
            accel_mss: [0.0; 3],
            yaw_rad: 0.0,
            yaw_rate_rads: 0.0,
        }
    }
}

impl RcIn {
    /// Value of the mode switch channel, if present.
    pub fn mode_channel(&self) -> Option<u16> {
        self.channels.get(RC_MODE_CHANNEL).copied()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
