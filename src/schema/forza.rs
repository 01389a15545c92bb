//! Forza Horizon "Dash" packet layout
//!
//! Offsets are frozen by the game's data-out format. Horizon inserts 12 extra
//! bytes after `NumCylinders` compared to the Motorsport "Sled" layout, so every
//! field from `PositionX` onwards is shifted by [`HORIZON_SHIFT`].

use super::TelemetrySchema;
use crate::Result;
use crate::types::{FieldDescriptor, ReaderKind, Transform};

use ReaderKind::{Boolean, Float32, Int8, UInt8, UInt16};

/// Bytes Horizon inserts between the car-info block and the dash block.
pub const HORIZON_SHIFT: usize = 12;

/// Size of a complete Horizon dash datagram as sent by the game.
pub const DASH_PACKET_SIZE: usize = 324;

const DASH_FIELDS: &[(&str, usize, ReaderKind)] = &[
    // Game state
    ("IsRaceOn", 0, Boolean),
    // Engine
    ("EngineMaxRpm", 8, Float32),
    ("EngineIdleRpm", 12, Float32),
    ("CurrentEngineRpm", 16, Float32),
    // Vehicle dynamics
    ("AccelerationX", 20, Float32),
    ("AccelerationY", 24, Float32),
    ("AccelerationZ", 28, Float32),
    ("VelocityX", 32, Float32),
    ("VelocityY", 36, Float32),
    ("VelocityZ", 40, Float32),
    ("AngularVelocityX", 44, Float32),
    ("AngularVelocityY", 48, Float32),
    ("AngularVelocityZ", 52, Float32),
    // Orientation
    ("Yaw", 56, Float32),
    ("Pitch", 60, Float32),
    ("Roll", 64, Float32),
    // Suspension, normalized
    ("NormSuspensionTravelFl", 68, Float32),
    ("NormSuspensionTravelFr", 72, Float32),
    ("NormSuspensionTravelRl", 76, Float32),
    ("NormSuspensionTravelRr", 80, Float32),
    // Tires
    ("TireSlipRatioFl", 84, Float32),
    ("TireCombinedSlipFl", 180, Float32),
    ("TireSlipRatioFr", 88, Float32),
    ("TireCombinedSlipFr", 184, Float32),
    ("TireSlipRatioRl", 92, Float32),
    ("TireCombinedSlipRl", 188, Float32),
    ("TireSlipRatioRr", 96, Float32),
    ("TireCombinedSlipRr", 192, Float32),
    ("WheelRotationSpeedFl", 100, Float32),
    ("WheelRotationSpeedFr", 104, Float32),
    ("WheelRotationSpeedRl", 108, Float32),
    ("WheelRotationSpeedRr", 112, Float32),
    ("TireSlipAngleFl", 164, Float32),
    ("TireSlipAngleFr", 168, Float32),
    ("TireSlipAngleRl", 172, Float32),
    ("TireSlipAngleRr", 176, Float32),
    // Suspension, metres
    ("SuspensionTravelMetersFl", 196, Float32),
    ("SuspensionTravelMetersFr", 200, Float32),
    ("SuspensionTravelMetersRl", 204, Float32),
    ("SuspensionTravelMetersRr", 208, Float32),
    // Car information
    ("CarOrdinal", 212, UInt16),
    ("CarClass", 216, UInt8),
    ("CarPerformanceIndex", 220, UInt16),
    ("DriveTrain", 224, UInt8),
    ("NumCylinders", 228, UInt8),
    // Position and speed
    ("PositionX", 232 + HORIZON_SHIFT, Float32),
    ("PositionY", 236 + HORIZON_SHIFT, Float32),
    ("PositionZ", 240 + HORIZON_SHIFT, Float32),
    ("Speed", 244 + HORIZON_SHIFT, Float32),
    ("Power", 248 + HORIZON_SHIFT, Float32),
    ("Torque", 252 + HORIZON_SHIFT, Float32),
    ("TireTempFl", 256 + HORIZON_SHIFT, Float32),
    ("TireTempFr", 260 + HORIZON_SHIFT, Float32),
    ("TireTempRl", 264 + HORIZON_SHIFT, Float32),
    ("TireTempRr", 268 + HORIZON_SHIFT, Float32),
    ("Boost", 272 + HORIZON_SHIFT, Float32),
    ("Fuel", 276 + HORIZON_SHIFT, Float32),
    // Race information
    ("Distance", 280 + HORIZON_SHIFT, Float32),
    ("BestLapTime", 284 + HORIZON_SHIFT, Float32),
    ("LastLapTime", 288 + HORIZON_SHIFT, Float32),
    ("CurrentLapTime", 292 + HORIZON_SHIFT, Float32),
    ("CurrentRaceTime", 296 + HORIZON_SHIFT, Float32),
    ("Lap", 300 + HORIZON_SHIFT, UInt16),
    ("RacePosition", 302 + HORIZON_SHIFT, UInt8),
    // Driver inputs
    ("Accelerator", 303 + HORIZON_SHIFT, UInt8),
    ("Brake", 304 + HORIZON_SHIFT, UInt8),
    ("Clutch", 305 + HORIZON_SHIFT, UInt8),
    ("Handbrake", 306 + HORIZON_SHIFT, UInt8),
    ("Gear", 307 + HORIZON_SHIFT, UInt8),
    ("Steer", 308 + HORIZON_SHIFT, Int8),
    // AI
    ("NormalDrivingLine", 309 + HORIZON_SHIFT, UInt8),
    ("NormalAiBrakeDifference", 310 + HORIZON_SHIFT, UInt8),
];

/// Per-field extras layered over the raw layout.
fn describe(name: &'static str, offset: usize, reader: ReaderKind) -> FieldDescriptor {
    let field = FieldDescriptor::new(name, offset, reader);
    match name {
        "Power" => field.with_transform(Transform::WATTS_TO_HORSEPOWER),
        "Boost" => field.with_transform(Transform::PSI_TO_BAR),
        "Accelerator" | "Brake" | "Clutch" | "Handbrake" => field.with_display_range(0.0, 255.0),
        "Gear" => field.with_display_range(0.0, 10.0),
        "Steer" => field.with_display_range(-127.0, 127.0),
        _ => field,
    }
}

/// Build the Forza Horizon dash schema.
///
/// Power is exposed in horsepower and Boost in bar; every other value is raw.
pub fn dash_schema() -> Result<TelemetrySchema> {
    TelemetrySchema::new(
        DASH_FIELDS.iter().map(|&(name, offset, reader)| describe(name, offset, reader)).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::test_utils::PacketBuilder;
    use crate::types::Value;

    #[test]
    fn dash_schema_is_valid() {
        let schema = dash_schema().unwrap();
        assert_eq!(schema.len(), DASH_FIELDS.len());
        assert_eq!(schema.len(), 72);
        // NormalAiBrakeDifference is the last byte the schema touches
        assert_eq!(schema.packet_len(), 323);
        assert!(schema.packet_len() <= DASH_PACKET_SIZE);
    }

    #[test]
    fn horizon_shift_applies_after_car_info() {
        let schema = dash_schema().unwrap();
        assert_eq!(schema.field("NumCylinders").unwrap().offset, 228);
        assert_eq!(schema.field("PositionX").unwrap().offset, 244);
        assert_eq!(schema.field("Speed").unwrap().offset, 256);
        assert_eq!(schema.field("Steer").unwrap().offset, 320);
    }

    #[test]
    fn unit_transforms_are_attached() {
        let schema = dash_schema().unwrap();
        assert_eq!(schema.field("Power").unwrap().transform.unwrap().name(), "watts_to_horsepower");
        assert_eq!(schema.field("Boost").unwrap().transform.unwrap().name(), "psi_to_bar");
        assert!(schema.field("Torque").unwrap().transform.is_none());
        assert_eq!(schema.field("Brake").unwrap().display_range.max, 255.0);
    }

    #[test]
    fn decodes_a_full_dash_packet() {
        let schema = dash_schema().unwrap();
        let packet = PacketBuilder::new(DASH_PACKET_SIZE)
            .f32(0, 1.0)
            .f32(16, 6500.0)
            .u16(212, 2345)
            .f32(256, 41.25)
            .f32(260, 745.699872 * 300.0)
            .f32(284, 14.504)
            .u16(312, 3)
            .u8(319, 4)
            .i8(320, -64)
            .build();

        let reading = decode(&packet, &schema).unwrap();
        assert_eq!(reading.len(), schema.len());
        assert_eq!(reading.get("IsRaceOn"), Some(Value::Bool(true)));
        assert_eq!(reading.get("CurrentEngineRpm"), Some(Value::Float32(6500.0)));
        assert_eq!(reading.get("CarOrdinal"), Some(Value::UInt16(2345)));
        assert_eq!(reading.get("Speed"), Some(Value::Float32(41.25)));
        assert_eq!(reading.get("Lap"), Some(Value::UInt16(3)));
        assert_eq!(reading.get("Gear"), Some(Value::UInt8(4)));
        assert_eq!(reading.get("Steer"), Some(Value::Int8(-64)));

        let hp = reading.get("Power").and_then(|v| v.as_f64()).unwrap();
        assert!((hp - 300.0).abs() < 1e-3, "power was {hp}");
        let bar = reading.get("Boost").and_then(|v| v.as_f64()).unwrap();
        assert!((bar - 1.0).abs() < 1e-6, "boost was {bar}");
    }

    #[test]
    fn sled_sized_packet_is_too_short() {
        let schema = dash_schema().unwrap();
        // Motorsport "Sled" packets stop at 232 bytes
        let packet = vec![0u8; 232];
        assert!(decode(&packet, &schema).is_err());
    }
}
