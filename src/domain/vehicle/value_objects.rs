use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Vehicle Value Objects
// ============================================================================

/// Vehicle status. `Loading` and `Unloading` are sub-states of `InUse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
    OutOfService,
    Loading,
    Unloading,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 6] = [
        VehicleStatus::Available,
        VehicleStatus::InUse,
        VehicleStatus::Maintenance,
        VehicleStatus::OutOfService,
        VehicleStatus::Loading,
        VehicleStatus::Unloading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InUse => "in_use",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::OutOfService => "out_of_service",
            VehicleStatus::Loading => "loading",
            VehicleStatus::Unloading => "unloading",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "Vehicle available",
            VehicleStatus::InUse => "Vehicle in use",
            VehicleStatus::Maintenance => "Vehicle under maintenance",
            VehicleStatus::OutOfService => "Vehicle out of service",
            VehicleStatus::Loading => "Vehicle loading",
            VehicleStatus::Unloading => "Vehicle unloading",
        }
    }

    /// In use, including the loading/unloading sub-states.
    pub fn is_engaged(&self) -> bool {
        matches!(
            self,
            VehicleStatus::InUse | VehicleStatus::Loading | VehicleStatus::Unloading
        )
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown vehicle status: {}", s))
    }
}

/// Human-facing vehicle code, `VEH-001`, `VEH-002`, ...
pub fn vehicle_code(sequence: i64) -> String {
    format!("VEH-{:03}", sequence)
}
