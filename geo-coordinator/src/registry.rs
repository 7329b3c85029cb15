//! Region and worker entities tracked by the coordinator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    Pending,
    Scanning,
    Complete,
    Error,
}

impl RegionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionStatus::Pending => "pending",
            RegionStatus::Scanning => "scanning",
            RegionStatus::Complete => "complete",
            RegionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "scanning" => Some(Self::Scanning),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Connecting,
    Scanning,
    Error,
    Stopped,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Connecting => "connecting",
            WorkerStatus::Scanning => "scanning",
            WorkerStatus::Error => "error",
            WorkerStatus::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionState {
    pub region_x: i64,
    pub region_y: i64,
    pub status: RegionStatus,
    pub total_cells: u64,
    pub scanned_cells: u64,
    pub assigned_worker: String,
    pub started_at: f64,
    pub completed_at: f64,
    pub error: String,
}

impl RegionState {
    pub fn new(region_x: i64, region_y: i64, total_cells: u64) -> Self {
        Self {
            region_x,
            region_y,
            status: RegionStatus::Pending,
            total_cells,
            scanned_cells: 0,
            assigned_worker: String::new(),
            started_at: 0.0,
            completed_at: 0.0,
            error: String::new(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}_{}", self.region_x, self.region_y)
    }

    pub fn progress(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.scanned_cells as f64 / self.total_cells as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerState {
    pub name: String,
    pub status: WorkerStatus,
    pub current_region: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub cells_scanned: u64,
    pub cells_per_sec: f64,
    pub errors: u64,
}

impl WorkerState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: WorkerStatus::Idle,
            current_region: String::new(),
            x: 0,
            y: 0,
            z: 0,
            cells_scanned: 0,
            cells_per_sec: 0.0,
            errors: 0,
        }
    }
}

/// Partial update applied atomically by [`crate::Coordinator::update_worker`];
/// `None` fields leave the existing value untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkerUpdate {
    pub status: Option<WorkerStatus>,
    pub current_region: Option<String>,
    pub position: Option<(i32, i32, i32)>,
    pub cells_scanned: Option<u64>,
    pub cells_per_sec: Option<f64>,
    pub errors: Option<u64>,
}

/// The 137 known geodata regions for this world, used to seed the registry
/// when the output directory holds no existing L2D files.
pub const KNOWN_REGIONS: &[(i64, i64)] = &[
    (11, 10), (11, 11), (11, 12), (11, 13),
    (12, 10), (12, 11), (12, 12), (12, 13), (12, 14), (12, 15),
    (13, 10), (13, 11), (13, 12), (13, 13), (13, 14), (13, 15),
    (14, 10), (14, 11), (14, 12), (14, 13), (14, 14), (14, 15),
    (15, 10), (15, 11), (15, 12), (15, 13), (15, 14), (15, 15), (15, 16), (15, 17),
    (16, 10), (16, 11), (16, 12), (16, 13), (16, 14), (16, 15), (16, 16), (16, 17),
    (17, 10), (17, 11), (17, 12), (17, 13), (17, 14), (17, 15), (17, 16), (17, 17), (17, 18),
    (18, 10), (18, 11), (18, 12), (18, 13), (18, 14), (18, 15), (18, 16), (18, 17), (18, 18), (18, 19),
    (19, 10), (19, 11), (19, 12), (19, 13), (19, 14), (19, 15), (19, 16), (19, 17), (19, 18), (19, 19),
    (20, 10), (20, 11), (20, 12), (20, 13), (20, 14), (20, 15), (20, 16), (20, 17), (20, 18), (20, 19),
    (21, 10), (21, 11), (21, 12), (21, 13), (21, 14), (21, 15), (21, 16), (21, 17), (21, 18), (21, 19),
    (22, 10), (22, 11), (22, 12), (22, 13), (22, 14), (22, 15), (22, 16), (22, 17), (22, 18), (22, 19), (22, 20),
    (23, 10), (23, 11), (23, 12), (23, 13), (23, 14), (23, 15), (23, 16), (23, 17), (23, 18), (23, 19), (23, 20),
    (24, 10), (24, 11), (24, 12), (24, 13), (24, 14), (24, 15), (24, 16), (24, 17), (24, 18), (24, 19), (24, 20),
    (25, 10), (25, 11), (25, 12), (25, 13), (25, 14), (25, 15), (25, 16), (25, 17), (25, 18), (25, 19),
    (26, 10), (26, 11), (26, 12), (26, 13), (26, 14), (26, 15), (26, 16),
];
