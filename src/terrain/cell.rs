use serde::{Deserialize, Serialize};
use std::fmt;

// Integer key of a streaming cell on the xz plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoordinate {
    pub x: i32,
    pub z: i32,
}

impl CellCoordinate {
    // Followers are clamped to this many cells from the origin, which leaves
    // room for view distances and neighbourhoods without leaving i32
    pub const LIMIT: i32 = 1 << 30;

    pub const fn new(x: i32, z: i32) -> Self {
        CellCoordinate { x, z }
    }

    // Cell containing a world-space point
    pub fn containing(x: f32, z: f32, cell_size: CellSize) -> Self {
        let size = cell_size.units() as f64;
        let axis = |value: f32| {
            let cell = (value as f64 / size).floor();
            if cell.is_nan() {
                0
            } else {
                cell.clamp(-(Self::LIMIT as f64), Self::LIMIT as f64) as i32
            }
        };
        CellCoordinate { x: axis(x), z: axis(z) }
    }

    // World-space corner with the lowest x and z
    pub fn origin(&self, cell_size: CellSize) -> (f32, f32) {
        let size = cell_size.units() as f32;
        (self.x as f32 * size, self.z as f32 * size)
    }

    pub fn chebyshev_distance(&self, other: &CellCoordinate) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dz = self.z as i64 - other.z as i64;
        dx.abs().max(dz.abs())
    }

    // Saturates for cells at opposite ends of the i32 range
    pub fn distance_squared(&self, other: &CellCoordinate) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dz = self.z as i64 - other.z as i64;
        dx.saturating_mul(dx).saturating_add(dz.saturating_mul(dz))
    }

    // The eight surrounding cells, row by row
    pub fn neighbours(&self) -> impl Iterator<Item = CellCoordinate> + '_ {
        (-1..=1).flat_map(move |dz| {
            (-1..=1).filter_map(move |dx| {
                if dx == 0 && dz == 0 {
                    None
                } else {
                    Some(CellCoordinate::new(self.x + dx, self.z + dz))
                }
            })
        })
    }
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Edge length of a cell in world units. Fixed for the lifetime of a grid
/// snapshot; changing it requires a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellSize {
    #[serde(rename = "16")]
    Size16,
    #[default]
    #[serde(rename = "32")]
    Size32,
    #[serde(rename = "64")]
    Size64,
    #[serde(rename = "128")]
    Size128,
    #[serde(rename = "256")]
    Size256,
}

impl CellSize {
    pub const ALL: [CellSize; 5] = [
        CellSize::Size16,
        CellSize::Size32,
        CellSize::Size64,
        CellSize::Size128,
        CellSize::Size256,
    ];

    pub const fn units(self) -> u32 {
        match self {
            CellSize::Size16 => 16,
            CellSize::Size32 => 32,
            CellSize::Size64 => 64,
            CellSize::Size128 => 128,
            CellSize::Size256 => 256,
        }
    }

    pub fn from_units(units: u32) -> Option<CellSize> {
        CellSize::ALL.into_iter().find(|size| size.units() == units)
    }

    pub fn label(self) -> &'static str {
        match self {
            CellSize::Size16 => "16",
            CellSize::Size32 => "32",
            CellSize::Size64 => "64",
            CellSize::Size128 => "128",
            CellSize::Size256 => "256",
        }
    }
}

// Lifecycle of a cell within one content grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    Unloaded,
    Queued,
    Generating,
    Loaded,
    Unloading,
}

impl CellState {
    // Whether the cell counts as present when diffing against the desired set
    pub fn is_present(self) -> bool {
        matches!(self, CellState::Queued | CellState::Generating | CellState::Loaded)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, CellState::Queued | CellState::Generating)
    }
}

/// Observer position supplied by the host once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPosition {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        WorldPosition { x, y, z }
    }

    pub fn cell(&self, cell_size: CellSize) -> CellCoordinate {
        CellCoordinate::containing(self.x, self.z, cell_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containing_floors_negative_positions() {
        assert_eq!(CellCoordinate::containing(0.0, 0.0, CellSize::Size32), CellCoordinate::new(0, 0));
        assert_eq!(CellCoordinate::containing(31.9, 63.9, CellSize::Size32), CellCoordinate::new(0, 1));
        assert_eq!(CellCoordinate::containing(-0.1, -32.0, CellSize::Size32), CellCoordinate::new(-1, -1));
        assert_eq!(CellCoordinate::containing(-32.1, 0.0, CellSize::Size32), CellCoordinate::new(-2, 0));
    }

    #[test]
    fn test_far_positions_clamp_to_limit() {
        let far = CellCoordinate::containing(1.0e11, -1.0e11, CellSize::Size16);
        assert_eq!(far, CellCoordinate::new(CellCoordinate::LIMIT, -CellCoordinate::LIMIT));
        assert_eq!(CellCoordinate::containing(f32::NAN, 0.0, CellSize::Size32), CellCoordinate::new(0, 0));
    }

    #[test]
    fn test_distances_do_not_overflow() {
        let a = CellCoordinate::new(i32::MAX, i32::MIN);
        let b = CellCoordinate::new(i32::MIN, i32::MAX);
        assert_eq!(a.chebyshev_distance(&b), u32::MAX as i64);
        assert_eq!(a.distance_squared(&b), i64::MAX);

        let east = CellCoordinate::new(CellCoordinate::LIMIT, 0);
        let west = CellCoordinate::new(-CellCoordinate::LIMIT, 0);
        assert_eq!(east.distance_squared(&west), 1i64 << 62);
    }

    #[test]
    fn test_default_cell_size() {
        assert_eq!(CellSize::default(), CellSize::Size32);
    }

    #[test]
    fn test_origin_matches_cell_size() {
        let coord = CellCoordinate::new(-2, 3);
        assert_eq!(coord.origin(CellSize::Size64), (-128.0, 192.0));
    }

    #[test]
    fn test_neighbours_excludes_self() {
        let coord = CellCoordinate::new(5, -5);
        let neighbours: Vec<_> = coord.neighbours().collect();
        assert_eq!(neighbours.len(), 8);
        assert!(!neighbours.contains(&coord));
        assert!(neighbours.iter().all(|n| n.chebyshev_distance(&coord) == 1));
    }

    #[test]
    fn test_cell_size_units_round_trip() {
        for size in CellSize::ALL {
            assert_eq!(CellSize::from_units(size.units()), Some(size));
        }
        assert_eq!(CellSize::from_units(48), None);
    }

    #[test]
    fn test_present_states() {
        assert!(CellState::Queued.is_present());
        assert!(CellState::Generating.is_present());
        assert!(CellState::Loaded.is_present());
        assert!(!CellState::Unloaded.is_present());
        assert!(!CellState::Unloading.is_present());
    }
}
