use crate::terrain::Cost;

/// Rule configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameConfig {
    /// Movement allowance given to actors whose speed was never set explicitly.
    pub default_speed: Cost,

    /// Upper bound on `width * height` accepted when building a map.
    pub max_map_cells: usize,
}

impl GameConfig {
    // ===== runtime-tunable defaults =====
    /// Six squares, the usual 30ft walking speed on a 5ft grid.
    pub const DEFAULT_SPEED_SQUARES: u32 = 6;
    pub const DEFAULT_MAX_MAP_CELLS: usize = 65_536;

    pub fn new() -> Self {
        Self {
            default_speed: Cost::squares(Self::DEFAULT_SPEED_SQUARES),
            max_map_cells: Self::DEFAULT_MAX_MAP_CELLS,
        }
    }

    pub fn with_default_speed(default_speed: Cost) -> Self {
        Self {
            default_speed,
            ..Self::new()
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new()
    }
}
