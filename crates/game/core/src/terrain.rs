//! Terrain cost model.
//!
//! Maps a cell's terrain classification and its author-placed `blocked` flag
//! to the cost of entering that cell. The model is a pure function of cell
//! state; the pathfinder relies on it returning the same answer every time.

use core::fmt;
use core::ops::{Add, AddAssign};
use core::str::FromStr;

/// Non-negative movement cost in hundredths of a grid square.
///
/// Fixed-point keeps half-cost terrain exact and the search frontier totally
/// ordered without floating point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Cost(u32);

impl Cost {
    pub const SCALE: u32 = 100;
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u32::MAX);

    /// Cost of `squares` whole grid squares.
    pub const fn squares(squares: u32) -> Self {
        Self(squares.saturating_mul(Self::SCALE))
    }

    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    /// `self - rhs`, clamped at zero.
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn as_squares_f32(self) -> f32 {
        self.0 as f32 / Self::SCALE as f32
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        if frac == 0 {
            write!(f, "{whole}")
        } else if frac % 10 == 0 {
            write!(f, "{whole}.{}", frac / 10)
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

/// Canonical terrain classes for grid cells.
///
/// `Unmarked` is the explicit default: authored tags that name no known
/// terrain resolve to it and cost the default single square.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TerrainKind {
    Grass,
    Road,
    Water,
    Mountain,
    Forest,
    Stone,
    Sand,
    Dirt,
    Swamp,
    Snow,
    Desert,
    #[strum(to_string = "impassable", serialize = "impassible")]
    Impassable,
    #[default]
    Unmarked,
}

impl TerrainKind {
    /// Resolves an authored terrain tag. Unknown or empty tags become `Unmarked`.
    pub fn from_tag(tag: &str) -> Self {
        TerrainKind::from_str(tag.trim()).unwrap_or_default()
    }

    pub fn as_tag(self) -> &'static str {
        self.into()
    }

    /// Cost of entering a cell of this terrain, ignoring any `blocked` flag.
    pub const fn base_cost(self) -> CellCost {
        match self {
            TerrainKind::Road => CellCost::Enter(Cost::from_hundredths(50)),
            TerrainKind::Grass | TerrainKind::Dirt | TerrainKind::Stone | TerrainKind::Unmarked => {
                CellCost::Enter(Cost::squares(1))
            }
            TerrainKind::Sand | TerrainKind::Desert => CellCost::Enter(Cost::from_hundredths(150)),
            TerrainKind::Forest | TerrainKind::Swamp | TerrainKind::Snow => {
                CellCost::Enter(Cost::squares(2))
            }
            TerrainKind::Water | TerrainKind::Mountain | TerrainKind::Impassable => {
                CellCost::Impassable
            }
        }
    }
}

/// Result of the terrain cost model for one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellCost {
    Enter(Cost),
    Impassable,
}

impl CellCost {
    pub const fn is_passable(self) -> bool {
        matches!(self, CellCost::Enter(_))
    }

    pub const fn finite(self) -> Option<Cost> {
        match self {
            CellCost::Enter(cost) => Some(cost),
            CellCost::Impassable => None,
        }
    }
}

/// One grid cell: a terrain class plus an independent author-placed obstacle flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerrainCell {
    pub terrain: TerrainKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub blocked: bool,
}

impl TerrainCell {
    pub const fn new(terrain: TerrainKind) -> Self {
        Self {
            terrain,
            blocked: false,
        }
    }

    pub const fn blocked(terrain: TerrainKind) -> Self {
        Self {
            terrain,
            blocked: true,
        }
    }

    /// Effective cost of entering this cell. `blocked` wins over any terrain.
    pub const fn cost(self) -> CellCost {
        if self.blocked {
            return CellCost::Impassable;
        }
        self.terrain.base_cost()
    }

    pub const fn is_passable(self) -> bool {
        self.cost().is_passable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn blocked_flag_overrides_every_terrain() {
        for terrain in TerrainKind::iter() {
            assert_eq!(TerrainCell::blocked(terrain).cost(), CellCost::Impassable);
        }
    }

    #[test]
    fn impassable_tags_need_no_flag() {
        for terrain in [
            TerrainKind::Water,
            TerrainKind::Mountain,
            TerrainKind::Impassable,
        ] {
            assert_eq!(TerrainCell::new(terrain).cost(), CellCost::Impassable);
        }
    }

    #[test]
    fn road_is_cheaper_than_default() {
        let road = TerrainCell::new(TerrainKind::Road).cost().finite().unwrap();
        let grass = TerrainCell::new(TerrainKind::Grass).cost().finite().unwrap();
        assert_eq!(road, Cost::from_hundredths(50));
        assert_eq!(grass, Cost::squares(1));
        assert!(road < grass);
    }

    #[test]
    fn passable_costs_are_positive() {
        for terrain in TerrainKind::iter() {
            if let CellCost::Enter(cost) = terrain.base_cost() {
                assert!(cost > Cost::ZERO, "{terrain:?} must cost something");
            }
        }
    }

    #[test]
    fn tags_resolve_case_insensitively_with_default_fallback() {
        assert_eq!(TerrainKind::from_tag("Grass"), TerrainKind::Grass);
        assert_eq!(TerrainKind::from_tag("ROAD"), TerrainKind::Road);
        assert_eq!(TerrainKind::from_tag("impassible"), TerrainKind::Impassable);
        assert_eq!(TerrainKind::from_tag("impassable"), TerrainKind::Impassable);
        assert_eq!(TerrainKind::from_tag("lava"), TerrainKind::Unmarked);
        assert_eq!(TerrainKind::from_tag(""), TerrainKind::Unmarked);
        assert_eq!(
            TerrainCell::new(TerrainKind::from_tag("lava")).cost(),
            CellCost::Enter(Cost::squares(1))
        );
    }

    #[test]
    fn cost_is_stable_for_the_same_cell() {
        let cell = TerrainCell::new(TerrainKind::Swamp);
        assert_eq!(cell.cost(), cell.cost());
    }

    #[test]
    fn cost_display_uses_decimal_squares() {
        assert_eq!(Cost::squares(6).to_string(), "6");
        assert_eq!(Cost::from_hundredths(50).to_string(), "0.5");
        assert_eq!(Cost::from_hundredths(125).to_string(), "1.25");
    }
}
