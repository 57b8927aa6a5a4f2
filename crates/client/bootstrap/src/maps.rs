//! Map loader for RON encounter files.
//!
//! Terrain is authored as free-form string tags and resolved through
//! [`TerrainKind::from_tag`], so unknown tags load as `Unmarked` instead of
//! failing. Blocked cells are listed separately from their terrain.
//!
//! ```ron
//! (
//!     dimensions: (12, 8),
//!     default: "grass",
//!     tiles: [(3, 0, "road"), (4, 0, "road"), (6, 6, "swamp")],
//!     blocked: [(5, 5)],
//!     tokens: [
//!         (id: 1, kind: player, entity: Some(1), at: (0, 0), label: "Aria", speed: Some(6)),
//!         (id: 2, kind: object, at: (7, 3), label: "Barrel"),
//!     ],
//! )
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use tabletop_core::{
    Cost, Encounter, EntityId, GameConfig, GridMap, MapDimensions, MapError, Position,
    TerrainCell, TerrainKind, Token, TokenId, TokenKind,
};

/// Size of the open field used when no map file is configured.
pub const DEFAULT_FIELD_SIZE: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct MapFile {
    pub dimensions: (u32, u32),
    #[serde(default = "default_terrain")]
    pub default: String,
    #[serde(default)]
    pub tiles: Vec<(i32, i32, String)>,
    #[serde(default)]
    pub blocked: Vec<(i32, i32)>,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub id: u32,
    pub kind: TokenKind,
    #[serde(default)]
    pub entity: Option<u32>,
    pub at: (i32, i32),
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Squares per turn; actors without one use the configured default.
    #[serde(default)]
    pub speed: Option<u32>,
}

fn default_terrain() -> String {
    "grass".to_string()
}

impl MapFile {
    pub fn parse(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse map RON: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read map file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Builds the starting encounter described by this file.
    pub fn into_encounter(self, config: &GameConfig) -> Result<Encounter> {
        let dimensions = MapDimensions::new(self.dimensions.0, self.dimensions.1);
        // Checked before any row is allocated.
        let cells = (dimensions.width as usize).checked_mul(dimensions.height as usize);
        if cells.is_none_or(|cells| cells > config.max_map_cells) {
            return Err(MapError::TooLarge {
                cells: cells.unwrap_or(usize::MAX),
                limit: config.max_map_cells,
            }
            .into());
        }
        let fill = TerrainCell::new(TerrainKind::from_tag(&self.default));
        let mut rows = vec![vec![fill; dimensions.width as usize]; dimensions.height as usize];

        for (x, y, tag) in self.tiles {
            let cell = cell_in(&mut rows, dimensions, x, y)?;
            cell.terrain = TerrainKind::from_tag(&tag);
        }
        for (x, y) in self.blocked {
            cell_in(&mut rows, dimensions, x, y)?.blocked = true;
        }

        let map = GridMap::from_rows_bounded(rows, config.max_map_cells)?;
        let mut encounter = Encounter::new(map, config);

        for entry in self.tokens {
            let mut token = Token::new(
                TokenId(entry.id),
                entry.kind,
                Position::new(entry.at.0, entry.at.1),
            )
            .with_label(entry.label);
            if let Some(color) = entry.color {
                token = token.with_color(color);
            }
            if let Some(entity) = entry.entity {
                token = token.with_entity(EntityId(entity));
                if let Some(speed) = entry.speed {
                    encounter.set_speed(EntityId(entity), Cost::squares(speed));
                }
            }
            encounter
                .place_token(token)
                .with_context(|| format!("Failed to place token {}", entry.id))?;
        }

        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            tokens = encounter.map().token_count(),
            "map loaded"
        );
        Ok(encounter)
    }
}

fn cell_in(
    rows: &mut [Vec<TerrainCell>],
    dimensions: MapDimensions,
    x: i32,
    y: i32,
) -> Result<&mut TerrainCell> {
    if !dimensions.contains(Position::new(x, y)) {
        bail!(
            "cell ({}, {}) lies outside the {}x{} map",
            x,
            y,
            dimensions.width,
            dimensions.height
        );
    }
    Ok(&mut rows[y as usize][x as usize])
}

/// Loads the encounter at `path`, or an open grass field without one.
pub fn load_encounter(path: Option<&Path>, config: &GameConfig) -> Result<Encounter> {
    match path {
        Some(path) => MapFile::load(path)?.into_encounter(config),
        None => {
            let dimensions = MapDimensions::new(DEFAULT_FIELD_SIZE, DEFAULT_FIELD_SIZE);
            let map = GridMap::filled(dimensions, TerrainCell::new(TerrainKind::Grass))?;
            Ok(Encounter::new(map, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tabletop_core::CellCost;

    const SAMPLE: &str = r#"(
        dimensions: (6, 4),
        default: "grass",
        tiles: [(1, 0, "Road"), (2, 0, "lava"), (3, 1, "impassible")],
        blocked: [(4, 2)],
        tokens: [
            (id: 1, kind: player, entity: Some(7), at: (0, 0), label: "Aria", speed: Some(4)),
            (id: 2, kind: object, at: (5, 3), label: "Barrel", color: Some("brown")),
        ],
    )"#;

    #[test]
    fn tags_resolve_at_load_time() {
        let encounter = MapFile::parse(SAMPLE)
            .unwrap()
            .into_encounter(&GameConfig::default())
            .unwrap();
        let map = encounter.map();

        assert_eq!(map.cell(Position::new(1, 0)).unwrap().terrain, TerrainKind::Road);
        assert_eq!(
            map.cell(Position::new(2, 0)).unwrap().terrain,
            TerrainKind::Unmarked
        );
        assert_eq!(map.cost_at(Position::new(3, 1)), CellCost::Impassable);
        assert_eq!(map.cost_at(Position::new(0, 3)), CellCost::Enter(Cost::squares(1)));
    }

    #[test]
    fn blocked_cells_keep_their_terrain() {
        let encounter = MapFile::parse(SAMPLE)
            .unwrap()
            .into_encounter(&GameConfig::default())
            .unwrap();
        let cell = encounter.map().cell(Position::new(4, 2)).unwrap();
        assert_eq!(cell.terrain, TerrainKind::Grass);
        assert!(cell.blocked);
        assert_eq!(cell.cost(), CellCost::Impassable);
    }

    #[test]
    fn tokens_and_speeds_are_installed() {
        let encounter = MapFile::parse(SAMPLE)
            .unwrap()
            .into_encounter(&GameConfig::default())
            .unwrap();

        let aria = encounter.token(TokenId(1)).unwrap();
        assert_eq!(aria.entity_id, Some(EntityId(7)));
        assert_eq!(aria.label, "Aria");
        assert_eq!(encounter.budget(EntityId(7)).speed, Cost::squares(4));

        let barrel = encounter.token(TokenId(2)).unwrap();
        assert_eq!(barrel.kind, TokenKind::Object);
        assert_eq!(barrel.entity_id, None);
        assert_eq!(barrel.color.as_deref(), Some("brown"));
    }

    #[test]
    fn out_of_bounds_tiles_are_rejected() {
        let file = MapFile::parse(r#"(dimensions: (2, 2), tiles: [(2, 0, "road")])"#).unwrap();
        assert!(file.into_encounter(&GameConfig::default()).is_err());
    }

    #[test]
    fn oversized_maps_are_rejected() {
        let config = GameConfig {
            max_map_cells: 10,
            ..GameConfig::default()
        };
        let file = MapFile::parse("(dimensions: (4, 4))").unwrap();
        assert!(file.into_encounter(&config).is_err());
    }

    #[test]
    fn huge_dimensions_fail_before_allocating() {
        let file = MapFile::parse("(dimensions: (4000000000, 4000000000))").unwrap();
        let err = file.into_encounter(&GameConfig::default()).unwrap_err();
        match err.downcast_ref::<MapError>() {
            Some(MapError::TooLarge { cells, limit }) => {
                assert!(cells > limit);
                assert_eq!(*limit, GameConfig::default().max_map_cells);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let encounter = load_encounter(Some(file.path()), &GameConfig::default()).unwrap();
        assert_eq!(encounter.map().dimensions(), MapDimensions::new(6, 4));
        assert_eq!(encounter.map().token_count(), 2);
    }

    #[test]
    fn missing_path_yields_open_field() {
        let encounter = load_encounter(None, &GameConfig::default()).unwrap();
        assert_eq!(
            encounter.map().dimensions(),
            MapDimensions::new(DEFAULT_FIELD_SIZE, DEFAULT_FIELD_SIZE)
        );
        assert_eq!(encounter.map().token_count(), 0);
    }
}
