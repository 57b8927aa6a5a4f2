//! Grid map, coordinates and the tokens placed on it.
//!
//! The map owns its tokens. A token's `entity_id` is only a back-reference to
//! an actor defined elsewhere (character sheet, NPC template); the map never
//! owns that actor.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ErrorSeverity, GameError};
use crate::terrain::{CellCost, TerrainCell};

/// Identifier of an actor (player character, NPC or director) owned outside the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a token on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

/// Discrete grid position expressed in tile coordinates (`x` = column, `y` = row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: CardinalDirection) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four grid neighbours. Diagonals are not part of the movement model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CardinalDirection {
    North,
    South,
    East,
    West,
}

impl CardinalDirection {
    /// Neighbour expansion order. The pathfinder's tie-breaking depends on it.
    pub const ALL: [CardinalDirection; 4] = [
        CardinalDirection::North,
        CardinalDirection::South,
        CardinalDirection::East,
        CardinalDirection::West,
    ];

    /// Row-major delta: North decreases the row index.
    pub fn delta(self) -> (i32, i32) {
        match self {
            CardinalDirection::North => (0, -1),
            CardinalDirection::South => (0, 1),
            CardinalDirection::East => (1, 0),
            CardinalDirection::West => (-1, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapDimensions {
    pub width: u32,
    pub height: u32,
}

impl MapDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as i64) < self.width as i64
            && (position.y as i64) < self.height as i64
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of `position`, if it lies on the map.
    pub fn index_of(&self, position: Position) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        Some(position.y as usize * self.width as usize + position.x as usize)
    }

    pub fn position_of(&self, index: usize) -> Position {
        let width = self.width as usize;
        Position::new((index % width) as i32, (index / width) as i32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TokenKind {
    Player,
    Npc,
    Object,
}

/// Free-form per-token data. `path` holds the most recently traveled route
/// and is consumed by clients for animation only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenMetadata {
    #[cfg_attr(feature = "serde", serde(default))]
    pub path: Vec<Position>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub extra: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub id: TokenId,
    pub kind: TokenKind,
    pub entity_id: Option<EntityId>,
    pub position: Position,
    pub label: String,
    pub color: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: TokenMetadata,
    /// Bumped on every confirmed move; callers compare it to detect stale views.
    #[cfg_attr(feature = "serde", serde(default))]
    pub version: u64,
}

impl Token {
    pub fn new(id: TokenId, kind: TokenKind, position: Position) -> Self {
        Self {
            id,
            kind,
            entity_id: None,
            position,
            label: String::new(),
            color: None,
            metadata: TokenMetadata::default(),
            version: 0,
        }
    }

    pub fn with_entity(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MapError {
    #[error("map must be at least 1x1 (got {width}x{height})")]
    EmptyMap { width: u32, height: u32 },

    #[error("map of {cells} cells exceeds the limit of {limit}")]
    TooLarge { cells: usize, limit: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("layout has {found} cells, dimensions require {expected}")]
    CellCountMismatch { expected: usize, found: usize },

    #[error("position {position} is outside the map")]
    OutOfBounds { position: Position },

    #[error("token {0} already exists")]
    DuplicateToken(TokenId),

    #[error("token {0} not found")]
    TokenNotFound(TokenId),
}

impl GameError for MapError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMap { .. } => "MAP_EMPTY",
            Self::TooLarge { .. } => "MAP_TOO_LARGE",
            Self::RaggedRow { .. } => "MAP_RAGGED_ROW",
            Self::CellCountMismatch { .. } => "MAP_CELL_COUNT_MISMATCH",
            Self::OutOfBounds { .. } => "MAP_OUT_OF_BOUNDS",
            Self::DuplicateToken(_) => "MAP_DUPLICATE_TOKEN",
            Self::TokenNotFound(_) => "MAP_TOKEN_NOT_FOUND",
        }
    }
}

/// Shared grid: row-major terrain cells plus the tokens standing on them.
///
/// Invariant: every token's position lies within `[0,width) x [0,height)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "GridMapData"))]
pub struct GridMap {
    dimensions: MapDimensions,
    cells: Vec<TerrainCell>,
    tokens: BTreeMap<TokenId, Token>,
}

/// Wire form of [`GridMap`], checked through the regular constructors.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct GridMapData {
    dimensions: MapDimensions,
    cells: Vec<TerrainCell>,
    tokens: BTreeMap<TokenId, Token>,
}

#[cfg(feature = "serde")]
impl TryFrom<GridMapData> for GridMap {
    type Error = MapError;

    fn try_from(data: GridMapData) -> Result<Self, Self::Error> {
        let mut map = GridMap::from_cells(data.dimensions, data.cells)?;
        for token in data.tokens.into_values() {
            map.place_token(token)?;
        }
        Ok(map)
    }
}

impl GridMap {
    /// Builds a map where every cell is `cell`.
    pub fn filled(dimensions: MapDimensions, cell: TerrainCell) -> Result<Self, MapError> {
        Self::check_dimensions(dimensions, usize::MAX)?;
        Ok(Self {
            dimensions,
            cells: vec![cell; dimensions.cell_count()],
            tokens: BTreeMap::new(),
        })
    }

    /// Builds a map from `[row][col]` cells. All rows must share one width.
    pub fn from_rows(rows: Vec<Vec<TerrainCell>>) -> Result<Self, MapError> {
        Self::from_rows_bounded(rows, usize::MAX)
    }

    /// Like [`GridMap::from_rows`], rejecting maps above `max_cells`.
    pub fn from_rows_bounded(
        rows: Vec<Vec<TerrainCell>>,
        max_cells: usize,
    ) -> Result<Self, MapError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let dimensions = MapDimensions::new(width as u32, height as u32);
        Self::check_dimensions(dimensions, max_cells)?;

        let mut cells = Vec::with_capacity(dimensions.cell_count());
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(MapError::RaggedRow {
                    row: row_index,
                    expected: width,
                    found: row.len(),
                });
            }
            cells.extend(row);
        }

        Ok(Self {
            dimensions,
            cells,
            tokens: BTreeMap::new(),
        })
    }

    /// Rebuilds a token-free map from its row-major cell layout.
    pub fn from_cells(dimensions: MapDimensions, cells: Vec<TerrainCell>) -> Result<Self, MapError> {
        Self::check_dimensions(dimensions, usize::MAX)?;
        if cells.len() != dimensions.cell_count() {
            return Err(MapError::CellCountMismatch {
                expected: dimensions.cell_count(),
                found: cells.len(),
            });
        }
        Ok(Self {
            dimensions,
            cells,
            tokens: BTreeMap::new(),
        })
    }

    fn check_dimensions(dimensions: MapDimensions, max_cells: usize) -> Result<(), MapError> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(MapError::EmptyMap {
                width: dimensions.width,
                height: dimensions.height,
            });
        }
        let cells = dimensions.cell_count();
        if cells > max_cells {
            return Err(MapError::TooLarge {
                cells,
                limit: max_cells,
            });
        }
        Ok(())
    }

    pub fn dimensions(&self) -> MapDimensions {
        self.dimensions
    }

    pub fn contains(&self, position: Position) -> bool {
        self.dimensions.contains(position)
    }

    pub fn cell(&self, position: Position) -> Option<TerrainCell> {
        self.dimensions
            .index_of(position)
            .map(|index| self.cells[index])
    }

    pub fn cell_mut(&mut self, position: Position) -> Option<&mut TerrainCell> {
        let index = self.dimensions.index_of(position)?;
        self.cells.get_mut(index)
    }

    /// Row-major cell layout.
    pub fn cells(&self) -> &[TerrainCell] {
        &self.cells
    }

    pub(crate) fn cell_at_index(&self, index: usize) -> TerrainCell {
        self.cells[index]
    }

    /// Cost of entering `position`. Off-map positions are impassable.
    pub fn cost_at(&self, position: Position) -> CellCost {
        self.cell(position)
            .map_or(CellCost::Impassable, TerrainCell::cost)
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Places a new token. Rejects duplicates and off-map positions.
    pub fn place_token(&mut self, token: Token) -> Result<(), MapError> {
        if self.tokens.contains_key(&token.id) {
            return Err(MapError::DuplicateToken(token.id));
        }
        if !self.contains(token.position) {
            return Err(MapError::OutOfBounds {
                position: token.position,
            });
        }
        self.tokens.insert(token.id, token);
        Ok(())
    }

    pub fn remove_token(&mut self, id: TokenId) -> Result<Token, MapError> {
        self.tokens.remove(&id).ok_or(MapError::TokenNotFound(id))
    }

    /// Moves a token, records the traveled path and bumps its version.
    pub fn relocate_token(
        &mut self,
        id: TokenId,
        destination: Position,
        path: Vec<Position>,
    ) -> Result<&Token, MapError> {
        if !self.contains(destination) {
            return Err(MapError::OutOfBounds {
                position: destination,
            });
        }
        let token = self.tokens.get_mut(&id).ok_or(MapError::TokenNotFound(id))?;
        token.position = destination;
        token.metadata.path = path;
        token.version += 1;
        Ok(token)
    }
}
