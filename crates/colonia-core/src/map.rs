use serde::{Deserialize, Serialize};

use colonia_protocol::{PlayerId, Position, SettlementId, Terrain, TileSnapshot};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub owner: Option<PlayerId>,
    /// Settlement claiming this tile (not necessarily standing on it).
    pub owning_settlement: Option<SettlementId>,
    /// Settlement standing on this tile.
    pub settlement: Option<SettlementId>,
    #[serde(default)]
    pub rumour: bool,
    #[serde(default)]
    pub region: Option<String>,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            owner: None,
            owning_settlement: None,
            settlement: None,
            rumour: false,
            region: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameMap {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl GameMap {
    pub fn new(width: u32, height: u32, default_terrain: Terrain) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::new(default_terrain); (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    pub fn index_of(&self, pos: Position) -> Option<usize> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn position_of(&self, index: usize) -> Position {
        let width = self.width.max(1) as usize;
        Position::new((index % width) as i32, (index / width) as i32)
    }

    pub fn get(&self, pos: Position) -> Option<&Tile> {
        self.index_of(pos).and_then(|idx| self.tiles.get(idx))
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        let idx = self.index_of(pos)?;
        self.tiles.get_mut(idx)
    }

    pub fn terrain(&self, pos: Position) -> Option<Terrain> {
        self.get(pos).map(|t| t.terrain)
    }

    pub fn is_land(&self, pos: Position) -> bool {
        self.terrain(pos).is_some_and(|t| !t.is_water())
    }

    pub fn is_coastal(&self, pos: Position) -> bool {
        pos.neighbors()
            .any(|n| self.terrain(n).is_some_and(Terrain::is_water))
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.tiles.len()).map(|idx| self.position_of(idx))
    }

    /// In-bounds positions within `radius`, in deterministic row-major order.
    pub fn square(&self, center: Position, radius: i32) -> impl Iterator<Item = Position> + '_ {
        center.square(radius).filter(|p| self.in_bounds(*p))
    }

    pub fn snapshot(&self, pos: Position) -> Option<TileSnapshot> {
        let tile = self.get(pos)?;
        Some(TileSnapshot {
            position: pos,
            terrain: tile.terrain,
            owner: tile.owner,
            settlement: tile.settlement,
            rumour: tile.rumour,
            region: tile.region.clone(),
        })
    }
}
