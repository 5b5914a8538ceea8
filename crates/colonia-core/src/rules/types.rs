use std::collections::{BTreeMap, HashMap};

use colonia_protocol::{
    FatherCategory, FatherId, GoodsAmount, GoodsTypeId, Terrain, UnitRole, UnitTypeId,
};
use serde::Deserialize;

use crate::rules::RulesError;

/// Data ids are the YAML keys (`free_colonist`, `muskets`, ...).
pub type DataId = String;

#[derive(Debug, Clone)]
pub struct Rules {
    pub terrains: Vec<TerrainType>,
    pub goods: Vec<GoodsType>,
    pub unit_types: Vec<UnitType>,
    pub roles: BTreeMap<UnitRole, RoleType>,
    pub fathers: Vec<FoundingFather>,
    pub royal_force: Vec<(UnitTypeId, u32)>,
    pub mercenaries: Vec<(UnitTypeId, u32)>,
    pub special: SpecialUnits,

    pub goods_ids: HashMap<DataId, GoodsTypeId>,
    pub unit_type_ids: HashMap<DataId, UnitTypeId>,
    pub father_ids: HashMap<DataId, FatherId>,
}

/// Unit types the simulation creates on its own.
#[derive(Debug, Clone, Copy)]
pub struct SpecialUnits {
    pub colonist: UnitTypeId,
    pub convert: UnitTypeId,
    pub expert_scout: UnitTypeId,
    pub brave: UnitTypeId,
}

impl Rules {
    pub fn terrain(&self, terrain: Terrain) -> &TerrainType {
        &self.terrains[terrain_index(terrain)]
    }

    pub fn goods_type(&self, id: GoodsTypeId) -> Option<&GoodsType> {
        self.goods.get(id.raw as usize)
    }

    pub fn unit_type(&self, id: UnitTypeId) -> Option<&UnitType> {
        self.unit_types.get(id.raw as usize)
    }

    pub fn father(&self, id: FatherId) -> Option<&FoundingFather> {
        self.fathers.get(id.raw as usize)
    }

    pub fn role(&self, role: UnitRole) -> Option<&RoleType> {
        self.roles.get(&role)
    }

    pub fn goods_id(&self, data_id: &str) -> Option<GoodsTypeId> {
        self.goods_ids.get(data_id).copied()
    }

    pub fn unit_type_id(&self, data_id: &str) -> Option<UnitTypeId> {
        self.unit_type_ids.get(data_id).copied()
    }

    pub fn father_id(&self, data_id: &str) -> Option<FatherId> {
        self.father_ids.get(data_id).copied()
    }

    pub fn storable_goods(&self) -> impl Iterator<Item = &GoodsType> {
        self.goods.iter().filter(|g| g.storable)
    }
}

pub(crate) fn terrain_index(terrain: Terrain) -> usize {
    match terrain {
        Terrain::Ocean => 0,
        Terrain::HighSeas => 1,
        Terrain::Plains => 2,
        Terrain::Grassland => 3,
        Terrain::Forest => 4,
        Terrain::Hills => 5,
        Terrain::Mountains => 6,
    }
}

pub(crate) fn terrain_from_key(key: &str) -> Option<Terrain> {
    Some(match key {
        "ocean" => Terrain::Ocean,
        "high_seas" => Terrain::HighSeas,
        "plains" => Terrain::Plains,
        "grassland" => Terrain::Grassland,
        "forest" => Terrain::Forest,
        "hills" => Terrain::Hills,
        "mountains" => Terrain::Mountains,
        _ => return None,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTerrainType {
    pub name: String,
    #[serde(default = "default_move_cost")]
    pub move_cost: u32,
    #[serde(default)]
    pub defence_bonus: i32,
}

#[derive(Debug, Clone)]
pub struct TerrainType {
    pub name: String,
    pub move_cost: u32,
    /// Percent added to a defender standing on this terrain.
    pub defence_bonus: i32,
}

impl RawTerrainType {
    pub fn compile(self) -> TerrainType {
        TerrainType {
            name: self.name,
            move_cost: self.move_cost.max(1),
            defence_bonus: self.defence_bonus,
        }
    }
}

fn default_move_cost() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGoodsType {
    pub name: String,
    #[serde(default = "default_true")]
    pub storable: bool,
    pub initial_price: u32,
    pub initial_amount: u32,
    /// Price natives pay for 100 units.
    pub native_price: u32,
}

#[derive(Debug, Clone)]
pub struct GoodsType {
    pub id: GoodsTypeId,
    pub data_id: DataId,
    pub name: String,
    pub storable: bool,
    pub initial_price: u32,
    pub initial_amount: u32,
    pub native_price: u32,
}

impl RawGoodsType {
    pub fn compile(self, id: GoodsTypeId, data_id: DataId) -> GoodsType {
        GoodsType {
            id,
            data_id,
            name: self.name,
            storable: self.storable,
            initial_price: self.initial_price.max(1),
            initial_amount: self.initial_amount,
            native_price: self.native_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expertise {
    Scout,
    Missionary,
    Soldier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUnitType {
    pub name: String,
    pub moves: u32,
    #[serde(default)]
    pub offence: i32,
    #[serde(default)]
    pub defence: i32,
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub naval: bool,
    #[serde(default)]
    pub space: u32,
    #[serde(default)]
    pub piracy: bool,
    #[serde(default)]
    pub can_learn: bool,
    #[serde(default)]
    pub teachable: bool,
    #[serde(default)]
    pub expertise: Option<Expertise>,
    #[serde(default)]
    pub native: bool,
    #[serde(default)]
    pub royal: bool,
    #[serde(default = "default_line_of_sight")]
    pub line_of_sight: u32,
}

fn default_line_of_sight() -> u32 {
    1
}

#[derive(Debug, Clone)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub data_id: DataId,
    pub name: String,
    pub moves: u32,
    pub offence: i32,
    pub defence: i32,
    pub price: u32,
    pub naval: bool,
    /// Cargo slots; each slot holds one unit or up to 100 goods.
    pub space: u32,
    pub piracy: bool,
    pub can_learn: bool,
    pub teachable: bool,
    pub expertise: Option<Expertise>,
    pub native: bool,
    pub royal: bool,
    pub line_of_sight: u32,
}

impl UnitType {
    pub fn is_expert(&self, expertise: Expertise) -> bool {
        self.expertise == Some(expertise)
    }
}

impl RawUnitType {
    pub fn compile(self, id: UnitTypeId, data_id: DataId) -> UnitType {
        UnitType {
            id,
            data_id,
            name: self.name,
            moves: self.moves.max(1),
            offence: self.offence,
            defence: self.defence,
            price: self.price,
            naval: self.naval,
            space: self.space,
            piracy: self.piracy,
            can_learn: self.can_learn,
            teachable: self.teachable,
            expertise: self.expertise,
            native: self.native,
            royal: self.royal,
            line_of_sight: self.line_of_sight,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRoleType {
    #[serde(default)]
    pub goods: BTreeMap<String, u32>,
    #[serde(default)]
    pub offence: i32,
    #[serde(default)]
    pub defence: i32,
    #[serde(default)]
    pub moves: Option<u32>,
    #[serde(default)]
    pub line_of_sight: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RoleType {
    pub role: UnitRole,
    pub goods: Vec<GoodsAmount>,
    pub offence: i32,
    pub defence: i32,
    pub moves: Option<u32>,
    pub line_of_sight: Option<u32>,
}

impl RawRoleType {
    pub fn compile(
        self,
        role: UnitRole,
        goods_ids: &HashMap<DataId, GoodsTypeId>,
    ) -> Result<RoleType, RulesError> {
        let goods = self
            .goods
            .into_iter()
            .map(|(key, amount)| {
                goods_ids
                    .get(&key)
                    .map(|id| GoodsAmount::new(*id, amount))
                    .ok_or(RulesError::MissingId(key))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RoleType {
            role,
            goods,
            offence: self.offence,
            defence: self.defence,
            moves: self.moves,
            line_of_sight: self.line_of_sight,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatherEffect {
    #[default]
    None,
    SafeRumours,
    LibertyBoost,
    PeaceWithNatives,
    ImmigrationBoost,
    ExpertMissionaries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFoundingFather {
    pub name: String,
    pub category: String,
    /// Offer weight per age (early, middle, late).
    pub weights: [u32; 3],
    #[serde(default)]
    pub effect: FatherEffect,
}

#[derive(Debug, Clone)]
pub struct FoundingFather {
    pub id: FatherId,
    pub data_id: DataId,
    pub name: String,
    pub category: FatherCategory,
    pub weights: [u32; 3],
    pub effect: FatherEffect,
}

impl RawFoundingFather {
    pub fn compile(self, id: FatherId, data_id: DataId) -> Result<FoundingFather, RulesError> {
        let category = match self.category.as_str() {
            "trade" => FatherCategory::Trade,
            "exploration" => FatherCategory::Exploration,
            "military" => FatherCategory::Military,
            "political" => FatherCategory::Political,
            "religious" => FatherCategory::Religious,
            other => return Err(RulesError::MissingId(other.to_string())),
        };
        Ok(FoundingFather {
            id,
            data_id,
            name: self.name,
            category,
            weights: self.weights,
            effect: self.effect,
        })
    }
}

pub(crate) fn role_from_key(key: &str) -> Option<UnitRole> {
    Some(match key {
        "soldier" => UnitRole::Soldier,
        "dragoon" => UnitRole::Dragoon,
        "scout" => UnitRole::Scout,
        "missionary" => UnitRole::Missionary,
        "pioneer" => UnitRole::Pioneer,
        _ => return None,
    })
}
