use std::collections::{BTreeMap, HashMap};

use colonia_protocol::{FatherId, GoodsTypeId, UnitRole, UnitTypeId};
use serde::Deserialize;
use thiserror::Error;

use crate::rules::types::{role_from_key, terrain_from_key, terrain_index};
use crate::rules::{
    RawFoundingFather, RawGoodsType, RawRoleType, RawTerrainType, RawUnitType, RoleType, Rules,
    SpecialUnits, TerrainType,
};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("missing terrain definition: {0}")]
    MissingTerrain(&'static str),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum RulesSource<'a> {
    Embedded,
    /// Directory containing `rules.yaml`.
    Path(String),
    Bytes(&'a [u8]),
}

#[derive(Debug, Deserialize)]
struct RawRules {
    terrains: BTreeMap<String, RawTerrainType>,
    goods: BTreeMap<String, RawGoodsType>,
    units: BTreeMap<String, RawUnitType>,
    #[serde(default)]
    roles: BTreeMap<String, RawRoleType>,
    #[serde(default)]
    fathers: BTreeMap<String, RawFoundingFather>,
    #[serde(default)]
    royal_expeditionary_force: BTreeMap<String, u32>,
    #[serde(default)]
    mercenaries: BTreeMap<String, u32>,
}

pub fn load_rules(source: RulesSource<'_>) -> Result<Rules, RulesError> {
    let raw: RawRules = match source {
        RulesSource::Embedded => {
            let yaml = include_str!("../../data/base/rules.yaml");
            serde_yaml::from_str(yaml)?
        }
        RulesSource::Path(path) => {
            let yaml = std::fs::read_to_string(format!("{path}/rules.yaml"))?;
            serde_yaml::from_str(&yaml)?
        }
        RulesSource::Bytes(bytes) => serde_yaml::from_str(std::str::from_utf8(bytes)?)?,
    };

    compile_rules(raw)
}

fn compile_rules(raw: RawRules) -> Result<Rules, RulesError> {
    let goods_ids = raw
        .goods
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), GoodsTypeId::new(i as u16)))
        .collect::<HashMap<_, _>>();
    let unit_type_ids = raw
        .units
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), UnitTypeId::new(i as u16)))
        .collect::<HashMap<_, _>>();
    let father_ids = raw
        .fathers
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), FatherId::new(i as u16)))
        .collect::<HashMap<_, _>>();

    let mut terrain_slots: Vec<Option<TerrainType>> = vec![None; 7];
    for (key, terrain) in raw.terrains {
        let kind = terrain_from_key(&key).ok_or(RulesError::MissingId(key))?;
        terrain_slots[terrain_index(kind)] = Some(terrain.compile());
    }
    const TERRAIN_KEYS: [&str; 7] = [
        "ocean",
        "high_seas",
        "plains",
        "grassland",
        "forest",
        "hills",
        "mountains",
    ];
    let terrains = terrain_slots
        .into_iter()
        .zip(TERRAIN_KEYS)
        .map(|(slot, key)| slot.ok_or(RulesError::MissingTerrain(key)))
        .collect::<Result<Vec<_>, _>>()?;

    let goods = raw
        .goods
        .into_iter()
        .enumerate()
        .map(|(i, (key, g))| g.compile(GoodsTypeId::new(i as u16), key))
        .collect::<Vec<_>>();
    let unit_types = raw
        .units
        .into_iter()
        .enumerate()
        .map(|(i, (key, u))| u.compile(UnitTypeId::new(i as u16), key))
        .collect::<Vec<_>>();
    let fathers = raw
        .fathers
        .into_iter()
        .enumerate()
        .map(|(i, (key, f))| f.compile(FatherId::new(i as u16), key))
        .collect::<Result<Vec<_>, _>>()?;

    let mut roles: BTreeMap<UnitRole, RoleType> = BTreeMap::new();
    for (key, role) in raw.roles {
        let kind = role_from_key(&key).ok_or_else(|| RulesError::MissingId(key.clone()))?;
        roles.insert(kind, role.compile(kind, &goods_ids)?);
    }

    let resolve_force = |force: BTreeMap<String, u32>| {
        force
            .into_iter()
            .map(|(key, count)| {
                unit_type_ids
                    .get(&key)
                    .map(|id| (*id, count))
                    .ok_or(RulesError::MissingId(key))
            })
            .collect::<Result<Vec<_>, _>>()
    };
    let royal_force = resolve_force(raw.royal_expeditionary_force)?;
    let mercenaries = resolve_force(raw.mercenaries)?;

    let special_id = |key: &str| {
        unit_type_ids
            .get(key)
            .copied()
            .ok_or_else(|| RulesError::MissingId(key.to_string()))
    };
    let special = SpecialUnits {
        colonist: special_id("free_colonist")?,
        convert: special_id("native_convert")?,
        expert_scout: special_id("expert_scout")?,
        brave: special_id("native_brave")?,
    };

    Ok(Rules {
        terrains,
        goods,
        unit_types,
        roles,
        fathers,
        royal_force,
        mercenaries,
        special,
        goods_ids,
        unit_type_ids,
        father_ids,
    })
}
