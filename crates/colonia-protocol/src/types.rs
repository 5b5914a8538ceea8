use serde::{Deserialize, Serialize};

use crate::{GoodsTypeId, PlayerId, Position, SettlementId, UnitId};

/// Diplomatic relationship between two players. Always symmetric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    Uncontacted,
    Peace,
    CeaseFire,
    Alliance,
    War,
}

impl Stance {
    /// Whether a negotiated or declared change from `self` to `next` is permitted.
    pub fn can_transition_to(self, next: Stance) -> bool {
        use Stance::*;
        matches!(
            (self, next),
            (Uncontacted, Peace)
                | (Uncontacted, War)
                | (Peace, War)
                | (Peace, Alliance)
                | (CeaseFire, Peace)
                | (CeaseFire, War)
                | (War, CeaseFire)
                | (War, Peace)
                | (Alliance, Peace)
                | (Alliance, War)
        )
    }
}

/// Discrete level derived from a tension scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TensionLevel {
    Happy,
    Content,
    Displeased,
    Angry,
    Hateful,
}

impl TensionLevel {
    pub const ALL: [TensionLevel; 5] = [
        TensionLevel::Happy,
        TensionLevel::Content,
        TensionLevel::Displeased,
        TensionLevel::Angry,
        TensionLevel::Hateful,
    ];

    /// Upper bound (inclusive) of the scalar range mapped to this level.
    pub const fn limit(self) -> i32 {
        match self {
            TensionLevel::Happy => 100,
            TensionLevel::Content => 600,
            TensionLevel::Displeased => 700,
            TensionLevel::Angry => 800,
            TensionLevel::Hateful => 1000,
        }
    }

    pub fn from_value(value: i32) -> TensionLevel {
        Self::ALL
            .into_iter()
            .find(|level| value <= level.limit())
            .unwrap_or(TensionLevel::Hateful)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    Active,
    Sentry,
    Skipped,
    Fortifying,
    Fortified,
    InColony,
    ToEurope,
    InEurope,
    ToAmerica,
}

impl UnitState {
    /// States a player may request directly; the rest are entered by the simulation.
    pub fn is_player_settable(self) -> bool {
        matches!(
            self,
            UnitState::Active | UnitState::Sentry | UnitState::Skipped | UnitState::Fortifying
        )
    }
}

/// Equipment-derived role of a land unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitRole {
    Default,
    Soldier,
    Dragoon,
    Scout,
    Missionary,
    Pioneer,
}

impl UnitRole {
    pub fn is_offensive(self) -> bool {
        matches!(self, UnitRole::Soldier | UnitRole::Dragoon)
    }

    /// Role kept after losing a battle, if the unit survives at all.
    pub fn downgrade(self) -> Option<UnitRole> {
        match self {
            UnitRole::Dragoon => Some(UnitRole::Soldier),
            UnitRole::Soldier | UnitRole::Scout | UnitRole::Pioneer => Some(UnitRole::Default),
            UnitRole::Default | UnitRole::Missionary => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    Colonial,
    Rebel,
    Independent,
    Royal,
    Native,
}

impl PlayerKind {
    pub fn is_european(self) -> bool {
        matches!(
            self,
            PlayerKind::Colonial | PlayerKind::Rebel | PlayerKind::Independent
        )
    }
}

/// Where a unit currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Location {
    Tile { position: Position },
    Settlement { settlement: SettlementId },
    Europe,
    HighSeas,
    Carrier { unit: UnitId },
}

impl Location {
    pub const fn tile(position: Position) -> Self {
        Location::Tile { position }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Ocean,
    HighSeas,
    Plains,
    Grassland,
    Forest,
    Hills,
    Mountains,
}

impl Terrain {
    pub fn is_water(self) -> bool {
        matches!(self, Terrain::Ocean | Terrain::HighSeas)
    }
}

/// Classification of a directional move attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    Move,
    MoveHighSeas,
    ExploreLostCityRumour,
    AttackUnit,
    AttackSettlement,
    Embark,
    EnterNativeSettlementWithScout,
    EnterNativeSettlementWithMissionary,
    EnterNativeSettlementWithColonist,
    EnterForeignColonyWithScout,
    EnterSettlementWithCarrierAndGoods,
    MoveNoAccessBeached,
    MoveNoAccessContact,
    MoveNoAccessGoods,
    MoveNoAccessLand,
    MoveNoAccessMissionBan,
    MoveNoAccessSettlement,
    MoveNoAccessSkill,
    MoveNoAccessTrade,
    MoveNoAccessWar,
    MoveNoAccessWater,
    MoveNoAttackCivilian,
    MoveNoAttackMarine,
    MoveNoMoves,
    MoveNoTile,
}

impl MoveType {
    pub fn is_legal(self) -> bool {
        !matches!(
            self,
            MoveType::MoveNoAccessBeached
                | MoveType::MoveNoAccessContact
                | MoveType::MoveNoAccessGoods
                | MoveType::MoveNoAccessLand
                | MoveType::MoveNoAccessMissionBan
                | MoveType::MoveNoAccessSettlement
                | MoveType::MoveNoAccessSkill
                | MoveType::MoveNoAccessTrade
                | MoveType::MoveNoAccessWar
                | MoveType::MoveNoAccessWater
                | MoveType::MoveNoAttackCivilian
                | MoveType::MoveNoAttackMarine
                | MoveType::MoveNoMoves
                | MoveType::MoveNoTile
        )
    }

    pub fn is_attack(self) -> bool {
        matches!(self, MoveType::AttackUnit | MoveType::AttackSettlement)
    }

    /// Legal moves that relocate the unit by one tile.
    pub fn is_progress(self) -> bool {
        matches!(
            self,
            MoveType::Move | MoveType::MoveHighSeas | MoveType::ExploreLostCityRumour
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FatherCategory {
    Trade,
    Exploration,
    Military,
    Political,
    Religious,
}

impl FatherCategory {
    pub const ALL: [FatherCategory; 5] = [
        FatherCategory::Trade,
        FatherCategory::Exploration,
        FatherCategory::Military,
        FatherCategory::Political,
        FatherCategory::Religious,
    ];
}

/// Crown actions that may fire when a new year begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonarchAction {
    RaiseTax,
    AddToRef,
    DeclareWar,
    OfferMercenaries,
}

impl MonarchAction {
    /// Actions whose outcome depends on the player's answer.
    pub fn needs_answer(self) -> bool {
        matches!(self, MonarchAction::RaiseTax | MonarchAction::OfferMercenaries)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoutAction {
    Speak,
    Tribute,
    Attack,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoutColonyAction {
    Negotiate,
    Spy,
    Attack,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionaryAction {
    Establish,
    Denounce,
    Incite,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoutOutcome {
    Expert,
    Tales { revealed: u32 },
    Beads { gold: u32 },
    Nothing,
    Died,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RumourOutcome {
    Nothing,
    Treasure { gold: u32 },
    Colonist { unit: UnitId },
    BurialGround { native: PlayerId },
    ExpeditionVanishes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatResult {
    AttackerWins,
    DefenderWins,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VictoryReason {
    RefDefeated,
    SoleEuropean,
    SoleHuman,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoodsAmount {
    pub goods: GoodsTypeId,
    pub amount: u32,
}

impl GoodsAmount {
    pub const fn new(goods: GoodsTypeId, amount: u32) -> Self {
        Self { goods, amount }
    }
}
