//! Local copy of one player's visibility-filtered world.
//!
//! Seeded from a full `WorldView` and kept current by applying the deltas the
//! server sends. The server's checksum for the same view travels alongside so
//! drift can be detected and repaired with a resync.

use colonia_protocol::wire::{view_hash, WireError};
use colonia_protocol::{
    Delta, Location, Notice, ObjectId, ObjectSnapshot, Patch, PlayerId, PlayerSnapshot, Position,
    PrivatePatch, PublicPatch, SettlementId, SettlementSnapshot, SettlementView, Stance,
    StanceEntry, TileSnapshot, UnitId, UnitSnapshot, WorldView,
};
use tracing::debug;

/// What the replica learned while applying a batch, beyond the state itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Applied {
    pub turn_changed: bool,
    pub game_ended: bool,
    pub notices: Vec<Notice>,
}

#[derive(Clone, Debug)]
pub struct Replica {
    view: WorldView,
    /// Checksum the server attached to the last state it sent.
    server_checksum: u64,
}

impl Replica {
    pub fn new(view: WorldView, checksum: u64) -> Self {
        Self {
            view,
            server_checksum: checksum,
        }
    }

    pub fn view(&self) -> &WorldView {
        &self.view
    }

    pub fn viewer(&self) -> Option<PlayerId> {
        self.view.viewer
    }

    pub fn server_checksum(&self) -> u64 {
        self.server_checksum
    }

    /// Hash of the local view, comparable with the server's checksum.
    pub fn local_checksum(&self) -> Result<u64, WireError> {
        view_hash(&self.view)
    }

    pub fn in_sync(&self) -> Result<bool, WireError> {
        Ok(self.local_checksum()? == self.server_checksum)
    }

    pub fn is_our_turn(&self) -> bool {
        self.view.viewer == Some(self.view.current_player) && !self.view.game_over
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitSnapshot> {
        self.view.units.iter().find(|u| u.id == id)
    }

    pub fn unit_position(&self, id: UnitId) -> Option<Position> {
        match self.unit(id)?.location {
            Location::Tile { position } => Some(position),
            Location::Settlement { settlement } => self.settlement(settlement).map(|s| s.position),
            _ => None,
        }
    }

    pub fn settlement(&self, id: SettlementId) -> Option<&SettlementSnapshot> {
        self.view.settlements.iter().find(|s| s.id == id)
    }

    pub fn settlement_at(&self, position: Position) -> Option<&SettlementSnapshot> {
        self.view.settlements.iter().find(|s| s.position == position)
    }

    pub fn units_at(&self, position: Position) -> impl Iterator<Item = &UnitSnapshot> {
        self.view
            .units
            .iter()
            .filter(move |u| u.location == Location::tile(position))
    }

    pub fn tile(&self, position: Position) -> Option<&TileSnapshot> {
        self.view.tiles.iter().find(|t| t.position == position)
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.view.players.iter().find(|p| p.id == id)
    }

    pub fn stance(&self, a: PlayerId, b: PlayerId) -> Stance {
        self.view
            .stances
            .iter()
            .find(|s| (s.a, s.b) == (a, b) || (s.a, s.b) == (b, a))
            .map(|s| s.stance)
            .unwrap_or(Stance::Uncontacted)
    }

    /// Replaces the whole view after a (re)sync.
    pub fn reset(&mut self, view: WorldView, checksum: u64) {
        self.view = view;
        self.server_checksum = checksum;
    }

    /// Applies one server batch and records the checksum that came with it.
    pub fn apply(&mut self, deltas: &[Delta], checksum: u64) -> Applied {
        let mut applied = Applied::default();
        for delta in deltas {
            self.apply_one(delta, &mut applied);
        }
        self.server_checksum = checksum;
        applied
    }

    fn apply_one(&mut self, delta: &Delta, applied: &mut Applied) {
        match delta {
            Delta::Update { object } => self.upsert(object.clone()),
            Delta::Partial { patch } => match patch {
                Patch::Private(patch) => self.apply_private(patch),
                Patch::Public(patch) => self.apply_public(patch),
            },
            Delta::Stance {
                player,
                other,
                stance,
            } => self.set_stance(*player, *other, *stance),
            Delta::Moved { unit, to, .. } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.location = *to;
                }
            }
            Delta::Disappeared { object } | Delta::Disposed { object } => self.remove(*object),
            Delta::Attack { .. } => {}
            Delta::Message { notice } => applied.notices.push(notice.clone()),
            Delta::TurnChanged { turn, player } => {
                applied.turn_changed |= self.view.turn != *turn || self.view.current_player != *player;
                self.view.turn = *turn;
                self.view.current_player = *player;
            }
            Delta::GameEnded { .. } => {
                self.view.game_over = true;
                applied.game_ended = true;
            }
        }
    }

    fn upsert(&mut self, object: ObjectSnapshot) {
        match object {
            ObjectSnapshot::Unit(unit) => {
                upsert_by(&mut self.view.units, unit, |u| u.id);
            }
            ObjectSnapshot::Settlement(settlement) => {
                upsert_by(&mut self.view.settlements, settlement, |s| s.id);
            }
            ObjectSnapshot::Tile(tile) => {
                // Row-major, like the server's map iteration.
                upsert_by(&mut self.view.tiles, tile, |t| (t.position.y, t.position.x));
            }
            ObjectSnapshot::Player(player) => {
                upsert_by(&mut self.view.players, player, |p| p.id);
            }
            ObjectSnapshot::TradeRoute(route) => {
                upsert_by(&mut self.view.trade_routes, route, |r| r.id);
            }
        }
    }

    fn remove(&mut self, object: ObjectId) {
        match object {
            ObjectId::Unit(id) => self.view.units.retain(|u| u.id != id),
            ObjectId::Settlement(id) => self.view.settlements.retain(|s| s.id != id),
            ObjectId::Tile(position) => self.view.tiles.retain(|t| t.position != position),
            ObjectId::Player(id) => self.view.players.retain(|p| p.id != id),
            ObjectId::TradeRoute(id) => self.view.trade_routes.retain(|r| r.id != id),
        }
    }

    fn set_stance(&mut self, a: PlayerId, b: PlayerId, stance: Stance) {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        match self
            .view
            .stances
            .iter_mut()
            .find(|s| (s.a, s.b) == (a, b) || (s.a, s.b) == (b, a))
        {
            Some(entry) => entry.stance = stance,
            None => {
                self.view.stances.push(StanceEntry { a, b, stance });
                self.view.stances.sort_by_key(|s| (s.a, s.b));
            }
        }
    }

    fn apply_private(&mut self, patch: &PrivatePatch) {
        match patch {
            PrivatePatch::Gold { gold } => {
                if let Some(p) = self.me_mut() {
                    p.gold = Some(*gold);
                }
            }
            PrivatePatch::Tax { tax } => {
                if let Some(p) = self.me_mut() {
                    p.tax = Some(*tax);
                }
            }
            PrivatePatch::Immigration { points } => {
                if let Some(p) = self.me_mut() {
                    p.immigration = Some(*points);
                }
            }
            PrivatePatch::Liberty { points } => {
                if let Some(p) = self.me_mut() {
                    p.liberty = Some(*points);
                }
            }
            PrivatePatch::FatherOffers { offers } => {
                if let Some(p) = self.me_mut() {
                    p.father_offers = offers.clone();
                }
            }
            PrivatePatch::CurrentFather { father } => {
                if let Some(p) = self.me_mut() {
                    p.current_father = *father;
                }
            }
            PrivatePatch::MarketEntry { entry } => {
                if let Some(p) = self.me_mut() {
                    match p.market.iter_mut().find(|e| e.goods == entry.goods) {
                        Some(existing) => *existing = *entry,
                        None => p.market.push(*entry),
                    }
                }
            }
            PrivatePatch::MovesLeft { unit, moves_left } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.moves_left = Some(*moves_left);
                }
            }
            PrivatePatch::UnitState { unit, state } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.state = *state;
                }
            }
            PrivatePatch::Destination { unit, destination } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.destination = *destination;
                }
            }
            PrivatePatch::Cargo { unit, cargo } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.cargo = cargo.clone();
                }
            }
            PrivatePatch::ColonyGoods { settlement, goods } => {
                if let Some(SettlementView::Colony { goods: held, .. }) = self.settlement_view_mut(*settlement) {
                    *held = Some(goods.clone());
                }
            }
            PrivatePatch::SettlementAlarm { settlement, level } => {
                if let Some(SettlementView::Native { alarm, .. }) = self.settlement_view_mut(*settlement) {
                    *alarm = Some(*level);
                }
            }
            PrivatePatch::LearnableSkill { settlement, skill } => {
                if let Some(SettlementView::Native {
                    learnable_skill, ..
                }) = self.settlement_view_mut(*settlement)
                {
                    *learnable_skill = *skill;
                }
            }
        }
    }

    fn apply_public(&mut self, patch: &PublicPatch) {
        match patch {
            PublicPatch::Score { player, score } => {
                if let Some(p) = self.player_mut(*player) {
                    p.score = *score;
                }
            }
            PublicPatch::PlayerDead { player } => {
                if let Some(p) = self.player_mut(*player) {
                    p.dead = true;
                }
            }
            PublicPatch::PlayerKind { player, kind } => {
                if let Some(p) = self.player_mut(*player) {
                    p.kind = *kind;
                }
            }
            PublicPatch::FatherJoined { player, father } => {
                if let Some(p) = self.player_mut(*player) {
                    if !p.fathers.contains(father) {
                        p.fathers.push(*father);
                    }
                }
            }
            PublicPatch::Missionary { settlement, owner } => {
                if let Some(SettlementView::Native { missionary, .. }) = self.settlement_view_mut(*settlement) {
                    *missionary = *owner;
                }
            }
            PublicPatch::TileOwner { position, owner } => {
                if let Some(t) = self.view.tiles.iter_mut().find(|t| t.position == *position) {
                    t.owner = *owner;
                }
            }
            PublicPatch::UnitRole { unit, role } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.role = *role;
                }
            }
            PublicPatch::UnitType { unit, unit_type } => {
                if let Some(u) = self.unit_mut(*unit) {
                    u.unit_type = *unit_type;
                }
            }
        }
    }

    fn me_mut(&mut self) -> Option<&mut PlayerSnapshot> {
        let viewer = self.view.viewer?;
        self.player_mut(viewer)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerSnapshot> {
        self.view.players.iter_mut().find(|p| p.id == id)
    }

    fn unit_mut(&mut self, id: UnitId) -> Option<&mut UnitSnapshot> {
        let found = self.view.units.iter_mut().find(|u| u.id == id);
        if found.is_none() {
            debug!(?id, "patch for a unit outside the replica");
        }
        found
    }

    fn settlement_view_mut(&mut self, id: SettlementId) -> Option<&mut SettlementView> {
        self.view
            .settlements
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| &mut s.view)
    }
}

fn upsert_by<T, K: Ord>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) {
    let k = key(&item);
    match items.binary_search_by(|existing| key(existing).cmp(&k)) {
        Ok(index) => items[index] = item,
        Err(index) => items.insert(index, item),
    }
}
