//! Visibility-scoped change sets.
//!
//! Handlers mutate the world first and queue entries second, so `build` always
//! renders post-mutation truth. `build` is pure: it can be called once per
//! recipient against the same world without re-deriving anything.
//!
//! Disposal is the one exception to build-time visibility: its audience is
//! fixed when queued, from the object's last position before it was removed.

use std::collections::BTreeSet;

use colonia_protocol::{
    CombatResult, Delta, Location, Notice, ObjectId, ObjectSnapshot, Patch, PlayerId, Position,
    PrivatePatch, PublicPatch, Stance, UnitId, VictoryReason,
};

use crate::world::World;

/// Who a change reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum See {
    Only(PlayerId),
    All,
    AllExcept(PlayerId),
    /// Whoever can see the object at build time, plus `always`, minus `except`.
    Perhaps {
        always: Option<PlayerId>,
        except: Option<PlayerId>,
    },
}

impl See {
    pub fn perhaps() -> Self {
        See::Perhaps {
            always: None,
            except: None,
        }
    }

    pub fn perhaps_always(player: PlayerId) -> Self {
        See::Perhaps {
            always: Some(player),
            except: None,
        }
    }

    pub fn perhaps_except(player: PlayerId) -> Self {
        See::Perhaps {
            always: None,
            except: Some(player),
        }
    }

    fn includes(self, player: PlayerId, perhaps: impl FnOnce() -> bool) -> bool {
        match self {
            See::Only(p) => p == player,
            See::All => true,
            See::AllExcept(p) => p != player,
            See::Perhaps { always, except } => {
                if except == Some(player) {
                    false
                } else if always == Some(player) {
                    true
                } else {
                    perhaps()
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Entry {
    Object {
        see: See,
        object: ObjectId,
    },
    Private {
        player: PlayerId,
        patch: PrivatePatch,
    },
    Public {
        see: See,
        patch: PublicPatch,
    },
    Move {
        unit: UnitId,
        owner: PlayerId,
        from: Location,
        from_position: Option<Position>,
        to: Location,
    },
    Dispose {
        audience: BTreeSet<PlayerId>,
        object: ObjectId,
    },
    Stance {
        see: See,
        player: PlayerId,
        other: PlayerId,
        stance: Stance,
    },
    Attack {
        parties: [PlayerId; 2],
        at: Option<Position>,
        attacker: UnitId,
        defender: ObjectId,
        result: CombatResult,
    },
    Message {
        see: See,
        notice: Notice,
    },
    TurnChanged {
        turn: u32,
        player: PlayerId,
    },
    GameEnded {
        winner: Option<PlayerId>,
        reason: VictoryReason,
    },
}

/// Per-recipient visibility computed once per build.
struct Viewer<'a> {
    world: &'a World,
    player: PlayerId,
    visible: BTreeSet<Position>,
}

impl Viewer<'_> {
    fn sees(&self, object: ObjectId) -> bool {
        match object {
            ObjectId::Unit(id) => self.world.unit_visible_to(id, self.player, &self.visible),
            ObjectId::Settlement(id) => self.world.settlements.get(id).is_some_and(|s| {
                s.owner == self.player || self.visible.contains(&s.position)
            }),
            ObjectId::Tile(pos) => self.visible.contains(&pos),
            ObjectId::Player(_) => true,
            ObjectId::TradeRoute(id) => self
                .world
                .trade_routes
                .get(id)
                .is_some_and(|r| r.owner == self.player),
        }
    }

    fn snapshot(&self, object: ObjectId) -> Option<ObjectSnapshot> {
        let viewer = Some(self.player);
        match object {
            ObjectId::Unit(id) => self.world.unit_snapshot(id, viewer).map(ObjectSnapshot::Unit),
            ObjectId::Settlement(id) => self
                .world
                .settlement_snapshot(id, viewer)
                .map(ObjectSnapshot::Settlement),
            ObjectId::Tile(pos) => self.world.map.snapshot(pos).map(ObjectSnapshot::Tile),
            ObjectId::Player(id) => self
                .world
                .player_snapshot(id, viewer)
                .map(ObjectSnapshot::Player),
            ObjectId::TradeRoute(id) => self
                .world
                .trade_route_snapshot(id)
                .map(ObjectSnapshot::TradeRoute),
        }
    }

    fn alive(&self, object: ObjectId) -> bool {
        match object {
            ObjectId::Unit(id) => self.world.units.contains(id),
            ObjectId::Settlement(id) => self.world.settlements.contains(id),
            ObjectId::Tile(pos) => self.world.map.in_bounds(pos),
            ObjectId::Player(id) => self.world.players.get(id.index()).is_some(),
            ObjectId::TradeRoute(id) => self.world.trade_routes.contains(id),
        }
    }
}

fn private_subject(patch: &PrivatePatch) -> Option<ObjectId> {
    match patch {
        PrivatePatch::MovesLeft { unit, .. }
        | PrivatePatch::UnitState { unit, .. }
        | PrivatePatch::Destination { unit, .. }
        | PrivatePatch::Cargo { unit, .. } => Some(ObjectId::Unit(*unit)),
        PrivatePatch::ColonyGoods { settlement, .. }
        | PrivatePatch::SettlementAlarm { settlement, .. }
        | PrivatePatch::LearnableSkill { settlement, .. } => {
            Some(ObjectId::Settlement(*settlement))
        }
        _ => None,
    }
}

fn public_subject(patch: &PublicPatch) -> Option<ObjectId> {
    match patch {
        PublicPatch::Missionary { settlement, .. } => Some(ObjectId::Settlement(*settlement)),
        PublicPatch::TileOwner { position, .. } => Some(ObjectId::Tile(*position)),
        PublicPatch::UnitRole { unit, .. } | PublicPatch::UnitType { unit, .. } => {
            Some(ObjectId::Unit(*unit))
        }
        PublicPatch::Score { .. }
        | PublicPatch::PlayerDead { .. }
        | PublicPatch::PlayerKind { .. }
        | PublicPatch::FatherJoined { .. } => None,
    }
}

/// Accumulated changes from one operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<Entry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn extend(&mut self, other: ChangeSet) {
        self.entries.extend(other.entries);
    }

    /// Full object sync.
    pub fn add(&mut self, see: See, object: ObjectId) {
        self.entries.push(Entry::Object { see, object });
    }

    /// Owner-only field update.
    pub fn add_private(&mut self, player: PlayerId, patch: PrivatePatch) {
        self.entries.push(Entry::Private { player, patch });
    }

    pub fn add_public(&mut self, see: See, patch: PublicPatch) {
        self.entries.push(Entry::Public { see, patch });
    }

    /// Move hint plus location update. `from_position` is the unit's map
    /// position before the move.
    pub fn add_move(
        &mut self,
        unit: UnitId,
        owner: PlayerId,
        from: Location,
        from_position: Option<Position>,
        to: Location,
    ) {
        self.entries.push(Entry::Move {
            unit,
            owner,
            from,
            from_position,
            to,
        });
    }

    /// Queues a disposal. Must be called before the object is removed: the
    /// audience is everyone who can see it now, plus `owner`.
    pub fn add_dispose(&mut self, world: &World, owner: Option<PlayerId>, object: ObjectId) {
        let position = world.object_position(object);
        let mut audience = BTreeSet::new();
        for player in world.players.iter().filter(|p| !p.dead) {
            let visible = world.visible_tiles(player.id);
            let sees = match object {
                ObjectId::Unit(id) => world.unit_visible_to(id, player.id, &visible),
                _ => position.is_some_and(|p| visible.contains(&p)),
            };
            if sees {
                audience.insert(player.id);
            }
        }
        if let Some(owner) = owner.or_else(|| world.object_owner(object)) {
            audience.insert(owner);
        }
        self.entries.push(Entry::Dispose { audience, object });
    }

    /// Disposal of a unit and everything aboard. Call before removal.
    pub fn add_dispose_unit(&mut self, world: &World, unit: UnitId) {
        for passenger in world.units_aboard(unit) {
            self.add_dispose_unit(world, passenger);
        }
        let owner = world.units.get(unit).map(|u| u.owner);
        self.add_dispose(world, owner, ObjectId::Unit(unit));
    }

    pub fn add_stance(&mut self, see: See, player: PlayerId, other: PlayerId, stance: Stance) {
        self.entries.push(Entry::Stance {
            see,
            player,
            other,
            stance,
        });
    }

    pub fn add_attack(
        &mut self,
        parties: [PlayerId; 2],
        at: Option<Position>,
        attacker: UnitId,
        defender: ObjectId,
        result: CombatResult,
    ) {
        self.entries.push(Entry::Attack {
            parties,
            at,
            attacker,
            defender,
            result,
        });
    }

    pub fn add_message(&mut self, see: See, notice: Notice) {
        self.entries.push(Entry::Message { see, notice });
    }

    pub fn add_turn_changed(&mut self, turn: u32, player: PlayerId) {
        self.entries.push(Entry::TurnChanged { turn, player });
    }

    pub fn add_game_ended(&mut self, winner: Option<PlayerId>, reason: VictoryReason) {
        self.entries.push(Entry::GameEnded { winner, reason });
    }

    /// Queues a unit update for its owner and whoever can see it.
    pub fn add_unit(&mut self, world: &World, unit: UnitId) {
        if let Some(owner) = world.units.get(unit).map(|u| u.owner) {
            self.add(See::perhaps_always(owner), ObjectId::Unit(unit));
        }
    }

    /// Queues the owner's view of a player.
    pub fn add_player_private(&mut self, player: PlayerId) {
        self.add(See::Only(player), ObjectId::Player(player));
    }

    /// Queues newly explored tiles for a player.
    pub fn add_explored(&mut self, player: PlayerId, tiles: &[Position]) {
        for tile in tiles {
            self.add(See::Only(player), ObjectId::Tile(*tile));
        }
    }

    /// Renders what `player` learns from this change set.
    pub fn build(&self, world: &World, player: PlayerId) -> Vec<Delta> {
        let viewer = Viewer {
            world,
            player,
            visible: world.visible_tiles(player),
        };
        let disposed: BTreeSet<ObjectId> = self
            .entries
            .iter()
            .filter_map(|e| match e {
                Entry::Dispose { object, .. } => Some(*object),
                _ => None,
            })
            .collect();
        let live = |object: ObjectId| !disposed.contains(&object) && viewer.alive(object);

        let mut synced: BTreeSet<ObjectId> = BTreeSet::new();
        let mut out = Vec::new();
        let mut push_update = |object: ObjectId, out: &mut Vec<Delta>| {
            if !synced.insert(object) {
                return;
            }
            if let Some(snapshot) = viewer.snapshot(object) {
                out.push(Delta::Update { object: snapshot });
            }
        };

        for entry in &self.entries {
            match entry {
                Entry::Object { see, object } => {
                    if live(*object) && see.includes(player, || viewer.sees(*object)) {
                        push_update(*object, &mut out);
                    }
                }
                Entry::Private { player: p, patch } => {
                    if *p == player && private_subject(patch).is_none_or(live) {
                        out.push(Delta::Partial {
                            patch: Patch::Private(patch.clone()),
                        });
                    }
                }
                Entry::Public { see, patch } => {
                    let subject = public_subject(patch);
                    if subject.is_some_and(|s| !live(s)) {
                        continue;
                    }
                    if see.includes(player, || subject.is_none_or(|s| viewer.sees(s))) {
                        out.push(Delta::Partial {
                            patch: Patch::Public(patch.clone()),
                        });
                    }
                }
                Entry::Move {
                    unit,
                    owner,
                    from,
                    from_position,
                    to,
                } => {
                    let object = ObjectId::Unit(*unit);
                    if !live(object) {
                        continue;
                    }
                    let moved = Delta::Moved {
                        unit: *unit,
                        from: *from,
                        to: *to,
                    };
                    if *owner == player || viewer.sees(object) {
                        out.push(moved);
                        push_update(object, &mut out);
                    } else if from_position.is_some_and(|p| viewer.visible.contains(&p)) {
                        out.push(moved);
                        out.push(Delta::Disappeared { object });
                    }
                }
                Entry::Dispose { audience, object } => {
                    if audience.contains(&player) {
                        out.push(Delta::Disposed { object: *object });
                    }
                }
                Entry::Stance {
                    see,
                    player: a,
                    other,
                    stance,
                } => {
                    if see.includes(player, || *a == player || *other == player) {
                        out.push(Delta::Stance {
                            player: *a,
                            other: *other,
                            stance: *stance,
                        });
                    }
                }
                Entry::Attack {
                    parties,
                    at,
                    attacker,
                    defender,
                    result,
                } => {
                    if !live(ObjectId::Unit(*attacker)) || !live(*defender) {
                        continue;
                    }
                    let involved = parties.contains(&player);
                    if involved || at.is_some_and(|p| viewer.visible.contains(&p)) {
                        out.push(Delta::Attack {
                            attacker: *attacker,
                            defender: *defender,
                            result: *result,
                        });
                    }
                }
                Entry::Message { see, notice } => {
                    if see.includes(player, || false) {
                        out.push(Delta::Message {
                            notice: notice.clone(),
                        });
                    }
                }
                Entry::TurnChanged { turn, player: p } => out.push(Delta::TurnChanged {
                    turn: *turn,
                    player: *p,
                }),
                Entry::GameEnded { winner, reason } => out.push(Delta::GameEnded {
                    winner: *winner,
                    reason: *reason,
                }),
            }
        }
        out
    }

    /// Players who receive at least one delta.
    pub fn recipients(&self, world: &World) -> Vec<PlayerId> {
        world
            .players
            .iter()
            .filter(|p| !p.dead)
            .map(|p| p.id)
            .filter(|p| !self.build(world, *p).is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::WorldBuilder;
    use colonia_protocol::{Direction, PlayerKind, Terrain, UnitRole};

    struct Fixture {
        world: World,
        dutch: PlayerId,
        english: PlayerId,
        far: PlayerId,
        soldier: UnitId,
    }

    fn fixture() -> Fixture {
        let mut b = WorldBuilder::new(20, 10, Terrain::Plains).unwrap();
        let dutch = b.player("Dutch", PlayerKind::Colonial, true);
        let english = b.player("English", PlayerKind::Colonial, true);
        let far = b.player("French", PlayerKind::Colonial, true);
        let soldier = b.unit(dutch, "veteran_soldier", UnitRole::Soldier, Position::new(5, 5));
        b.unit(english, "free_colonist", UnitRole::Default, Position::new(6, 5));
        b.unit(far, "free_colonist", UnitRole::Default, Position::new(18, 5));
        Fixture {
            world: b.build().unwrap(),
            dutch,
            english,
            far,
            soldier,
        }
    }

    #[test]
    fn private_patch_reaches_only_its_player() {
        let f = fixture();
        let mut cs = ChangeSet::new();
        cs.add_private(f.dutch, PrivatePatch::Gold { gold: 42 });
        assert_eq!(cs.build(&f.world, f.dutch).len(), 1);
        assert!(cs.build(&f.world, f.english).is_empty());
    }

    #[test]
    fn perhaps_follows_line_of_sight() {
        let f = fixture();
        let mut cs = ChangeSet::new();
        cs.add_unit(&f.world, f.soldier);
        assert_eq!(cs.build(&f.world, f.dutch).len(), 1);
        assert_eq!(cs.build(&f.world, f.english).len(), 1);
        assert!(cs.build(&f.world, f.far).is_empty());
    }

    #[test]
    fn disposed_objects_only_appear_as_disposals() {
        let mut f = fixture();
        let mut cs = ChangeSet::new();
        cs.add_unit(&f.world, f.soldier);
        cs.add_dispose_unit(&f.world, f.soldier);
        f.world.dispose_unit(f.soldier);

        for player in [f.dutch, f.english] {
            let deltas = cs.build(&f.world, player);
            assert_eq!(
                deltas,
                vec![Delta::Disposed {
                    object: ObjectId::Unit(f.soldier)
                }]
            );
        }
        assert!(cs.build(&f.world, f.far).is_empty());
    }

    #[test]
    fn moving_out_of_sight_disappears() {
        let mut f = fixture();
        let from = Position::new(5, 5);
        let to = from.step(Direction::W);
        let mut cs = ChangeSet::new();
        {
            let unit = f.world.unit_mut(f.soldier).unwrap();
            unit.location = Location::tile(to);
        }
        cs.add_move(f.soldier, f.dutch, Location::tile(from), Some(from), Location::tile(to));

        let english = cs.build(&f.world, f.english);
        assert!(matches!(english[0], Delta::Moved { .. }));
        assert_eq!(
            english[1],
            Delta::Disappeared {
                object: ObjectId::Unit(f.soldier)
            }
        );
        let dutch = cs.build(&f.world, f.dutch);
        assert!(matches!(dutch[1], Delta::Update { .. }));
    }

    #[test]
    fn build_is_repeatable() {
        let f = fixture();
        let mut cs = ChangeSet::new();
        cs.add_unit(&f.world, f.soldier);
        cs.add_stance(See::All, f.dutch, f.english, Stance::War);
        cs.add_message(See::Only(f.english), Notice::FirstContact { other: f.dutch });
        assert_eq!(cs.build(&f.world, f.english), cs.build(&f.world, f.english));
    }
}
