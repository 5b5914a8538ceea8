use colonia_protocol::{
    CombatResult, DecisionRequest, Location, Notice, ObjectId, PlayerId, PlayerKind, Position,
    SettlementId, Stance, UnitId, UnitState,
};
use tracing::info;

use crate::change::{ChangeSet, See};
use crate::combat::best_defender;
use crate::controller::GameEngine;
use crate::decision::{confirm, DecisionSource};
use crate::error::GameError;
use crate::tension::{TENSION_ADD_SETTLEMENT_ATTACKED, TENSION_ADD_UNIT_DESTROYED};

impl GameEngine {
    /// Sequences one attack: confirm, resolve, apply, notify.
    pub(super) fn attack(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        target: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let settlement = self.world.settlement_at(target);
        let Some(enemy) = self.defending_player(player, target) else {
            return Err(GameError::Invariant(format!("attack on empty tile {target:?}")));
        };

        let piracy = self.world.has_piracy(self.world.unit(unit)?)
            || self
                .world
                .units_at(target)
                .into_iter()
                .filter_map(|id| self.world.units.get(id))
                .any(|u| u.owner == enemy && self.world.has_piracy(u));
        if !piracy && !self.world.at_war(player, enemy) {
            let request = DecisionRequest::ConfirmHostile {
                unit,
                target: enemy,
            };
            if !confirm(decisions, player, request)? {
                return Ok(());
            }
            self.declare_war(player, enemy, cs);
        }

        self.set_moves(unit, 0, cs)?;
        let Some(defender) = best_defender(&self.world, target, enemy) else {
            // Nobody left to defend the settlement.
            return match settlement {
                Some(settlement) => self.settlement_falls(player, unit, settlement, cs),
                None => Err(GameError::Invariant(format!("no defender at {target:?}"))),
            };
        };

        let result = self.combat.resolve(&mut self.world, unit, defender)?;
        info!(?player, ?unit, ?defender, ?result, "combat");
        let defender_object = match settlement {
            Some(s) => ObjectId::Settlement(s),
            None => ObjectId::Unit(defender),
        };
        cs.add_attack([player, enemy], Some(target), unit, defender_object, result);

        match result {
            CombatResult::AttackerWins => {
                let defender_fought = self.world.is_offensive(self.world.unit(defender)?);
                match settlement {
                    // A colony falls as soon as it is defended by a civilian.
                    Some(s) if self.world.settlement(s)?.is_colony() && !defender_fought => {
                        self.settlement_falls(player, unit, s, cs)?;
                    }
                    Some(s) => {
                        self.lose_battle(defender, player, cs)?;
                        if best_defender(&self.world, target, enemy).is_none() {
                            self.settlement_falls(player, unit, s, cs)?;
                        }
                    }
                    None => self.lose_battle(defender, player, cs)?,
                }
            }
            CombatResult::DefenderWins => self.lose_battle(unit, enemy, cs)?,
        }
        Ok(())
    }

    fn defending_player(&self, attacker: PlayerId, target: Position) -> Option<PlayerId> {
        if let Some(s) = self.world.settlement_at(target) {
            return self.world.settlements.get(s).map(|s| s.owner);
        }
        self.world
            .units_at(target)
            .into_iter()
            .filter_map(|id| self.world.units.get(id))
            .map(|u| u.owner)
            .find(|owner| *owner != attacker)
    }

    pub(super) fn declare_war(&mut self, player: PlayerId, enemy: PlayerId, cs: &mut ChangeSet) {
        if self.world.at_war(player, enemy) {
            return;
        }
        info!(?player, ?enemy, "war declared");
        self.world.set_stance(player, enemy, Stance::War);
        cs.add_stance(See::All, player, enemy, Stance::War);
    }

    /// Applies a lost battle to `loser`: demotion, capture, or death.
    fn lose_battle(&mut self, loser: UnitId, winner: PlayerId, cs: &mut ChangeSet) -> Result<(), GameError> {
        let u = self.world.unit(loser)?.clone();
        let loser_kind = self.world.player(u.owner)?.kind;
        let winner_kind = self.world.player(winner)?.kind;

        if !self.world.is_naval(&u) {
            if let Some(role) = u.role.downgrade() {
                return self.change_role(loser, role, cs);
            }
        }

        let in_settlement = match u.location {
            Location::Settlement { settlement } => Some(settlement),
            _ => None,
        };
        let capturable = !self.world.is_naval(&u)
            && !self.world.is_offensive(&u)
            && in_settlement.is_none()
            && loser_kind.is_european()
            && winner_kind.is_european();
        if capturable {
            info!(unit = ?loser, from = ?u.owner, to = ?winner, "unit captured");
            self.world.transfer_unit(loser, winner);
            let captured = self.world.unit_mut(loser)?;
            captured.moves_left = 0;
            captured.state = UnitState::Active;
            cs.add(See::Only(u.owner), ObjectId::Unit(loser));
            cs.add_unit(&self.world, loser);
            return Ok(());
        }

        if loser_kind == PlayerKind::Native {
            match in_settlement {
                Some(settlement) => {
                    self.world
                        .modify_alarm(settlement, winner, TENSION_ADD_UNIT_DESTROYED)?;
                }
                None => self
                    .world
                    .modify_tension(u.owner, winner, TENSION_ADD_UNIT_DESTROYED),
            }
        }
        cs.add_dispose_unit(&self.world, loser);
        self.world.dispose_unit(loser);
        Ok(())
    }

    /// An undefended settlement changes hands (colony) or is burnt (native).
    fn settlement_falls(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let s = self.world.settlement(settlement)?.clone();
        if s.is_colony() {
            info!(?player, colony = %s.name, "colony captured");
            self.world.transfer_settlement(settlement, player)?;
            let from = self.location_of(unit)?;
            let from_position = self.world.unit_position(unit);
            let to = Location::Settlement { settlement };
            {
                let u = self.world.unit_mut(unit)?;
                u.location = to;
                u.state = UnitState::Active;
            }
            cs.add_move(unit, player, from, from_position, to);
            cs.add(See::perhaps_always(s.owner), ObjectId::Settlement(settlement));
            for tile in self.world.settlement_tiles(settlement) {
                cs.add(See::perhaps(), ObjectId::Tile(tile));
            }
            for inside in self.world.units_in(settlement) {
                cs.add(See::Only(s.owner), ObjectId::Unit(inside));
                cs.add_unit(&self.world, inside);
            }
            cs.add_message(
                See::All,
                Notice::ColonyCaptured {
                    settlement,
                    by: player,
                },
            );
            return Ok(());
        }

        let plunder = self
            .world
            .rng
            .between(self.world.options.plunder_min, self.world.options.plunder_max);
        info!(?player, settlement = %s.name, plunder, "native settlement destroyed");
        for inside in self.world.units_in(settlement) {
            cs.add_dispose_unit(&self.world, inside);
        }
        cs.add_dispose(&self.world, Some(s.owner), ObjectId::Settlement(settlement));
        let tiles = self.world.settlement_tiles(settlement);
        self.world.dispose_settlement(settlement)?;
        for tile in tiles {
            cs.add(See::perhaps(), ObjectId::Tile(tile));
        }
        self.world
            .modify_tension(s.owner, player, TENSION_ADD_SETTLEMENT_ATTACKED);
        self.earn_gold(player, plunder as i64, cs)?;
        cs.add_message(
            See::All,
            Notice::SettlementDestroyed {
                settlement,
                by: player,
                plunder,
            },
        );
        Ok(())
    }
}
