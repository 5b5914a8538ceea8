//! Transaction sessions: short-lived negotiation locks between one unit and one
//! native settlement.
//!
//! Every open is paired with an explicit close. Sessions are never collected
//! implicitly; the turn controller closes whatever a player left open when the
//! player's turn ends.

use std::collections::BTreeMap;

use colonia_protocol::{PlayerId, Rejection, SettlementId, Stance, UnitId};

use crate::error::{reject, GameError};
use crate::world::World;

/// What a session was used for. At most one per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    Buy,
    Sell,
    Gift,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeSession {
    pub unit: UnitId,
    pub settlement: SettlementId,
    pub owner: PlayerId,
    pub moves_at_open: u32,
    pub action: Option<SessionAction>,
    pub can_buy: bool,
    pub can_sell: bool,
    pub can_gift: bool,
    pub haggles: u32,
}

impl TradeSession {
    pub fn action_taken(&self) -> bool {
        self.action.is_some()
    }

    /// Whether an action of this kind may still be taken.
    pub fn allows(&self, action: SessionAction) -> bool {
        if self.action_taken() {
            return false;
        }
        match action {
            SessionAction::Buy => self.can_buy,
            SessionAction::Sell => self.can_sell,
            SessionAction::Gift => self.can_gift,
        }
    }

    /// Capabilities are fixed here and never recomputed for the session's lifetime.
    fn compute(world: &World, unit: UnitId, settlement: SettlementId) -> Result<Self, GameError> {
        let u = world.unit(unit)?;
        let s = world.settlement(settlement)?;
        let at_war = world.stance(u.owner, s.owner) == Stance::War;
        let has_cargo = !u.cargo.is_empty();
        Ok(Self {
            unit,
            settlement,
            owner: u.owner,
            moves_at_open: u.moves_left,
            action: None,
            can_buy: !at_war,
            can_sell: !at_war && has_cargo,
            can_gift: true,
            haggles: 0,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: BTreeMap<(UnitId, SettlementId), TradeSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_open(&self, unit: UnitId, settlement: SettlementId) -> bool {
        self.sessions.contains_key(&(unit, settlement))
    }

    pub fn get(&self, unit: UnitId, settlement: SettlementId) -> Option<&TradeSession> {
        self.sessions.get(&(unit, settlement))
    }

    pub fn get_mut(&mut self, unit: UnitId, settlement: SettlementId) -> Option<&mut TradeSession> {
        self.sessions.get_mut(&(unit, settlement))
    }

    /// Opens a session, or returns the existing one. A fresh session zeroes the
    /// unit's moves; a unit can hold at most one session at a time.
    pub fn open(
        &mut self,
        world: &mut World,
        unit: UnitId,
        settlement: SettlementId,
    ) -> Result<&TradeSession, GameError> {
        let key = (unit, settlement);
        if !self.sessions.contains_key(&key) {
            if self.sessions.keys().any(|(u, _)| *u == unit) {
                return reject(Rejection::SessionBusy);
            }
            let session = TradeSession::compute(world, unit, settlement)?;
            world.unit_mut(unit)?.moves_left = 0;
            tracing::debug!(?unit, ?settlement, "trade session opened");
            self.sessions.insert(key, session);
        }
        self.sessions
            .get(&key)
            .ok_or(GameError::SessionNotOpen { unit, settlement })
    }

    /// Records an action against an open session.
    pub fn take_action(
        &mut self,
        unit: UnitId,
        settlement: SettlementId,
        action: SessionAction,
    ) -> Result<(), GameError> {
        let session = self
            .sessions
            .get_mut(&(unit, settlement))
            .ok_or(GameError::SessionNotOpen { unit, settlement })?;
        if session.action_taken() {
            return reject(Rejection::SessionActionTaken);
        }
        if !session.allows(action) {
            return reject(Rejection::CapabilityDenied);
        }
        session.action = Some(action);
        Ok(())
    }

    /// Counts a haggle attempt; returns the new count.
    pub fn haggle(&mut self, unit: UnitId, settlement: SettlementId) -> Result<u32, GameError> {
        let session = self
            .sessions
            .get_mut(&(unit, settlement))
            .ok_or(GameError::SessionNotOpen { unit, settlement })?;
        session.haggles += 1;
        Ok(session.haggles)
    }

    /// Closes a session, restoring moves if nothing was done with it.
    /// Closing a session that was never opened is a contract violation.
    pub fn close(
        &mut self,
        world: &mut World,
        unit: UnitId,
        settlement: SettlementId,
    ) -> Result<TradeSession, GameError> {
        let session = self
            .sessions
            .remove(&(unit, settlement))
            .ok_or(GameError::SessionNotOpen { unit, settlement })?;
        if !session.action_taken() {
            if let Some(u) = world.units.get_mut(unit) {
                u.moves_left = session.moves_at_open;
            }
        }
        tracing::debug!(?unit, ?settlement, action = ?session.action, "trade session closed");
        Ok(session)
    }

    /// Closes any session held by `unit`, if one is open.
    pub fn close_for_unit(&mut self, world: &mut World, unit: UnitId) -> Option<TradeSession> {
        let key = self.sessions.keys().find(|(u, _)| *u == unit).copied()?;
        self.close(world, key.0, key.1).ok()
    }

    /// End-of-turn expiry for everything a player left open.
    pub fn close_all_for_player(&mut self, world: &mut World, player: PlayerId) -> usize {
        let keys: Vec<_> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.owner == player)
            .map(|(k, _)| *k)
            .collect();
        let count = keys.len();
        for (unit, settlement) in keys {
            // Keys were just read from the store, so close cannot miss.
            let _ = self.close(world, unit, settlement);
        }
        count
    }

    /// Drops sessions that reference a disposed unit or settlement.
    pub fn discard_disposed(&mut self, world: &World) {
        self.sessions.retain(|(unit, settlement), _| {
            world.units.contains(*unit) && world.settlements.contains(*settlement)
        });
    }

    /// Runs a synchronous negotiation for AI-controlled units: capabilities are
    /// computed the same way but nothing persists past `body`.
    pub fn transient<T>(
        world: &mut World,
        unit: UnitId,
        settlement: SettlementId,
        body: impl FnOnce(&mut World, &mut TradeSession) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let mut session = TradeSession::compute(world, unit, settlement)?;
        world.unit_mut(unit)?.moves_left = 0;
        let result = body(world, &mut session)?;
        if !session.action_taken() {
            world.unit_mut(unit)?.moves_left = session.moves_at_open;
        }
        Ok(result)
    }
}

impl TradeSession {
    /// Marks an action on a transient session, with the same checks as the store.
    pub fn record(&mut self, action: SessionAction) -> Result<(), GameError> {
        if self.action_taken() {
            return reject(Rejection::SessionActionTaken);
        }
        if !self.allows(action) {
            return reject(Rejection::CapabilityDenied);
        }
        self.action = Some(action);
        Ok(())
    }
}
