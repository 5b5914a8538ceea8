use colonia_protocol::{
    GoodsAmount, GoodsTypeId, Location, PlayerId, PlayerKind, PrivatePatch, Rejection, Terrain,
    UnitId, UnitRole, UnitState, UnitTypeId,
};
use tracing::info;

use crate::change::ChangeSet;
use crate::controller::GameEngine;
use crate::error::{reject, GameError};
use crate::world::Orders;

/// Recruitable immigrants and their relative odds.
const RECRUIT_POOL: [(&str, u32); 3] = [
    ("free_colonist", 5),
    ("indentured_servant", 3),
    ("petty_criminal", 2),
];

impl GameEngine {
    fn require_crown_access(&self, player: PlayerId) -> Result<(), GameError> {
        if self.world.player(player)?.kind != PlayerKind::Colonial {
            return reject(Rejection::NotInEurope);
        }
        Ok(())
    }

    /// Current price of the next recruit; falls as immigration accumulates.
    pub fn recruit_price(&self, player: PlayerId) -> Result<u32, GameError> {
        let p = self.world.player(player)?;
        let o = &self.world.options;
        let required = p.immigration_required.max(1) as i64;
        let missing = (required - p.immigration as i64).clamp(0, required);
        let price = o.recruit_price_base as i64 * missing / required;
        Ok(price.max(o.recruit_price_min as i64) as u32)
    }

    pub(super) fn recruit_unit(&mut self, player: PlayerId, cs: &mut ChangeSet) -> Result<(), GameError> {
        self.require_crown_access(player)?;
        let price = self.recruit_price(player)?;
        self.spend_gold(player, price as i64, cs)?;
        let weights: Vec<u32> = RECRUIT_POOL.iter().map(|(_, w)| *w).collect();
        let pick = self.world.rng.pick_weighted(&weights).unwrap_or(0);
        let unit_type = self
            .world
            .rules
            .unit_type_id(RECRUIT_POOL[pick].0)
            .unwrap_or(self.world.rules.special.colonist);
        let unit = self
            .world
            .spawn_unit(player, unit_type, UnitRole::Default, Location::Europe);
        info!(?player, ?unit, price, "immigrant recruited");
        cs.add_unit(&self.world, unit);
        Ok(())
    }

    pub(super) fn train_unit(
        &mut self,
        player: PlayerId,
        unit_type: UnitTypeId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.require_crown_access(player)?;
        let Some(t) = self.world.rules.unit_type(unit_type) else {
            return reject(Rejection::UnknownUnitType);
        };
        if t.price == 0 || t.native || t.royal {
            return reject(Rejection::UnknownUnitType);
        }
        let price = t.price;
        self.spend_gold(player, price as i64, cs)?;
        let unit = self
            .world
            .spawn_unit(player, unit_type, UnitRole::Default, Location::Europe);
        info!(?player, ?unit, price, "unit trained");
        cs.add_unit(&self.world, unit);
        Ok(())
    }

    pub(super) fn sail_to_europe(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        self.require_crown_access(player)?;
        let sail_turns = self.world.options.sail_turns;
        let work_left = match (u.state, u.location) {
            (UnitState::ToAmerica, _) => sail_turns.saturating_sub(u.work_left).max(1),
            (_, Location::Tile { position })
                if self.world.is_naval(&u)
                    && self.world.map.terrain(position) == Some(Terrain::HighSeas) =>
            {
                sail_turns
            }
            _ => return reject(Rejection::NotOnHighSeas),
        };
        self.sessions.close_for_unit(&mut self.world, unit);
        let from_position = self.world.unit_position(unit);
        {
            let u = self.world.unit_mut(unit)?;
            u.location = Location::HighSeas;
            u.state = UnitState::ToEurope;
            u.work_left = work_left;
            u.moves_left = 0;
            if matches!(u.orders, Orders::Goto { destination: Location::Europe }) {
                u.orders = Orders::None;
            }
        }
        info!(?player, ?unit, work_left, "sailing to Europe");
        cs.add_move(unit, player, u.location, from_position, Location::HighSeas);
        cs.add_private(player, PrivatePatch::UnitState { unit, state: UnitState::ToEurope });
        cs.add_private(player, PrivatePatch::MovesLeft { unit, moves_left: 0 });
        Ok(())
    }

    pub(super) fn sail_to_america(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        if !self.world.is_naval(&u) || u.location != Location::Europe {
            return reject(Rejection::NotInEurope);
        }
        let work_left = self.world.options.sail_turns;
        {
            let u = self.world.unit_mut(unit)?;
            u.location = Location::HighSeas;
            u.state = UnitState::ToAmerica;
            u.work_left = work_left;
            u.moves_left = 0;
        }
        for passenger in self.world.units_aboard(unit) {
            self.world.unit_mut(passenger)?.state = UnitState::Sentry;
        }
        info!(?player, ?unit, "sailing to America");
        cs.add_move(unit, player, Location::Europe, None, Location::HighSeas);
        cs.add_private(player, PrivatePatch::UnitState { unit, state: UnitState::ToAmerica });
        Ok(())
    }

    pub(super) fn equip_role(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        role: UnitRole,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        if self.world.is_naval(&u) {
            return reject(Rejection::InvalidRole);
        }
        if u.role == role {
            return Ok(());
        }
        let goods_of = |r: UnitRole| -> Vec<GoodsAmount> {
            self.world
                .rules
                .role(r)
                .map(|t| t.goods.clone())
                .unwrap_or_default()
        };
        let returned = goods_of(u.role);
        let needed = goods_of(role);

        match u.location {
            Location::Settlement { settlement } => {
                let colony = self.own_colony_mut(player, settlement)?;
                for g in &returned {
                    colony.add_goods(g.goods, g.amount);
                }
                for g in &needed {
                    if !colony.remove_goods(g.goods, g.amount) {
                        return reject(Rejection::InsufficientGoods);
                    }
                }
                let goods = colony.goods_list();
                cs.add_private(player, PrivatePatch::ColonyGoods { settlement, goods });
                let offensive = role.is_offensive();
                self.world.unit_mut(unit)?.state = if offensive {
                    UnitState::Active
                } else {
                    UnitState::InColony
                };
            }
            Location::Europe => {
                self.require_crown_access(player)?;
                for g in &returned {
                    self.sell_in_europe(player, g.goods, g.amount, cs)?;
                }
                for g in &needed {
                    self.buy_in_europe(player, g.goods, g.amount, cs)?;
                }
            }
            _ => return reject(Rejection::InvalidRole),
        }
        info!(?player, ?unit, ?role, "role equipped");
        self.change_role(unit, role, cs)
    }

    pub(super) fn buy_in_europe(
        &mut self,
        player: PlayerId,
        goods: GoodsTypeId,
        amount: u32,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.require_crown_access(player)?;
        let market = &self.world.player(player)?.market;
        if market.is_boycotted(goods) {
            return reject(Rejection::Boycotted);
        }
        if !market.has(goods) {
            return reject(Rejection::InsufficientGoods);
        }
        let cost = market.cost_to_buy(goods, amount);
        self.spend_gold(player, cost, cs)?;
        let market = &mut self.world.player_mut(player)?.market;
        market.remove_stock(goods, amount);
        if let Some(entry) = market.entry(goods) {
            cs.add_private(player, PrivatePatch::MarketEntry { entry });
        }
        Ok(())
    }

    pub(super) fn sell_in_europe(
        &mut self,
        player: PlayerId,
        goods: GoodsTypeId,
        amount: u32,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.require_crown_access(player)?;
        let p = self.world.player(player)?;
        if p.market.is_boycotted(goods) {
            return reject(Rejection::Boycotted);
        }
        if !p.market.has(goods) {
            return reject(Rejection::InsufficientGoods);
        }
        let proceeds = p.market.sale_proceeds(goods, amount, p.tax);
        self.earn_gold(player, proceeds, cs)?;
        let market = &mut self.world.player_mut(player)?.market;
        market.add_stock(goods, amount);
        if let Some(entry) = market.entry(goods) {
            cs.add_private(player, PrivatePatch::MarketEntry { entry });
        }
        Ok(())
    }
}
