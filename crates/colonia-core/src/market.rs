use std::collections::{BTreeMap, BTreeSet};

use colonia_protocol::{GoodsTypeId, MarketEntry};

use crate::rules::Rules;

const MAX_PRICE: u32 = 19;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Stock {
    amount: u32,
    initial_amount: u32,
    initial_price: u32,
}

/// A player's European market. Prices follow stock: scarcity raises them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Market {
    stock: BTreeMap<GoodsTypeId, Stock>,
    boycotted: BTreeSet<GoodsTypeId>,
}

impl Market {
    pub fn new(rules: &Rules) -> Self {
        let stock = rules
            .storable_goods()
            .map(|g| {
                (
                    g.id,
                    Stock {
                        amount: g.initial_amount,
                        initial_amount: g.initial_amount,
                        initial_price: g.initial_price,
                    },
                )
            })
            .collect();
        Self {
            stock,
            boycotted: BTreeSet::new(),
        }
    }

    pub fn has(&self, goods: GoodsTypeId) -> bool {
        self.stock.contains_key(&goods)
    }

    pub fn goods(&self) -> impl Iterator<Item = GoodsTypeId> + '_ {
        self.stock.keys().copied()
    }

    /// Unit price the market pays.
    pub fn sell_price(&self, goods: GoodsTypeId) -> u32 {
        let Some(s) = self.stock.get(&goods) else {
            return 0;
        };
        let scaled = (s.initial_price as u64 * s.initial_amount as u64) / (s.amount.max(1) as u64);
        scaled.clamp(1, MAX_PRICE as u64) as u32
    }

    /// Unit price the market charges.
    pub fn buy_price(&self, goods: GoodsTypeId) -> u32 {
        self.sell_price(goods) + 1
    }

    pub fn cost_to_buy(&self, goods: GoodsTypeId, amount: u32) -> i64 {
        self.buy_price(goods) as i64 * amount as i64
    }

    /// Net proceeds after the crown's tax.
    pub fn sale_proceeds(&self, goods: GoodsTypeId, amount: u32, tax: u8) -> i64 {
        let gross = self.sell_price(goods) as i64 * amount as i64;
        gross * (100 - tax.min(100) as i64) / 100
    }

    pub fn remove_stock(&mut self, goods: GoodsTypeId, amount: u32) {
        if let Some(s) = self.stock.get_mut(&goods) {
            s.amount = s.amount.saturating_sub(amount);
        }
    }

    pub fn add_stock(&mut self, goods: GoodsTypeId, amount: u32) {
        if let Some(s) = self.stock.get_mut(&goods) {
            s.amount = s.amount.saturating_add(amount);
        }
    }

    /// Removes `percent` of the stock. Returns true if the price moved.
    pub fn decay(&mut self, goods: GoodsTypeId, percent: u32) -> bool {
        let before = self.sell_price(goods);
        if let Some(s) = self.stock.get_mut(&goods) {
            let lost = (s.amount as u64 * percent.min(100) as u64 / 100) as u32;
            s.amount -= lost;
        }
        before != self.sell_price(goods)
    }

    pub fn amount(&self, goods: GoodsTypeId) -> u32 {
        self.stock.get(&goods).map_or(0, |s| s.amount)
    }

    pub fn boycott(&mut self, goods: GoodsTypeId) {
        self.boycotted.insert(goods);
    }

    pub fn is_boycotted(&self, goods: GoodsTypeId) -> bool {
        self.boycotted.contains(&goods)
    }

    pub fn entry(&self, goods: GoodsTypeId) -> Option<MarketEntry> {
        let s = self.stock.get(&goods)?;
        Some(MarketEntry {
            goods,
            buy_price: self.buy_price(goods),
            sell_price: self.sell_price(goods),
            amount: s.amount,
            boycotted: self.is_boycotted(goods),
        })
    }

    pub fn entries(&self) -> Vec<MarketEntry> {
        self.stock.keys().filter_map(|g| self.entry(*g)).collect()
    }
}
