//! Tuning knobs for the simulation.
//!
//! Everything here is balance, not structure: it can be overridden per game
//! from YAML and every field has a default.

use serde::{Deserialize, Serialize};

use crate::rules::RulesError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    // Tribute
    pub tribute_cooldown_turns: u32,
    /// Share of the native treasury paid at happy/content alarm.
    pub tribute_fraction_pct_content: u32,
    /// Share of the native treasury paid at displeased alarm.
    pub tribute_fraction_pct_displeased: u32,
    pub tribute_tension: i32,

    // Incitement
    /// Base incitement price. The natives add the amount by which their
    /// tension toward the inciter exceeds their tension toward the target.
    pub incite_gold_floor: u32,

    // Market
    pub market_decay_pct: u32,
    pub market_extra_decay_pct: u32,

    // Missions
    pub conversion_chance_pct: u32,
    pub conversion_expert_bonus_pct: u32,
    pub convert_radius: i32,
    pub denounce_threshold: u32,
    pub denounce_expert_bonus: u32,

    // Scouting
    pub scout_weight_expert: u32,
    pub scout_weight_tales: u32,
    pub scout_weight_beads: u32,
    pub tales_radius: i32,
    pub beads_random: u32,
    pub beads_base: u32,
    pub expert_scout_beads_pct: u32,

    // Rumours
    pub rumour_weight_nothing: u32,
    pub rumour_weight_treasure: u32,
    pub rumour_weight_colonist: u32,
    pub rumour_weight_burial: u32,
    pub rumour_weight_vanish: u32,
    pub rumour_treasure_min: u32,
    pub rumour_treasure_max: u32,

    // Native trade
    pub haggle_margin_pct: u32,
    pub haggle_success_pct: u32,
    pub max_haggles: u32,
    pub gift_tension_divisor: u32,

    // Crown
    pub monarch_action_chance_pct: u32,
    pub monarch_weight_raise_tax: u32,
    pub monarch_weight_add_to_ref: u32,
    pub monarch_weight_declare_war: u32,
    pub monarch_weight_offer_mercenaries: u32,
    pub max_tax: u8,
    pub max_tax_raise: u8,
    pub mercenary_price: u32,

    // Europe
    pub sail_turns: u32,
    pub recruit_price_base: u32,
    pub recruit_price_min: u32,
    pub immigration_required_initial: i32,
    pub immigration_required_increment: i32,
    pub immigration_per_colony: i32,
    pub immigration_boost: i32,

    // Liberty and founding fathers
    pub bells_per_colonist: i32,
    /// Accumulated bells per colonist at which a colony is fully rebel.
    pub bells_per_rebel: i32,
    pub father_cost_base: i32,
    pub father_cost_increment: i32,
    pub liberty_boost_pct: i32,
    pub independence_rebel_pct: u32,

    // Combat
    pub plunder_min: u32,
    pub plunder_max: u32,

    // Victory and succession
    pub victory_defeat_ref: bool,
    pub victory_defeat_europeans: bool,
    pub victory_defeat_humans: bool,
    pub spanish_succession: bool,
    pub succession_rebel_pct: u32,

    // Diplomacy
    pub max_trade_rounds: u32,

    /// Debug: number of rounds during which AI turns are skipped entirely.
    pub ai_turn_skip: u32,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            tribute_cooldown_turns: 5,
            tribute_fraction_pct_content: 20,
            tribute_fraction_pct_displeased: 10,
            tribute_tension: 200,

            incite_gold_floor: 650,

            market_decay_pct: 5,
            market_extra_decay_pct: 10,

            conversion_chance_pct: 8,
            conversion_expert_bonus_pct: 10,
            convert_radius: 3,
            denounce_threshold: 50,
            denounce_expert_bonus: 20,

            scout_weight_expert: 10,
            scout_weight_tales: 40,
            scout_weight_beads: 50,
            tales_radius: 5,
            beads_random: 400,
            beads_base: 50,
            expert_scout_beads_pct: 110,

            rumour_weight_nothing: 40,
            rumour_weight_treasure: 30,
            rumour_weight_colonist: 15,
            rumour_weight_burial: 10,
            rumour_weight_vanish: 5,
            rumour_treasure_min: 50,
            rumour_treasure_max: 300,

            haggle_margin_pct: 10,
            haggle_success_pct: 60,
            max_haggles: 3,
            gift_tension_divisor: 50,

            monarch_action_chance_pct: 30,
            monarch_weight_raise_tax: 10,
            monarch_weight_add_to_ref: 10,
            monarch_weight_declare_war: 4,
            monarch_weight_offer_mercenaries: 4,
            max_tax: 70,
            max_tax_raise: 5,
            mercenary_price: 3000,

            sail_turns: 3,
            recruit_price_base: 200,
            recruit_price_min: 80,
            immigration_required_initial: 30,
            immigration_required_increment: 10,
            immigration_per_colony: 2,
            immigration_boost: 3,

            bells_per_colonist: 1,
            bells_per_rebel: 20,
            father_cost_base: 48,
            father_cost_increment: 24,
            liberty_boost_pct: 50,
            independence_rebel_pct: 50,

            plunder_min: 100,
            plunder_max: 500,

            victory_defeat_ref: true,
            victory_defeat_europeans: true,
            victory_defeat_humans: false,
            spanish_succession: true,
            succession_rebel_pct: 50,

            max_trade_rounds: 10,

            ai_turn_skip: 0,
        }
    }
}

impl GameOptions {
    pub fn from_yaml(yaml: &str) -> Result<Self, RulesError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &str) -> Result<Self, RulesError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Gold asked to turn natives against `target`, given the natives' raw
    /// tension toward the inciter and toward the target.
    pub fn incite_price(&self, toward_inciter: i32, toward_target: i32) -> u32 {
        let surcharge = toward_inciter.saturating_sub(toward_target).max(0) as u32;
        self.incite_gold_floor.saturating_add(surcharge)
    }
}
