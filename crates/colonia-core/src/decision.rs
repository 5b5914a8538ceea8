//! Sources of player decisions.
//!
//! The engine asks; a source either answers at once or returns `None`, in
//! which case the operation is abandoned with `GameError::DecisionRequired`
//! and nothing is mutated. Commands are deterministic given their answers, so
//! the caller gathers the answer and runs the command again.

use std::collections::{BTreeMap, VecDeque};

use colonia_protocol::{
    DecisionAnswer, DecisionRequest, MissionaryAction, NativeTradeAction, PlayerId,
    ResolvedDecision, ScoutAction, ScoutColonyAction, TradeStatus,
};

use crate::error::GameError;

pub trait DecisionSource {
    fn decide(&mut self, player: PlayerId, request: &DecisionRequest) -> Option<DecisionAnswer>;
}

/// Answers nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDecisions;

impl DecisionSource for NoDecisions {
    fn decide(&mut self, _: PlayerId, _: &DecisionRequest) -> Option<DecisionAnswer> {
        None
    }
}

/// Pre-recorded answers, consumed in order per player.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDecisions {
    queues: BTreeMap<PlayerId, VecDeque<DecisionAnswer>>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resolved(resolved: &[ResolvedDecision]) -> Self {
        let mut scripted = Self::new();
        for r in resolved {
            scripted.push(r.player, r.answer.clone());
        }
        scripted
    }

    pub fn push(&mut self, player: PlayerId, answer: DecisionAnswer) -> &mut Self {
        self.queues.entry(player).or_default().push_back(answer);
        self
    }

    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn decide(&mut self, player: PlayerId, _: &DecisionRequest) -> Option<DecisionAnswer> {
        self.queues.get_mut(&player)?.pop_front()
    }
}

/// Answers through a closure.
pub struct AutoDecisions<F>(pub F);

impl<F> DecisionSource for AutoDecisions<F>
where
    F: FnMut(PlayerId, &DecisionRequest) -> Option<DecisionAnswer>,
{
    fn decide(&mut self, player: PlayerId, request: &DecisionRequest) -> Option<DecisionAnswer> {
        (self.0)(player, request)
    }
}

/// Tries `first`, then falls back to `second` for the listed players.
pub struct Layered<'a> {
    pub first: &'a mut dyn DecisionSource,
    pub second: &'a mut dyn DecisionSource,
    pub fallback_for: Vec<PlayerId>,
}

impl DecisionSource for Layered<'_> {
    fn decide(&mut self, player: PlayerId, request: &DecisionRequest) -> Option<DecisionAnswer> {
        self.first.decide(player, request).or_else(|| {
            if self.fallback_for.contains(&player) {
                self.second.decide(player, request)
            } else {
                None
            }
        })
    }
}

/// Conservative answers for seats without a strategy attached: never escalate,
/// never spend, refuse what it is offered.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassiveDecisions;

impl DecisionSource for PassiveDecisions {
    fn decide(&mut self, _: PlayerId, request: &DecisionRequest) -> Option<DecisionAnswer> {
        Some(match request {
            DecisionRequest::ConfirmHostile { .. }
            | DecisionRequest::ConfirmIncite { .. }
            | DecisionRequest::LearnSkill { .. } => DecisionAnswer::Confirm(false),
            DecisionRequest::ConfirmHighSeas { .. } => DecisionAnswer::Confirm(true),
            DecisionRequest::AcceptTributeDemand { .. } => DecisionAnswer::Confirm(true),
            DecisionRequest::ChooseCarrier { candidates, .. } => {
                DecisionAnswer::Unit(*candidates.first()?)
            }
            DecisionRequest::ChooseDisembark { candidates, .. } => {
                DecisionAnswer::Units(candidates.clone())
            }
            DecisionRequest::ScoutSettlement { .. } => DecisionAnswer::Scout(ScoutAction::Speak),
            DecisionRequest::ScoutColony { .. } => {
                DecisionAnswer::ScoutColony(ScoutColonyAction::Cancel)
            }
            DecisionRequest::MissionarySettlement { .. } => {
                DecisionAnswer::Missionary(MissionaryAction::Establish)
            }
            DecisionRequest::SelectInciteTarget { .. } => DecisionAnswer::Player(None),
            DecisionRequest::SelectTributeAmount { .. } => DecisionAnswer::Amount(None),
            DecisionRequest::RespondToTrade { agreement } => {
                DecisionAnswer::Trade(agreement.clone().with_status(TradeStatus::Reject))
            }
            DecisionRequest::DraftTrade { .. } => return None,
            DecisionRequest::MonarchRaiseTax { .. } => DecisionAnswer::Confirm(true),
            DecisionRequest::MonarchMercenaries { .. } => DecisionAnswer::Confirm(false),
            DecisionRequest::NativeTrade { .. } => {
                DecisionAnswer::NativeTrade(NativeTradeAction::Done)
            }
        })
    }
}

/// Asks `player`, turning a missing answer into `DecisionRequired`.
pub(crate) fn ask(
    decisions: &mut dyn DecisionSource,
    player: PlayerId,
    request: DecisionRequest,
) -> Result<DecisionAnswer, GameError> {
    match decisions.decide(player, &request) {
        Some(answer) => Ok(answer),
        None => Err(GameError::DecisionRequired { player, request }),
    }
}

/// Asks for a yes/no answer.
pub(crate) fn confirm(
    decisions: &mut dyn DecisionSource,
    player: PlayerId,
    request: DecisionRequest,
) -> Result<bool, GameError> {
    let answer = ask(decisions, player, request.clone())?;
    answer
        .as_confirm()
        .ok_or(GameError::UnexpectedAnswer { request })
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonia_protocol::EntityId;

    #[test]
    fn scripted_answers_are_per_player() {
        let mut s = ScriptedDecisions::new();
        s.push(PlayerId(1), DecisionAnswer::Confirm(true));
        let req = DecisionRequest::ConfirmHighSeas {
            unit: EntityId::new(0, 0),
        };
        assert_eq!(s.decide(PlayerId(0), &req), None);
        assert_eq!(s.decide(PlayerId(1), &req), Some(DecisionAnswer::Confirm(true)));
        assert_eq!(s.remaining(), 0);
    }

    #[test]
    fn missing_answer_becomes_decision_required() {
        let req = DecisionRequest::ConfirmHighSeas {
            unit: EntityId::new(0, 0),
        };
        let err = confirm(&mut NoDecisions, PlayerId(2), req.clone()).unwrap_err();
        assert_eq!(
            err,
            GameError::DecisionRequired {
                player: PlayerId(2),
                request: req
            }
        );
        assert!(!err.is_contract_violation());
    }
}
