//! Hi-lo showdown: declarations, group scoring, "both" qualification, pot splitting.

use serde::{Deserialize, Serialize};

use super::cards::{hand_value, ACE_HIGH, ACE_LOW};
use super::state::{GameState, Pot};
use super::types::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotAward {
    pub pot_index: usize,
    pub amount: Chips,
    pub high_winners: Vec<SeatIndex>,
    pub low_winners: Vec<SeatIndex>,
    pub high_share: Chips,
    pub low_share: Chips,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowdownOutcome {
    pub awards: Vec<PotAward>,
    /// Pots with no eligible winner on either side; left in `GameState::pots`.
    pub unawarded: Vec<Pot>,
    pub disqualified: Vec<SeatIndex>,
}

/// Seats that reach showdown without declaring get a default side.
pub fn default_declaration(hole_card_count: usize) -> Declaration {
    if hole_card_count >= 4 {
        Declaration::High
    } else {
        Declaration::Low
    }
}

pub fn apply_default_declarations(state: &mut GameState) {
    for seat in state.seats.iter_mut().filter(|s| s.is_contending()) {
        if seat.declaration.is_none() {
            seat.declaration = Some(default_declaration(seat.hole_cards.len()));
        }
    }
}

/// Resolves every pot, credits winners' stacks, and clears the awarded pots.
pub fn resolve_showdown(state: &mut GameState) -> ShowdownOutcome {
    apply_default_declarations(state);

    let mut high: Vec<(SeatIndex, u32)> = Vec::new();
    let mut low: Vec<(SeatIndex, u32)> = Vec::new();
    let mut both: Vec<SeatIndex> = Vec::new();
    for seat in state.contenders() {
        let Some(declaration) = seat.declaration else {
            continue;
        };
        if declaration.contests_high() {
            high.push((seat.seat, hand_value(&seat.hole_cards, ACE_HIGH)));
        }
        if declaration.contests_low() {
            low.push((seat.seat, hand_value(&seat.hole_cards, ACE_LOW)));
        }
        if declaration == Declaration::Both {
            both.push(seat.seat);
        }
    }
    high.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    low.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

    // A "both" seat must tie or beat the whole field on each side, or it loses both.
    let best_high = high.first().map(|&(_, v)| v);
    let best_low = low.first().map(|&(_, v)| v);
    let disqualified: Vec<SeatIndex> = both
        .into_iter()
        .filter(|seat| {
            let high_ok = score_of(&high, *seat) >= best_high;
            let low_ok = score_of(&low, *seat) <= best_low;
            !(high_ok && low_ok)
        })
        .collect();
    high.retain(|(seat, _)| !disqualified.contains(seat));
    low.retain(|(seat, _)| !disqualified.contains(seat));

    let mut outcome = ShowdownOutcome {
        disqualified,
        ..ShowdownOutcome::default()
    };
    let pots = std::mem::take(&mut state.pots);
    for (pot_index, pot) in pots.into_iter().enumerate() {
        if pot.amount == 0 {
            continue;
        }
        let high_winners = best_of(&high, &pot, |a, b| a > b);
        let low_winners = best_of(&low, &pot, |a, b| a < b);

        let (high_share, low_share) = match (high_winners.is_empty(), low_winners.is_empty()) {
            (true, true) => {
                outcome.unawarded.push(pot);
                continue;
            }
            (false, true) => (pot.amount, 0),
            (true, false) => (0, pot.amount),
            (false, false) => {
                let low_share = pot.amount / 2;
                (pot.amount - low_share, low_share)
            }
        };

        credit(state, &high_winners, high_share);
        credit(state, &low_winners, low_share);
        outcome.awards.push(PotAward {
            pot_index,
            amount: pot.amount,
            high_winners,
            low_winners,
            high_share,
            low_share,
        });
    }
    state.pots = outcome.unawarded.clone();
    outcome
}

fn score_of(group: &[(SeatIndex, u32)], seat: SeatIndex) -> Option<u32> {
    group.iter().find(|(s, _)| *s == seat).map(|&(_, v)| v)
}

/// Every eligible seat tied for the best score, in ascending seat order.
fn best_of<F>(group: &[(SeatIndex, u32)], pot: &Pot, better: F) -> Vec<SeatIndex>
where
    F: Fn(u32, u32) -> bool,
{
    let eligible: Vec<(SeatIndex, u32)> = group
        .iter()
        .copied()
        .filter(|(seat, _)| pot.is_eligible(*seat))
        .collect();
    let Some(best) = eligible
        .iter()
        .map(|&(_, v)| v)
        .reduce(|acc, v| if better(v, acc) { v } else { acc })
    else {
        return Vec::new();
    };
    let mut winners: Vec<SeatIndex> = eligible
        .into_iter()
        .filter(|&(_, v)| v == best)
        .map(|(seat, _)| seat)
        .collect();
    winners.sort_unstable();
    winners
}

/// Even split; the odd remainder goes to the lowest seat index.
pub fn split_share(share: Chips, winners: usize) -> Vec<Chips> {
    if winners == 0 {
        return Vec::new();
    }
    let each = share / winners as Chips;
    let remainder = share % winners as Chips;
    let mut parts = vec![each; winners];
    parts[0] += remainder;
    parts
}

fn credit(state: &mut GameState, winners: &[SeatIndex], share: Chips) {
    for (seat, amount) in winners.iter().zip(split_share(share, winners.len())) {
        state.seat_mut(*seat).stack += amount;
    }
}
