use super::state::{GameSeat, GameState, Pot};
use super::types::*;

/// Moves every live street bet into the pot stack, opening side pots at each all-in level.
///
/// A seat becomes eligible for a pot once it puts chips into it while unfolded. Folded
/// chips are collected but never confer eligibility.
pub fn collect_contributions(state: &mut GameState) {
    if state.pots.is_empty() {
        state.pots.push(Pot::default());
    }
    if state.seats.iter().all(|s| s.bet == 0) {
        return;
    }

    // A pot that already lists an all-in seat is closed to further action.
    if last_pot_is_capped(state) {
        state.pots.push(Pot::default());
    }

    let mut all_ins: Vec<(Chips, SeatIndex)> = state
        .seats
        .iter()
        .filter(|s| s.is_all_in() && s.bet > 0)
        .map(|s| (s.bet, s.seat))
        .collect();
    all_ins.sort();

    for (_, seat) in all_ins {
        let cap = state.seat(seat).bet;
        if cap == 0 {
            continue;
        }
        move_into_last_pot(state, cap);
        if state.seats.iter().any(|s| s.bet > 0) {
            state.pots.push(Pot::default());
        }
    }

    move_into_last_pot(state, Chips::MAX);
}

fn last_pot_is_capped(state: &GameState) -> bool {
    let Some(pot) = state.pots.last() else {
        return false;
    };
    pot.eligible_seats.iter().any(|&idx| {
        let seat = state.seat(idx);
        seat.is_all_in() && seat.bet == 0
    })
}

fn move_into_last_pot(state: &mut GameState, cap: Chips) {
    let GameState { seats, pots, .. } = state;
    let Some(pot) = pots.last_mut() else {
        return;
    };
    for seat in seats.iter_mut() {
        take_capped(seat, pot, cap);
    }
}

fn take_capped(seat: &mut GameSeat, pot: &mut Pot, cap: Chips) {
    let take = seat.bet.min(cap);
    if take == 0 {
        return;
    }
    seat.bet -= take;
    pot.amount += take;
    if !seat.folded {
        pot.add_eligible(seat.seat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat_with(state: &mut GameState, seat: SeatIndex, stack: Chips, bet: Chips) {
        let s = state.seat_mut(seat);
        s.player_id = format!("p{seat}");
        s.active = true;
        s.stack = stack;
        s.bet = bet;
    }

    fn betting_state() -> GameState {
        let mut state = GameState::new("t", TableConfig::default());
        state.street = Street::Flop;
        state.pots = vec![Pot::default()];
        state
    }

    #[test]
    fn two_all_ins_split_into_three_pots() {
        let mut state = betting_state();
        seat_with(&mut state, 0, 0, 40);
        seat_with(&mut state, 1, 0, 70);
        seat_with(&mut state, 2, 500, 100);
        seat_with(&mut state, 3, 500, 100);
        let before = state.chips_in_play();

        collect_contributions(&mut state);

        assert_eq!(
            state.pots,
            vec![
                Pot {
                    amount: 160,
                    eligible_seats: vec![0, 1, 2, 3]
                },
                Pot {
                    amount: 90,
                    eligible_seats: vec![1, 2, 3]
                },
                Pot {
                    amount: 60,
                    eligible_seats: vec![2, 3]
                },
            ]
        );
        assert!(state.seats.iter().all(|s| s.bet == 0));
        assert_eq!(state.chips_in_play(), before);
    }

    #[test]
    fn no_all_in_sweeps_into_current_pot_and_folded_chips_are_not_eligible() {
        let mut state = betting_state();
        state.pots[0] = Pot {
            amount: 30,
            eligible_seats: vec![0, 1, 2],
        };
        seat_with(&mut state, 0, 90, 20);
        seat_with(&mut state, 1, 90, 20);
        seat_with(&mut state, 2, 95, 5);
        state.seat_mut(2).folded = true;

        collect_contributions(&mut state);

        assert_eq!(state.pots.len(), 1);
        assert_eq!(state.pots[0].amount, 75);
        assert_eq!(state.pots[0].eligible_seats, vec![0, 1, 2]);
    }

    #[test]
    fn folded_seat_contribution_is_capped_without_eligibility() {
        let mut state = betting_state();
        seat_with(&mut state, 0, 0, 30);
        seat_with(&mut state, 1, 50, 50);
        seat_with(&mut state, 2, 50, 50);
        seat_with(&mut state, 3, 80, 20);
        state.seat_mut(3).folded = true;

        collect_contributions(&mut state);

        assert_eq!(state.pots[0].amount, 110);
        assert_eq!(state.pots[0].eligible_seats, vec![0, 1, 2]);
        assert_eq!(state.pots[1].amount, 40);
        assert_eq!(state.pots[1].eligible_seats, vec![1, 2]);
    }

    #[test]
    fn all_in_from_an_earlier_street_opens_a_new_pot_for_later_bets() {
        let mut state = betting_state();
        state.pots[0] = Pot {
            amount: 120,
            eligible_seats: vec![0, 1, 2],
        };
        seat_with(&mut state, 0, 0, 0);
        seat_with(&mut state, 1, 60, 25);
        seat_with(&mut state, 2, 60, 25);

        collect_contributions(&mut state);

        assert_eq!(state.pots.len(), 2);
        assert_eq!(state.pots[0].amount, 120);
        assert_eq!(state.pots[1].amount, 50);
        assert_eq!(state.pots[1].eligible_seats, vec![1, 2]);
    }

    #[test]
    fn equal_all_ins_share_one_cap() {
        let mut state = betting_state();
        seat_with(&mut state, 0, 0, 40);
        seat_with(&mut state, 1, 0, 40);
        seat_with(&mut state, 2, 10, 40);

        collect_contributions(&mut state);

        assert_eq!(state.pots.len(), 1);
        assert_eq!(state.pots[0].amount, 120);
    }
}
