#![cfg(test)]

use rand::{rngs::StdRng, SeedableRng};

use super::*;

fn config(ante: Chips, sb: Chips, bb: Chips) -> TableConfig {
    TableConfig {
        ante,
        small_blind: sb,
        big_blind: bb,
    }
}

fn table_with_players(count: usize, stack: Chips, cfg: TableConfig) -> GameState {
    let mut state = GameState::new("table-1", cfg);
    for idx in 0..count {
        let seat = state.seat_mut(idx as SeatIndex);
        seat.player_id = format!("p{idx}");
        seat.stack = stack;
        seat.active = true;
    }
    state
}

fn started_hand(count: usize, stack: Chips, cfg: TableConfig, seed: u64) -> GameState {
    let state = table_with_players(count, stack, cfg);
    let mut rng = StdRng::seed_from_u64(seed);
    let next = advance_street(&state, &mut rng).expect("valid state");
    assert_eq!(next.state.street, Street::Preflop);
    next.state
}

fn act(state: &GameState, action: PlayerAction) -> GameState {
    let player = state.current_seat().player_id.clone();
    validate_action(state, &player, &action).expect("action should be legal");
    apply_action(state, &player, &action)
}

/// Checks when possible, otherwise calls, until the round closes.
fn passive_round(mut state: GameState) -> GameState {
    let mut guard = 0;
    while !round_closed(&state) {
        let seat = state.current_seat();
        let action = if seat.bet == state.current_bet {
            PlayerAction::Check
        } else {
            PlayerAction::Call
        };
        state = act(&state, action);
        guard += 1;
        assert!(guard < 64, "betting round failed to close");
    }
    state
}

#[test]
fn preflop_posts_blinds_and_deals_five_cards_to_each_active_seat() {
    let state = started_hand(4, 100, config(0, 5, 10), 1);

    assert_eq!(state.hand_seq, 1);
    assert_eq!(state.pot_total(), 15);
    let posted: Vec<_> = state.seats.iter().filter(|s| s.bet > 0).collect();
    assert_eq!(posted.len(), 2);
    assert_eq!(state.button, 1);
    assert_eq!(state.seat(2).bet, 5);
    assert_eq!(state.seat(3).bet, 10);
    assert_eq!(state.current_bet, 10);
    assert_eq!(state.min_raise, 10);
    assert_eq!(state.current_player_seat, 0);
    for seat in state.seats.iter().filter(|s| s.active) {
        assert_eq!(seat.hole_cards.len(), HOLE_CARD_COUNT);
    }
    assert_eq!(state.deck.len(), DECK_SIZE - 4 * HOLE_CARD_COUNT);
    assert_eq!(state.pots.len(), 1);
}

#[test]
fn antes_are_collected_into_the_first_pot_with_eligibility() {
    let state = started_hand(5, 100, config(2, 5, 10), 3);

    assert_eq!(state.pots[0].amount, 10);
    assert_eq!(state.pots[0].eligible_seats, vec![0, 1, 2, 3, 4]);
    assert_eq!(state.chips_in_play(), 500);
}

#[test]
fn three_players_cannot_start_a_hand() {
    let state = table_with_players(3, 100, config(0, 5, 10));
    let mut rng = StdRng::seed_from_u64(2);

    let next = advance_street(&state, &mut rng).unwrap().state;

    assert_eq!(next.street, Street::Interround);
    assert!(next.seats.iter().all(|s| s.hole_cards.is_empty() && s.bet == 0));
}

#[test]
fn short_stacks_are_sat_out_before_the_deal() {
    let mut state = table_with_players(5, 100, config(10, 5, 10));
    state.seat_mut(4).stack = 6;
    let mut rng = StdRng::seed_from_u64(4);

    let next = advance_street(&state, &mut rng).unwrap().state;

    assert_eq!(next.street, Street::Preflop);
    assert!(!next.seat(4).active);
    assert!(next.seat(4).hole_cards.is_empty());
    assert_eq!(next.seat(4).stack, 6);
    assert_eq!(next.pots[0].amount, 40);
}

#[test]
fn raise_reopens_action_and_sets_new_minimum() {
    let state = started_hand(4, 100, config(0, 5, 10), 5);
    let mut state = act(&state, PlayerAction::Call); // seat 0
    state.seat_mut(1).acted = true;

    // seat 1 raises to 30 facing 10
    let next = act(&state, PlayerAction::Raise { raise_amount: 30 });

    assert_eq!(next.current_bet, 30);
    assert_eq!(next.min_raise, 50);
    assert_eq!(next.seat(1).bet, 30);
    assert_eq!(next.seat(1).stack, 70);
    for idx in [0u8, 2, 3] {
        assert!(!next.seat(idx).acted, "seat {idx} should act again");
    }
    assert_eq!(next.current_player_seat, 2);
    // input untouched
    assert_eq!(state.current_bet, 10);
}

#[test]
fn all_in_raise_keeps_previous_minimum() {
    let mut state = started_hand(4, 100, config(0, 5, 10), 6);
    state.seat_mut(0).stack = 25;

    let next = act(&state, PlayerAction::Raise { raise_amount: 25 });

    assert_eq!(next.current_bet, 25);
    assert_eq!(next.min_raise, 10);
    assert!(next.seat(0).is_all_in());
}

#[test]
fn validator_rejects_out_of_turn_and_illegal_moves() {
    let state = started_hand(4, 100, config(0, 5, 10), 7);

    assert_eq!(
        validate_action(&state, "p1", &PlayerAction::Fold),
        Err(ActionError::TurnOrder)
    );
    assert_eq!(
        validate_action(&state, "p0", &PlayerAction::Check),
        Err(ActionError::CannotCheck)
    );
    assert_eq!(
        validate_action(&state, "p0", &PlayerAction::Raise { raise_amount: 0 }),
        Err(ActionError::InvalidRaiseAmount)
    );
    assert_eq!(
        validate_action(&state, "p0", &PlayerAction::Raise { raise_amount: 10 }),
        Err(ActionError::RaiseNotAboveCurrentBet { current_bet: 10 })
    );
    assert_eq!(
        validate_action(&state, "p0", &PlayerAction::Raise { raise_amount: 500 }),
        Err(ActionError::InsufficientChips {
            raise_amount: 500,
            stack: 100
        })
    );
    assert!(validate_action(&state, "p0", &PlayerAction::Raise { raise_amount: 15 }).is_ok());

    // big blind facing no raise may check but has nothing to call
    let mut bb_turn = state.clone();
    bb_turn.current_player_seat = 3;
    assert_eq!(
        validate_action(&bb_turn, "p3", &PlayerAction::Call),
        Err(ActionError::NothingToCall)
    );
    assert!(validate_action(&bb_turn, "p3", &PlayerAction::Check).is_ok());
}

#[test]
fn oversized_raise_from_a_blind_is_short_of_chips() {
    let mut state = started_hand(4, 100, config(0, 5, 10), 7);
    state.current_player_seat = 3;
    let stack = state.seat(3).stack;
    assert!(state.seat(3).bet > 0);

    assert_eq!(
        validate_action(&state, "p3", &PlayerAction::Raise { raise_amount: u64::MAX }),
        Err(ActionError::InsufficientChips {
            raise_amount: u64::MAX,
            stack
        })
    );
}

#[test]
fn raise_below_minimum_is_rejected_unless_all_in() {
    let mut state = started_hand(4, 100, config(0, 5, 10), 8);
    state.min_raise = 40;

    assert_eq!(
        validate_action(&state, "p0", &PlayerAction::Raise { raise_amount: 20 }),
        Err(ActionError::RaiseBelowMinimum {
            raise_amount: 20,
            min_raise: 40
        })
    );

    state.seat_mut(0).stack = 20;
    assert!(validate_action(&state, "p0", &PlayerAction::Raise { raise_amount: 20 }).is_ok());
}

#[test]
fn betting_is_illegal_outside_betting_streets() {
    let mut state = started_hand(4, 100, config(0, 5, 10), 9);
    state.street = Street::Declare;
    assert_eq!(
        validate_action(&state, "p0", &PlayerAction::Call),
        Err(ActionError::IllegalStreet(Street::Declare))
    );
    state.street = Street::Flop;
    assert_eq!(
        validate_action(
            &state,
            "p0",
            &PlayerAction::Declare {
                declaration: Declaration::High
            }
        ),
        Err(ActionError::NotDeclareStreet(Street::Flop))
    );
}

#[test]
fn folded_seat_is_mucked_and_skipped_in_turn_order() {
    let state = started_hand(5, 100, config(0, 5, 10), 10);
    // button 1, sb 2, bb 3, first to act 4
    assert_eq!(state.current_player_seat, 4);
    let state = act(&state, PlayerAction::Fold);
    assert!(state.seat(4).folded);
    assert!(state.seat(4).hole_cards.is_empty());
    assert_eq!(state.current_player_seat, 0);

    let state = act(&state, PlayerAction::Call);
    let state = act(&state, PlayerAction::Call);
    let state = act(&state, PlayerAction::Call);
    assert_eq!(state.current_player_seat, 3);
    let state = act(&state, PlayerAction::Check);
    assert!(is_action_closed(&state));
    assert_ne!(state.current_player_seat, 4);
}

#[test]
fn turn_never_lands_on_all_in_or_inactive_seats() {
    let mut state = started_hand(5, 100, config(0, 5, 10), 11);
    state.seat_mut(1).stack = 0;
    state.seat_mut(2).active = false;

    let next = act(&state, PlayerAction::Fold); // seat 4
    assert_eq!(next.current_player_seat, 0);
    let next = act(&next, PlayerAction::Call); // seat 0
    assert_eq!(next.current_player_seat, 3);
}

#[test]
fn lone_live_seat_must_still_answer_an_all_in() {
    let mut state = started_hand(4, 100, config(0, 5, 10), 12);
    for idx in [1u8, 2] {
        state.seat_mut(idx).muck();
    }
    state.seat_mut(0).stack = 0;
    state.seat_mut(0).bet = 60;
    state.seat_mut(0).acted = true;
    state.current_bet = 60;
    state.current_player_seat = 3;

    assert!(!is_action_closed(&state));
    let state = act(&state, PlayerAction::Call);
    assert!(is_action_closed(&state));
}

#[test]
fn board_grows_two_two_one_and_matching_ranks_are_discarded() {
    let mut state = passive_round(started_hand(4, 100, config(0, 5, 10), 13));
    let mut rng = StdRng::seed_from_u64(0);

    state = advance_street(&state, &mut rng).unwrap().state;
    assert_eq!(state.street, Street::Flop);
    assert_eq!(state.board_cards.len(), 2);
    assert_eq!(state.current_bet, 0);
    assert_eq!(state.current_player_seat, 2);
    for seat in state.contenders() {
        assert!(seat
            .hole_cards
            .iter()
            .all(|c| state.board_cards.iter().all(|b| b.rank != c.rank)));
    }

    state = advance_street(&passive_round(state), &mut rng).unwrap().state;
    assert_eq!(state.street, Street::Turn);
    assert_eq!(state.board_cards.len(), 4);

    state = advance_street(&passive_round(state), &mut rng).unwrap().state;
    assert_eq!(state.street, Street::River);
    assert_eq!(state.board_cards.len(), 5);
}

#[test]
fn force_discards_matches_rank_not_suit() {
    let mut state = table_with_players(4, 100, config(0, 5, 10));
    state.board_cards = vec![Card::new(Rank::Seven, Suit::Hearts)];
    state.seat_mut(0).hole_cards = vec![
        Card::new(Rank::Seven, Suit::Spades),
        Card::new(Rank::Eight, Suit::Hearts),
    ];

    force_discards(&mut state);

    assert_eq!(
        state.seat(0).hole_cards,
        vec![Card::new(Rank::Eight, Suit::Hearts)]
    );
}

#[test]
fn declarations_do_not_move_the_turn_and_close_the_round_when_all_are_in() {
    let mut state = table_with_players(4, 100, config(0, 5, 10));
    state.street = Street::Declare;
    state.current_player_seat = 2;
    let high = PlayerAction::Declare {
        declaration: Declaration::High,
    };

    assert!(!declarations_complete(&state));
    for player in ["p0", "p1", "p2"] {
        validate_action(&state, player, &high).unwrap();
        state = apply_action(&state, player, &high);
        assert_eq!(state.current_player_seat, 2);
    }
    assert_eq!(
        validate_action(&state, "p0", &high),
        Err(ActionError::AlreadyDeclared(0))
    );
    assert!(awaiting_input(&state));
    state = apply_action(&state, "p3", &high);
    assert!(round_closed(&state));
    assert!(!awaiting_input(&state));
}

#[test]
fn full_hand_conserves_chips_and_pays_out_at_showdown() {
    let mut state = started_hand(4, 100, config(1, 5, 10), 21);
    let total = state.chips_in_play();
    assert_eq!(total, 400);
    let mut rng = StdRng::seed_from_u64(21);

    state = act(&state, PlayerAction::Raise { raise_amount: 20 });
    assert_eq!(state.chips_in_play(), total);

    while state.street != Street::Declare {
        state = passive_round(state);
        assert_eq!(state.chips_in_play(), total);
        state = advance_street(&state, &mut rng).unwrap().state;
        assert_eq!(state.chips_in_play(), total);
    }

    let declare = PlayerAction::Declare {
        declaration: Declaration::Low,
    };
    state = apply_action(&state, "p0", &declare);
    let transition = advance_street(&state, &mut rng).unwrap();
    let outcome = transition.showdown.expect("showdown outcome");
    state = transition.state;

    assert_eq!(state.street, Street::Showdown);
    assert!(state.pots.is_empty());
    assert!(outcome.unawarded.is_empty());
    assert_eq!(state.seats.iter().map(|s| s.stack).sum::<Chips>(), total);
    for award in &outcome.awards {
        assert_eq!(award.high_share + award.low_share, award.amount);
        assert!(award.high_share.abs_diff(award.low_share) <= 1 || award.low_share == 0 || award.high_share == 0);
    }

    let next = advance_street(&state, &mut rng).unwrap().state;
    assert_eq!(next.street, Street::Interround);
}

#[test]
fn invariants_catch_a_player_seated_twice() {
    let mut state = table_with_players(4, 100, config(0, 5, 10));
    state.seat_mut(1).player_id = "p0".into();
    assert_eq!(
        state.validate_invariants(),
        Err(StateError::InvariantViolation("player seated twice"))
    );
}
