use super::state::{GameSeat, GameState};
use super::types::*;

pub trait Seating {
    /// Circular scan starting after `from`; `from` itself is checked last.
    fn next_seat_where<F>(&self, from: SeatIndex, pred: F) -> Option<SeatIndex>
    where
        F: Fn(&GameSeat) -> bool;

    /// Next seat that can still act (active, unfolded, chips behind).
    fn next_live_seat(&self, from: SeatIndex) -> Option<SeatIndex> {
        self.next_seat_where(from, GameSeat::can_act)
    }

    /// First seat to act on a post-flop street.
    fn first_to_act_after_button(&self) -> Option<SeatIndex>;
}

impl Seating for GameState {
    fn next_seat_where<F>(&self, from: SeatIndex, pred: F) -> Option<SeatIndex>
    where
        F: Fn(&GameSeat) -> bool,
    {
        let count = self.seats.len();
        if count == 0 {
            return None;
        }
        let start = from as usize % count;
        (1..=count)
            .map(|step| (start + step) % count)
            .find(|&idx| pred(&self.seats[idx]))
            .map(|idx| idx as SeatIndex)
    }

    fn first_to_act_after_button(&self) -> Option<SeatIndex> {
        self.next_live_seat(self.button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seated(state: &mut GameState, seat: SeatIndex, stack: Chips) {
        let s = state.seat_mut(seat);
        s.player_id = format!("p{seat}");
        s.stack = stack;
        s.active = true;
    }

    #[test]
    fn scan_wraps_and_skips_folded_inactive_and_all_in() {
        let mut state = GameState::new("t", TableConfig::default());
        seated(&mut state, 1, 100);
        seated(&mut state, 3, 0);
        seated(&mut state, 5, 100);
        seated(&mut state, 6, 100);
        state.seat_mut(5).folded = true;

        assert_eq!(state.next_live_seat(1), Some(6));
        assert_eq!(state.next_live_seat(6), Some(1));
        assert_eq!(state.next_live_seat(7), Some(1));
    }

    #[test]
    fn scan_returns_origin_when_it_is_the_only_match_and_none_when_empty() {
        let mut state = GameState::new("t", TableConfig::default());
        assert_eq!(state.next_live_seat(0), None);
        seated(&mut state, 4, 10);
        assert_eq!(state.next_live_seat(4), Some(4));
    }
}
