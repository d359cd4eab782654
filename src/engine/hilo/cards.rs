//! Deck construction, dealing, and the hole-card hand metric.

use rand::seq::SliceRandom;
use rand::Rng;

use super::errors::DealError;
use super::types::{Card, Rank, Suit, DECK_SIZE};

pub const ACE_HIGH: u32 = 11;
pub const ACE_LOW: u32 = 1;

pub fn ordered_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            deck.push(Card::new(rank, suit));
        }
    }
    deck
}

/// Uniformly permuted 52-card deck (Fisher-Yates via `SliceRandom::shuffle`).
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = ordered_deck();
    deck.shuffle(rng);
    deck
}

/// Removes `n` cards from the front of the deck.
pub fn deal(deck: &mut Vec<Card>, n: usize) -> Result<Vec<Card>, DealError> {
    if n > deck.len() {
        return Err(DealError::InsufficientCards {
            requested: n,
            remaining: deck.len(),
        });
    }
    Ok(deck.drain(..n).collect())
}

/// Deals up to `n` cards, stopping early when the deck runs short.
pub fn deal_capped(deck: &mut Vec<Card>, n: usize) -> Vec<Card> {
    let n = n.min(deck.len());
    deck.drain(..n).collect()
}

pub fn rank_value(rank: Rank, ace_value: u32) -> u32 {
    match rank {
        Rank::Ace => ace_value,
        Rank::Two => 2,
        Rank::Three => 3,
        Rank::Four => 4,
        Rank::Five => 5,
        Rank::Six => 6,
        Rank::Seven => 7,
        Rank::Eight => 8,
        Rank::Nine => 9,
        Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
    }
}

/// Sum of blackjack-style rank values over the hole cards; board cards never count.
pub fn hand_value(hole_cards: &[Card], ace_value: u32) -> u32 {
    hole_cards
        .iter()
        .map(|card| rank_value(card.rank, ace_value))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn shuffled_deck_is_a_permutation_of_52_distinct_cards() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = shuffled_deck(&mut rng);
        assert_eq!(deck.len(), DECK_SIZE);
        let unique: HashSet<_> = deck.iter().copied().collect();
        assert_eq!(unique.len(), DECK_SIZE);
        assert_ne!(deck, ordered_deck(), "seeded shuffle should move cards");
    }

    #[test]
    fn same_seed_gives_same_order() {
        let a = shuffled_deck(&mut StdRng::seed_from_u64(99));
        let b = shuffled_deck(&mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn deal_takes_from_the_front_and_rejects_overdraw() {
        let mut deck = ordered_deck();
        let first = deck[0];
        let dealt = deal(&mut deck, 3).unwrap();
        assert_eq!(dealt[0], first);
        assert_eq!(deck.len(), DECK_SIZE - 3);

        let mut short = vec![Card::new(Rank::Ace, Suit::Spades)];
        assert_eq!(
            deal(&mut short, 2),
            Err(DealError::InsufficientCards {
                requested: 2,
                remaining: 1
            })
        );
        assert_eq!(short.len(), 1, "failed deal must not consume cards");
        assert_eq!(deal_capped(&mut short, 2).len(), 1);
        assert!(short.is_empty());
    }

    #[test]
    fn hand_value_counts_faces_as_ten_and_ace_per_caller() {
        let hand = [
            Card::new(Rank::Ace, Suit::Hearts),
            Card::new(Rank::King, Suit::Clubs),
            Card::new(Rank::Ten, Suit::Spades),
            Card::new(Rank::Four, Suit::Diamonds),
        ];
        assert_eq!(hand_value(&hand, ACE_HIGH), 35);
        assert_eq!(hand_value(&hand, ACE_LOW), 25);
        assert_eq!(hand_value(&[], ACE_HIGH), 0);
    }
}
