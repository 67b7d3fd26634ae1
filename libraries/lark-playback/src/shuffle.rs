//! Shuffle play orders
//!
//! Shuffling never reorders the queue itself. It produces a permutation of
//! queue indices that navigation walks instead of sequential order.

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use std::collections::HashMap;

use crate::item::ItemRef;
use crate::types::ShuffleMode;

/// Build a play order for `items`, or `None` when shuffle is off
///
/// If `anchor` is given, that index is placed first so everything else is
/// still ahead of the item currently playing.
pub fn play_order(items: &[ItemRef], mode: ShuffleMode, anchor: Option<usize>) -> Option<Vec<usize>> {
    play_order_with_rng(items, mode, anchor, &mut thread_rng())
}

/// [`play_order`] with a caller-provided random source
pub fn play_order_with_rng<R: Rng + ?Sized>(
    items: &[ItemRef],
    mode: ShuffleMode,
    anchor: Option<usize>,
    rng: &mut R,
) -> Option<Vec<usize>> {
    let mut order = match mode {
        ShuffleMode::Off => return None,
        ShuffleMode::Random => shuffle_random(items.len(), rng),
        ShuffleMode::Smart => shuffle_smart(items, rng),
    };

    if let Some(anchor) = anchor.filter(|&a| a < items.len()) {
        if let Some(pos) = order.iter().position(|&i| i == anchor) {
            order.remove(pos);
            order.insert(0, anchor);
        }
    }

    Some(order)
}

/// Fisher-Yates over the index range
fn shuffle_random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}

/// Spread artists apart
///
/// 1. Group indices by artist
/// 2. Shuffle within each group and shuffle the group order
/// 3. Round-robin through the groups
fn shuffle_smart<R: Rng + ?Sized>(items: &[ItemRef], rng: &mut R) -> Vec<usize> {
    if items.len() <= 2 {
        return shuffle_random(items.len(), rng);
    }

    let mut by_artist: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        by_artist
            .entry(item.artist.as_deref().unwrap_or_default())
            .or_default()
            .push(index);
    }

    let mut groups: Vec<Vec<usize>> = by_artist.into_values().collect();
    for group in &mut groups {
        group.shuffle(rng);
    }
    groups.shuffle(rng);

    let mut order = Vec::with_capacity(items.len());
    let mut round = 0;
    while order.len() < items.len() {
        for group in &groups {
            if let Some(&index) = group.get(round) {
                order.push(index);
            }
        }
        round += 1;
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{AudioItem, SourceKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn create_test_item(id: usize, artist: &str) -> ItemRef {
        AudioItem::new(format!("/music/{}.mp3", id), SourceKind::File)
            .with_artist(artist)
            .into_ref()
    }

    fn is_permutation(order: &[usize], len: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..len).collect::<Vec<_>>()
    }

    #[test]
    fn off_has_no_order() {
        let items = vec![create_test_item(0, "A")];
        assert!(play_order(&items, ShuffleMode::Off, None).is_none());
    }

    #[test]
    fn random_is_permutation() {
        let items: Vec<_> = (0..20).map(|i| create_test_item(i, "A")).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let order = play_order_with_rng(&items, ShuffleMode::Random, None, &mut rng).unwrap();
        assert!(is_permutation(&order, items.len()));
    }

    #[test]
    fn anchor_goes_first() {
        let items: Vec<_> = (0..10).map(|i| create_test_item(i, "A")).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let order = play_order_with_rng(&items, ShuffleMode::Random, Some(4), &mut rng).unwrap();
        assert_eq!(order[0], 4);
        assert!(is_permutation(&order, items.len()));
    }

    #[test]
    fn smart_spreads_artists() {
        // Two artists with equal counts interleave perfectly
        let items: Vec<_> = (0..10)
            .map(|i| create_test_item(i, if i % 2 == 0 { "A" } else { "B" }))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let order = play_order_with_rng(&items, ShuffleMode::Smart, None, &mut rng).unwrap();

        assert!(is_permutation(&order, items.len()));
        for pair in order.windows(2) {
            assert_ne!(items[pair[0]].artist, items[pair[1]].artist);
        }
    }

    #[test]
    fn smart_handles_missing_artists() {
        let items = vec![
            AudioItem::new("/a.mp3", SourceKind::File).into_ref(),
            AudioItem::new("/b.mp3", SourceKind::File).into_ref(),
            create_test_item(2, "C"),
            create_test_item(3, "C"),
        ];
        let order = play_order(&items, ShuffleMode::Smart, None).unwrap();
        assert!(is_permutation(&order, items.len()));
    }
}
