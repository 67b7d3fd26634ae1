//! Queue manager
//!
//! Ordered items plus a current index. `None` is the empty sentinel: no item
//! is current, which is distinct from index 0.
//!
//! ```text
//! items:   [A] [B] [C] [D]
//! current:      ^
//! order:   2 0 3 1        (only while shuffling)
//! ```
//!
//! Navigation is delegated to [`navigation::step`]; when shuffling it walks
//! `order` instead of the sequence. The order is rebuilt whenever the contents
//! change.

use tracing::debug;

use crate::error::{PlaybackError, Result};
use crate::item::{same_item, ItemRef};
use crate::navigation::{self, Direction};
use crate::shuffle;
use crate::types::{RepeatMode, ShuffleMode};

/// Ordered items with a current index
#[derive(Debug, Clone, Default)]
pub struct Queue {
    items: Vec<ItemRef>,

    /// Always `None` or a valid index into `items`
    current: Option<usize>,

    repeat: RepeatMode,
    shuffle: ShuffleMode,

    /// Permutation of indices while shuffling
    order: Option<Vec<usize>>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with initial modes
    pub fn with_modes(repeat: RepeatMode, shuffle: ShuffleMode) -> Self {
        Self {
            repeat,
            shuffle,
            ..Self::default()
        }
    }

    // ===== Accessors =====

    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ItemRef> {
        self.items.get(index)
    }

    /// Current index, `None` when nothing is current
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&ItemRef> {
        self.current.and_then(|index| self.items.get(index))
    }

    /// Index of `item` in the queue, by identity
    pub fn position_of(&self, item: &ItemRef) -> Option<usize> {
        self.items.iter().position(|queued| same_item(queued, item))
    }

    /// Shuffled play order, if shuffling
    pub fn play_order(&self) -> Option<&[usize]> {
        self.order.as_deref()
    }

    // ===== Modes =====

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.shuffle
    }

    /// Change shuffle mode
    ///
    /// Turning shuffle on (or switching algorithm) draws a fresh order with
    /// the current item first.
    pub fn set_shuffle_mode(&mut self, mode: ShuffleMode) {
        if self.shuffle == mode {
            return;
        }
        self.shuffle = mode;
        self.rebuild_order();
    }

    // ===== Mutation =====

    /// Add items to the end
    ///
    /// The current index is untouched, so an empty queue stays at the sentinel.
    pub fn append(&mut self, items: impl IntoIterator<Item = ItemRef>) {
        let before = self.items.len();
        self.items.extend(items);
        if self.items.len() != before {
            self.rebuild_order();
        }
    }

    /// Insert items before `at` (`at == len` appends)
    pub fn insert(&mut self, items: impl IntoIterator<Item = ItemRef>, at: usize) -> Result<()> {
        if at > self.items.len() {
            return Err(PlaybackError::invalid_index(
                at,
                format!("insert position beyond queue length {}", self.items.len()),
            ));
        }

        let before = self.items.len();
        self.items.splice(at..at, items);
        let added = self.items.len() - before;
        if added == 0 {
            return Ok(());
        }

        if let Some(current) = self.current {
            if current >= at {
                self.current = Some(current + added);
            }
        }
        self.rebuild_order();
        Ok(())
    }

    /// Remove the item at `index`
    ///
    /// Removing the current item leaves the queue at the sentinel; the caller
    /// decides what happens to playback.
    pub fn remove(&mut self, index: usize) -> Result<ItemRef> {
        self.check_index(index)?;

        let removed = self.items.remove(index);
        self.current = match self.current {
            Some(current) if current == index => None,
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        self.rebuild_order();
        Ok(removed)
    }

    /// Move the item at `from` so it ends up at `to`
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);

        self.current = self.current.map(|current| {
            if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            }
        });
        self.rebuild_order();
        Ok(())
    }

    /// Replace the current item, returning the one it replaced
    ///
    /// At the sentinel the item is appended and becomes current.
    pub fn replace_current(&mut self, item: ItemRef) -> Option<ItemRef> {
        let replaced = match self.current {
            Some(index) => Some(std::mem::replace(&mut self.items[index], item)),
            None => {
                self.items.push(item);
                self.current = Some(self.items.len() - 1);
                None
            }
        };
        self.rebuild_order();
        replaced
    }

    /// Remove every item after the current one
    pub fn remove_upcoming(&mut self) -> Vec<ItemRef> {
        let Some(current) = self.current else {
            return Vec::new();
        };
        let removed: Vec<_> = self.items.drain(current + 1..).collect();
        if !removed.is_empty() {
            self.rebuild_order();
        }
        removed
    }

    /// Remove every item before the current one
    pub fn remove_previous(&mut self) -> Vec<ItemRef> {
        let Some(current) = self.current else {
            return Vec::new();
        };
        let removed: Vec<_> = self.items.drain(..current).collect();
        if !removed.is_empty() {
            self.current = Some(0);
            self.rebuild_order();
        }
        removed
    }

    /// Remove everything and return to the sentinel
    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        self.order = None;
    }

    // ===== Navigation =====

    /// Make `index` current
    pub fn jump(&mut self, index: usize) -> Result<ItemRef> {
        self.check_index(index)?;
        self.current = Some(index);
        Ok(self.items[index].clone())
    }

    /// Advance one step
    ///
    /// On error the current index is unchanged.
    pub fn next(&mut self) -> Result<ItemRef> {
        self.step(Direction::Forward)
    }

    /// Go back one step
    pub fn previous(&mut self) -> Result<ItemRef> {
        self.step(Direction::Backward)
    }

    /// Item `next()` would move to, without moving
    pub fn peek_next(&self) -> Option<&ItemRef> {
        self.target(Direction::Forward)
            .ok()
            .and_then(|index| self.items.get(index))
    }

    /// Item `previous()` would move to, without moving
    pub fn peek_previous(&self) -> Option<&ItemRef> {
        self.target(Direction::Backward)
            .ok()
            .and_then(|index| self.items.get(index))
    }

    fn step(&mut self, direction: Direction) -> Result<ItemRef> {
        let index = self.target(direction)?;
        debug!(from = ?self.current, to = index, ?direction, "queue step");
        self.current = Some(index);
        Ok(self.items[index].clone())
    }

    fn target(&self, direction: Direction) -> Result<usize> {
        navigation::step(
            self.items.len(),
            self.current,
            direction,
            self.repeat,
            self.order.as_deref(),
        )
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(PlaybackError::invalid_index(
                index,
                format!("queue has {} items", self.items.len()),
            ))
        }
    }

    fn rebuild_order(&mut self) {
        self.order = shuffle::play_order(&self.items, self.shuffle, self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{AudioItem, SourceKind};

    fn create_test_item(name: &str) -> ItemRef {
        AudioItem::new(format!("/music/{}.mp3", name), SourceKind::File)
            .with_title(name)
            .into_ref()
    }

    fn titles(queue: &Queue) -> Vec<String> {
        queue
            .items()
            .iter()
            .map(|item| item.display_title().to_string())
            .collect()
    }

    fn abc() -> (Queue, [ItemRef; 3]) {
        let items = [
            create_test_item("A"),
            create_test_item("B"),
            create_test_item("C"),
        ];
        let mut queue = Queue::new();
        queue.append(items.iter().cloned());
        (queue, items)
    }

    #[test]
    fn create_empty_queue() {
        let queue = Queue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn append_keeps_sentinel() {
        let (queue, _) = abc();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn jump_sets_current() {
        let (mut queue, items) = abc();
        let item = queue.jump(2).unwrap();
        assert!(same_item(&item, &items[2]));
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn jump_out_of_bounds() {
        let (mut queue, _) = abc();
        assert!(matches!(
            queue.jump(3),
            Err(PlaybackError::InvalidIndex { index: 3, .. })
        ));
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn next_from_sentinel_fails() {
        let (mut queue, _) = abc();
        assert_eq!(queue.next().unwrap_err(), PlaybackError::NoNextItem);
        assert_eq!(queue.previous().unwrap_err(), PlaybackError::NoPreviousItem);
    }

    #[test]
    fn next_then_previous_returns_to_start() {
        let (mut queue, items) = abc();
        queue.jump(1).unwrap();
        queue.next().unwrap();
        let back = queue.previous().unwrap();
        assert!(same_item(&back, &items[1]));
    }

    #[test]
    fn next_at_end_fails_and_keeps_index() {
        let (mut queue, _) = abc();
        queue.jump(2).unwrap();
        assert_eq!(queue.next().unwrap_err(), PlaybackError::NoNextItem);
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn repeat_queue_wraps_both_ways() {
        let (mut queue, items) = abc();
        queue.set_repeat_mode(RepeatMode::Queue);
        queue.jump(2).unwrap();
        assert!(same_item(&queue.next().unwrap(), &items[0]));
        assert!(same_item(&queue.previous().unwrap(), &items[2]));
    }

    #[test]
    fn repeat_one_returns_current() {
        let (mut queue, items) = abc();
        queue.set_repeat_mode(RepeatMode::One);
        queue.jump(1).unwrap();
        assert!(same_item(&queue.next().unwrap(), &items[1]));
        assert!(same_item(&queue.previous().unwrap(), &items[1]));
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn remove_current_sets_sentinel() {
        let (mut queue, items) = abc();
        queue.jump(1).unwrap();
        let removed = queue.remove(1).unwrap();
        assert!(same_item(&removed, &items[1]));
        assert_eq!(titles(&queue), ["A", "C"]);
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn remove_before_current_shifts_index() {
        let (mut queue, items) = abc();
        queue.jump(2).unwrap();
        queue.remove(0).unwrap();
        assert_eq!(queue.current_index(), Some(1));
        assert!(same_item(queue.current().unwrap(), &items[2]));
    }

    #[test]
    fn remove_out_of_bounds() {
        let (mut queue, _) = abc();
        assert!(matches!(
            queue.remove(5),
            Err(PlaybackError::InvalidIndex { index: 5, .. })
        ));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn insert_before_current_shifts_index() {
        let (mut queue, items) = abc();
        queue.jump(1).unwrap();
        queue
            .insert([create_test_item("X"), create_test_item("Y")], 0)
            .unwrap();
        assert_eq!(titles(&queue), ["X", "Y", "A", "B", "C"]);
        assert!(same_item(queue.current().unwrap(), &items[1]));
    }

    #[test]
    fn insert_at_len_appends() {
        let (mut queue, _) = abc();
        queue.insert([create_test_item("D")], 3).unwrap();
        assert_eq!(titles(&queue), ["A", "B", "C", "D"]);
        assert!(queue.insert([create_test_item("E")], 9).is_err());
    }

    #[test]
    fn move_item_tracks_current() {
        let (mut queue, items) = abc();
        queue.jump(0).unwrap();
        queue.move_item(0, 2).unwrap();
        assert_eq!(titles(&queue), ["B", "C", "A"]);
        assert!(same_item(queue.current().unwrap(), &items[0]));

        queue.move_item(0, 2).unwrap();
        assert_eq!(titles(&queue), ["C", "A", "B"]);
        assert!(same_item(queue.current().unwrap(), &items[0]));
    }

    #[test]
    fn replace_current_swaps_item() {
        let (mut queue, items) = abc();
        queue.jump(1).unwrap();
        let replaced = queue.replace_current(create_test_item("Z")).unwrap();
        assert!(same_item(&replaced, &items[1]));
        assert_eq!(titles(&queue), ["A", "Z", "C"]);
    }

    #[test]
    fn replace_current_on_sentinel_appends() {
        let mut queue = Queue::new();
        assert!(queue.replace_current(create_test_item("A")).is_none());
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn remove_upcoming_and_previous() {
        let (mut queue, _) = abc();
        queue.append([create_test_item("D")]);
        queue.jump(1).unwrap();

        assert_eq!(queue.remove_upcoming().len(), 2);
        assert_eq!(titles(&queue), ["A", "B"]);

        assert_eq!(queue.remove_previous().len(), 1);
        assert_eq!(titles(&queue), ["B"]);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn clear_resets_everything() {
        let (mut queue, _) = abc();
        queue.jump(1).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn shuffle_visits_every_item_once() {
        let mut queue = Queue::new();
        queue.append((0..8).map(|i| create_test_item(&i.to_string())));
        queue.set_shuffle_mode(ShuffleMode::Random);

        let first = queue.play_order().unwrap()[0];
        queue.jump(first).unwrap();

        let mut seen = vec![first];
        while let Ok(item) = queue.next() {
            seen.push(queue.position_of(&item).unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_order_rebuilt_on_change() {
        let (mut queue, _) = abc();
        queue.set_shuffle_mode(ShuffleMode::Random);
        assert_eq!(queue.play_order().unwrap().len(), 3);

        queue.append([create_test_item("D")]);
        assert_eq!(queue.play_order().unwrap().len(), 4);

        queue.remove(0).unwrap();
        assert_eq!(queue.play_order().unwrap().len(), 3);

        queue.set_shuffle_mode(ShuffleMode::Off);
        assert!(queue.play_order().is_none());
    }

    #[test]
    fn enabling_shuffle_keeps_current_first() {
        let (mut queue, _) = abc();
        queue.jump(2).unwrap();
        queue.set_shuffle_mode(ShuffleMode::Smart);
        assert_eq!(queue.play_order().unwrap()[0], 2);
        assert!(queue.peek_previous().is_none());
    }

    #[test]
    fn peek_does_not_move() {
        let (mut queue, items) = abc();
        queue.jump(0).unwrap();
        assert!(same_item(queue.peek_next().unwrap(), &items[1]));
        assert!(queue.peek_previous().is_none());
        assert_eq!(queue.current_index(), Some(0));
    }
}
