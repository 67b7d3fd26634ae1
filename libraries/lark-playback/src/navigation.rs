//! Queue navigation
//!
//! Pure function from (length, current index, direction, repeat mode,
//! optional play order) to the index to move to. The queue manager applies
//! the result; nothing here has side effects.

use crate::error::{PlaybackError, Result};
use crate::types::RepeatMode;

/// Which way to move through the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn boundary_error(self) -> PlaybackError {
        match self {
            Direction::Forward => PlaybackError::NoNextItem,
            Direction::Backward => PlaybackError::NoPreviousItem,
        }
    }
}

/// Compute the index reached by moving one step from `current`
///
/// `order` is a permutation of `0..len` giving the play order when shuffling.
/// An order whose length does not match `len` is ignored and sequential order
/// is used instead.
///
/// - `current == None` (or an empty queue) is a boundary in both directions.
/// - `RepeatMode::One` stays on `current`.
/// - `RepeatMode::Queue` wraps around at either end.
pub fn step(
    len: usize,
    current: Option<usize>,
    direction: Direction,
    repeat: RepeatMode,
    order: Option<&[usize]>,
) -> Result<usize> {
    let current = match current {
        Some(index) if index < len => index,
        _ => return Err(direction.boundary_error()),
    };

    if repeat == RepeatMode::One {
        return Ok(current);
    }

    let order = order.filter(|order| order.len() == len);
    let position = order
        .and_then(|order| order.iter().position(|&index| index == current))
        .unwrap_or(current);

    let target = match direction {
        Direction::Forward if position + 1 < len => position + 1,
        Direction::Forward if repeat == RepeatMode::Queue => 0,
        Direction::Backward if position > 0 => position - 1,
        Direction::Backward if repeat == RepeatMode::Queue => len - 1,
        _ => return Err(direction.boundary_error()),
    };

    Ok(order.map_or(target, |order| order[target]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_forward_and_back() {
        assert_eq!(
            step(3, Some(0), Direction::Forward, RepeatMode::Off, None),
            Ok(1)
        );
        assert_eq!(
            step(3, Some(2), Direction::Backward, RepeatMode::Off, None),
            Ok(1)
        );
    }

    #[test]
    fn boundaries_without_repeat() {
        assert_eq!(
            step(3, Some(2), Direction::Forward, RepeatMode::Off, None),
            Err(PlaybackError::NoNextItem)
        );
        assert_eq!(
            step(3, Some(0), Direction::Backward, RepeatMode::Off, None),
            Err(PlaybackError::NoPreviousItem)
        );
    }

    #[test]
    fn empty_sentinel_is_a_boundary() {
        assert_eq!(
            step(3, None, Direction::Forward, RepeatMode::Queue, None),
            Err(PlaybackError::NoNextItem)
        );
        assert_eq!(
            step(0, None, Direction::Backward, RepeatMode::One, None),
            Err(PlaybackError::NoPreviousItem)
        );
    }

    #[test]
    fn repeat_queue_wraps() {
        assert_eq!(
            step(3, Some(2), Direction::Forward, RepeatMode::Queue, None),
            Ok(0)
        );
        assert_eq!(
            step(3, Some(0), Direction::Backward, RepeatMode::Queue, None),
            Ok(2)
        );
    }

    #[test]
    fn repeat_one_stays_put() {
        assert_eq!(
            step(3, Some(2), Direction::Forward, RepeatMode::One, None),
            Ok(2)
        );
        assert_eq!(
            step(3, Some(0), Direction::Backward, RepeatMode::One, None),
            Ok(0)
        );
    }

    #[test]
    fn follows_play_order() {
        let order = [2, 0, 3, 1];
        assert_eq!(
            step(4, Some(2), Direction::Forward, RepeatMode::Off, Some(&order)),
            Ok(0)
        );
        assert_eq!(
            step(4, Some(3), Direction::Backward, RepeatMode::Off, Some(&order)),
            Ok(0)
        );
        // Index 1 is last in play order
        assert_eq!(
            step(4, Some(1), Direction::Forward, RepeatMode::Off, Some(&order)),
            Err(PlaybackError::NoNextItem)
        );
        assert_eq!(
            step(4, Some(1), Direction::Forward, RepeatMode::Queue, Some(&order)),
            Ok(2)
        );
    }

    #[test]
    fn mismatched_order_is_ignored() {
        let stale = [1, 0];
        assert_eq!(
            step(3, Some(0), Direction::Forward, RepeatMode::Off, Some(&stale)),
            Ok(1)
        );
    }
}
