//! Selection bookkeeping across structural edits.
//!
//! Line positions are zero-based and dense. Whenever a line is removed,
//! inserted or swapped, every position held outside of the document
//! (selection, cursors in a list view) has to be remapped. The rules here
//! are the single place that mapping is defined.

use std::cmp::Ordering;

/// Zero-based index of a line inside a document.
pub type Position = usize;

/// A server-side edit that shifts line positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralEdit {
  /// The line at this position was removed.
  Delete(Position),
  /// A blank line was inserted at this position, pushing the old line down.
  Insert(Position),
  /// Two lines exchanged places.
  Swap(Position, Position),
}

impl StructuralEdit {
  /// Map a single position through this edit.
  ///
  /// Returns `None` when the position itself was deleted, or when an
  /// insert would push it past the last addressable position.
  pub fn map(self, position: Position) -> Option<Position> {
    match self {
      Self::Delete(deleted) => {
        match position.cmp(&deleted) {
          Ordering::Less => Some(position),
          Ordering::Equal => None,
          Ordering::Greater => Some(position - 1),
        }
      },
      Self::Insert(inserted) => {
        if position >= inserted {
          position.checked_add(1)
        } else {
          Some(position)
        }
      },
      Self::Swap(a, b) => {
        if position == a {
          Some(b)
        } else if position == b {
          Some(a)
        } else {
          Some(position)
        }
      },
    }
  }
}

/// Adjust an optional selection after a structural edit.
pub fn adjust(selected: Option<Position>, edit: StructuralEdit) -> Option<Position> {
  selected.and_then(|position| edit.map(position))
}
