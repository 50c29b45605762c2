//! Single-cursor state and the sorted multi-cursor set.
//!
//! A cursor caches its coordinate and visual column; both are re-derived on
//! every index change. The *intended* column is sticky: vertical motion
//! through short lines remembers where the cursor wants to be and returns
//! there. Cursors do not hold a buffer reference; callers pass the buffer
//! into any operation that needs one.

use pat_text::{Buffer, Coord, Slice};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    coord: Coord,
    intended_column: usize,
    real_column: usize,
    selection_start: Option<usize>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(buffer: &Buffer, index: usize) -> Self {
        let mut cursor = Self::default();
        cursor.set_index(buffer, index);
        cursor.update_intended_column(buffer);
        cursor
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    pub fn intended_column(&self) -> usize {
        self.intended_column
    }

    pub fn real_column(&self) -> usize {
        self.real_column
    }

    pub fn has_selection(&self) -> bool {
        self.selection_start.is_some()
    }

    pub fn selection_start(&self) -> Option<usize> {
        self.selection_start
    }

    /// The sorted selection span. `selection.end` is one past the last
    /// selected byte; an empty span (anchor == caret) is a live selection
    /// that covers nothing.
    pub fn selection(&self) -> Option<Slice> {
        let anchor = self.selection_start?;
        Some(Slice::new(
            anchor.min(self.index),
            anchor.max(self.index),
        ))
    }

    /// Move the caret and re-derive the cached coordinate and visual column.
    pub fn set_index(&mut self, buffer: &Buffer, index: usize) {
        self.index = index;
        self.coord = buffer.index_to_coord(index);
        self.real_column = buffer.index_to_column(index);
    }

    /// Remember the current visual column as the target for vertical motion.
    pub fn update_intended_column(&mut self, buffer: &Buffer) {
        self.intended_column = buffer.index_to_column(self.index);
    }

    pub fn set_intended_column(&mut self, column: usize) {
        self.intended_column = column;
    }

    pub fn set_selection_start(&mut self, index: usize) {
        self.selection_start = Some(index);
    }

    pub fn clear_selection(&mut self) {
        self.selection_start = None;
    }

    /// Equality over everything the user can observe: position, sticky
    /// column, and selection (anchor compared only when one exists).
    pub fn equals(&self, other: &Cursor) -> bool {
        self.index == other.index
            && self.intended_column == other.intended_column
            && self.has_selection() == other.has_selection()
            && (!self.has_selection() || self.selection_start == other.selection_start)
    }
}

/// A sorted set of cursors. `reversed` selects which end is the primary
/// cursor: the first when growing upward, the last otherwise.
#[derive(Debug, Clone, Default)]
pub struct MultiCursor {
    cursors: Vec<Cursor>,
    reversed: bool,
}

impl MultiCursor {
    pub fn new() -> Self {
        Self {
            cursors: vec![Cursor::new()],
            reversed: false,
        }
    }

    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn cursors_mut(&mut self) -> &mut [Cursor] {
        &mut self.cursors
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        false // there is always at least one cursor
    }

    pub fn primary(&self) -> &Cursor {
        if self.reversed {
            &self.cursors[0]
        } else {
            self.cursors.last().expect("at least one cursor")
        }
    }

    pub fn primary_mut(&mut self) -> &mut Cursor {
        if self.reversed {
            &mut self.cursors[0]
        } else {
            self.cursors.last_mut().expect("at least one cursor")
        }
    }

    /// Insert a cursor unless one already sits at the same index.
    pub fn add_cursor(&mut self, cursor: Cursor) {
        if self.cursors.iter().any(|c| c.index() == cursor.index()) {
            return;
        }
        self.cursors.push(cursor);
        self.sort();
    }

    /// Grow the set one line downward, or shrink it when the set currently
    /// extends upward. The spawned cursor lands on the intended column of
    /// the anchor end.
    pub fn add_cursor_down(&mut self, buffer: &Buffer) {
        if self.reversed {
            if self.cursors.len() == 1 {
                self.reversed = false;
            } else {
                self.cursors.remove(0);
                return;
            }
        }

        let coord = self.cursors.last().expect("at least one cursor").coord();
        if coord.line + 1 >= buffer.line_count() {
            return;
        }

        let intended = self.cursors[0].intended_column();
        let (index, _) = buffer.column_to_index(intended, coord.line + 1);
        let mut cursor = Cursor::new();
        cursor.set_index(buffer, index);
        cursor.update_intended_column(buffer);
        self.add_cursor(cursor);
    }

    pub fn add_cursor_up(&mut self, buffer: &Buffer) {
        if !self.reversed {
            if self.cursors.len() == 1 {
                self.reversed = true;
            } else {
                self.cursors.pop();
                return;
            }
        }

        let coord = self.cursors[0].coord();
        if coord.line == 0 {
            return;
        }

        let intended = self
            .cursors
            .last()
            .expect("at least one cursor")
            .intended_column();
        let (index, _) = buffer.column_to_index(intended, coord.line - 1);
        let mut cursor = Cursor::new();
        cursor.set_index(buffer, index);
        cursor.update_intended_column(buffer);
        self.add_cursor(cursor);
    }

    /// Collapse to the primary cursor only.
    pub fn clear_multi_cursors(&mut self) {
        if self.reversed {
            self.cursors.truncate(1);
        } else {
            let primary = self.cursors.pop().expect("at least one cursor");
            self.cursors.clear();
            self.cursors.push(primary);
        }
    }

    pub fn clear_selections(&mut self) {
        for cursor in &mut self.cursors {
            cursor.clear_selection();
        }
    }

    /// Re-establish the set invariants after any outside mutation: clamp
    /// every cursor into the buffer, sort by index, drop duplicate indices,
    /// and merge cursors whose selections overlap.
    pub fn changed(&mut self, buffer: &Buffer) {
        let len = buffer.len();
        for cursor in &mut self.cursors {
            if cursor.index() > len {
                cursor.set_index(buffer, len);
            }
            if let Some(anchor) = cursor.selection_start()
                && anchor > len
            {
                cursor.set_selection_start(len);
            }
        }

        self.sort();
        self.cursors.dedup_by(|b, a| a.index() == b.index());

        // Merge overlapping selections pairwise; the survivor extends to the
        // absorbed cursor's far endpoint.
        let mut i = 1;
        while i < self.cursors.len() {
            let (left, right) = {
                let (head, tail) = self.cursors.split_at(i);
                (head[i - 1].clone(), tail[0].clone())
            };
            let (Some(s1), Some(s2)) = (left.selection(), right.selection()) else {
                i += 1;
                continue;
            };
            if s2.start < s1.end {
                let survivor = &mut self.cursors[i - 1];
                if survivor.index() == s1.end {
                    // Caret is the far end: move it, keep the anchor, and
                    // take over the absorbed cursor's intended column.
                    survivor.set_index(buffer, s2.end);
                    survivor.set_intended_column(right.intended_column());
                } else {
                    survivor.set_selection_start(s2.end);
                }
                self.cursors.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn sort(&mut self) {
        self.cursors.sort_by_key(Cursor::index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn indices(mc: &MultiCursor) -> Vec<usize> {
        mc.cursors().iter().map(Cursor::index).collect()
    }

    #[test]
    fn set_index_caches_coord_and_column() {
        let buffer = Buffer::from_str("ab\tc\nxy");
        let mut cursor = Cursor::new();
        cursor.set_index(&buffer, 3);
        assert_eq!(cursor.coord(), Coord::new(0, 3));
        assert_eq!(cursor.real_column(), 4); // tab expands to column 4
        cursor.set_index(&buffer, 6);
        assert_eq!(cursor.coord(), Coord::new(1, 1));
        assert_eq!(cursor.real_column(), 1);
    }

    #[test]
    fn selection_is_sorted_pair() {
        let buffer = Buffer::from_str("hello");
        let mut cursor = Cursor::new();
        cursor.set_index(&buffer, 1);
        cursor.set_selection_start(4);
        assert_eq!(cursor.selection(), Some(Slice::new(1, 4)));
        cursor.set_index(&buffer, 5);
        assert_eq!(cursor.selection(), Some(Slice::new(4, 5)));
    }

    #[test]
    fn empty_selection_is_still_a_selection() {
        let buffer = Buffer::from_str("hello");
        let mut cursor = Cursor::new();
        cursor.set_index(&buffer, 2);
        cursor.set_selection_start(2);
        assert!(cursor.has_selection());
        assert_eq!(cursor.selection(), Some(Slice::new(2, 2)));
    }

    #[test]
    fn add_cursor_down_spawns_on_intended_column() {
        let buffer = Buffer::from_str("foo\nbar\nbaz");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 3);
        mc.primary_mut().update_intended_column(&buffer);

        mc.add_cursor_down(&buffer);
        mc.add_cursor_down(&buffer);
        assert_eq!(indices(&mc), vec![3, 7, 11]);
    }

    #[test]
    fn add_cursor_down_then_up_shrinks() {
        let buffer = Buffer::from_str("foo\nbar\nbaz");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 1);
        mc.primary_mut().update_intended_column(&buffer);

        mc.add_cursor_down(&buffer);
        assert_eq!(mc.len(), 2);
        mc.add_cursor_up(&buffer);
        assert_eq!(indices(&mc), vec![1]);
    }

    #[test]
    fn add_cursor_up_grows_reversed() {
        let buffer = Buffer::from_str("foo\nbar\nbaz");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 9);
        mc.primary_mut().update_intended_column(&buffer);

        mc.add_cursor_up(&buffer);
        mc.add_cursor_up(&buffer);
        assert_eq!(indices(&mc), vec![1, 5, 9]);
        // Growing upward makes the first cursor primary.
        assert_eq!(mc.primary().index(), 1);
    }

    #[test]
    fn add_cursor_down_stops_at_last_line() {
        let buffer = Buffer::from_str("one\ntwo");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 5);
        mc.primary_mut().update_intended_column(&buffer);
        mc.add_cursor_down(&buffer);
        assert_eq!(mc.len(), 1);
    }

    #[test]
    fn changed_clamps_sorts_and_dedups() {
        let buffer = Buffer::from_str("hello");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 4);
        let mut far = Cursor::new();
        far.set_index(&buffer, 5);
        mc.add_cursor(far);

        // Shrink the buffer out from under the cursors.
        let buffer = Buffer::from_str("hi");
        mc.changed(&buffer);
        assert_eq!(indices(&mc), vec![2]);
    }

    #[test]
    fn changed_merges_overlapping_selections() {
        let buffer = Buffer::from_str("abcdefgh");
        let mut mc = MultiCursor::new();
        // Cursor 1: selection [0, 5) with caret at 5.
        mc.primary_mut().set_index(&buffer, 5);
        mc.primary_mut().set_selection_start(0);
        // Cursor 2: selection [3, 8) with caret at 8.
        let mut second = Cursor::new();
        second.set_index(&buffer, 8);
        second.set_selection_start(3);
        mc.add_cursor(second);

        mc.changed(&buffer);
        assert_eq!(mc.len(), 1);
        let merged = &mc.cursors()[0];
        assert_eq!(merged.index(), 8);
        assert_eq!(merged.selection_start(), Some(0));
        assert_eq!(merged.selection(), Some(Slice::new(0, 8)));
    }

    #[test]
    fn changed_merges_anchor_forward_selection() {
        let buffer = Buffer::from_str("abcdefgh");
        let mut mc = MultiCursor::new();
        // Caret at the *start* of the first selection: anchor is the far end.
        mc.primary_mut().set_index(&buffer, 1);
        mc.primary_mut().set_selection_start(5);
        let mut second = Cursor::new();
        second.set_index(&buffer, 8);
        second.set_selection_start(4);
        mc.add_cursor(second);

        mc.changed(&buffer);
        assert_eq!(mc.len(), 1);
        let merged = &mc.cursors()[0];
        assert_eq!(merged.index(), 1);
        assert_eq!(merged.selection_start(), Some(8));
    }

    #[test]
    fn changed_keeps_disjoint_selections() {
        let buffer = Buffer::from_str("abcdefgh");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 2);
        mc.primary_mut().set_selection_start(0);
        let mut second = Cursor::new();
        second.set_index(&buffer, 7);
        second.set_selection_start(4);
        mc.add_cursor(second);

        mc.changed(&buffer);
        assert_eq!(mc.len(), 2);
    }

    #[test]
    fn clear_multi_cursors_keeps_primary() {
        let buffer = Buffer::from_str("foo\nbar\nbaz");
        let mut mc = MultiCursor::new();
        mc.primary_mut().set_index(&buffer, 1);
        mc.primary_mut().update_intended_column(&buffer);
        mc.add_cursor_down(&buffer);
        mc.add_cursor_down(&buffer);
        let primary = mc.primary().index();
        mc.clear_multi_cursors();
        assert_eq!(indices(&mc), vec![primary]);
    }
}
