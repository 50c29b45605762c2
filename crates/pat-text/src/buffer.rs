//! The document byte buffer and its cached line index.
//!
//! ```text
//! text    = "hello\nworld"
//! bytes   =  h e l l o \n w o r l d        (len 11, index 11 reads 0)
//! lines   =  [ (0,5), (6,11) ]
//!
//! text    = "hello\nworld\n"
//! lines   =  [ (0,5), (6,11), (12,12) ]    trailing newline adds a null line
//!
//! text    = ""
//! lines   =  [ (0,0) ]                     always at least one line
//! ```
//!
//! Invariants maintained by every mutation:
//! * `lines[0].start == 0`.
//! * `lines[i].end` is the index of the `\n` terminating line `i`; the final
//!   line's `end` equals the buffer length.
//! * `lines[i+1].start == lines[i].end + 1`.

use crate::{Coord, Slice};

/// Handle returned by [`Buffer::register_listener`]; pass it back to
/// [`Buffer::unregister_listener`] to drop the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type ChangeListener = Box<dyn FnMut() + Send>;

pub struct Buffer {
    data: Vec<u8>,
    lines: Vec<Slice>,
    tab_size: usize,
    listeners: Vec<(ListenerId, ChangeListener)>,
    next_listener: u64,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.data.len())
            .field("lines", &self.lines.len())
            .field("tab_size", &self.tab_size)
            .finish()
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mut buffer = Self {
            data,
            lines: Vec::new(),
            tab_size: 4,
            listeners: Vec::new(),
            next_listener: 0,
        };
        buffer.recompute_lines();
        buffer
    }

    pub fn from_str(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Visual width of a tab character. Always at least 1.
    pub fn tab_size(&self) -> usize {
        self.tab_size
    }

    pub fn set_tab_size(&mut self, tab_size: usize) {
        self.tab_size = tab_size.max(1);
    }

    /// Byte at `index` widened to `u32`. Index `len` is valid and reads 0,
    /// acting as the null terminator the line math relies on.
    pub fn at(&self, index: usize) -> u32 {
        debug_assert!(index <= self.data.len());
        self.data.get(index).copied().unwrap_or(0) as u32
    }

    /// Copy of the byte range `[index, index + count)`. `count == 0` yields
    /// an empty vector. The caller guarantees the range is in bounds.
    pub fn substring(&self, index: usize, count: usize) -> Vec<u8> {
        if count == 0 {
            return Vec::new();
        }
        debug_assert!(index + count <= self.data.len());
        self.data[index..index + count].to_vec()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Slice {
        self.lines[index]
    }

    pub fn lines(&self) -> &[Slice] {
        &self.lines
    }

    /// Locate `index` in the line table by binary search. The newline byte
    /// belongs to the line it terminates, and `index == len` maps onto the
    /// final line.
    pub fn index_to_coord(&self, index: usize) -> Coord {
        debug_assert!(index <= self.data.len());
        let mut lo = 0usize;
        let mut hi = self.lines.len() - 1;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let slice = self.lines[mid];
            if slice.start <= index && index <= slice.end {
                return Coord::new(mid, index - slice.start);
            } else if slice.end < index {
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }
        unreachable!("index {index} not covered by the line table");
    }

    /// Inverse of [`Buffer::index_to_coord`]. No bounds check: an invalid
    /// coord produces an invalid index.
    pub fn coord_to_index(&self, coord: Coord) -> usize {
        self.lines[coord.line].start + coord.character
    }

    /// Visual column of `index`, expanding each tab to the next multiple of
    /// the tab size.
    pub fn index_to_column(&self, index: usize) -> usize {
        let line = self.lines[self.index_to_coord(index).line];
        let mut column = 0usize;
        let mut tab_width = self.tab_size;
        for i in line.start..index {
            if self.at(i) == b'\t' as u32 {
                column += tab_width;
                tab_width = self.tab_size;
            } else {
                column += 1;
                tab_width -= 1;
                if tab_width == 0 {
                    tab_width = self.tab_size;
                }
            }
        }
        column
    }

    /// Byte index on `line` whose visual column is `column`. When the column
    /// lands inside a tab's expansion the tab's own index is returned and the
    /// second value is the number of columns left within the tab; when the
    /// column is past the end of the line the end index is returned with the
    /// overshoot as the delta. Exact hits return a delta of zero.
    pub fn column_to_index(&self, column: usize, line: usize) -> (usize, usize) {
        let slice = self.lines[line];
        let mut current = 0usize;
        let mut tab_width = self.tab_size;
        for i in slice.start..=slice.end {
            if current == column {
                return (i, 0);
            }
            if current > column {
                // Overshot: the column sits inside the previous tab.
                return (i - 1, self.tab_size - (current - column));
            }
            if self.at(i) == b'\t' as u32 {
                current += tab_width;
                tab_width = self.tab_size;
            } else {
                current += 1;
                tab_width -= 1;
                if tab_width == 0 {
                    tab_width = self.tab_size;
                }
            }
        }
        (slice.end, column - current)
    }

    /// A coord is valid when its line exists and its character offset is at
    /// most the line length (sitting on the newline is allowed). Returns the
    /// corresponding byte index.
    pub fn is_valid_coord(&self, coord: Coord) -> Option<usize> {
        if coord.line >= self.lines.len() {
            return None;
        }
        let line = self.lines[coord.line];
        if coord.character > line.len() {
            return None;
        }
        Some(self.coord_to_index(coord))
    }

    pub fn insert_text(&mut self, index: usize, text: &[u8]) {
        debug_assert!(index <= self.data.len());
        if text.is_empty() {
            return;
        }
        self.data.splice(index..index, text.iter().copied());
        self.on_buffer_changed();
    }

    pub fn remove_text(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        debug_assert!(index + count <= self.data.len());
        self.data.drain(index..index + count);
        self.on_buffer_changed();
    }

    pub fn register_listener(&mut self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    fn on_buffer_changed(&mut self) {
        self.recompute_lines();
        for (_, listener) in &mut self.listeners {
            listener();
        }
    }

    // Single linear scan. Splitting at every newline and closing the final
    // slice at the buffer length yields the null line for free.
    fn recompute_lines(&mut self) {
        self.lines.clear();
        let mut start = 0usize;
        for (i, &b) in self.data.iter().enumerate() {
            if b == b'\n' {
                self.lines.push(Slice::new(start, i));
                start = i + 1;
            }
        }
        self.lines.push(Slice::new(start, self.data.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_null_line() {
        let b = Buffer::new();
        assert_eq!(b.lines(), &[Slice::new(0, 0)]);
        assert_eq!(b.at(0), 0);
    }

    #[test]
    fn line_table_without_trailing_newline() {
        let b = Buffer::from_str("hello\nworld");
        assert_eq!(b.lines(), &[Slice::new(0, 5), Slice::new(6, 11)]);
    }

    #[test]
    fn trailing_newline_adds_null_line() {
        let b = Buffer::from_str("hello\nworld\n");
        assert_eq!(
            b.lines(),
            &[Slice::new(0, 5), Slice::new(6, 11), Slice::new(12, 12)]
        );
    }

    #[test]
    fn lines_are_contiguous_after_edits() {
        let mut b = Buffer::from_str("one\ntwo\nthree");
        b.insert_text(3, b"\nmid");
        b.remove_text(0, 2);
        let lines = b.lines();
        assert_eq!(lines[0].start, 0);
        for w in lines.windows(2) {
            assert_eq!(w[1].start, w[0].end + 1);
            assert_eq!(b.at(w[0].end), b'\n' as u32);
        }
        assert_eq!(lines.last().unwrap().end, b.len());
    }

    #[test]
    fn coord_round_trip() {
        let b = Buffer::from_str("abc\nd\n\nxy");
        for index in 0..=b.len() {
            let coord = b.index_to_coord(index);
            assert_eq!(b.coord_to_index(coord), index, "index {index}");
        }
    }

    #[test]
    fn newline_belongs_to_its_line() {
        let b = Buffer::from_str("ab\ncd");
        assert_eq!(b.index_to_coord(2), Coord::new(0, 2));
        assert_eq!(b.index_to_coord(3), Coord::new(1, 0));
        assert_eq!(b.index_to_coord(5), Coord::new(1, 2));
    }

    #[test]
    fn column_expands_tabs() {
        let b = Buffer::from_str("\tab\tc");
        // tab -> 4, a -> 5, b -> 6, tab aligns to 8, c -> 9
        assert_eq!(b.index_to_column(0), 0);
        assert_eq!(b.index_to_column(1), 4);
        assert_eq!(b.index_to_column(2), 5);
        assert_eq!(b.index_to_column(3), 6);
        assert_eq!(b.index_to_column(4), 8);
        assert_eq!(b.index_to_column(5), 9);
    }

    #[test]
    fn column_to_index_exact_and_inside_tab() {
        let b = Buffer::from_str("\tabc");
        assert_eq!(b.column_to_index(0, 0), (0, 0));
        assert_eq!(b.column_to_index(4, 0), (1, 0));
        // Columns 1..=3 land inside the tab: index of the tab plus the
        // columns remaining within it.
        assert_eq!(b.column_to_index(2, 0), (0, 2));
        // Beyond the end of the line: clamp to line end with the overshoot
        // (the end-of-line position itself occupies one column).
        assert_eq!(b.column_to_index(9, 0), (4, 1));
    }

    #[test]
    fn column_round_trip_outside_tabs() {
        let b = Buffer::from_str("ab\tcd\nxyz");
        for index in 0..=b.len() {
            let coord = b.index_to_coord(index);
            let column = b.index_to_column(index);
            let (back, delta) = b.column_to_index(column, coord.line);
            assert_eq!(delta, 0);
            assert_eq!(back, index, "index {index} column {column}");
        }
    }

    #[test]
    fn valid_coord_includes_line_end() {
        let b = Buffer::from_str("ab\ncd");
        assert_eq!(b.is_valid_coord(Coord::new(0, 2)), Some(2));
        assert_eq!(b.is_valid_coord(Coord::new(0, 3)), None);
        assert_eq!(b.is_valid_coord(Coord::new(1, 2)), Some(5));
        assert_eq!(b.is_valid_coord(Coord::new(2, 0)), None);
    }

    #[test]
    fn substring_and_at() {
        let b = Buffer::from_str("hello");
        assert_eq!(b.substring(1, 3), b"ell".to_vec());
        assert!(b.substring(2, 0).is_empty());
        assert_eq!(b.at(5), 0);
        assert_eq!(b.at(0), b'h' as u32);
    }

    #[test]
    fn listeners_fire_on_every_mutation() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut b = Buffer::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let id = b.register_listener(Box::new(move || {
            seen.fetch_add(1, Ordering::Relaxed);
        }));
        b.insert_text(0, b"ab");
        b.remove_text(0, 1);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
        b.unregister_listener(id);
        b.insert_text(0, b"c");
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }
}
