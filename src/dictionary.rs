//! LZW Dictionary (spec.md §4.2): a 4096-entry code table of pixel runs.
//!
//! Explicitly *not* the teacher's parent+suffix chain representation —
//! `embedded-gif`'s `LzwEntry { first, last }` walks a chain per symbol on
//! every emit (`find_first_symbol_in_chain`/`emit_entry_chain`). spec.md
//! §4.2 "Why a dictionary of runs" argues against exactly that shape in
//! favor of one pixel run per slot, paid for in memory bounded by the
//! longest emitted run, in exchange for decode time linear in output
//! pixels. Slot/table sizing (4096 entries, clear/EOI sentinels, grow
//! coupled to the reader's code width) is kept from the teacher's
//! `table_index`/`current_symbol_size` bookkeeping.

const TABLE_SIZE: usize = 4096;

/// The run-per-slot LZW code table.
pub struct Dictionary {
    entries: Vec<Option<Vec<u32>>>,
    clear_code: u16,
    eoi_code: u16,
    next_code: u16,
}

impl Dictionary {
    /// Fills slots `[0, active_table.len())` with single-pixel runs drawn
    /// from the frame's active color table; slots `clear_code` and
    /// `eoi_code` are left as sentinels (never looked up by the decoder,
    /// which handles those codes before calling `get`). If
    /// `transparency_index` is set, that slot is overwritten with a
    /// single transparent ARGB pixel. `next_code` starts at
    /// `eoi_code + 1`.
    pub fn initialize(active_table: &[u32], transparency_index: Option<u8>, clear_code: u16, eoi_code: u16) -> Self {
        let mut entries = vec![None; TABLE_SIZE];
        for (i, &pixel) in active_table.iter().enumerate() {
            if i < TABLE_SIZE {
                entries[i] = Some(vec![pixel]);
            }
        }
        if let Some(ti) = transparency_index {
            if (ti as usize) < TABLE_SIZE {
                entries[ti as usize] = Some(vec![crate::util::TRANSPARENT]);
            }
        }

        Dictionary {
            entries,
            clear_code,
            eoi_code,
            next_code: eoi_code + 1,
        }
    }

    /// Reinstates the post-initialize state (`next_code` back to
    /// `eoi_code + 1`) without reallocating or touching the base color
    /// entries. Slots `>= next_code` are simply no longer reachable
    /// through `get`/`is_known`.
    pub fn reset(&mut self) {
        self.next_code = self.eoi_code + 1;
    }

    pub fn clear_code(&self) -> u16 {
        self.clear_code
    }

    pub fn end_of_info_code(&self) -> u16 {
        self.eoi_code
    }

    pub fn next_code(&self) -> u16 {
        self.next_code
    }

    /// A code is populated (decodable) once its slot actually holds a run.
    /// `code < next_code` alone is not sufficient: when the active color
    /// table is smaller than `clear_code`, the slots between the table's
    /// length and `clear_code` are never filled by `initialize` yet are
    /// still `< next_code` (which starts at `eoi_code + 1`), so checking
    /// the slot itself is required to catch that gap.
    pub fn is_known(&self, code: u16) -> bool {
        (code as usize) < TABLE_SIZE && code < self.next_code && self.entries[code as usize].is_some()
    }

    /// Appends `run` at the next free code, if any remain. Returns `true`
    /// if the dictionary has just filled the current code width and the
    /// reader should grow by one bit (capped at 12 — once `current_width`
    /// is already 12 this never fires again until a CLEAR).
    pub fn add_entry(&mut self, run: Vec<u32>, current_width: u8) -> bool {
        if self.next_code as usize > 4095 {
            return false; // dictionary full; silently drop per spec.md §4.2
        }
        self.entries[self.next_code as usize] = Some(run);
        self.next_code += 1;

        current_width < 12 && self.next_code as u32 == (1u32 << current_width) - 1
    }

    /// Looks up a populated slot. Panics if `code` was never populated —
    /// callers must check `is_known` (or handle the "not yet in table"
    /// special case) first; see `lzw_decoder.rs`.
    pub fn get(&self, code: u16) -> &[u32] {
        self.entries[code as usize]
            .as_deref()
            .expect("dictionary slot not populated; caller must check is_known first")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::argb_opaque;

    fn table() -> Vec<u32> {
        vec![
            argb_opaque(0, 0, 0),
            argb_opaque(255, 255, 255),
            argb_opaque(255, 0, 0),
            argb_opaque(0, 0, 255),
        ]
    }

    #[test]
    fn initialize_fills_color_slots() {
        let dict = Dictionary::initialize(&table(), None, 4, 5);
        assert_eq!(dict.get(0), &[argb_opaque(0, 0, 0)]);
        assert_eq!(dict.get(3), &[argb_opaque(0, 0, 255)]);
        assert_eq!(dict.next_code(), 6);
    }

    #[test]
    fn transparency_index_overridden() {
        let dict = Dictionary::initialize(&table(), Some(1), 4, 5);
        assert_eq!(dict.get(1), &[crate::util::TRANSPARENT]);
    }

    #[test]
    fn add_entry_signals_grow_at_width_boundary() {
        let mut dict = Dictionary::initialize(&table(), None, 4, 5);
        // next_code starts at 6; appending one entry takes it to 7, which
        // is the 2^3-1 boundary for the current 3-bit width.
        assert!(dict.add_entry(vec![0], 3));
        assert_eq!(dict.next_code(), 7);
        // at 12 bits wide the boundary is never reported again.
        assert!(!dict.add_entry(vec![0], 12));
    }

    #[test]
    fn add_entry_drops_silently_once_full() {
        let mut dict = Dictionary::initialize(&table(), None, 4, 5);
        for code in 6..=4095u16 {
            let _ = code;
            dict.add_entry(vec![1], 12);
        }
        assert_eq!(dict.next_code(), 4096);
        // one more add must not panic or grow beyond bounds
        assert!(!dict.add_entry(vec![1], 12));
        assert_eq!(dict.next_code(), 4096);
    }

    #[test]
    fn is_known_false_for_unfilled_slots_below_clear_code() {
        // A 4-entry color table with clear_code=16 (min_code_size=4)
        // leaves slots 4..16 unpopulated; they sit below next_code (17)
        // but must not report as known.
        let dict = Dictionary::initialize(&table(), None, 16, 17);
        assert!(dict.is_known(3));
        assert!(!dict.is_known(10));
        assert!(!dict.is_known(15));
    }

    #[test]
    fn reset_returns_to_post_initialize_state() {
        let mut dict = Dictionary::initialize(&table(), None, 4, 5);
        dict.add_entry(vec![1, 2], 3);
        assert!(dict.next_code() > 6);
        dict.reset();
        assert_eq!(dict.next_code(), 6);
    }
}
