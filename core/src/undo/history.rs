//! Undo/redo history.
//!
//! [`UndoHistory`] is a linear timeline of committed [`UndoEntry`] values
//! with a cursor. Entries before the cursor are applied, entries after it
//! are available for redo. Adding a new entry after undoing discards the
//! redo branch: there is no branching history.

use std::collections::VecDeque;
use std::fmt;

use super::cmd::{Cmd, CmdError, CmdResult, Editable};
use crate::config::UndoConfig;

/// Default maximum number of undo steps.
pub const DEFAULT_MAX_UNDO: usize = 100;

/// One committed transaction.
///
/// Immutable once committed: the history only moves its cursor across
/// entries, it never edits an entry's command list.
pub struct UndoEntry<T: Editable> {
    label: String,
    cmds: Vec<Box<dyn Cmd<T>>>,
    modifies_content: bool,
    footprint: usize,
}

impl<T: Editable> UndoEntry<T> {
    pub(crate) fn new(label: String, cmds: Vec<Box<dyn Cmd<T>>>, modifies_content: bool) -> Self {
        let mut entry = Self {
            label,
            cmds,
            modifies_content,
            footprint: 0,
        };
        entry.footprint = entry.measure();
        entry
    }

    /// The transaction label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of commands in the entry.
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    /// Returns `true` if the entry holds no commands.
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Whether undoing or redoing this entry changes document content.
    pub fn modifies_content(&self) -> bool {
        self.modifies_content
    }

    /// Approximate bytes held by the entry's commands.
    pub fn memory_footprint(&self) -> usize {
        self.footprint
    }

    fn measure(&self) -> usize {
        self.label.len() + self.cmds.iter().map(|c| c.memory_footprint()).sum::<usize>()
    }

    /// Undoes every command in reverse insertion order.
    ///
    /// If one command fails, the commands already undone are redone so the
    /// entry is left fully applied.
    fn undo(&mut self, target: &mut T) -> CmdResult {
        for i in (0..self.cmds.len()).rev() {
            if let Err(e) = self.cmds[i].undo(target) {
                for cmd in &mut self.cmds[i + 1..] {
                    if let Err(e) = cmd.redo(target) {
                        log::error!("Could not re-apply '{}' after failed undo: {e}", cmd.label());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Redoes every command in insertion order.
    ///
    /// If one command fails, the commands already redone are undone so the
    /// entry is left fully undone.
    fn redo(&mut self, target: &mut T) -> CmdResult {
        for i in 0..self.cmds.len() {
            if let Err(e) = self.cmds[i].redo(target) {
                for cmd in self.cmds[..i].iter_mut().rev() {
                    if let Err(e) = cmd.undo(target) {
                        log::error!("Could not revert '{}' after failed redo: {e}", cmd.label());
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

impl<T: Editable> fmt::Debug for UndoEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoEntry")
            .field("label", &self.label)
            .field("cmds", &self.cmds)
            .field("modifies_content", &self.modifies_content)
            .field("footprint", &self.footprint)
            .finish()
    }
}

/// Linear undo/redo history with a saved-state tracker.
///
/// # Example
///
/// ```ignore
/// let mut history = UndoHistory::new(50);
/// let mut tx = Transaction::begin("Move cel");
/// tx.add(Box::new(move_cel), &mut ctx)?;
/// tx.commit(&mut history)?;
///
/// history.undo(&mut ctx)?;
/// history.redo(&mut ctx)?;
/// ```
pub struct UndoHistory<T: Editable> {
    entries: VecDeque<UndoEntry<T>>,
    /// Number of applied entries; `entries[..cursor]` are applied.
    cursor: usize,
    max_undo: usize,
    memory_limit: usize,
    memory_used: usize,
    /// Tracks distance from the saved state, in content steps.
    ///
    /// - `Some(0)` — the current state matches the last save.
    /// - `Some(n)` where `n > 0` — `n` undos needed to reach the saved state.
    /// - `Some(n)` where `n < 0` — `|n|` redos needed to reach the saved state.
    /// - `None` — never reachable again (the entries leading to it were
    ///   evicted, or the redo branch holding it was discarded).
    save_distance: Option<i64>,
    /// Sticky flag set when a save failed midway.
    saved_state_lost: bool,
    /// Bumped on every add, undo, redo and clear.
    revision: u64,
    /// While `false`, [`add`](Self::add) drops entries instead of recording.
    enabled: bool,
}

impl<T: Editable> UndoHistory<T> {
    /// Creates an empty history keeping at most `max_undo` entries and no
    /// memory budget.
    pub fn new(max_undo: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_undo: max_undo.max(1),
            memory_limit: usize::MAX,
            memory_used: 0,
            save_distance: Some(0),
            saved_state_lost: false,
            revision: 0,
            enabled: true,
        }
    }

    /// Creates an empty history with the limits from `config`.
    pub fn with_config(config: &UndoConfig) -> Self {
        let mut history = Self::new(config.max_undo_steps);
        history.memory_limit = config.undo_size_limit_bytes();
        history
    }

    /// Turns recording on or off.
    ///
    /// While off, committed entries are dropped. Dropping one that changed
    /// content also drops the whole timeline, since its entries no longer
    /// lead to the current state.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::debug!("Undo recording {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Appends a committed entry. Returns `false` if recording is off and the
    /// entry was dropped.
    ///
    /// Discards every entry after the cursor first, then evicts the oldest
    /// entries while the count or memory budget is exceeded (the newest
    /// entry is always kept).
    pub fn add(&mut self, entry: UndoEntry<T>) -> bool {
        if !self.enabled {
            log::debug!("Undo recording off, dropping '{}'", entry.label);
            if entry.modifies_content {
                self.entries.clear();
                self.cursor = 0;
                self.memory_used = 0;
                self.save_distance = None;
            }
            self.revision += 1;
            return false;
        }

        if self.cursor < self.entries.len() {
            let discarded = self.entries.len() - self.cursor;
            for dropped in self.entries.drain(self.cursor..) {
                self.memory_used -= dropped.footprint;
            }
            // A negative distance means the save point was in the branch we
            // just threw away.
            if let Some(d) = self.save_distance
                && d < 0
            {
                self.save_distance = None;
            }
            log::trace!("Discarded {discarded} redo entr(ies)");
        }

        if entry.modifies_content
            && let Some(d) = &mut self.save_distance
        {
            *d += 1;
        }

        self.memory_used += entry.footprint;
        self.entries.push_back(entry);
        self.cursor = self.entries.len();
        self.revision += 1;

        self.evict();
        true
    }

    fn evict(&mut self) {
        while self.entries.len() > self.max_undo
            || (self.entries.len() > 1 && self.memory_used > self.memory_limit)
        {
            if self.cursor == 0 {
                break;
            }
            let Some(dropped) = self.entries.pop_front() else {
                break;
            };
            self.cursor -= 1;
            self.memory_used -= dropped.footprint;
            log::debug!(
                "Evicted undo entry '{}' ({} bytes)",
                dropped.label,
                dropped.footprint
            );

            // If the save point was behind the oldest surviving entry, it's gone.
            if let Some(d) = self.save_distance
                && d > self.applied_content_entries() as i64
            {
                self.save_distance = None;
            }
        }
    }

    fn applied_content_entries(&self) -> usize {
        self.entries
            .iter()
            .take(self.cursor)
            .filter(|e| e.modifies_content)
            .count()
    }

    /// Undoes the entry before the cursor and moves the cursor back.
    ///
    /// Returns an error if there is nothing to undo or the undo failed; a
    /// failed undo leaves the entry applied and the cursor in place.
    pub fn undo(&mut self, target: &mut T) -> CmdResult {
        if self.cursor == 0 {
            return Err(CmdError::Custom("nothing to undo".into()));
        }
        let index = self.cursor - 1;
        let entry = &mut self.entries[index];
        log::debug!("Undo: {}", entry.label);
        if let Err(e) = entry.undo(target) {
            report_failure("Undo", &entry.label, &e);
            return Err(e);
        }

        let modifies_content = entry.modifies_content;
        self.cursor = index;
        if modifies_content && let Some(d) = &mut self.save_distance {
            *d -= 1;
        }
        self.refresh_footprint(index);
        self.revision += 1;
        Ok(())
    }

    /// Moves the cursor forward and redoes that entry.
    ///
    /// Returns an error if there is nothing to redo or the redo failed; a
    /// failed redo leaves the entry undone and the cursor in place.
    pub fn redo(&mut self, target: &mut T) -> CmdResult {
        if self.cursor == self.entries.len() {
            return Err(CmdError::Custom("nothing to redo".into()));
        }
        let index = self.cursor;
        let entry = &mut self.entries[index];
        log::debug!("Redo: {}", entry.label);
        if let Err(e) = entry.redo(target) {
            report_failure("Redo", &entry.label, &e);
            return Err(e);
        }

        let modifies_content = entry.modifies_content;
        self.cursor = index + 1;
        if modifies_content && let Some(d) = &mut self.save_distance {
            *d += 1;
        }
        self.refresh_footprint(index);
        self.revision += 1;
        Ok(())
    }

    /// Commands may move data between live and suspended form on undo/redo,
    /// so the entry is re-measured afterwards.
    fn refresh_footprint(&mut self, index: usize) {
        let entry = &mut self.entries[index];
        let measured = entry.measure();
        self.memory_used = self.memory_used - entry.footprint + measured;
        entry.footprint = measured;
    }

    /// Returns `true` if the cursor is not at the start of the timeline.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Returns `true` if the cursor is not at the end of the timeline.
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Label of the entry the next [`undo`](Self::undo) would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .map(|i| self.entries[i].label.as_str())
    }

    /// Label of the entry the next [`redo`](Self::redo) would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(|e| e.label.as_str())
    }

    /// Returns an iterator over undo labels, most recent first.
    pub fn undo_labels(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .take(self.cursor)
            .rev()
            .map(|e| e.label.as_str())
    }

    /// Returns an iterator over redo labels, next redo first.
    pub fn redo_labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().skip(self.cursor).map(|e| e.label.as_str())
    }

    /// Number of entries on the timeline (applied and undone).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of applied entries.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the maximum undo depth.
    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Summed memory footprint of every entry.
    pub fn memory_footprint(&self) -> usize {
        self.memory_used
    }

    /// Memory budget in bytes (`usize::MAX` when unbounded).
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Sets the memory budget. Takes effect on the next [`add`](Self::add).
    pub fn set_memory_limit(&mut self, bytes: usize) {
        self.memory_limit = bytes;
    }

    /// Monotonic change counter; differs whenever the timeline moved.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Records the current state as the saved state.
    ///
    /// This is the only way to clear the flag set by
    /// [`impossible_to_back_to_saved_state`](Self::impossible_to_back_to_saved_state):
    /// a later successful save.
    pub fn mark_saved_state(&mut self) {
        self.save_distance = Some(0);
        self.saved_state_lost = false;
    }

    /// Marks the saved state as permanently unreachable.
    ///
    /// Used when a save fails midway and the file on disk no longer matches
    /// any point of the timeline. Undo, redo, add and clear never reset it.
    pub fn impossible_to_back_to_saved_state(&mut self) {
        self.saved_state_lost = true;
    }

    /// Returns `true` if the current state matches the last save.
    pub fn is_in_saved_state(&self) -> bool {
        !self.saved_state_lost && self.save_distance == Some(0)
    }

    /// Returns `true` if the current state differs from the last saved state.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.is_in_saved_state()
    }

    /// Signed distance, in content steps, to the saved state.
    ///
    /// `None` if the saved state can no longer be reached.
    pub fn save_distance(&self) -> Option<i64> {
        if self.saved_state_lost {
            None
        } else {
            self.save_distance
        }
    }

    /// Drops every entry.
    ///
    /// If the current state was the saved state it remains so, otherwise the
    /// save point is permanently lost.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.memory_used = 0;
        if self.save_distance != Some(0) {
            self.save_distance = None;
        }
        self.revision += 1;
    }
}

fn report_failure(step: &str, label: &str, e: &CmdError) {
    if e.is_corruption() {
        log::error!("{step} of '{label}' hit corrupted data: {e}");
        debug_assert!(false, "{step} of '{label}' hit corrupted data: {e}");
    } else {
        log::warn!("{step} of '{label}' failed: {e}");
    }
}

impl<T: Editable> fmt::Debug for UndoHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoHistory")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("max_undo", &self.max_undo)
            .field("memory_used", &self.memory_used)
            .field("save_distance", &self.save_distance)
            .field("saved_state_lost", &self.saved_state_lost)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::Transaction;

    struct Counter {
        value: i32,
    }

    impl Editable for Counter {}

    #[derive(Debug)]
    struct Add {
        amount: i32,
    }

    impl Cmd<Counter> for Add {
        fn execute(&mut self, target: &mut Counter) -> CmdResult {
            target.value += self.amount;
            Ok(())
        }

        fn undo(&mut self, target: &mut Counter) -> CmdResult {
            target.value -= self.amount;
            Ok(())
        }

        fn redo(&mut self, target: &mut Counter) -> CmdResult {
            self.execute(target)
        }

        fn label(&self) -> &str {
            "Add"
        }
    }

    /// View-state command that never affects the save distance.
    #[derive(Debug)]
    struct Scroll;

    impl Cmd<Counter> for Scroll {
        fn execute(&mut self, _target: &mut Counter) -> CmdResult {
            Ok(())
        }

        fn undo(&mut self, _target: &mut Counter) -> CmdResult {
            Ok(())
        }

        fn redo(&mut self, _target: &mut Counter) -> CmdResult {
            Ok(())
        }

        fn label(&self) -> &str {
            "Scroll"
        }

        fn modifies_content(&self) -> bool {
            false
        }
    }

    /// Fails on undo once `armed` is set; used to check entry-level recovery.
    #[derive(Debug)]
    struct FragileUndo {
        armed: bool,
    }

    impl Cmd<Counter> for FragileUndo {
        fn execute(&mut self, target: &mut Counter) -> CmdResult {
            target.value += 100;
            Ok(())
        }

        fn undo(&mut self, target: &mut Counter) -> CmdResult {
            if self.armed {
                return Err(CmdError::InvalidState("fragile".into()));
            }
            target.value -= 100;
            Ok(())
        }

        fn redo(&mut self, target: &mut Counter) -> CmdResult {
            self.execute(target)
        }

        fn label(&self) -> &str {
            "Fragile"
        }
    }

    /// Reports a large footprint to exercise the memory budget.
    #[derive(Debug)]
    struct Heavy;

    impl Cmd<Counter> for Heavy {
        fn execute(&mut self, target: &mut Counter) -> CmdResult {
            target.value += 1;
            Ok(())
        }

        fn undo(&mut self, target: &mut Counter) -> CmdResult {
            target.value -= 1;
            Ok(())
        }

        fn redo(&mut self, target: &mut Counter) -> CmdResult {
            self.execute(target)
        }

        fn label(&self) -> &str {
            "Heavy"
        }

        fn memory_footprint(&self) -> usize {
            1000
        }
    }

    fn commit(
        history: &mut UndoHistory<Counter>,
        counter: &mut Counter,
        cmd: Box<dyn Cmd<Counter>>,
    ) -> bool {
        let label = cmd.label().to_owned();
        let mut tx = Transaction::begin(label);
        tx.add(cmd, counter).unwrap();
        tx.commit(history).unwrap()
    }

    fn add(history: &mut UndoHistory<Counter>, counter: &mut Counter, amount: i32) {
        commit(history, counter, Box::new(Add { amount }));
    }

    #[test]
    fn disabled_history_drops_view_entries_only() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };
        add(&mut history, &mut counter, 1);
        history.mark_saved_state();

        history.set_enabled(false);
        assert!(!history.is_enabled());
        let revision = history.revision();
        assert!(!commit(&mut history, &mut counter, Box::new(Scroll)));
        assert_eq!(history.len(), 1);
        assert!(history.can_undo());
        assert!(history.is_in_saved_state());
        assert!(history.revision() > revision);
    }

    #[test]
    fn disabled_history_drops_timeline_on_content_change() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };
        add(&mut history, &mut counter, 1);
        add(&mut history, &mut counter, 2);
        history.undo(&mut counter).unwrap();
        history.mark_saved_state();

        history.set_enabled(false);
        assert!(!commit(&mut history, &mut counter, Box::new(Add { amount: 5 })));
        assert_eq!(counter.value, 6);
        assert!(history.is_empty());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.memory_footprint(), 0);
        assert!(history.has_unsaved_changes());

        history.set_enabled(true);
        add(&mut history, &mut counter, 3);
        assert_eq!(history.len(), 1);
        history.undo(&mut counter).unwrap();
        assert_eq!(counter.value, 6);
        assert_eq!(history.save_distance(), None);
    }

    #[test]
    fn add_advances_cursor() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 5);

        assert_eq!(counter.value, 5);
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 1);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_then_redo() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 10 };

        add(&mut history, &mut counter, 5);
        history.undo(&mut counter).unwrap();
        assert_eq!(counter.value, 10);
        assert_eq!(history.cursor(), 0);
        assert!(history.can_redo());

        history.redo(&mut counter).unwrap();
        assert_eq!(counter.value, 15);
        assert_eq!(history.cursor(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn linear_after_n_adds() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };
        for n in 1..=5 {
            add(&mut history, &mut counter, n);
            assert!(history.can_undo());
            assert!(!history.can_redo());
        }
    }

    #[test]
    fn add_after_undo_discards_redo_branch() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        add(&mut history, &mut counter, 2);
        history.undo(&mut counter).unwrap();
        assert!(history.can_redo());

        add(&mut history, &mut counter, 10);
        assert!(!history.can_redo());
        assert!(history.redo(&mut counter).is_err());
        assert_eq!(history.len(), 2);
        assert_eq!(counter.value, 11);
    }

    #[test]
    fn undo_empty_returns_error() {
        let mut history = UndoHistory::<Counter>::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };
        assert!(history.undo(&mut counter).is_err());
        assert!(history.redo(&mut counter).is_err());
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut history = UndoHistory::new(2);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        add(&mut history, &mut counter, 2);
        add(&mut history, &mut counter, 3);

        assert_eq!(history.len(), 2);
        assert_eq!(counter.value, 6);

        history.undo(&mut counter).unwrap();
        history.undo(&mut counter).unwrap();
        assert_eq!(counter.value, 1);
        assert!(history.undo(&mut counter).is_err());
    }

    #[test]
    fn memory_budget_evicts_oldest_but_keeps_newest() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        history.set_memory_limit(2500);
        let mut counter = Counter { value: 0 };

        for _ in 0..4 {
            commit(&mut history, &mut counter, Box::new(Heavy));
        }
        assert_eq!(history.len(), 2);
        assert!(history.memory_footprint() <= 2500);

        history.set_memory_limit(10);
        commit(&mut history, &mut counter, Box::new(Heavy));
        assert_eq!(history.len(), 1);
        assert_eq!(counter.value, 5);
    }

    #[test]
    fn labels() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        assert_eq!(history.undo_label(), None);
        add(&mut history, &mut counter, 1);
        commit(&mut history, &mut counter, Box::new(Scroll));

        let undos: Vec<&str> = history.undo_labels().collect();
        assert_eq!(undos, vec!["Scroll", "Add"]);

        history.undo(&mut counter).unwrap();
        assert_eq!(history.undo_label(), Some("Add"));
        assert_eq!(history.redo_label(), Some("Scroll"));
        let redos: Vec<&str> = history.redo_labels().collect();
        assert_eq!(redos, vec!["Scroll"]);
    }

    #[test]
    fn failed_undo_keeps_entry_applied() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        let mut tx = Transaction::begin("Mixed");
        tx.add(Box::new(FragileUndo { armed: true }), &mut counter)
            .unwrap();
        tx.add(Box::new(Add { amount: 1 }), &mut counter).unwrap();
        tx.commit(&mut history).unwrap();
        assert_eq!(counter.value, 101);

        assert!(history.undo(&mut counter).is_err());
        assert_eq!(counter.value, 101);
        assert_eq!(history.cursor(), 1);
    }

    #[test]
    fn revision_moves_on_every_change() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };
        let r0 = history.revision();
        add(&mut history, &mut counter, 1);
        let r1 = history.revision();
        history.undo(&mut counter).unwrap();
        let r2 = history.revision();
        assert!(r0 < r1 && r1 < r2);
    }

    // -- Saved state ---------------------------------------------------------

    #[test]
    fn new_history_is_saved() {
        let history = UndoHistory::<Counter>::new(DEFAULT_MAX_UNDO);
        assert!(history.is_in_saved_state());
        assert_eq!(history.save_distance(), Some(0));
    }

    #[test]
    fn undo_redo_walk_back_to_saved_state() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        history.mark_saved_state();
        add(&mut history, &mut counter, 2);
        assert_eq!(history.save_distance(), Some(1));
        assert!(history.has_unsaved_changes());

        history.undo(&mut counter).unwrap();
        assert!(history.is_in_saved_state());

        history.undo(&mut counter).unwrap();
        assert_eq!(history.save_distance(), Some(-1));

        history.redo(&mut counter).unwrap();
        assert!(history.is_in_saved_state());
    }

    #[test]
    fn view_state_entries_do_not_move_save_distance() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        commit(&mut history, &mut counter, Box::new(Scroll));
        assert!(history.is_in_saved_state());
        history.undo(&mut counter).unwrap();
        assert!(history.is_in_saved_state());
    }

    #[test]
    fn discarding_branch_with_save_point_makes_it_unreachable() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        add(&mut history, &mut counter, 2);
        history.mark_saved_state();
        history.undo(&mut counter).unwrap();
        assert_eq!(history.save_distance(), Some(-1));

        // The save point lives in the discarded redo branch.
        commit(&mut history, &mut counter, Box::new(Scroll));
        assert_eq!(history.save_distance(), None);

        history.undo(&mut counter).unwrap();
        history.undo(&mut counter).unwrap();
        assert!(history.has_unsaved_changes());
    }

    #[test]
    fn discarding_branch_ahead_of_save_point_keeps_it() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        history.mark_saved_state();
        add(&mut history, &mut counter, 2);
        history.undo(&mut counter).unwrap();
        assert!(history.is_in_saved_state());

        add(&mut history, &mut counter, 3);
        assert_eq!(history.save_distance(), Some(1));
        history.undo(&mut counter).unwrap();
        assert!(history.is_in_saved_state());
    }

    #[test]
    fn eviction_past_save_point_makes_it_unreachable() {
        let mut history = UndoHistory::new(2);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        add(&mut history, &mut counter, 2);
        add(&mut history, &mut counter, 3);
        assert_eq!(history.save_distance(), None);
    }

    #[test]
    fn impossible_to_back_to_saved_state_is_sticky() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        history.undo(&mut counter).unwrap();
        assert!(history.is_in_saved_state());

        history.impossible_to_back_to_saved_state();
        assert!(!history.is_in_saved_state());

        history.redo(&mut counter).unwrap();
        history.undo(&mut counter).unwrap();
        history.clear();
        assert!(!history.is_in_saved_state());

        history.mark_saved_state();
        assert!(history.is_in_saved_state());
    }

    #[test]
    fn clear_keeps_saved_state_only_when_at_it() {
        let mut history = UndoHistory::new(DEFAULT_MAX_UNDO);
        let mut counter = Counter { value: 0 };

        add(&mut history, &mut counter, 1);
        history.mark_saved_state();
        history.clear();
        assert!(history.is_in_saved_state());
        assert!(!history.can_undo());

        add(&mut history, &mut counter, 1);
        history.clear();
        assert!(history.has_unsaved_changes());
    }

    #[test]
    fn with_config_uses_limits() {
        let config = UndoConfig {
            max_undo_steps: 3,
            undo_size_limit_mb: 1,
            ..UndoConfig::default()
        };
        let history = UndoHistory::<Counter>::with_config(&config);
        assert_eq!(history.max_undo(), 3);
        assert_eq!(history.memory_limit(), 1024 * 1024);
    }

    #[test]
    fn debug_impl() {
        let history = UndoHistory::<Counter>::new(DEFAULT_MAX_UNDO);
        let debug = format!("{history:?}");
        assert!(debug.contains("UndoHistory"));
        assert!(debug.contains("save_distance"));
    }
}
