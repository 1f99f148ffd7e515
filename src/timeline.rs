//! Ordered conversation entries and copy-on-write snapshots.

use std::sync::Arc;

use agent_wire::AgentPhase;
use uuid::Uuid;

use crate::guardrail::GuardrailState;
use crate::product::{StructuredProduct, ToolOutput};

pub type EntryId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Human,
    Assistant,
    Tool,
    Phase,
}

/// One conversational unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    /// Stable identity; placeholders have none.
    pub id: Option<EntryId>,
    pub kind: EntryKind,
    pub content: String,
    /// `false` while an assistant entry is still receiving deltas.
    pub stream_done: bool,
    pub is_placeholder: bool,
    pub phase: Option<AgentPhase>,
    pub tool_name: Option<String>,
    pub tool_output: Option<ToolOutput>,
    pub attached_product: Option<StructuredProduct>,
    pub product_group_id: Option<String>,
    pub guardrail: Option<GuardrailState>,
}

pub(crate) fn new_entry_id() -> EntryId {
    Uuid::new_v4().to_string()
}

impl TimelineEntry {
    fn base(kind: EntryKind, content: String) -> Self {
        Self {
            id: Some(new_entry_id()),
            kind,
            content,
            stream_done: true,
            is_placeholder: false,
            phase: None,
            tool_name: None,
            tool_output: None,
            attached_product: None,
            product_group_id: None,
            guardrail: None,
        }
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::base(EntryKind::Human, text.into())
    }

    /// An assistant entry that is still streaming.
    pub fn streaming_assistant(content: impl Into<String>) -> Self {
        Self {
            stream_done: false,
            ..Self::base(EntryKind::Assistant, content.into())
        }
    }

    /// An assistant entry that will receive no further deltas.
    pub fn finished_assistant(content: impl Into<String>) -> Self {
        Self::base(EntryKind::Assistant, content.into())
    }

    pub fn tool(name: Option<String>, content: String, output: ToolOutput) -> Self {
        Self {
            tool_name: name,
            tool_output: Some(output),
            ..Self::base(EntryKind::Tool, content)
        }
    }

    pub fn placeholder(phase: AgentPhase, label: impl Into<String>) -> Self {
        Self {
            id: None,
            is_placeholder: true,
            phase: Some(phase),
            ..Self::base(EntryKind::Phase, label.into())
        }
    }

    pub fn product_attachment(product: StructuredProduct, group_id: impl Into<String>) -> Self {
        Self {
            attached_product: Some(product),
            product_group_id: Some(group_id.into()),
            ..Self::base(EntryKind::Assistant, String::new())
        }
    }

    /// Entries manufactured from structured payload rather than free text.
    pub fn is_synthetic_attachment(&self) -> bool {
        self.attached_product.is_some() && self.product_group_id.is_some()
    }

    /// A free-text assistant answer (not a placeholder or product card).
    pub fn is_answer(&self) -> bool {
        self.kind == EntryKind::Assistant && !self.is_placeholder && !self.is_synthetic_attachment()
    }
}

/// Immutable view of the timeline.
///
/// Clones share storage; every mutation yields a fresh allocation, so
/// [`Timeline::same_snapshot`] tells subscribers whether anything changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Arc<Vec<TimelineEntry>>,
}

impl Timeline {
    pub fn from_entries(entries: Vec<TimelineEntry>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimelineEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    pub fn get(&self, id: &str) -> Option<&TimelineEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id.as_deref() == Some(id))
    }

    pub fn same_snapshot(&self, other: &Timeline) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    pub fn placeholder(&self) -> Option<&TimelineEntry> {
        self.entries.iter().find(|entry| entry.is_placeholder)
    }

    pub fn placeholder_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_placeholder).count()
    }

    /// Index of the most recent human entry.
    pub fn last_human_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.kind == EntryKind::Human)
    }

    /// Index of the most recent non-placeholder entry.
    pub fn last_content_index(&self) -> Option<usize> {
        self.entries.iter().rposition(|entry| !entry.is_placeholder)
    }

    /// Index of the answer belonging to the current turn, i.e. the last
    /// answer after the most recent human entry.
    pub fn current_answer_index(&self) -> Option<usize> {
        let turn_start = self.last_human_index().map_or(0, |index| index + 1);
        self.entries
            .iter()
            .rposition(TimelineEntry::is_answer)
            .filter(|index| *index >= turn_start)
    }

    fn with_entries(&self, edit: impl FnOnce(&mut Vec<TimelineEntry>)) -> Self {
        let mut entries = self.entries.as_ref().clone();
        edit(&mut entries);
        Self::from_entries(entries)
    }

    pub fn appended(&self, entry: TimelineEntry) -> Self {
        self.with_entries(|entries| entries.push(entry))
    }

    pub fn with_last_replaced(&self, entry: TimelineEntry) -> Self {
        self.with_entries(|entries| match entries.last_mut() {
            Some(last) => *last = entry,
            None => entries.push(entry),
        })
    }

    /// Apply `edit` to the entry at `index`. Out-of-range indices leave the
    /// snapshot shared.
    pub fn with_updated(&self, index: usize, edit: impl FnOnce(&mut TimelineEntry)) -> Self {
        if index >= self.entries.len() {
            return self.clone();
        }
        self.with_entries(|entries| edit(&mut entries[index]))
    }

    /// Drop entries matching `predicate`. Returns a shared snapshot when
    /// nothing matched.
    pub fn without(&self, predicate: impl Fn(&TimelineEntry) -> bool) -> Self {
        if !self.entries.iter().any(&predicate) {
            return self.clone();
        }
        self.with_entries(|entries| entries.retain(|entry| !predicate(entry)))
    }

    /// Insert ahead of the trailing placeholder, or append when none exists.
    pub fn inserted_before_placeholder(&self, entry: TimelineEntry) -> Self {
        self.with_entries(|entries| {
            match entries.iter().position(|existing| existing.is_placeholder) {
                Some(index) => entries.insert(index, entry),
                None => entries.push(entry),
            }
        })
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimelineEntry;
    type IntoIter = std::slice::Iter<'a, TimelineEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owner of the current snapshot. Mutations swap in a new snapshot and
/// report whether the visible timeline changed.
#[derive(Debug, Default)]
pub struct TimelineStore {
    current: Timeline,
}

impl TimelineStore {
    pub fn snapshot(&self) -> Timeline {
        self.current.clone()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.current
    }

    fn swap(&mut self, next: Timeline) -> bool {
        let changed = !next.same_snapshot(&self.current);
        self.current = next;
        changed
    }

    pub fn append(&mut self, entry: TimelineEntry) -> bool {
        let next = self.current.appended(entry);
        self.swap(next)
    }

    pub fn replace_last(&mut self, entry: TimelineEntry) -> bool {
        let next = self.current.with_last_replaced(entry);
        self.swap(next)
    }

    pub fn update(&mut self, index: usize, edit: impl FnOnce(&mut TimelineEntry)) -> bool {
        let next = self.current.with_updated(index, edit);
        self.swap(next)
    }

    pub fn remove_where(&mut self, predicate: impl Fn(&TimelineEntry) -> bool) -> bool {
        let next = self.current.without(predicate);
        self.swap(next)
    }

    pub fn insert_before_placeholder(&mut self, entry: TimelineEntry) -> bool {
        let next = self.current.inserted_before_placeholder(entry);
        self.swap(next)
    }

    /// Replace any placeholder with `entry` at the end of the timeline.
    pub fn set_placeholder(&mut self, entry: TimelineEntry) -> bool {
        if self.current.last().is_some_and(|last| last.is_placeholder) {
            return self.replace_last(entry);
        }
        let next = self
            .current
            .without(|existing| existing.is_placeholder)
            .appended(entry);
        self.swap(next)
    }

    pub fn remove_placeholder(&mut self) -> bool {
        self.remove_where(|entry| entry.is_placeholder)
    }
}

#[cfg(test)]
mod tests {
    use agent_wire::AgentPhase;

    use super::{EntryKind, Timeline, TimelineEntry, TimelineStore};
    use crate::product::StructuredProduct;

    fn product(id: &str) -> StructuredProduct {
        StructuredProduct {
            id: id.to_string(),
            title: format!("Product {id}"),
            price: None,
            currency: None,
            image_url: None,
            url: None,
            description: None,
        }
    }

    #[test]
    fn mutations_never_touch_published_snapshots() {
        let mut store = TimelineStore::default();
        store.append(TimelineEntry::human("hello"));
        let before = store.snapshot();

        store.append(TimelineEntry::streaming_assistant("hi"));
        let after = store.snapshot();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
        assert!(!before.same_snapshot(&after));
    }

    #[test]
    fn no_op_removal_keeps_snapshot_identity() {
        let mut store = TimelineStore::default();
        store.append(TimelineEntry::human("hello"));
        let before = store.snapshot();

        assert!(!store.remove_placeholder());
        assert!(before.same_snapshot(store.timeline()));
    }

    #[test]
    fn carried_over_entries_keep_their_id() {
        let mut store = TimelineStore::default();
        store.append(TimelineEntry::streaming_assistant("a"));
        let id = store.timeline().entries()[0].id.clone();

        store.update(0, |entry| entry.content.push('b'));
        store.append(TimelineEntry::human("next"));

        let entry = store.timeline().entries()[0].clone();
        assert_eq!(entry.id, id);
        assert_eq!(entry.content, "ab");
    }

    #[test]
    fn set_placeholder_keeps_a_single_trailing_placeholder() {
        let mut store = TimelineStore::default();
        store.append(TimelineEntry::human("hello"));
        store.set_placeholder(TimelineEntry::placeholder(AgentPhase::Thinking, "Thinking"));
        store.insert_before_placeholder(TimelineEntry::finished_assistant("note"));
        store.set_placeholder(TimelineEntry::placeholder(
            AgentPhase::Validating,
            "Checking",
        ));

        let timeline = store.snapshot();
        assert_eq!(timeline.placeholder_count(), 1);
        let last = timeline.last().expect("placeholder");
        assert!(last.is_placeholder);
        assert_eq!(last.phase, Some(AgentPhase::Validating));
        assert_eq!(timeline.entries()[1].content, "note");
    }

    #[test]
    fn trailing_placeholder_is_replaced_in_place() {
        let mut store = TimelineStore::default();
        store.append(TimelineEntry::human("hello"));
        store.set_placeholder(TimelineEntry::placeholder(AgentPhase::Thinking, "Thinking"));
        let before = store.snapshot();

        assert!(store.set_placeholder(TimelineEntry::placeholder(
            AgentPhase::Regenerating,
            "Rewriting",
        )));

        let timeline = store.snapshot();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.entries()[0], before.entries()[0]);
        assert_eq!(timeline.entries()[1].content, "Rewriting");
        assert_eq!(before.entries()[1].content, "Thinking");
    }

    #[test]
    fn replace_last_on_empty_timeline_appends() {
        let mut store = TimelineStore::default();
        assert!(store.replace_last(TimelineEntry::human("first")));
        assert_eq!(store.timeline().len(), 1);
    }

    #[test]
    fn current_answer_ignores_previous_turns_and_attachments() {
        let timeline = Timeline::from_entries(vec![
            TimelineEntry::human("first"),
            TimelineEntry::finished_assistant("old answer"),
            TimelineEntry::human("second"),
            TimelineEntry::product_attachment(product("p1"), "g1"),
        ]);
        assert_eq!(timeline.current_answer_index(), None);

        let timeline = timeline.appended(TimelineEntry::streaming_assistant("new"));
        assert_eq!(timeline.current_answer_index(), Some(4));
        assert_eq!(timeline.entries()[3].kind, EntryKind::Assistant);
        assert!(timeline.entries()[3].is_synthetic_attachment());
    }

    #[test]
    fn lookup_by_id_finds_entry() {
        let entry = TimelineEntry::human("hello");
        let id = entry.id.clone().expect("human entries get an id");
        let timeline = Timeline::from_entries(vec![entry]);

        assert_eq!(timeline.get(&id).map(|entry| entry.content.as_str()), Some("hello"));
        assert!(timeline.get("missing").is_none());
    }
}
