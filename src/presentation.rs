//! Timeline snapshot to renderable view items.

use agent_wire::AgentPhase;

use crate::guardrail::GuardrailState;
use crate::product::{ProductMetadata, StructuredProduct, ToolOutput};
use crate::timeline::{EntryId, EntryKind, Timeline, TimelineEntry};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewItem {
    Human {
        id: Option<EntryId>,
        text: String,
    },
    Assistant {
        /// `None` for items synthesized to carry trailing metadata.
        id: Option<EntryId>,
        text: String,
        streaming: bool,
        metadata: Option<ProductMetadata>,
        guardrail: Option<GuardrailState>,
    },
    /// Tool output without a recognized metadata shape.
    Tool {
        id: Option<EntryId>,
        name: Option<String>,
        payload: String,
    },
    Product {
        id: Option<EntryId>,
        group_id: String,
        product: StructuredProduct,
    },
    Phase {
        phase: Option<AgentPhase>,
        label: String,
    },
}

impl ViewItem {
    fn empty_carrier(metadata: ProductMetadata) -> Self {
        Self::Assistant {
            id: None,
            text: String::new(),
            streaming: false,
            metadata: Some(metadata),
            guardrail: None,
        }
    }
}

/// Map a snapshot to view items without touching it.
///
/// Metadata tool entries fold into the next answer; an answer with no text
/// and no metadata is dropped; metadata with no following answer in its turn
/// gets an empty answer to carry it.
pub fn view_items(timeline: &Timeline) -> Vec<ViewItem> {
    let mut items = Vec::with_capacity(timeline.len());
    let mut pending: Option<ProductMetadata> = None;

    for entry in timeline {
        match entry.kind {
            EntryKind::Human => {
                flush_pending(&mut items, &mut pending);
                items.push(ViewItem::Human {
                    id: entry.id.clone(),
                    text: entry.content.clone(),
                });
            }
            EntryKind::Tool => match entry.tool_output.as_ref() {
                Some(ToolOutput::Metadata(metadata)) => match pending.as_mut() {
                    Some(existing) => existing.merge(metadata.clone()),
                    None => pending = Some(metadata.clone()),
                },
                _ => items.push(ViewItem::Tool {
                    id: entry.id.clone(),
                    name: entry.tool_name.clone(),
                    payload: entry.content.clone(),
                }),
            },
            EntryKind::Phase => items.push(ViewItem::Phase {
                phase: entry.phase,
                label: entry.content.clone(),
            }),
            EntryKind::Assistant => {
                if let Some(item) = assistant_item(entry, &mut pending) {
                    items.push(item);
                }
            }
        }
    }

    flush_pending(&mut items, &mut pending);
    items
}

fn assistant_item(entry: &TimelineEntry, pending: &mut Option<ProductMetadata>) -> Option<ViewItem> {
    if entry.is_placeholder {
        return Some(ViewItem::Phase {
            phase: entry.phase,
            label: entry.content.clone(),
        });
    }

    if let (Some(product), Some(group_id)) =
        (entry.attached_product.as_ref(), entry.product_group_id.as_ref())
    {
        return Some(ViewItem::Product {
            id: entry.id.clone(),
            group_id: group_id.clone(),
            product: product.clone(),
        });
    }

    let metadata = pending.take();
    if entry.content.is_empty() && metadata.is_none() {
        return None;
    }

    Some(ViewItem::Assistant {
        id: entry.id.clone(),
        text: entry.content.clone(),
        streaming: !entry.stream_done,
        metadata,
        guardrail: entry.guardrail.clone(),
    })
}

/// Emit a carrier for unattached metadata ahead of any trailing phase items.
fn flush_pending(items: &mut Vec<ViewItem>, pending: &mut Option<ProductMetadata>) {
    let Some(metadata) = pending.take() else {
        return;
    };
    let position = items
        .iter()
        .rposition(|item| !matches!(item, ViewItem::Phase { .. }))
        .map_or(0, |index| index + 1);
    items.insert(position, ViewItem::empty_carrier(metadata));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_timeline_maps_to_nothing() {
        assert!(view_items(&Timeline::default()).is_empty());
    }

    #[test]
    fn streaming_flag_follows_stream_done() {
        let timeline = Timeline::from_entries(vec![TimelineEntry::streaming_assistant("Hi")]);
        assert!(matches!(
            view_items(&timeline).as_slice(),
            [ViewItem::Assistant {
                streaming: true,
                ..
            }]
        ));
    }
}
