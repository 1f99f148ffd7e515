//! Plain-text rendering of view items.

use assistant_stream::{GuardrailPhase, GuardrailState, StructuredProduct, ViewItem};

/// Items after the most recent human entry.
pub fn current_turn(items: &[ViewItem]) -> &[ViewItem] {
    let start = items
        .iter()
        .rposition(|item| matches!(item, ViewItem::Human { .. }))
        .map_or(0, |index| index + 1);
    &items[start..]
}

pub fn render_items(items: &[ViewItem]) -> String {
    let mut lines = Vec::new();
    for item in items {
        match item {
            ViewItem::Human { text, .. } => lines.push(format!("> {text}")),
            ViewItem::Assistant {
                text,
                streaming,
                metadata,
                guardrail,
                ..
            } => {
                if !text.is_empty() {
                    lines.push(if *streaming {
                        format!("{text} …")
                    } else {
                        text.clone()
                    });
                }
                if let Some(note) = guardrail.as_ref().and_then(guardrail_note) {
                    lines.push(note);
                }
                for product in metadata.iter().flat_map(|metadata| &metadata.products) {
                    lines.push(product_line(product));
                }
            }
            ViewItem::Tool { name, payload, .. } => {
                let name = name.as_deref().unwrap_or("tool");
                lines.push(format!("[{name}] {payload}"));
            }
            ViewItem::Product { product, .. } => lines.push(product_line(product)),
            ViewItem::Phase { label, .. } => lines.push(format!("({label})")),
        }
    }
    lines.join("\n")
}

fn guardrail_note(state: &GuardrailState) -> Option<String> {
    if state.phase != GuardrailPhase::Done {
        return None;
    }
    let verdict = state.verdict.as_ref()?;
    let note = match (verdict.compliant, verdict.was_regenerated) {
        (_, true) => format!(
            "[answer revised, {} claim(s) corrected]",
            verdict.violated_claims.len()
        ),
        (true, false) => "[answer verified]".to_string(),
        (false, false) => format!(
            "[unverified claims: {}]",
            verdict.violated_claims.join(", ")
        ),
    };
    Some(note)
}

fn product_line(product: &StructuredProduct) -> String {
    match (product.price, product.currency.as_deref()) {
        (Some(price), Some(currency)) => format!("  * {} ({price:.2} {currency})", product.title),
        (Some(price), None) => format!("  * {} ({price:.2})", product.title),
        _ => format!("  * {}", product.title),
    }
}
