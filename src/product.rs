//! Boundary validation for structured product payloads and tool output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A product card the renderer can trust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredProduct {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Validates and coerces arbitrary backend payloads.
pub trait ProductNormalizer {
    /// Returns `None` when `raw` cannot be turned into a product.
    fn normalize(&self, raw: &Value) -> Option<StructuredProduct>;
}

impl<F> ProductNormalizer for F
where
    F: Fn(&Value) -> Option<StructuredProduct>,
{
    fn normalize(&self, raw: &Value) -> Option<StructuredProduct> {
        self(raw)
    }
}

/// Accepts objects with an id (`id` or `sku`, string or integer) and a title
/// (`title` or `name`). `price` may be a number or a numeric string.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProductNormalizer;

impl ProductNormalizer for DefaultProductNormalizer {
    fn normalize(&self, raw: &Value) -> Option<StructuredProduct> {
        let object = raw.as_object()?;

        let id = ["id", "sku"]
            .iter()
            .find_map(|key| identifier(object.get(*key)?))?;
        let title = ["title", "name"]
            .iter()
            .find_map(|key| non_blank(object.get(*key)?))?;

        Some(StructuredProduct {
            id,
            title,
            price: object.get("price").and_then(price),
            currency: object.get("currency").and_then(non_blank),
            image_url: ["imageUrl", "image_url", "image"]
                .iter()
                .find_map(|key| non_blank(object.get(*key)?)),
            url: object.get("url").and_then(non_blank),
            description: object.get("description").and_then(non_blank),
        })
    }
}

fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => non_blank(value),
        Value::Number(number) if number.is_u64() || number.is_i64() => Some(number.to_string()),
        _ => None,
    }
}

fn non_blank(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Normalize a batch, dropping entries that fail validation.
pub fn normalize_products<N>(normalizer: &N, raw: &[Value]) -> Vec<StructuredProduct>
where
    N: ProductNormalizer + ?Sized,
{
    let products: Vec<StructuredProduct> = raw
        .iter()
        .filter_map(|item| normalizer.normalize(item))
        .collect();
    if products.len() < raw.len() {
        tracing::debug!(
            dropped = raw.len() - products.len(),
            kept = products.len(),
            "dropped malformed product payloads"
        );
    }
    products
}

/// Product metadata announced by a tool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductMetadata {
    pub products: Vec<StructuredProduct>,
}

impl ProductMetadata {
    pub fn merge(&mut self, other: ProductMetadata) {
        self.products.extend(other.products);
    }
}

/// Tool output, classified once when it enters the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// `{"metadata": {"products": [...]}}`
    Metadata(ProductMetadata),
    Raw(Value),
}

#[derive(Deserialize)]
struct MetadataEnvelope {
    metadata: MetadataBody,
}

#[derive(Deserialize)]
struct MetadataBody {
    products: Vec<Value>,
}

impl ToolOutput {
    pub fn classify<N>(item: Value, normalizer: &N) -> Self
    where
        N: ProductNormalizer + ?Sized,
    {
        match MetadataEnvelope::deserialize(&item) {
            Ok(envelope) => Self::Metadata(ProductMetadata {
                products: normalize_products(normalizer, &envelope.metadata.products),
            }),
            Err(_) => Self::Raw(item),
        }
    }

    pub fn metadata(&self) -> Option<&ProductMetadata> {
        match self {
            Self::Metadata(metadata) => Some(metadata),
            Self::Raw(_) => None,
        }
    }
}
