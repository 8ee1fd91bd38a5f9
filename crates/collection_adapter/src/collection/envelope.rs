use crate::collection::item::ItemRecord;
use crate::collection::store::NewItem;
use crate::domain::{DomainError, DomainResult};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// Discriminator key inside every description envelope
pub const TYPE_FIELD: &str = "type";

/// Parsed JSON object carried in an item's description
pub type Envelope = Map<String, Value>;

/// Maps one entity kind to and from the three-field item format.
///
/// All kinds share a single collection; `TYPE_TAG` is what tells them apart.
pub trait EntityCodec {
    type Entity;

    const TYPE_TAG: &'static str;

    /// Build the item fields, with every entity field except name and
    /// creation time inside a tagged JSON envelope
    fn encode(entity: &Self::Entity) -> NewItem;

    /// Build the entity from a normalized item and its parsed envelope.
    /// Missing envelope fields take their defaults.
    fn decode(record: ItemRecord, envelope: &Envelope) -> Self::Entity;
}

/// Serialize envelope fields, stamping the kind's discriminator
pub fn seal_envelope(type_tag: &str, fields: Value) -> String {
    let mut envelope = match fields {
        Value::Object(map) => map,
        _ => Envelope::new(),
    };
    envelope.insert(TYPE_FIELD.to_string(), Value::String(type_tag.to_string()));
    Value::Object(envelope).to_string()
}

fn parse_envelope(description: &str) -> Result<Envelope, String> {
    match serde_json::from_str::<Value>(description) {
        Ok(Value::Object(envelope)) => Ok(envelope),
        Ok(_) => Err("description is not a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Decode one item the caller asked for by id.
///
/// A description that is not a JSON object is an error here; a missing or
/// non-string description decodes as an empty envelope.
pub fn decode_item<C: EntityCodec>(raw: &Value) -> DomainResult<C::Entity> {
    let record = ItemRecord::ingest(raw);

    let envelope = match record.description.as_deref() {
        Some(description) => parse_envelope(description).map_err(|reason| {
            error!(item_id = %record.display_id(), kind = C::TYPE_TAG, error = %reason, "failed to parse description envelope");
            DomainError::MalformedEnvelope {
                kind: C::TYPE_TAG,
                id: record.display_id().to_string(),
                reason,
            }
        })?,
        None => Envelope::new(),
    };

    Ok(C::decode(record, &envelope))
}

/// Whether an envelope claims a different kind than `C`.
/// Envelopes without a discriminator are not considered foreign.
pub fn is_foreign<C: EntityCodec>(raw: &Value) -> bool {
    let record = ItemRecord::ingest(raw);
    record
        .description
        .as_deref()
        .and_then(|description| parse_envelope(description).ok())
        .and_then(|envelope| {
            envelope
                .get(TYPE_FIELD)
                .and_then(|v| v.as_str())
                .map(|tag| tag != C::TYPE_TAG)
        })
        .unwrap_or(false)
}

/// Exact-match condition on one envelope field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    field: &'static str,
    expected: Value,
}

impl FieldFilter {
    pub fn eq(field: &'static str, expected: impl Into<Value>) -> Self {
        Self {
            field,
            expected: expected.into(),
        }
    }

    pub fn matches(&self, envelope: &Envelope) -> bool {
        envelope.get(self.field) == Some(&self.expected)
    }
}

/// Select and decode the members of kind `C` from a full collection listing.
///
/// Items with an empty or unparseable description, another kind's tag, or a
/// failing filter are skipped. Nothing here fails the listing as a whole.
pub fn scan_items<C: EntityCodec>(items: Vec<Value>, filters: &[FieldFilter]) -> Vec<C::Entity> {
    let total = items.len();
    let mut entities = Vec::new();

    for raw in items {
        let record = ItemRecord::ingest(&raw);

        let description = match record.description.as_deref() {
            Some(description) if !description.is_empty() => description,
            _ => continue,
        };

        let envelope = match parse_envelope(description) {
            Ok(envelope) => envelope,
            Err(reason) => {
                warn!(item_id = %record.display_id(), kind = C::TYPE_TAG, error = %reason, "skipping item with malformed description");
                continue;
            }
        };

        if envelope.get(TYPE_FIELD).and_then(|v| v.as_str()) != Some(C::TYPE_TAG) {
            continue;
        }

        if !filters.iter().all(|filter| filter.matches(&envelope)) {
            continue;
        }

        entities.push(C::decode(record, &envelope));
    }

    debug!(kind = C::TYPE_TAG, scanned = total, matched = entities.len(), "scanned collection");
    entities
}

pub(crate) fn string_field(envelope: &Envelope, field: &str, default: &str) -> String {
    envelope
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

pub(crate) fn optional_string_field(envelope: &Envelope, field: &str) -> Option<String> {
    envelope
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub(crate) fn string_list_field(envelope: &Envelope, field: &str) -> Vec<String> {
    envelope
        .get(field)
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn bool_field(envelope: &Envelope, field: &str, default: bool) -> bool {
    envelope
        .get(field)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}
