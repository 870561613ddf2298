//! Versioned state container with per-field merge policies.
//!
//! Every field a graph touches is declared up front in a [`StateSchema`]
//! together with its [`MergePolicy`]. Node outputs are [`PartialUpdate`]s;
//! [`State::merge`] combines them with the current record, rejecting any
//! field the schema does not know about.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mender_types::{MenderError, Result};

// ---------------------------------------------------------------------------
// Merge policy and schema
// ---------------------------------------------------------------------------

/// How a node's output for a field combines with the existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// New value replaces the old one.
    Overwrite,
    /// New value(s) are concatenated onto the existing ordered sequence.
    /// The update may supply a single item or a sequence; both are
    /// flattened onto the end, preserving argument order.
    Append,
}

#[derive(Debug, Clone)]
struct FieldSpec {
    policy: MergePolicy,
    default: Value,
}

/// Declares every field a graph's state may hold, with one merge policy and
/// a zero-valued default per field. Fixed at graph-definition time.
#[derive(Debug, Clone)]
pub struct StateSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl StateSchema {
    pub fn builder() -> StateSchemaBuilder {
        StateSchemaBuilder {
            fields: BTreeMap::new(),
        }
    }

    /// The declared merge policy for `field`, or `None` if undeclared.
    pub fn policy(&self, field: &str) -> Option<MergePolicy> {
        self.fields.get(field).map(|spec| spec.policy)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Declared field names, in lexical order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`StateSchema`].
pub struct StateSchemaBuilder {
    fields: BTreeMap<String, FieldSpec>,
}

impl StateSchemaBuilder {
    /// Declare a field with the policy's zero-valued default:
    /// `null` for `overwrite`, `[]` for `append`.
    pub fn field(self, name: impl Into<String>, policy: MergePolicy) -> Self {
        let default = match policy {
            MergePolicy::Overwrite => Value::Null,
            MergePolicy::Append => Value::Array(Vec::new()),
        };
        self.field_with_default(name, policy, default)
    }

    /// Declare a field with an explicit default. A non-array default for an
    /// `append` field is treated as a single seed element.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        policy: MergePolicy,
        default: Value,
    ) -> Self {
        let default = match policy {
            MergePolicy::Append if !default.is_array() => Value::Array(vec![default]),
            _ => default,
        };
        self.fields.insert(name.into(), FieldSpec { policy, default });
        self
    }

    pub fn build(self) -> StateSchema {
        StateSchema {
            fields: self.fields,
        }
    }
}

// ---------------------------------------------------------------------------
// PartialUpdate — what a node returns
// ---------------------------------------------------------------------------

/// A partial state update: only the fields a node wants to change.
/// Fields absent from the update are left untouched by the merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialUpdate {
    entries: BTreeMap<String, Value>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(field.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field names touched by this update, in lexical order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries.get(field)
    }
}

impl FromIterator<(String, Value)> for PartialUpdate {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The typed, versioned key/value record a run carries between nodes.
///
/// A `State` always holds exactly the fields its schema declares. It is
/// mutated only by [`merge`](State::merge), which returns the next record
/// and bumps the version by one; routing predicates see it read-only.
#[derive(Debug, Clone)]
pub struct State {
    schema: Arc<StateSchema>,
    values: BTreeMap<String, Value>,
    version: u64,
}

impl State {
    /// A pristine record: every schema field at its default, version 0.
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect();
        Self {
            schema,
            values,
            version: 0,
        }
    }

    /// A record seeded with caller-supplied initial values, merged onto the
    /// defaults under the declared policies. Fails with
    /// [`MenderError::UnknownField`] if `initial` names an undeclared field.
    pub fn with_initial(schema: Arc<StateSchema>, initial: &PartialUpdate) -> Result<Self> {
        State::new(schema).merge(initial)
    }

    /// `merge(current, partial) → next`.
    ///
    /// For every field in `partial`: `overwrite` replaces the current value;
    /// `append` flattens the new value(s) onto the end of the current
    /// sequence. Fields absent from `partial` are carried over unchanged.
    pub fn merge(&self, partial: &PartialUpdate) -> Result<State> {
        let mut next = self.values.clone();
        for (field, value) in partial.iter() {
            let policy = self
                .schema
                .policy(field)
                .ok_or_else(|| MenderError::UnknownField {
                    field: field.to_string(),
                })?;
            match policy {
                MergePolicy::Overwrite => {
                    next.insert(field.to_string(), value.clone());
                }
                MergePolicy::Append => {
                    let slot = next.entry(field.to_string()).or_insert(Value::Array(Vec::new()));
                    let existing = match slot {
                        Value::Array(items) => items,
                        other => {
                            // Defaults guarantee an array; a prior overwrite
                            // of this field is impossible under the schema.
                            let seed = other.take();
                            *other = Value::Array(vec![seed]);
                            match other {
                                Value::Array(items) => items,
                                _ => unreachable!(),
                            }
                        }
                    };
                    match value {
                        Value::Array(items) => existing.extend(items.iter().cloned()),
                        single => existing.push(single.clone()),
                    }
                }
            }
        }
        Ok(State {
            schema: Arc::clone(&self.schema),
            values: next,
            version: self.version + 1,
        })
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn schema_handle(&self) -> Arc<StateSchema> {
        Arc::clone(&self.schema)
    }

    /// Number of merges applied since the record was created.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Convenience accessor for a boolean field; `false` when absent or not
    /// a boolean.
    pub fn get_bool(&self, field: &str) -> bool {
        self.values
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Convenience accessor for a string field. Falls back to `default`
    /// when the field is absent, null, or not a JSON string.
    pub fn get_str<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.values
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// Convenience accessor for a non-negative integer field; 0 when absent
    /// or not a number.
    pub fn get_u64(&self, field: &str) -> u64 {
        self.values.get(field).and_then(Value::as_u64).unwrap_or(0)
    }

    /// The items of an `append`-policy sequence field as owned strings,
    /// skipping non-string items. Empty when the field is absent.
    pub fn get_string_seq(&self, field: &str) -> Vec<String> {
        self.values
            .get(field)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Shallow copy of the current values map.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }
}
