// patch.rs — Tri-state field patch: keep / clear / set.
//
// Update payloads need three distinguishable cases per optional field:
// the field was omitted (no change), explicitly null (clear), or carries
// a value (assign). A plain Option collapses the first two, so updates
// that should leave a field alone would wipe it instead.

use serde::{Deserialize, Serialize};

/// A three-way patch for one optional field.
///
/// On the wire (inside an event payload): an absent key is `Keep`, an
/// explicit `null` is `Clear`, and a value is `Set`. Serialize fields with
/// `#[serde(default, skip_serializing_if = "Patch::is_keep",
/// with = "patch::double_option")]` to get that encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the current value untouched.
    #[default]
    Keep,
    /// Clear the field.
    Clear,
    /// Assign a new value.
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Convert an always-present wire value into a patch: `None` clears.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }
}

impl<T: PartialEq + Clone> Patch<T> {
    /// Apply onto a target field. Returns `true` when the field changed.
    pub fn apply_to(&self, target: &mut Option<T>) -> bool {
        match self {
            Patch::Keep => false,
            Patch::Clear => {
                if target.is_none() {
                    false
                } else {
                    *target = None;
                    true
                }
            }
            Patch::Set(value) => {
                if target.as_ref() == Some(value) {
                    false
                } else {
                    *target = Some(value.clone());
                    true
                }
            }
        }
    }

    /// Would applying this patch change `current`?
    pub fn changes(&self, current: &Option<T>) -> bool {
        match self {
            Patch::Keep => false,
            Patch::Clear => current.is_some(),
            Patch::Set(value) => current.as_ref() != Some(value),
        }
    }
}

/// Serde adapter giving `Patch<T>` absent / null / value encoding when
/// combined with `default` + `skip_serializing_if = "Patch::is_keep"`.
pub mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Patch;

    pub fn serialize<T, S>(patch: &Patch<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match patch {
            // Keep is skipped at the field level; a Keep that reaches here
            // still encodes as null rather than inventing a value.
            Patch::Keep | Patch::Clear => serializer.serialize_none(),
            Patch::Set(value) => serializer.serialize_some(value),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Patch<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Patch::Clear,
            Some(value) => Patch::Set(value),
        })
    }
}
