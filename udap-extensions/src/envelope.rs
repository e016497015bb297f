// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use bherror::traits::{ErrorContext as _, ForeignError as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// One declared member of an extension object.
///
/// The value of a declared member is always a list of strings.
pub struct DeclaredField<T> {
    /// The member name on the wire.
    pub wire_name: &'static str,
    /// Read the typed value.
    pub get: fn(&T) -> Option<&[String]>,
    /// Store a decoded value.
    pub set: fn(&mut T, Vec<String>),
}

/// The typed part of an extension object.
pub trait ExtensionShape: Default + 'static {
    /// Key of the extension within the `extensions` object, e.g. `hl7-b2b`.
    const KEY: &'static str;

    /// Declared members, in the order they are written.
    const FIELDS: &'static [DeclaredField<Self>];

    /// The declared field with the given wire name.
    fn field(wire_name: &str) -> Option<&'static DeclaredField<Self>> {
        Self::FIELDS
            .iter()
            .find(|field| field.wire_name == wire_name)
    }
}

/// An extension object: declared members bound to `T`, every other member kept as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionEnvelope<T> {
    declared: T,
    additional: Map<String, Value>,
}

impl<T: ExtensionShape> ExtensionEnvelope<T> {
    /// An envelope with the given declared members and an empty opaque bucket.
    pub fn new(declared: T) -> Self {
        Self {
            declared,
            additional: Map::new(),
        }
    }

    /// Decode an extension object.
    ///
    /// A member named after a declared field is bound to it only if its value is an array of
    /// strings; otherwise it is kept verbatim in the opaque bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtensionPayload`] if `value` is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(members) = value else {
            return Err(bherror::Error::root(Error::InvalidExtensionPayload)
                .ctx(format!("`{}` extension is not a JSON object", T::KEY)));
        };

        let mut envelope = Self::new(T::default());
        for (name, value) in members {
            match (T::field(&name), string_list(&value)) {
                (Some(field), Some(values)) => (field.set)(&mut envelope.declared, values),
                _ => {
                    envelope.additional.insert(name, value);
                }
            }
        }

        Ok(envelope)
    }

    /// Decode an extension object from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value = serde_json::from_str(json)
            .foreign_err(|| Error::InvalidExtensionPayload)
            .ctx(|| format!("`{}` extension is not valid JSON", T::KEY))?;

        Self::from_value(value)
    }

    /// Encode the extension object.
    ///
    /// Opaque members come first, followed by every declared field that is set.  A declared
    /// field replaces an opaque member of the same name.
    pub fn to_value(&self) -> Value {
        let mut members = self.additional.clone();

        for field in T::FIELDS {
            if let Some(values) = (field.get)(&self.declared) {
                members.insert(field.wire_name.to_owned(), values.into());
            }
        }

        Value::Object(members)
    }

    /// The declared members.
    pub fn declared(&self) -> &T {
        &self.declared
    }

    /// Mutable access to the declared members.
    pub fn declared_mut(&mut self) -> &mut T {
        &mut self.declared
    }

    /// The opaque members.
    pub fn additional(&self) -> &Map<String, Value> {
        &self.additional
    }

    /// The opaque member `name`, if it is a string.
    pub fn additional_str(&self, name: &str) -> Option<&str> {
        self.additional.get(name)?.as_str()
    }

    /// Set an opaque member, returning the previous value.
    pub fn insert_additional(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.additional.insert(name.into(), value)
    }

    /// Remove an opaque member.
    pub fn remove_additional(&mut self, name: &str) -> Option<Value> {
        self.additional.remove(name)
    }
}

impl<T: ExtensionShape> Serialize for ExtensionEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de, T: ExtensionShape> Deserialize<'de> for ExtensionEnvelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;

        Self::from_value(value).map_err(|err| serde::de::Error::custom(err.error))
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect()
}
