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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, ExtensionEnvelope, ExtensionShape, Result};

/// The `extensions` object of an authorization request, mapping extension keys to extension
/// objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationExtensions(Map<String, Value>);

impl AuthorizationExtensions {
    /// An empty `extensions` object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a decoded `extensions` object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtensionPayload`] if `value` is not a JSON object.  The members
    /// themselves are only checked when accessed.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(extensions) => Ok(Self(extensions)),
            _ => Err(bherror::Error::root(Error::InvalidExtensionPayload)
                .ctx("`extensions` is not a JSON object")),
        }
    }

    /// Decode the extension stored under `key` as `T`.
    ///
    /// Returns `Ok(None)` if there is no such extension.
    pub fn get<T: ExtensionShape>(&self, key: &str) -> Result<Option<ExtensionEnvelope<T>>> {
        self.0
            .get(key)
            .map(|value| ExtensionEnvelope::from_value(value.clone()))
            .transpose()
    }

    /// Decode the extension stored under the key of `T`.
    pub fn extension<T: ExtensionShape>(&self) -> Result<Option<ExtensionEnvelope<T>>> {
        self.get(T::KEY)
    }

    /// Store `envelope` under the key of `T`, returning the previous raw value.
    pub fn insert<T: ExtensionShape>(&mut self, envelope: &ExtensionEnvelope<T>) -> Option<Value> {
        self.0.insert(T::KEY.to_owned(), envelope.to_value())
    }

    /// The raw value stored under `key`.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Keys of all present extensions.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Encode the `extensions` object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::{Hl7B2b, Hl7B2bUser};

    #[test]
    fn test_typed_access() {
        let extensions = AuthorizationExtensions::from_value(json!({
            "hl7-b2b": {
                "version": "1",
                "purpose_of_use": ["urn:oid:2.16.840.1.113883.5.8#TREAT"]
            },
            "vendor-extension": 42
        }))
        .unwrap();

        let b2b = extensions.extension::<Hl7B2b>().unwrap().unwrap();
        assert_eq!(b2b.version(), Some("1"));

        assert!(extensions.extension::<Hl7B2bUser>().unwrap().is_none());
        assert_eq!(extensions.raw("vendor-extension"), Some(&json!(42)));
        assert_eq!(
            extensions.keys().collect::<Vec<_>>(),
            ["hl7-b2b", "vendor-extension"]
        );

        let err = extensions
            .get::<Hl7B2b>("vendor-extension")
            .unwrap_err();
        assert_matches!(err.error, Error::InvalidExtensionPayload);
    }

    #[test]
    fn test_insert() {
        let mut extensions = AuthorizationExtensions::new();
        let mut b2b = ExtensionEnvelope::new(Hl7B2b {
            purpose_of_use: Some(vec!["urn:oid:2.16.840.1.113883.5.8#TREAT".to_owned()]),
            ..Default::default()
        });
        b2b.insert_additional("version", json!("1"));

        assert_eq!(extensions.insert(&b2b), None);

        assert_eq!(
            serde_json::to_value(&extensions).unwrap(),
            json!({
                "hl7-b2b": {
                    "version": "1",
                    "purpose_of_use": ["urn:oid:2.16.840.1.113883.5.8#TREAT"]
                }
            })
        );
        assert_eq!(extensions.extension::<Hl7B2b>().unwrap(), Some(b2b));
    }

    #[test]
    fn test_not_an_object() {
        let err = AuthorizationExtensions::from_value(json!(["hl7-b2b"])).unwrap_err();
        assert_matches!(err.error, Error::InvalidExtensionPayload);
    }
}
