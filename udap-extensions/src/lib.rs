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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate implements the _Extension Envelope Codec_ for the semi-structured extension
//! objects carried in UDAP authorization requests, such as the [`hl7-b2b`][1] extension of the
//! HL7 FHIR UDAP Security implementation guide.
//!
//! [1]: <https://hl7.org/fhir/us/udap-security/b2b.html#b2b-authorization-extension-object>
//!
//! # Details
//!
//! An extension object is a flat JSON object.  A handful of its members are _declared_: they
//! have a fixed wire name and must hold an array of strings.  Everything else is carried along
//! untouched.  Each extension type implements [`ExtensionShape`], listing its declared members
//! in an explicit [`DeclaredField`] table, and is wrapped in an [`ExtensionEnvelope`] which keeps
//! the remaining members in an opaque bucket.
//!
//! Decoding never fails because of the shape of a single member: a declared member which is
//! not an array of strings simply ends up in the opaque bucket.  Only a payload which is not a
//! JSON object is rejected, with [`Error::InvalidExtensionPayload`].
//!
//! [`AuthorizationExtensions`] is the `extensions` object grouping several extension objects by
//! their key.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use udap_extensions::{ExtensionEnvelope, Hl7B2b};
//!
//! let envelope = ExtensionEnvelope::<Hl7B2b>::from_value(json!({
//!     "version": "1",
//!     "organization_id": "https://fhirlabs.net/fhir/r4",
//!     "purpose_of_use": ["urn:oid:2.16.840.1.113883.5.8#TREAT"],
//! }))
//! .unwrap();
//!
//! assert_eq!(
//!     envelope.declared().purpose_of_use.as_deref(),
//!     Some(&["urn:oid:2.16.840.1.113883.5.8#TREAT".to_owned()][..])
//! );
//! assert_eq!(envelope.version(), Some("1"));
//! ```

mod container;
mod envelope;
mod error;
mod hl7;

pub use container::*;
pub use envelope::*;
pub use error::*;
pub use hl7::*;
