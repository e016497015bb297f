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

//! This crate builds the UDAP discovery document (`/.well-known/udap`) of a trust community and
//! signs its `signed_metadata` member.
//!
//! # Details
//!
//! [`MetadataBuilder`] combines three inputs:
//!
//! - the static [`ServerMetadataConfig`] (versions, profiles, grant types, endpoint paths),
//! - the current snapshot of the [`TrustGraphStore`](udap_trust::TrustGraphStore), which decides
//!   the served community and the certifications it recognizes,
//! - a [`SigningKeyStore`] holding one signing key with its certificate chain per community.
//!
//! A signing key is held exclusively for the duration of one signing operation and released on
//! every path, including failures and an elapsed deadline.  A signing attempt which does not
//! complete in time fails with [`Error::SigningCancelled`].
//!
//! The `signed_metadata` is a compact JWS with `alg` and `x5c` header parameters.  Its claims
//! repeat the endpoints of the document, so a client can check them against the server
//! certificate with the _Certificate Chain Key Resolver_ of the `udap-x5chain` crate.
//!
//! # Examples
//!
//! ```ignore
//! use std::{sync::Arc, time::Duration};
//!
//! use udap_metadata::{InMemorySigningKeyStore, MetadataBuilder, ServerMetadataConfig};
//! use udap_trust::CommunitySelector;
//!
//! let keys = InMemorySigningKeyStore::from_config_file("signing-keys.json".as_ref())?;
//! let builder = MetadataBuilder::new(store, ServerMetadataConfig::default(), keys);
//!
//! let base_url = "https://fhirlabs.net/fhir/r4".parse()?;
//! let selector = CommunitySelector::parse("udap://fhirlabs.net");
//! let metadata = builder
//!     .metadata(Some(&selector), &base_url, Duration::from_secs(10))
//!     .await?;
//! ```

mod builder;
mod config;
mod document;
mod error;
mod html;
mod keys;

pub use builder::*;
pub use config::*;
pub use document::*;
pub use error::*;
pub use html::*;
pub use keys::*;
