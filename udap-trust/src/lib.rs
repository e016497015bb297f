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

//! This crate implements the _Trust Graph Store_ of a UDAP authorization server: the
//! authoritative set of trust communities, their trust anchors, the certifications they
//! require, and the tiered OAuth clients registered against them.
//!
//! # Details
//!
//! The store keeps the whole graph as an immutable [`TrustGraph`] snapshot.  Readers obtain an
//! [`Arc`][std::sync::Arc] of the current snapshot through [`TrustGraphStore::snapshot`] (or one of
//! the `get_*` convenience methods) and never observe a partially applied mutation.  Writers are
//! serialized; each mutation is applied to a private copy of the graph, the invariants are
//! re-checked and only then is the new snapshot published.
//!
//! The central invariant is that **at most one** [`Community`] is marked as the default
//! community.  An attempt to introduce a second default fails with
//! [`Error::ConflictingDefaultCommunity`] and leaves the store untouched.
//!
//! Persistence is abstracted by the [`TrustGraphRepository`] trait working on
//! [`TrustGraphRecords`], the persisted shape of the graph.  A JSON file implementation is
//! provided as [`JsonFileRepository`].
//!
//! # Examples
//!
//! ```ignore
//! use udap_trust::{CommunitySelector, NewCommunity, ReadMode, TrustGraphStore};
//!
//! let store = TrustGraphStore::new();
//! let community = store.add_community(NewCommunity::new("udap://fhirlabs.net").as_default())?;
//!
//! let found = store.get_community(&CommunitySelector::parse("udap://fhirlabs.net"));
//! assert_eq!(found, Some(community));
//! assert_eq!(store.get_communities(ReadMode::Discovery).len(), 1);
//! ```

mod entity;
mod error;
mod graph;
mod model;
mod repository;
mod store;

pub use entity::*;
pub use error::*;
pub use graph::*;
pub use model::*;
pub use repository::*;
pub use store::*;
