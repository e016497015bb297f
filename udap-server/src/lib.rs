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

//! This crate is the HTTP boundary of a UDAP authorization server.
//!
//! It serves the discovery endpoints
//!
//! - `GET /.well-known/udap[?community=<name|id>]`, the signed metadata of a community,
//! - `GET /.well-known/udap/communities`, the enabled communities as JSON,
//! - `GET /.well-known/udap/communities.html`, the same list as links for a browser,
//!
//! and authenticates clients by the `x5c` chain of their signed assertions with
//! [`ClientAssertionAuthenticator`].
//!
//! Errors are returned as [`bherror::Error`]s of the crate [`Error`] type and are turned into
//! HTTP responses by the [`bherror`] axum adapter: an unknown community is `404`, a malformed
//! assertion `400`, an untrusted client `401` and a signing failure `500`.
//!
//! The `udap-server` binary reads its [`ServerConfig`] from the environment.

mod api;
mod auth;
mod config;
mod error;
mod state;

pub use api::*;
pub use auth::*;
pub use config::*;
pub use error::*;
pub use state::*;
