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

//! This crate provides functions and types for working with the X.509 certificate chains carried
//! in the `x5c` header parameter of UDAP client assertions and signed metadata, as defined in
//! [RFC 7515][1] and the [UDAP JWT-Based Client Authentication][2] profile.
//!
//! [1]: <https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.6>
//! [2]: <https://www.udap.org/udap-jwt-client-auth.html>
//!
//! # Details
//!
//! The primary API of this crate is the [`resolve_keys`] function, the _Certificate Chain Key
//! Resolver_.  Given a compact JWS it reads **only** the protected header, decodes every `x5c`
//! entry and yields one [`ResolvedKey`] per certificate, tagged by its
//! [`KeyAlgorithmFamily`].  It never verifies the token signature; that is the responsibility of
//! the caller, using the keys returned here.
//!
//! Trust is established separately.  The [`X5Chain`] type models an ordered certificate chain
//! (leaf first) and can be verified against the anchors of a UDAP community collected into an
//! [`X509Trust`].
//!
//! [`JwtX5Chain`] is the wire representation (base64-DER strings) used when a chain needs to be
//! serialized into a JWT header, and [`public_key_to_jwk`] exports resolved keys as JWKs.
//!
//! # Examples
//!
//! ```ignore
//! let keys = udap_x5chain::resolve_keys(client_assertion)?;
//!
//! for key in &keys {
//!     println!("{} key from certificate #{}", key.algorithm_family(), key.source_certificate_index());
//! }
//! ```
//!
//! The [`Builder`] is a lightweight certificate authority for tests and demos.  It can create
//! community anchors and issue client certificates without shelling out to `openssl`.

mod builder;
mod error;
mod jwk;
mod jwt;
mod resolver;
mod x5chain;

pub use builder::*;
pub use error::*;
pub use jwk::*;
pub use jwt::*;
pub use resolver::*;
pub use x5chain::*;
