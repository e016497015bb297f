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

//! This crate provides functions and types for working with the [JSON Web Signatures (JWS)][1]
//! exchanged in UDAP: client assertions presented by clients, and `signed_metadata` published
//! by the server.
//!
//! [1]: https://datatracker.ietf.org/doc/html/rfc7515
//!
//! # Details
//!
//! The primary way to use this library is via the [`JwtSigner`] and [`JwtVerifier`] traits,
//! which provide functionality for signing JWTs and verifying signed JWTs.  An [`openssl`]
//! backed implementation of these traits is available through the [`PkeySigner`] and
//! [`PkeyVerifier`] structs, supporting the `RS256`, `RS384`, `ES256` and `ES384` algorithms
//! used by UDAP.
//!
//! A custom implementation (e.g. backed by a hardware security module) must implement the
//! [`Signer`] trait for signing and the [`SignatureVerifier`] trait for verifying signatures.
//! The [`JwtSigner`] and [`JwtVerifier`] traits are implemented automatically for it.
//!
//! UDAP signers always publish their certificate chain in the `x5c` header parameter; the
//! [`SignerWithChain`] wrapper pairs a [`Signer`] with the matching
//! [`X5Chain`](udap_x5chain::X5Chain).
//!
//! # Examples
//!
//! ## Sign and verify a JWT
//!
//! ```
//! use udap_jws::{json_object, JwtSigner, JwtVerifier, PkeySigner, PkeyVerifier, Signer as _, SigningAlgorithm};
//!
//! let signer = PkeySigner::generate(SigningAlgorithm::Rs256).unwrap();
//!
//! let claims = json_object!({
//!    "iss": "https://client.example.com",
//!    "sub": "client-id",
//!    "iat": 1516239022
//! });
//!
//! let header = jwt::Header {
//!     algorithm: jwt::AlgorithmType::Rs256,
//!     ..Default::default()
//! };
//! let signed: jwt::Token<_, _, jwt::token::Signed> =
//!     signer.sign_jwt(jwt::Token::new(header, claims)).unwrap();
//!
//! let public_jwk = signer.public_jwk().unwrap();
//! let _: jwt::Token<jwt::Header, serde_json::Value, _> = PkeyVerifier::new(SigningAlgorithm::Rs256)
//!     .verify_jwt_signature(signed.as_str(), &public_jwk)
//!     .unwrap();
//! ```

mod error;
mod openssl_impl;
mod traits;
mod utils;
mod x509_chain;

pub use error::*;
// Re-export the `jwt` crate
pub use jwt;
pub use openssl_impl::*;
pub use traits::*;
pub use utils::*;
pub use x509_chain::*;

/// Helper macro with the same syntax as [`serde_json::json`] specialized for
/// constructing JSON objects.
///
/// It will construct a more specific type ([`serde_json::Map<String,Value>`])
/// than just [`serde_json::Value`] when constructing an object, and panic if
/// the syntax is valid JSON but not an object.
#[macro_export]
macro_rules! json_object {
    ($stuff:tt) => {
        match ::serde_json::json!($stuff) {
            ::serde_json::Value::Object(o) => o,
            _ => unreachable!("JSON literal wasn't an object"),
        }
    };
}
