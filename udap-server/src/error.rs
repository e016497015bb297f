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

use bherror::adapters::axum::{IntoAxumResponse, StatusCode};

/// Error returned by the crate API and the HTTP endpoints.
///
/// The response body is the error message only; it never carries key or certificate material.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum Error {
    /// The selected community does not exist or is disabled.
    #[strum(to_string = "Community not found")]
    CommunityNotFound,
    /// The client assertion is not a well-formed JWS with a usable `x5c` chain.
    #[strum(to_string = "Malformed client assertion")]
    MalformedAssertion,
    /// The signature of the client assertion does not verify with the leaf certificate key.
    #[strum(to_string = "Invalid client assertion signature")]
    InvalidSignature,
    /// The certificate chain of the client does not lead to an active anchor of the community.
    #[strum(to_string = "Untrusted client certificate chain")]
    UntrustedClient,
    /// The metadata could not be built or signed.
    #[strum(to_string = "Metadata unavailable")]
    MetadataUnavailable,
    /// The trust graph holds a record which can not be used.
    #[strum(to_string = "Trust graph unavailable")]
    TrustGraph,
    /// The process configuration is invalid.
    #[strum(to_string = "Invalid server configuration")]
    Configuration,
}

impl bherror::BhError for Error {}

impl IntoAxumResponse for Error {
    fn http_status_code(&self) -> StatusCode {
        match self {
            Error::CommunityNotFound => StatusCode::NOT_FOUND,
            Error::MalformedAssertion => StatusCode::BAD_REQUEST,
            Error::InvalidSignature | Error::UntrustedClient => StatusCode::UNAUTHORIZED,
            Error::MetadataUnavailable | Error::TrustGraph | Error::Configuration => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// The [`bherror::Result`] type with the error type of
/// [`udap_server::Error`](Error), used throughout this crate.
pub type Result<T> = bherror::Result<T, Error>;
