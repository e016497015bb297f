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

/// Error returned by the crate API.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum Error {
    /// The compact token could not be split or its protected header could not be decoded.
    #[strum(to_string = "Malformed token")]
    MalformedToken,
    /// At least one `x5c` entry is not valid base64 or not a DER encoded X.509 certificate.
    ///
    /// A chain is rejected as a whole; no keys are returned alongside this error.
    #[strum(to_string = "Malformed certificate chain")]
    MalformedCertificateChain,
    /// A certificate carries a public key which is neither RSA nor elliptic-curve.
    #[strum(to_string = "Unsupported key algorithm")]
    UnsupportedKeyAlgorithm,
    /// Error when trying to construct or work with an invalid [`X5Chain`][crate::X5Chain].
    #[strum(to_string = "Invalid x5chain")]
    X5Chain,
    /// The [`X5Chain`][crate::X5Chain] does not verify against any of the trusted anchors.
    #[strum(to_string = "Untrusted x5chain")]
    UntrustedX5Chain,
    /// Error returned by the [`Builder`][crate::Builder] methods.
    #[strum(to_string = "The certificate builder failed")]
    Builder,
}

impl bherror::BhError for Error {}

/// The [`bherror::Result`] type with the error type of
/// [`udap_x5chain::Error`](Error), used throughout this crate.
pub type Result<T> = bherror::Result<T, Error>;
