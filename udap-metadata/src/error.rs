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
    /// The static server metadata configuration is invalid.
    #[strum(to_string = "Invalid server metadata configuration")]
    InvalidConfiguration,
    /// No usable signing key is available for the community.
    #[strum(to_string = "Signing key unavailable")]
    SigningKeyUnavailable,
    /// The signing backend failed to sign the metadata.
    #[strum(to_string = "Signing failed")]
    SigningFailed,
    /// Signing did not complete before the deadline and was abandoned.
    #[strum(to_string = "Signing cancelled")]
    SigningCancelled,
}

impl bherror::BhError for Error {}

/// The [`bherror::Result`] type with the error type of
/// [`udap_metadata::Error`](Error), used throughout this crate.
pub type Result<T> = bherror::Result<T, Error>;
