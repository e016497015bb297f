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

use crate::{AnchorId, CertificationId, CommunityId, TieredClientId};

/// Error returned by the crate API.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum Error {
    /// The mutation would leave more than one community marked as the default.
    #[strum(to_string = "Another community is already the default")]
    ConflictingDefaultCommunity,
    /// No community with the given id exists.
    #[strum(to_string = "Unknown community {0}")]
    UnknownCommunity(CommunityId),
    /// No anchor with the given id exists.
    #[strum(to_string = "Unknown anchor {0}")]
    UnknownAnchor(AnchorId),
    /// No certification with the given id exists.
    #[strum(to_string = "Unknown certification {0}")]
    UnknownCertification(CertificationId),
    /// No tiered client with the given id exists.
    #[strum(to_string = "Unknown tiered client {0}")]
    UnknownTieredClient(TieredClientId),
    /// A community or certification with the same name already exists.
    #[strum(to_string = "Duplicate name {0}")]
    DuplicateName(String),
    /// A persisted record could not be converted into the model.
    #[strum(to_string = "Invalid record")]
    InvalidRecord,
    /// The trust graph could not be loaded or saved.
    #[strum(to_string = "Persistence failure")]
    Persistence,
}

impl bherror::BhError for Error {}

/// The [`bherror::Result`] type with the error type of
/// [`udap_trust::Error`](Error), used throughout this crate.
pub type Result<T> = bherror::Result<T, Error>;
