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

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use bherror::traits::PropagateError as _;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use udap_metadata::{CommunitySummary, UdapMetadata};
use udap_trust::CommunitySelector;

use crate::{AppState, Error, Result, WELL_KNOWN_UDAP_PATH};

/// Query parameters of the discovery endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct MetadataQuery {
    /// Name or id of the community; the default community when absent or empty.
    pub community: Option<String>,
}

/// Discovery document of the selected community.
///
/// GET /.well-known/udap[?community=<name|id>]
pub async fn udap_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
) -> Result<Json<UdapMetadata>> {
    let selector = query
        .community
        .as_deref()
        .filter(|community| !community.is_empty())
        .map(CommunitySelector::parse);

    state
        .metadata
        .metadata(selector.as_ref(), &state.base_url, state.signing_timeout)
        .await
        .with_err(|| Error::MetadataUnavailable)?
        .map(Json)
        .ok_or_else(|| bherror::Error::root(Error::CommunityNotFound))
}

/// The enabled communities.
///
/// GET /.well-known/udap/communities
pub async fn communities(State(state): State<Arc<AppState>>) -> Json<Vec<CommunitySummary>> {
    Json(state.metadata.communities())
}

/// The enabled communities, as links to their discovery documents.
///
/// GET /.well-known/udap/communities.html
pub async fn communities_html(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.metadata.communities_html(&state.metadata_url))
}

/// Create the router of the discovery endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(WELL_KNOWN_UDAP_PATH, get(udap_metadata))
        .route(
            &format!("{WELL_KNOWN_UDAP_PATH}/communities"),
            get(communities),
        )
        .route(
            &format!("{WELL_KNOWN_UDAP_PATH}/communities.html"),
            get(communities_html),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
