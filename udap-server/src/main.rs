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

//! UDAP discovery server binary.

use std::{process::ExitCode, sync::Arc};

use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use udap_server::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {err}");
        return ExitCode::FAILURE;
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "Unable to initialize the server");
            return ExitCode::FAILURE;
        }
    };

    info!(
        base_url = %config.base_url,
        communities = state.metadata.communities().len(),
        port = config.port,
        "Starting UDAP server"
    );

    let app = create_router(Arc::new(state));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %addr, error = %err, "Failed to bind to address");
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %addr, "UDAP server listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
