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

use std::{path::PathBuf, time::Duration};

use bherror::traits::{ErrorContext as _, ForeignError as _};
use reqwest::Url;
use tracing::Level;

use crate::{Error, Result};

/// Port the server listens on when `UDAP_SERVER_PORT` is not set.
pub const DEFAULT_PORT: u16 = 8080;

/// Signing deadline when `UDAP_SIGNING_TIMEOUT_SECS` is not set.
pub const DEFAULT_SIGNING_TIMEOUT: Duration = Duration::from_secs(10);

/// Process configuration of the server binary, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// `UDAP_SERVER_PORT`
    pub port: u16,
    /// `UDAP_BASE_URL`, the public base URL the endpoints are derived from.
    pub base_url: Url,
    /// `UDAP_TRUST_GRAPH_PATH`; an empty trust graph is used when not set.
    pub trust_graph_path: Option<PathBuf>,
    /// `UDAP_METADATA_CONFIG_PATH`; the default metadata configuration is used when not set.
    pub metadata_config_path: Option<PathBuf>,
    /// `UDAP_SIGNING_KEYS_PATH`; no community can be signed for when not set.
    pub signing_keys_path: Option<PathBuf>,
    /// `UDAP_SIGNING_TIMEOUT_SECS`
    pub signing_timeout: Duration,
    /// `UDAP_LOG_LEVEL`, `info` when not set or not a level.
    pub log_level: Level,
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `UDAP_BASE_URL` is missing or any set variable can
    /// not be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("UDAP_SERVER_PORT") {
            Some(port) => port
                .parse::<u16>()
                .foreign_err(|| Error::Configuration)
                .ctx(|| format!("UDAP_SERVER_PORT must be a port number, got {port:?}"))?,
            None => DEFAULT_PORT,
        };

        let base_url = lookup("UDAP_BASE_URL")
            .ok_or_else(|| bherror::Error::root(Error::Configuration))
            .ctx(|| "UDAP_BASE_URL is not set")?;
        let base_url = Url::parse(&base_url)
            .foreign_err(|| Error::Configuration)
            .ctx(|| format!("UDAP_BASE_URL is not a URL: {base_url:?}"))?;
        if base_url.cannot_be_a_base() || base_url.query().is_some() {
            return Err(bherror::Error::root(Error::Configuration)
                .ctx("UDAP_BASE_URL must be a base URL without a query"));
        }

        let signing_timeout = match lookup("UDAP_SIGNING_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .map(Duration::from_secs)
                .foreign_err(|| Error::Configuration)
                .ctx(|| format!("UDAP_SIGNING_TIMEOUT_SECS must be a number, got {secs:?}"))?,
            None => DEFAULT_SIGNING_TIMEOUT,
        };

        let log_level = lookup("UDAP_LOG_LEVEL")
            .and_then(|level| level.parse::<Level>().ok())
            .unwrap_or(Level::INFO);

        Ok(Self {
            port,
            base_url,
            trust_graph_path: lookup("UDAP_TRUST_GRAPH_PATH").map(PathBuf::from),
            metadata_config_path: lookup("UDAP_METADATA_CONFIG_PATH").map(PathBuf::from),
            signing_keys_path: lookup("UDAP_SIGNING_KEYS_PATH").map(PathBuf::from),
            signing_timeout,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();

        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("UDAP_BASE_URL", "https://fhirlabs.net/fhir/r4")]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url.as_str(), "https://fhirlabs.net/fhir/r4");
        assert_eq!(config.trust_graph_path, None);
        assert_eq!(config.signing_timeout, Duration::from_secs(10));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_all_variables() {
        let config = config(&[
            ("UDAP_SERVER_PORT", "9443"),
            ("UDAP_BASE_URL", "https://fhirlabs.net/fhir/r4/"),
            ("UDAP_TRUST_GRAPH_PATH", "/etc/udap/trust-graph.json"),
            ("UDAP_METADATA_CONFIG_PATH", "/etc/udap/metadata.json"),
            ("UDAP_SIGNING_KEYS_PATH", "/etc/udap/signing-keys.json"),
            ("UDAP_SIGNING_TIMEOUT_SECS", "3"),
            ("UDAP_LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.port, 9443);
        assert_eq!(
            config.trust_graph_path,
            Some(PathBuf::from("/etc/udap/trust-graph.json"))
        );
        assert_eq!(
            config.signing_keys_path,
            Some(PathBuf::from("/etc/udap/signing-keys.json"))
        );
        assert_eq!(config.signing_timeout, Duration::from_secs(3));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_invalid_variables() {
        for vars in [
            &[][..],
            &[("UDAP_BASE_URL", "not a url")][..],
            &[("UDAP_BASE_URL", "mailto:admin@fhirlabs.net")][..],
            &[("UDAP_BASE_URL", "https://fhirlabs.net/?tenant=1")][..],
            &[
                ("UDAP_BASE_URL", "https://fhirlabs.net"),
                ("UDAP_SERVER_PORT", "eighty"),
            ][..],
            &[
                ("UDAP_BASE_URL", "https://fhirlabs.net"),
                ("UDAP_SIGNING_TIMEOUT_SECS", "-1"),
            ][..],
        ] {
            let err = config(vars).unwrap_err();
            assert_matches!(err.error, Error::Configuration, "vars: {vars:?}");
        }
    }
}
