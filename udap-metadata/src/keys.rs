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

use std::{
    collections::HashMap,
    future::Future,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use openssl::{pkey::PKey, x509::X509};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use udap_jws::{
    HasX5Chain, JwtSigner, PkeySigner, PkeySignerWithChain, Signer as _, SigningAlgorithm,
};
use udap_trust::Community;
use udap_x5chain::X5Chain;

use crate::{Error, Result};

/// Source of the keys signing the metadata of each community.
///
/// A key is handed out as a [`SigningKeyHandle`] granting exclusive use until it is dropped.
pub trait SigningKeyStore: Send + Sync {
    /// The signer behind a handle.
    type Signer: JwtSigner + HasX5Chain + Send + Sync + 'static;

    /// Acquire the signing key of `community`.
    ///
    /// Implementations fail with [`Error::SigningKeyUnavailable`] when the community has no
    /// usable key.  The returned future may wait for the key to be released by another request;
    /// callers bound it with a timeout.
    fn acquire(
        &self,
        community: &Community,
    ) -> impl Future<Output = Result<SigningKeyHandle<Self::Signer>>> + Send;
}

/// Exclusive, scoped access to a signing key.
///
/// The key is released when the handle is dropped.
pub struct SigningKeyHandle<S> {
    community: String,
    guard: OwnedMutexGuard<S>,
}

impl<S> SigningKeyHandle<S> {
    /// Wrap the lock guard of the key belonging to `community`.
    pub fn new(community: impl Into<String>, guard: OwnedMutexGuard<S>) -> Self {
        let community = community.into();
        tracing::debug!(community = %community, "Acquired signing key");

        Self { community, guard }
    }

    /// Name of the community the key belongs to.
    pub fn community(&self) -> &str {
        &self.community
    }
}

impl<S> Deref for SigningKeyHandle<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> Drop for SigningKeyHandle<S> {
    fn drop(&mut self) {
        tracing::debug!(community = %self.community, "Released signing key");
    }
}

/// One entry of the signing keys file read by
/// [`InMemorySigningKeyStore::from_config_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyConfig {
    /// Name of the community the key signs for.
    pub community: String,
    /// PEM file holding the private key.
    pub private_key_path: PathBuf,
    /// PEM file holding the certificate chain, leaf first.
    pub certificate_chain_path: PathBuf,
    /// Signing algorithm; derived from the key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<SigningAlgorithm>,
}

/// A [`SigningKeyStore`] holding [`PkeySignerWithChain`] keys in memory, one per community
/// name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySigningKeyStore {
    keys: HashMap<String, Arc<Mutex<PkeySignerWithChain>>>,
}

impl InMemorySigningKeyStore {
    /// An empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key of `community`, replacing the previous one.
    pub fn insert(&mut self, community: impl Into<String>, signer: PkeySignerWithChain) {
        self.keys
            .insert(community.into(), Arc::new(Mutex::new(signer)));
    }

    /// Set the key of `community` from a PEM private key and a PEM certificate chain.
    ///
    /// The leaf certificate must hold the public key of the private key.
    pub fn insert_pem(
        &mut self,
        community: impl Into<String>,
        algorithm: Option<SigningAlgorithm>,
        private_key_pem: &[u8],
        certificate_chain_pem: &[u8],
    ) -> Result<()> {
        let community = community.into();

        let private_key = PKey::private_key_from_pem(private_key_pem)
            .foreign_err(|| Error::SigningKeyUnavailable)
            .ctx(|| format!("invalid private key for community {community}"))?;
        let signer = match algorithm {
            Some(algorithm) => PkeySigner::new(algorithm, private_key),
            None => PkeySigner::with_default_algorithm(private_key),
        }
        .with_err(|| Error::SigningKeyUnavailable)?;

        let certificates = X509::stack_from_pem(certificate_chain_pem)
            .foreign_err(|| Error::SigningKeyUnavailable)
            .ctx(|| format!("invalid certificate chain for community {community}"))?;
        let x5chain = X5Chain::new(certificates).with_err(|| Error::SigningKeyUnavailable)?;

        let signer = PkeySignerWithChain::new(signer, x5chain)
            .with_err(|| Error::SigningKeyUnavailable)
            .ctx(|| format!("certificate does not match the key of community {community}"))?;

        tracing::info!(
            community = %community,
            algorithm = %signer.algorithm(),
            "Loaded signing key"
        );
        self.insert(community, signer);

        Ok(())
    }

    /// Load every key listed in the JSON array of [`SigningKeyConfig`] at `path`.
    ///
    /// Relative key and certificate paths are resolved against the directory of `path`.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path)
            .foreign_err(|| Error::SigningKeyUnavailable)
            .ctx(|| format!("unable to read {}", path.display()))?;
        let entries: Vec<SigningKeyConfig> = serde_json::from_slice(&contents)
            .foreign_err(|| Error::SigningKeyUnavailable)
            .ctx(|| format!("{} is not a valid signing keys file", path.display()))?;

        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let read = |file: &Path| {
            std::fs::read(directory.join(file))
                .foreign_err(|| Error::SigningKeyUnavailable)
                .ctx(|| format!("unable to read {}", file.display()))
        };

        let mut store = Self::new();
        for entry in entries {
            let private_key_pem = read(&entry.private_key_path)?;
            let certificate_chain_pem = read(&entry.certificate_chain_path)?;

            store.insert_pem(
                entry.community,
                entry.algorithm,
                &private_key_pem,
                &certificate_chain_pem,
            )?;
        }

        Ok(store)
    }

    /// Whether a key is configured for `community`.
    pub fn contains(&self, community: &str) -> bool {
        self.keys.contains_key(community)
    }
}

impl SigningKeyStore for InMemorySigningKeyStore {
    type Signer = PkeySignerWithChain;

    fn acquire(
        &self,
        community: &Community,
    ) -> impl Future<Output = Result<SigningKeyHandle<Self::Signer>>> + Send {
        let key = self.keys.get(&community.name).cloned();
        let name = community.name.clone();

        async move {
            let Some(key) = key else {
                return Err(bherror::Error::root(Error::SigningKeyUnavailable)
                    .ctx(format!("no signing key for community {name}")));
            };

            let guard = key.lock_owned().await;

            Ok(SigningKeyHandle::new(name, guard))
        }
    }
}
