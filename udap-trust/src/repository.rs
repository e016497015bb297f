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
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use bherror::traits::{ErrorContext as _, ForeignError as _};

use crate::{Error, Result, TrustGraph, TrustGraphRecords, TrustGraphStore};

/// Storage backend of a [`TrustGraphStore`].
pub trait TrustGraphRepository {
    /// Read every persisted record.
    fn load(&self) -> Result<TrustGraphRecords>;

    /// Replace the persisted records with `records`.
    fn save(&self, records: &TrustGraphRecords) -> Result<()>;
}

/// A [`TrustGraphRepository`] keeping the records in a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    /// Use the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrustGraphRepository for JsonFileRepository {
    fn load(&self) -> Result<TrustGraphRecords> {
        let contents = fs::read(&self.path)
            .foreign_err(|| Error::Persistence)
            .ctx(|| format!("unable to read {}", self.path.display()))?;

        serde_json::from_slice(&contents)
            .foreign_err(|| Error::Persistence)
            .ctx(|| format!("{} is not a valid trust graph document", self.path.display()))
    }

    /// Writes a temporary file next to the document and renames it over the document.  The
    /// temporary file is removed when any step fails.
    fn save(&self, records: &TrustGraphRecords) -> Result<()> {
        let contents = serde_json::to_vec_pretty(records).foreign_err(|| Error::Persistence)?;

        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(directory)
            .foreign_err(|| Error::Persistence)
            .ctx(|| format!("unable to create a temporary file in {}", directory.display()))?;
        file.write_all(&contents)
            .and_then(|()| file.as_file().sync_all())
            .foreign_err(|| Error::Persistence)
            .ctx(|| format!("unable to write {}", file.path().display()))?;

        file.persist(&self.path)
            .map_err(|err| err.error)
            .foreign_err(|| Error::Persistence)
            .ctx(|| format!("unable to replace {}", self.path.display()))?;

        Ok(())
    }
}

impl TrustGraphStore {
    /// Build a store from the records of `repository`.
    ///
    /// Every record is converted and every invariant checked; an inconsistent repository is
    /// rejected as a whole.
    pub fn load(repository: &impl TrustGraphRepository) -> Result<Self> {
        let records = repository.load()?;
        let graph = TrustGraph::try_from(records)?;

        tracing::info!(
            communities = graph.communities.len(),
            anchors = graph.anchors.len(),
            certifications = graph.certifications.len(),
            "Loaded trust graph"
        );

        Self::from_graph(graph)
    }

    /// Persist the current snapshot to `repository`.
    pub fn save(&self, repository: &impl TrustGraphRepository) -> Result<()> {
        let records = TrustGraphRecords::from(&*self.snapshot());
        repository.save(&records)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use udap_x5chain::{Builder, KeyAlgorithmFamily};

    use super::*;
    use crate::{CommunitySelector, NewAnchor, NewCommunity, ReadMode};

    #[test]
    fn test_save_and_load() {
        let directory = tempfile::tempdir().unwrap();
        let repository = JsonFileRepository::new(directory.path().join("trust-graph.json"));

        let store = TrustGraphStore::new();
        let community = store
            .add_community(NewCommunity::new("udap://community1").as_default())
            .unwrap();
        let anchor = Builder::generate_anchor(KeyAlgorithmFamily::Ec, "anchor").unwrap();
        let pem = String::from_utf8(anchor.certificate().to_pem().unwrap()).unwrap();
        store
            .add_anchor(NewAnchor::new(community.id, "anchor", pem))
            .unwrap();
        let certification = store.add_certification("udap://certification").unwrap();
        store
            .associate_community_certification(community.id, certification.id)
            .unwrap();

        store.save(&repository).unwrap();
        let loaded = TrustGraphStore::load(&repository).unwrap();

        assert_eq!(*loaded.snapshot(), *store.snapshot());
        assert_eq!(
            loaded.get_community(&CommunitySelector::parse("udap://community1")),
            Some(community.clone())
        );
        assert_eq!(loaded.get_anchors(community.id).len(), 1);
        assert_eq!(loaded.get_certifications(community.id), vec![certification]);
        assert_eq!(fs::read_dir(directory.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_save_leaves_no_temporary_file() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trust-graph.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"").unwrap();

        let store = TrustGraphStore::new();
        store.add_community(NewCommunity::new("udap://community1")).unwrap();

        let err = store.save(&JsonFileRepository::new(&path)).unwrap_err();
        assert_matches!(err.error, Error::Persistence);

        let entries: Vec<_> = fs::read_dir(directory.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, ["trust-graph.json"]);
    }

    #[test]
    fn test_load_missing_file() {
        let directory = tempfile::tempdir().unwrap();
        let repository = JsonFileRepository::new(directory.path().join("missing.json"));

        let err = TrustGraphStore::load(&repository).unwrap_err();
        assert_matches!(err.error, Error::Persistence);
    }

    #[test]
    fn test_load_invalid_document() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trust-graph.json");
        fs::write(&path, r#"{"communities": 5}"#).unwrap();

        let err = TrustGraphStore::load(&JsonFileRepository::new(&path)).unwrap_err();
        assert_matches!(err.error, Error::Persistence);
    }

    #[test]
    fn test_load_rejects_two_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trust-graph.json");
        fs::write(
            &path,
            r#"{
                "communities": [
                    { "id": 1, "name": "udap://one", "enabled": true, "default": true },
                    { "id": 2, "name": "udap://two", "enabled": true, "default": true }
                ]
            }"#,
        )
        .unwrap();

        let err = TrustGraphStore::load(&JsonFileRepository::new(&path)).unwrap_err();
        assert_matches!(err.error, Error::ConflictingDefaultCommunity);
    }

    #[test]
    fn test_load_partial_document() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("trust-graph.json");
        fs::write(
            &path,
            r#"{ "communities": [ { "id": 3, "name": "udap://three", "enabled": false } ] }"#,
        )
        .unwrap();

        let store = TrustGraphStore::load(&JsonFileRepository::new(&path)).unwrap();

        assert_eq!(store.get_communities(ReadMode::Administrative).len(), 1);
        assert!(store.get_communities(ReadMode::Discovery).is_empty());
        assert_eq!(store.default_community(), None);
    }
}
