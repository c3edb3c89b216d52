use std::sync::Arc;

use futures::future::try_join_all;
use shroud_crypto::{sha256, CryptoProvider};
use shroud_dag::{Dag, DagError, DagVertex};
use shroud_doc::{pack_changes, unpack_changes, Document, State};
use shroud_protocol::endpoint::url;
use shroud_protocol::{
    b64_decode, b64_encode, endpoints, MetadataAddRequest, MetadataDeleteRequest,
    MetadataGetRequest, MetadataLookup, NetResponse, NetworkProvider, PublicMetadataGetRequest,
    RequestBody,
};
use shroud_types::clean_path;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::config::MetadataConfig;
use crate::error::{MetadataError, MetadataResult};
use crate::index::{index_entries, IndexEntry, METADATA_INDEX_PATH};
use crate::keys::DocumentKeys;
use crate::store::MetadataStore;

/// Which endpoint a read goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadVia {
    Owner,
    Public,
}

/// Key-value document store over an untrusted metadata node.
///
/// Every document is a DAG of encrypted change-sets stored under a public
/// key. Reads fetch the DAG, decrypt each vertex and replay the changes;
/// writes diff the current document, append one signed vertex and post it.
/// Writes through one instance are serialized so that two local callers
/// never diff against the same base document.
pub struct MetadataAccess {
    config: MetadataConfig,
    crypto: Arc<dyn CryptoProvider>,
    net: Arc<dyn NetworkProvider>,
    store: MetadataStore,
    actor: String,
    write_lock: Mutex<()>,
}

impl MetadataAccess {
    pub fn new(
        config: MetadataConfig,
        crypto: Arc<dyn CryptoProvider>,
        net: Arc<dyn NetworkProvider>,
    ) -> Self {
        Self {
            config,
            crypto,
            net,
            store: MetadataStore::new(),
            actor: uuid::Uuid::now_v7().to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub fn crypto(&self) -> &Arc<dyn CryptoProvider> {
        &self.crypto
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Actor id stamped on every change made through this instance.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Keys for a logical path, after cleaning it.
    pub async fn keys_for_path(&self, path: &str) -> MetadataResult<DocumentKeys> {
        DocumentKeys::for_path(self.crypto.as_ref(), &clean_path(path)).await
    }

    /// Current document at `path`, or `None` if nothing was written yet.
    pub async fn get(&self, path: &str) -> MetadataResult<Option<Document>> {
        let keys = self.keys_for_path(path).await?;
        self.read(&keys, ReadVia::Owner).await
    }

    /// Read a shared document by its public key and symmetric key.
    pub async fn get_public(
        &self,
        public_key: &[u8],
        encrypt_key: &[u8],
    ) -> MetadataResult<Option<Document>> {
        let keys = DocumentKeys::from_public(public_key, encrypt_key);
        self.read(&keys, ReadVia::Public).await
    }

    /// Apply `mutator` to the document at `path` and publish the difference.
    ///
    /// A mutator that leaves the document unchanged costs no request.
    pub async fn change<F>(&self, path: &str, mutator: F) -> MetadataResult<Document>
    where
        F: FnOnce(&mut State),
    {
        let keys = self.keys_for_path(path).await?;
        let _guard = self.write_lock.lock().await;
        self.commit_tracked(&keys, false, mutator).await
    }

    /// Like [`change`](Self::change) for a document addressed by an explicit
    /// private key and symmetric key. The document is readable through
    /// [`get_public`](Self::get_public).
    pub async fn change_public<F>(
        &self,
        private_key: &[u8],
        encrypt_key: &[u8],
        mutator: F,
    ) -> MetadataResult<Document>
    where
        F: FnOnce(&mut State),
    {
        let keys =
            DocumentKeys::from_private(self.crypto.as_ref(), private_key, Some(encrypt_key)).await?;
        let _guard = self.write_lock.lock().await;
        self.commit_tracked(&keys, true, mutator).await
    }

    /// Delete the document at `path` on the node and forget it locally.
    pub async fn delete(&self, path: &str) -> MetadataResult<()> {
        let keys = self.keys_for_path(path).await?;
        let _guard = self.write_lock.lock().await;
        let store_key = keys.store_key();
        let request = MetadataDeleteRequest {
            metadata_v2_key: store_key.clone(),
        };
        let result = self
            .post(endpoints::METADATA_DELETE, &request)
            .await
            .and_then(|res| Ok(res.error_for_status()?));
        self.store.purge(&store_key);
        result?;
        info!(key = %store_key, "deleted metadata document");
        Ok(())
    }

    /// Force the next read of `path` to go to the node.
    pub async fn mark_cache_dirty(&self, path: &str) -> MetadataResult<()> {
        let keys = self.keys_for_path(path).await?;
        self.store.mark_dirty(&keys.store_key());
        Ok(())
    }

    /// Keys recorded in the metadata index that still exist on the node.
    ///
    /// A key the node does not know is dropped whether it was deleted or
    /// never written.
    pub async fn get_metadata_location_keys_list(&self) -> MetadataResult<Vec<IndexEntry>> {
        let Some(index) = self.get(METADATA_INDEX_PATH).await? else {
            return Ok(Vec::new());
        };
        let entries = index_entries(&index)?;
        let semaphore = Semaphore::new(self.config.discovery_concurrency.max(1));
        let probes = entries.into_iter().map(|entry| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await;
                let exists = self.exists(&entry.public_key).await?;
                Ok::<_, MetadataError>(exists.then_some(entry))
            }
        });
        let found: Vec<IndexEntry> = try_join_all(probes).await?.into_iter().flatten().collect();
        debug!(keys = found.len(), "discovered metadata keys");
        Ok(found)
    }

    async fn exists(&self, store_key: &str) -> MetadataResult<bool> {
        let request = MetadataGetRequest {
            metadata_v2_key: store_key.to_string(),
        };
        let res = self.post(endpoints::METADATA_GET, &request).await?;
        Ok(matches!(
            MetadataLookup::from_response(&res)?,
            MetadataLookup::Found(_)
        ))
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> MetadataResult<NetResponse> {
        let body = RequestBody::json(body)?;
        Ok(self
            .net
            .post(&url(&self.config.metadata_node, path), &[], body)
            .await?)
    }

    async fn read(&self, keys: &DocumentKeys, via: ReadVia) -> MetadataResult<Option<Document>> {
        let store_key = keys.store_key();
        if let Some(document) = self
            .store
            .cached(&store_key, Instant::now(), self.config.cache_ttl())
        {
            return Ok(document);
        }

        let res = match via {
            ReadVia::Owner => {
                let request = MetadataGetRequest {
                    metadata_v2_key: store_key.clone(),
                };
                self.post(endpoints::METADATA_GET, &request).await?
            }
            ReadVia::Public => {
                let request = PublicMetadataGetRequest::new(store_key.clone())?;
                self.post(endpoints::METADATA_GET_PUBLIC, &request).await?
            }
        };
        let now = Instant::now();
        let found = match MetadataLookup::from_response(&res)? {
            MetadataLookup::Found(found) => found,
            MetadataLookup::NotFound => {
                debug!(key = %store_key, "no metadata document yet");
                self.store
                    .put(&store_key, Dag::new(), CacheEntry::new(None, now));
                return Ok(None);
            }
        };

        let dag = Dag::from_binary(&b64_decode(&found.metadata_v2)?)?;
        let document = self.replay(&dag, keys.encrypt_key()).await?;
        debug!(key = %store_key, vertices = dag.len(), "fetched metadata document");
        self.store
            .put(&store_key, dag, CacheEntry::new(Some(document.clone()), now));
        Ok(Some(document))
    }

    /// Decrypt every vertex and replay its changes in DAG order.
    async fn replay(&self, dag: &Dag, encrypt_key: &[u8]) -> MetadataResult<Document> {
        let plaintexts = try_join_all(
            dag.vertices()
                .map(|vertex| self.crypto.decrypt(encrypt_key, vertex.payload())),
        )
        .await?;
        let mut records = Vec::new();
        for plaintext in &plaintexts {
            records.extend(unpack_changes(plaintext)?);
        }
        Ok(Document::from_changes(self.actor.clone(), records.iter())?)
    }

    /// Commit and, for a non-empty write, record the key in the index.
    async fn commit_tracked<F>(
        &self,
        keys: &DocumentKeys,
        is_public: bool,
        mutator: F,
    ) -> MetadataResult<Document>
    where
        F: FnOnce(&mut State),
    {
        let (document, written) = self.commit(keys, is_public, mutator).await?;
        if written && self.config.track_index {
            self.record_in_index(keys, is_public).await?;
        }
        Ok(document)
    }

    /// Diff, encrypt, append, sign and post. Callers hold `write_lock`.
    /// The flag tells whether a vertex was written.
    async fn commit<F>(
        &self,
        keys: &DocumentKeys,
        is_public: bool,
        mutator: F,
    ) -> MetadataResult<(Document, bool)>
    where
        F: FnOnce(&mut State),
    {
        let store_key = keys.store_key();
        let private = keys
            .private()
            .ok_or_else(|| MetadataError::ReadOnly(store_key.clone()))?;

        let current = self
            .read(keys, ReadVia::Owner)
            .await?
            .unwrap_or_else(|| Document::new(self.actor.clone()));
        let (next, records) = current.change(mutator)?;
        if records.is_empty() {
            debug!(key = %store_key, "change left document untouched");
            return Ok((current, false));
        }

        let mut dag = self.store.dag(&store_key).unwrap_or_default();
        let encrypted = self
            .crypto
            .encrypt(keys.encrypt_key(), &pack_changes(&records)?)
            .await?;
        let insertion = dag.add_reduced(DagVertex::new(encrypted));
        if insertion.is_duplicate() {
            debug!(key = %store_key, "vertex already present");
            return Ok((current, false));
        }
        let id = insertion.id();
        let vertex = dag.get(&id).ok_or(DagError::VertexNotFound(id))?;
        let edges = dag.parent_edges(&id)?;
        let signature = self.crypto.sign(private, &dag.digest(&id, sha256)?).await?;

        let request = MetadataAddRequest {
            metadata_v2_key: store_key.clone(),
            metadata_v2_vertex: b64_encode(&vertex.to_binary()?),
            metadata_v2_edges: edges.iter().map(|e| b64_encode(&e.to_binary())).collect(),
            metadata_v2_sig: b64_encode(&signature),
            is_public,
        };
        let posted = self
            .post(endpoints::METADATA_ADD, &request)
            .await
            .and_then(|res| Ok(res.error_for_status()?));
        if let Err(e) = posted {
            warn!(key = %store_key, error = %e, "metadata write rejected, dropping local state");
            self.store.purge(&store_key);
            return Err(e);
        }

        let now = Instant::now();
        let entry = CacheEntry::new(Some(next.clone()), now)
            .with_eviction(now + self.config.eviction_delay());
        self.store.put(&store_key, dag, entry);
        debug!(key = %store_key, vertex = %id.short_hex(), "appended metadata vertex");
        Ok((next, true))
    }

    async fn record_in_index(&self, keys: &DocumentKeys, is_public: bool) -> MetadataResult<()> {
        let index_keys = self.keys_for_path(METADATA_INDEX_PATH).await?;
        if index_keys.public() == keys.public() {
            return Ok(());
        }
        let entry = IndexEntry::for_keys(keys, is_public);
        let value = entry.to_value()?;
        self.commit(&index_keys, false, move |state| {
            state.insert(entry.public_key, value);
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shroud_crypto::LocalCrypto;
    use shroud_protocol::MemoryRemote;
    use std::time::Duration;

    const SEED: [u8; 32] = [42u8; 32];

    fn access_with(remote: &Arc<MemoryRemote>, config: MetadataConfig) -> MetadataAccess {
        MetadataAccess::new(config, Arc::new(LocalCrypto::new(SEED)), remote.clone())
    }

    fn access(remote: &Arc<MemoryRemote>) -> MetadataAccess {
        access_with(remote, MetadataConfig::with_node("memory://meta"))
    }

    fn set(key: &'static str, value: serde_json::Value) -> impl FnOnce(&mut State) {
        move |state: &mut State| {
            state.insert(key.to_string(), value);
        }
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        assert!(meta.get("/nothing").await.unwrap().is_none());
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), 1);
    }

    #[tokio::test]
    async fn change_then_get_from_fresh_instance() {
        let remote = Arc::new(MemoryRemote::new());
        let writer = access(&remote);
        let doc = writer.change("/a", set("name", json!("alpha"))).await.unwrap();
        assert_eq!(doc.get::<String>("name").unwrap().as_deref(), Some("alpha"));

        let reader = access(&remote);
        let doc = reader.get("/a/./").await.unwrap().unwrap();
        assert_eq!(doc.get::<String>("name").unwrap().as_deref(), Some("alpha"));
    }

    #[tokio::test]
    async fn noop_change_makes_no_requests() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        let before = meta.change("/a", set("x", json!(1))).await.unwrap();
        let requests = remote.request_count();

        let after = meta.change("/a", |_| {}).await.unwrap();
        let same = meta.change("/a", set("x", json!(1))).await.unwrap();
        assert_eq!(remote.request_count(), requests);
        assert_eq!(after, before);
        assert_eq!(same, before);
    }

    #[tokio::test]
    async fn sequential_changes_merge() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        meta.change("/a", set("y", json!(2))).await.unwrap();

        let key = meta.keys_for_path("/a").await.unwrap().store_key();
        assert_eq!(remote.document_len(&key), Some(2));

        let doc = access(&remote).get("/a").await.unwrap().unwrap();
        assert_eq!(doc.get::<i64>("x").unwrap(), Some(1));
        assert_eq!(doc.get::<i64>("y").unwrap(), Some(2));
    }

    #[tokio::test]
    async fn concurrent_changes_to_one_path_both_land() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_latency(Duration::from_millis(5));
        let meta = access(&remote);
        let (x, y) = tokio::join!(
            meta.change("/a", set("x", json!(1))),
            meta.change("/a", set("y", json!(2))),
        );
        x.unwrap();
        y.unwrap();

        let key = meta.keys_for_path("/a").await.unwrap().store_key();
        assert_eq!(remote.document_len(&key), Some(2));

        let doc = access(&remote).get("/a").await.unwrap().unwrap();
        assert_eq!(doc.get::<i64>("x").unwrap(), Some(1));
        assert_eq!(doc.get::<i64>("y").unwrap(), Some(2));
    }

    #[tokio::test]
    async fn two_instances_build_on_each_other() {
        let remote = Arc::new(MemoryRemote::new());
        let first = access(&remote);
        let second = access(&remote);
        first.change("/shared", set("x", json!(1))).await.unwrap();
        second.change("/shared", set("y", json!(2))).await.unwrap();

        first.mark_cache_dirty("/shared").await.unwrap();
        let doc = first.get("/shared").await.unwrap().unwrap();
        assert_eq!(doc.state().len(), 2);
    }

    #[tokio::test]
    async fn dirty_cache_forces_fetch() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        let gets = remote.count_requests(endpoints::METADATA_GET);

        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets);

        meta.mark_cache_dirty("/a").await.unwrap();
        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets + 1);
        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_and_ttl_expire_cache() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        let gets = remote.count_requests(endpoints::METADATA_GET);

        tokio::time::advance(Duration::from_secs(4)).await;
        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets);

        tokio::time::advance(Duration::from_secs(2)).await;
        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets + 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets + 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        meta.get("/a").await.unwrap();
        assert_eq!(remote.count_requests(endpoints::METADATA_GET), gets + 2);
    }

    #[tokio::test]
    async fn rejected_write_drops_local_state() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        let key = meta.keys_for_path("/a").await.unwrap().store_key();

        remote.fail_metadata_adds(true);
        let err = meta.change("/a", set("x", json!(2))).await.unwrap_err();
        assert!(matches!(err, MetadataError::Protocol(_)));
        assert!(!meta.store().contains(&key));

        remote.fail_metadata_adds(false);
        let doc = meta.get("/a").await.unwrap().unwrap();
        assert_eq!(doc.get::<i64>("x").unwrap(), Some(1));
        meta.change("/a", set("x", json!(3))).await.unwrap();
        assert_eq!(remote.document_len(&key), Some(2));
    }

    #[tokio::test]
    async fn delete_purges_document() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        let key = meta.keys_for_path("/a").await.unwrap().store_key();

        meta.delete("/a").await.unwrap();
        assert!(!meta.store().contains(&key));
        assert_eq!(remote.document_len(&key), None);
        assert!(meta.get("/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn public_documents_are_readable_by_key() {
        let remote = Arc::new(MemoryRemote::new());
        let owner = access(&remote);
        let private = owner.crypto().derive(None, "/share/1").await.unwrap();
        let encrypt_key = owner.crypto().generate_symmetric_key().await.unwrap();
        owner
            .change_public(&private, &encrypt_key, set("title", json!("notes")))
            .await
            .unwrap();
        let public = owner.crypto().public_key(&private).await.unwrap();

        let stranger = MetadataAccess::new(
            MetadataConfig::with_node("memory://meta"),
            Arc::new(LocalCrypto::generate()),
            remote.clone(),
        );
        let doc = stranger.get_public(&public, &encrypt_key).await.unwrap().unwrap();
        assert_eq!(doc.get::<String>("title").unwrap().as_deref(), Some("notes"));
        assert_eq!(remote.count_requests(endpoints::METADATA_GET_PUBLIC), 1);
    }

    #[tokio::test]
    async fn private_documents_are_not_public() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        let keys = meta.keys_for_path("/a").await.unwrap();

        let stranger = access(&remote);
        let doc = stranger
            .get_public(keys.public(), keys.encrypt_key())
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn discovery_lists_live_keys() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        meta.change("/a", set("x", json!(2))).await.unwrap();
        meta.change("/b", set("x", json!(1))).await.unwrap();
        meta.change("/c", set("x", json!(1))).await.unwrap();
        meta.delete("/c").await.unwrap();

        let index_key = meta.keys_for_path(METADATA_INDEX_PATH).await.unwrap().store_key();
        assert_eq!(remote.document_len(&index_key), Some(3));

        let mut expected = vec![
            meta.keys_for_path("/a").await.unwrap().store_key(),
            meta.keys_for_path("/b").await.unwrap().store_key(),
        ];
        expected.sort();
        let found: Vec<String> = meta
            .get_metadata_location_keys_list()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.public_key)
            .collect();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn discovery_probes_many_keys_with_small_concurrency() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_latency(Duration::from_millis(2));
        let config = MetadataConfig {
            discovery_concurrency: 2,
            ..MetadataConfig::with_node("memory://meta")
        };
        let meta = access_with(&remote, config);
        let paths = ["/p0", "/p1", "/p2", "/p3", "/p4", "/p5", "/p6"];
        let mut expected = Vec::new();
        for path in paths {
            meta.change(path, set("x", json!(path))).await.unwrap();
            expected.push(meta.keys_for_path(path).await.unwrap().store_key());
        }
        meta.delete("/p3").await.unwrap();
        let gone = meta.keys_for_path("/p3").await.unwrap().store_key();
        expected.retain(|key| *key != gone);
        expected.sort();

        let mut found: Vec<String> = meta
            .get_metadata_location_keys_list()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.public_key)
            .collect();
        found.sort();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn untracked_writes_skip_the_index() {
        let remote = Arc::new(MemoryRemote::new());
        let config = MetadataConfig {
            track_index: false,
            ..MetadataConfig::with_node("memory://meta")
        };
        let meta = access_with(&remote, config);
        meta.change("/a", set("x", json!(1))).await.unwrap();
        assert_eq!(remote.document_keys().len(), 1);
        assert!(meta.get_metadata_location_keys_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_only_keys_cannot_commit() {
        let remote = Arc::new(MemoryRemote::new());
        let meta = access(&remote);
        let keys = DocumentKeys::from_public(&[1u8; 32], &[2u8; 32]);
        let _guard = meta.write_lock.lock().await;
        let err = meta.commit(&keys, true, |_| {}).await.unwrap_err();
        assert!(matches!(err, MetadataError::ReadOnly(_)));
    }
}
