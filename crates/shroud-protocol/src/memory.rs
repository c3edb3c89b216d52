//! In-memory emulation of the metadata and storage nodes.
//!
//! [`MemoryRemote`] implements [`NetworkProvider`] by routing on the URL path
//! and ignores the host, so one instance can stand in for both nodes. It
//! enforces what a real metadata node enforces for writes: the vertex must
//! match its edges, every parent must already be stored, and the signature
//! must verify over the SHA-256 digest chain of the new vertex.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use shroud_crypto::{sha256, Signature, VerifyingKey};
use shroud_dag::{Dag, DagEdge, DagVertex};
use tracing::debug;

use crate::endpoint::endpoints;
use crate::error::ProtocolResult;
use crate::message::{
    b64_decode, b64_encode, form_fields, DownloadResponse, FileIdRequest, MetadataAddRequest,
    MetadataAddResponse, MetadataGetRequest, MetadataGetResponse, PublicMetadataGetRequest,
    UploadStatusRequest, KEY_NOT_FOUND,
};
use crate::transport::{FormField, Headers, NetResponse, NetworkProvider, RequestBody};

const DOWNLOAD_BASE: &str = "memory://storage/files/";
const EXPIRATION_SECS: i64 = 365 * 24 * 3600;

#[derive(Clone, Default)]
struct StoredDocument {
    dag: Dag,
    is_public: bool,
}

struct StoredFile {
    size_on_fs: u64,
    metadata: Vec<u8>,
    end_index: u64,
    parts: BTreeMap<u64, Vec<u8>>,
    finished: bool,
}

impl StoredFile {
    fn contents(&self) -> Vec<u8> {
        self.parts.values().flatten().copied().collect()
    }
}

#[derive(Default)]
struct RemoteState {
    documents: HashMap<String, StoredDocument>,
    files: HashMap<String, StoredFile>,
    log: Vec<String>,
    failing_uploads: u32,
    failing_metadata_adds: bool,
    latency: Duration,
}

/// In-memory metadata and storage node.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
}

fn respond(status: u16, body: impl Into<Bytes>) -> NetResponse {
    NetResponse {
        status,
        data: body.into(),
    }
}

fn respond_json<T: Serialize>(value: &T) -> NetResponse {
    match serde_json::to_vec(value) {
        Ok(body) => respond(200, body),
        Err(e) => respond(500, e.to_string()),
    }
}

fn not_found() -> NetResponse {
    respond(404, format!("\"{KEY_NOT_FOUND}\""))
}

/// Path component of a URL, host and scheme stripped.
fn route(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => url,
    };
    match rest.find('/') {
        Some(i) => &rest[i..],
        None => "/",
    }
}

/// Parse `bytes=a-b` (inclusive) into a half-open range.
fn parse_range(headers: &Headers, len: usize) -> Option<(usize, usize)> {
    let (_, value) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("range"))?;
    let bounds = value.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end: usize = match end {
        "" => len.saturating_sub(1),
        e => e.parse().ok()?,
    };
    (start <= end && end < len).then_some((start, end + 1))
}

fn form_text<'a>(fields: &'a [FormField], name: &str) -> Option<&'a str> {
    fields.iter().find(|f| f.name == name).and_then(|f| f.as_text())
}

fn form_bytes<'a>(fields: &'a [FormField], name: &str) -> Option<&'a [u8]> {
    fields.iter().find(|f| f.name == name).and_then(|f| f.as_bytes())
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Delay applied to every request before it is handled.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Answer the next `n` part uploads with a server error.
    pub fn fail_next_uploads(&self, n: u32) {
        self.lock().failing_uploads = n;
    }

    /// Reject every metadata write while set.
    pub fn fail_metadata_adds(&self, fail: bool) {
        self.lock().failing_metadata_adds = fail;
    }

    /// Every request seen so far, as `"METHOD /path"`.
    pub fn requests(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Number of requests whose path ends with `suffix`.
    pub fn count_requests(&self, suffix: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|entry| entry.ends_with(suffix))
            .count()
    }

    /// Number of vertices stored under a base64 public key.
    pub fn document_len(&self, key: &str) -> Option<usize> {
        self.lock().documents.get(key).map(|d| d.dag.len())
    }

    /// Base64 keys of every stored document.
    pub fn document_keys(&self) -> Vec<String> {
        self.lock().documents.keys().cloned().collect()
    }

    /// Encrypted contents of a fully uploaded file.
    pub fn stored_file(&self, file_id: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        let file = state.files.get(file_id)?;
        file.finished.then(|| file.contents())
    }

    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    fn handle_get(&self, path: &str, headers: &Headers) -> NetResponse {
        let state = self.lock();
        if path == "/" || path.is_empty() {
            return respond(200, "ok");
        }
        let Some(rest) = path.strip_prefix("/files/") else {
            return respond(404, "no such route");
        };
        let (id, kind) = match rest.split_once('/') {
            Some((id, kind)) => (id, format!("/{kind}")),
            None => return respond(404, "no such route"),
        };
        let Some(file) = state.files.get(id).filter(|f| f.finished) else {
            return respond(404, "file not found");
        };
        match kind.as_str() {
            endpoints::DOWNLOAD_METADATA_SUFFIX => respond(200, file.metadata.clone()),
            endpoints::DOWNLOAD_FILE_SUFFIX => {
                let contents = file.contents();
                match parse_range(headers, contents.len()) {
                    Some((start, end)) => respond(206, contents[start..end].to_vec()),
                    None if headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("range")) => {
                        respond(416, "range not satisfiable")
                    }
                    None => respond(200, contents),
                }
            }
            _ => respond(404, "no such route"),
        }
    }

    fn handle_post(&self, path: &str, body: RequestBody) -> NetResponse {
        match (path, body) {
            (endpoints::METADATA_GET, RequestBody::Json(json)) => {
                match serde_json::from_str::<MetadataGetRequest>(&json) {
                    Ok(req) => self.metadata_get(&req.metadata_v2_key, false),
                    Err(e) => respond(400, e.to_string()),
                }
            }
            (endpoints::METADATA_GET_PUBLIC, RequestBody::Json(json)) => {
                let query = serde_json::from_str::<PublicMetadataGetRequest>(&json)
                    .map_err(|e| e.to_string())
                    .and_then(|req| req.query().map_err(|e| e.to_string()));
                match query {
                    Ok(query) => self.metadata_get(&query.metadata_v2_key, true),
                    Err(e) => respond(400, e),
                }
            }
            (endpoints::METADATA_ADD, RequestBody::Json(json)) => {
                match serde_json::from_str::<MetadataAddRequest>(&json) {
                    Ok(req) => self.metadata_add(req),
                    Err(e) => respond(400, e.to_string()),
                }
            }
            (endpoints::METADATA_DELETE, RequestBody::Json(json)) => {
                match serde_json::from_str::<MetadataGetRequest>(&json) {
                    Ok(req) => {
                        self.lock().documents.remove(&req.metadata_v2_key);
                        respond_json(&serde_json::json!({
                            "status": "metadataV2 successfully deleted"
                        }))
                    }
                    Err(e) => respond(400, e.to_string()),
                }
            }
            (endpoints::INIT_UPLOAD, RequestBody::Form(fields)) => self.init_upload(&fields),
            (endpoints::UPLOAD_PART, RequestBody::Form(fields)) => self.upload_part(&fields),
            (endpoints::UPLOAD_STATUS, RequestBody::Json(json)) => {
                match serde_json::from_str::<UploadStatusRequest>(&json) {
                    Ok(req) => self.upload_status(&req.file_handle),
                    Err(e) => respond(400, e.to_string()),
                }
            }
            (endpoints::DOWNLOAD, RequestBody::Json(json)) => {
                match serde_json::from_str::<FileIdRequest>(&json) {
                    Ok(req) => {
                        let state = self.lock();
                        match state.files.get(&req.file_id) {
                            Some(file) if file.finished => respond_json(&DownloadResponse {
                                file_download_url: format!("{DOWNLOAD_BASE}{}", req.file_id),
                            }),
                            _ => respond(404, "file not found"),
                        }
                    }
                    Err(e) => respond(400, e.to_string()),
                }
            }
            (endpoints::DELETE, RequestBody::Json(json)) => {
                match serde_json::from_str::<FileIdRequest>(&json) {
                    Ok(req) => match self.lock().files.remove(&req.file_id) {
                        Some(_) => respond(200, "file deleted"),
                        None => respond(404, "file not found"),
                    },
                    Err(e) => respond(400, e.to_string()),
                }
            }
            _ => respond(404, "no such route"),
        }
    }

    fn metadata_get(&self, key: &str, public: bool) -> NetResponse {
        let state = self.lock();
        let Some(doc) = state.documents.get(key) else {
            return not_found();
        };
        if public && !doc.is_public {
            return not_found();
        }
        match doc.dag.to_binary() {
            Ok(bin) => respond_json(&MetadataGetResponse {
                metadata_v2: b64_encode(&bin),
                expiration_date: chrono::Utc::now().timestamp() + EXPIRATION_SECS,
            }),
            Err(e) => respond(500, e.to_string()),
        }
    }

    fn metadata_add(&self, req: MetadataAddRequest) -> NetResponse {
        let mut state = self.lock();
        if state.failing_metadata_adds {
            return respond(500, "metadata node unavailable");
        }

        let key = match b64_decode(&req.metadata_v2_key)
            .ok()
            .and_then(|k| VerifyingKey::from_slice(&k).ok())
        {
            Some(key) => key,
            None => return respond(400, "invalid metadataV2Key"),
        };
        let vertex = match b64_decode(&req.metadata_v2_vertex)
            .ok()
            .and_then(|v| DagVertex::from_binary(&v).ok())
        {
            Some(vertex) => vertex,
            None => return respond(400, "invalid metadataV2Vertex"),
        };
        let mut edge_parents = BTreeSet::new();
        for edge in &req.metadata_v2_edges {
            match b64_decode(edge).ok().and_then(|e| DagEdge::from_binary(&e).ok()) {
                Some(edge) if edge.child == vertex.id() => {
                    edge_parents.insert(edge.parent);
                }
                _ => return respond(400, "invalid metadataV2Edges"),
            }
        }
        if &edge_parents != vertex.parents() {
            return respond(400, "edges do not match vertex");
        }
        let signature = match b64_decode(&req.metadata_v2_sig)
            .ok()
            .and_then(|s| Signature::from_slice(&s).ok())
        {
            Some(sig) => sig,
            None => return respond(400, "invalid metadataV2Sig"),
        };

        let mut doc = state
            .documents
            .get(&req.metadata_v2_key)
            .cloned()
            .unwrap_or_default();
        let id = vertex.id();
        if let Err(e) = doc.dag.insert(vertex) {
            return respond(409, e.to_string());
        }
        let digest = match doc.dag.digest(&id, sha256) {
            Ok(digest) => digest,
            Err(e) => return respond(500, e.to_string()),
        };
        if key.verify(&digest, &signature).is_err() {
            return respond(403, "signature does not match digest");
        }
        doc.is_public |= req.is_public;

        let bin = match doc.dag.to_binary() {
            Ok(bin) => bin,
            Err(e) => return respond(500, e.to_string()),
        };
        debug!(vertex = %id.short_hex(), vertices = doc.dag.len(), "stored metadata vertex");
        state.documents.insert(req.metadata_v2_key.clone(), doc);
        respond_json(&MetadataAddResponse {
            metadata_v2_key: req.metadata_v2_key,
            metadata_v2: b64_encode(&bin),
            expiration_date: chrono::Utc::now().timestamp() + EXPIRATION_SECS,
        })
    }

    fn init_upload(&self, fields: &[FormField]) -> NetResponse {
        let handle = form_text(fields, form_fields::FILE_HANDLE);
        let size = form_text(fields, form_fields::FILE_SIZE).and_then(|s| s.parse::<u64>().ok());
        let metadata = form_bytes(fields, form_fields::METADATA);
        let (Some(handle), Some(size_on_fs), Some(metadata)) = (handle, size, metadata) else {
            return respond(400, "incomplete init-upload form");
        };
        self.lock().files.insert(
            handle.to_string(),
            StoredFile {
                size_on_fs,
                metadata: metadata.to_vec(),
                end_index: 0,
                parts: BTreeMap::new(),
                finished: false,
            },
        );
        respond(200, "upload initialized")
    }

    fn upload_part(&self, fields: &[FormField]) -> NetResponse {
        let mut state = self.lock();
        if state.failing_uploads > 0 {
            state.failing_uploads -= 1;
            return respond(503, "injected failure");
        }
        let handle = form_text(fields, form_fields::FILE_HANDLE);
        let index = form_text(fields, form_fields::PART_INDEX).and_then(|s| s.parse::<u64>().ok());
        let end = form_text(fields, form_fields::END_INDEX).and_then(|s| s.parse::<u64>().ok());
        let data = form_bytes(fields, form_fields::FILE_DATA);
        let (Some(handle), Some(index), Some(end), Some(data)) = (handle, index, end, data) else {
            return respond(400, "incomplete upload form");
        };
        let Some(file) = state.files.get_mut(handle) else {
            return respond(404, "upload not initialized");
        };
        if index == 0 || index > end {
            return respond(400, "part index out of range");
        }
        file.end_index = end;
        file.parts.insert(index, data.to_vec());
        respond(200, "part uploaded")
    }

    fn upload_status(&self, handle: &str) -> NetResponse {
        let mut state = self.lock();
        let Some(file) = state.files.get_mut(handle) else {
            return respond(404, "upload not initialized");
        };
        let complete = file.end_index > 0 && (1..=file.end_index).all(|i| file.parts.contains_key(&i));
        let size_matches = file.parts.values().map(|p| p.len() as u64).sum::<u64>() == file.size_on_fs;
        if complete && size_matches {
            file.finished = true;
            respond_json(&serde_json::json!({ "status": "File is uploaded" }))
        } else {
            respond(400, "upload incomplete")
        }
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl NetworkProvider for MemoryRemote {
    async fn get(&self, url: &str, headers: &Headers) -> ProtocolResult<NetResponse> {
        let path = route(url);
        self.lock().log.push(format!("GET {path}"));
        self.delay().await;
        Ok(self.handle_get(path, headers))
    }

    async fn post(
        &self,
        url: &str,
        _headers: &Headers,
        body: RequestBody,
    ) -> ProtocolResult<NetResponse> {
        let path = route(url);
        self.lock().log.push(format!("POST {path}"));
        self.delay().await;
        Ok(self.handle_post(path, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{init_upload_form, upload_part_form, MetadataLookup};
    use shroud_crypto::SigningKey;

    fn add_request(sk: &SigningKey, dag: &mut Dag, payload: &[u8]) -> MetadataAddRequest {
        let id = dag.add_reduced(DagVertex::new(payload.to_vec())).id();
        let vertex = dag.get(&id).unwrap();
        let digest = dag.digest(&id, sha256).unwrap();
        MetadataAddRequest {
            metadata_v2_key: b64_encode(&sk.verifying_key().as_bytes()),
            metadata_v2_vertex: b64_encode(&vertex.to_binary().unwrap()),
            metadata_v2_edges: dag
                .parent_edges(&id)
                .unwrap()
                .iter()
                .map(|e| b64_encode(&e.to_binary()))
                .collect(),
            metadata_v2_sig: b64_encode(&sk.sign(&digest).to_bytes()),
            is_public: false,
        }
    }

    async fn post_json<T: Serialize>(remote: &MemoryRemote, path: &str, body: &T) -> NetResponse {
        remote
            .post(&format!("memory://meta{path}"), &[], RequestBody::json(body).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn route_strips_scheme_and_host() {
        assert_eq!(route("https://node.example/api/v2/download"), "/api/v2/download");
        assert_eq!(route("https://node.example"), "/");
        assert_eq!(route("/files/x/file"), "/files/x/file");
    }

    #[test]
    fn range_parsing() {
        let headers = vec![("Range".to_string(), "bytes=2-4".to_string())];
        assert_eq!(parse_range(&headers, 10), Some((2, 5)));
        assert_eq!(parse_range(&headers, 4), None);
        assert_eq!(parse_range(&[], 10), None);
    }

    #[tokio::test]
    async fn metadata_add_then_get() {
        let remote = MemoryRemote::new();
        let sk = SigningKey::generate();
        let mut dag = Dag::new();

        let req = add_request(&sk, &mut dag, b"one");
        let key = req.metadata_v2_key.clone();
        assert!(post_json(&remote, endpoints::METADATA_ADD, &req).await.ok());
        let req = add_request(&sk, &mut dag, b"two");
        assert!(post_json(&remote, endpoints::METADATA_ADD, &req).await.ok());

        let res = post_json(
            &remote,
            endpoints::METADATA_GET,
            &MetadataGetRequest {
                metadata_v2_key: key.clone(),
            },
        )
        .await;
        let MetadataLookup::Found(found) = MetadataLookup::from_response(&res).unwrap() else {
            panic!("document should exist");
        };
        let stored = Dag::from_binary(&b64_decode(&found.metadata_v2).unwrap()).unwrap();
        assert_eq!(stored, dag);
        assert_eq!(remote.document_len(&key), Some(2));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let remote = MemoryRemote::new();
        let res = post_json(
            &remote,
            endpoints::METADATA_GET,
            &MetadataGetRequest {
                metadata_v2_key: "nope".into(),
            },
        )
        .await;
        assert_eq!(
            MetadataLookup::from_response(&res).unwrap(),
            MetadataLookup::NotFound
        );
    }

    #[tokio::test]
    async fn wrong_signer_is_rejected() {
        let remote = MemoryRemote::new();
        let sk = SigningKey::generate();
        let mut req = add_request(&sk, &mut Dag::new(), b"x");
        let other = SigningKey::generate();
        req.metadata_v2_key = b64_encode(&other.verifying_key().as_bytes());
        let res = post_json(&remote, endpoints::METADATA_ADD, &req).await;
        assert_eq!(res.status, 403);
        assert!(remote.document_keys().is_empty());
    }

    #[tokio::test]
    async fn vertex_with_unknown_parent_is_rejected() {
        let remote = MemoryRemote::new();
        let sk = SigningKey::generate();
        let mut dag = Dag::new();
        add_request(&sk, &mut dag, b"never sent");
        let req = add_request(&sk, &mut dag, b"child");
        let res = post_json(&remote, endpoints::METADATA_ADD, &req).await;
        assert_eq!(res.status, 409);
    }

    #[tokio::test]
    async fn storage_upload_download_delete() {
        let remote = MemoryRemote::new();
        let id = hex::encode([7u8; 32]);
        let base = "memory://storage";

        let ping = remote.get(base, &[]).await.unwrap();
        assert!(ping.ok());

        let init = init_upload_form(&id, 6, b"meta".to_vec());
        assert!(remote
            .post(&format!("{base}{}", endpoints::INIT_UPLOAD), &[], RequestBody::Form(init))
            .await
            .unwrap()
            .ok());
        for (i, chunk) in [b"abc", b"def"].iter().enumerate() {
            let form = upload_part_form(&id, i as u64 + 1, 2, chunk.to_vec());
            let res = remote
                .post(&format!("{base}{}", endpoints::UPLOAD_PART), &[], RequestBody::Form(form))
                .await
                .unwrap();
            assert!(res.ok());
        }
        let status = post_json(
            &remote,
            endpoints::UPLOAD_STATUS,
            &UploadStatusRequest {
                file_handle: id.clone(),
            },
        )
        .await;
        assert!(status.ok());
        assert_eq!(remote.stored_file(&id).unwrap(), b"abcdef");

        let res = post_json(&remote, endpoints::DOWNLOAD, &FileIdRequest { file_id: id.clone() }).await;
        let url = res.json::<DownloadResponse>().unwrap().file_download_url;
        let meta = remote.get(&format!("{url}/metadata"), &[]).await.unwrap();
        assert_eq!(&meta.data[..], b"meta");
        let range = vec![("Range".to_string(), "bytes=1-3".to_string())];
        let part = remote.get(&format!("{url}/file"), &range).await.unwrap();
        assert_eq!(part.status, 206);
        assert_eq!(&part.data[..], b"bcd");

        let deleted = post_json(&remote, endpoints::DELETE, &FileIdRequest { file_id: id.clone() }).await;
        assert!(deleted.ok());
        let again = post_json(&remote, endpoints::DELETE, &FileIdRequest { file_id: id }).await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn injected_upload_failures() {
        let remote = MemoryRemote::new();
        remote.fail_next_uploads(1);
        let form = upload_part_form("x", 1, 1, vec![1]);
        let res = remote
            .post("memory://s/api/v2/sia/upload", &[], RequestBody::Form(form.clone()))
            .await
            .unwrap();
        assert_eq!(res.status, 503);
        let res = remote
            .post("memory://s/api/v2/sia/upload", &[], RequestBody::Form(form))
            .await
            .unwrap();
        // Failure budget used up; this one reaches the handler.
        assert_eq!(res.status, 404);
        assert_eq!(remote.count_requests(endpoints::UPLOAD_PART), 2);
    }
}
