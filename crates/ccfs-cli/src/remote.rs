//! Client for the server's direct transfer endpoints
//!
//! ```text
//! upload:   seal locally → GET /api/upload?filename=… → PUT sealed body to the URL
//! download: GET /api/download?key=… → GET the URL → open filename → open body
//! ```
//!
//! The server hands out presigned URLs and never sees the password. No
//! bucket credentials are needed here.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

use ccfs_crypto::{codec, CipherBox, CryptoError, KdfSpec};
use ccfs_envelope::{derive, EnvelopeError, EnvelopeResult, ObjectMetadata};

/// S3 user metadata travels as `x-amz-meta-<name>` headers.
const META_PREFIX: &str = "x-amz-meta-";

#[derive(Debug, Deserialize)]
struct Presigned {
    method: String,
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct UploadSlot {
    key: String,
    locator: String,
    #[serde(flatten)]
    request: Presigned,
}

/// Where a server-mode upload ended up
#[derive(Debug)]
pub struct RemoteUpload {
    pub key: String,
    pub locator: String,
}

/// A fetched object whose filename opened under the password. The body is
/// still sealed.
pub struct RemoteObject {
    filename: String,
    sealed: Bytes,
    cipher: CipherBox,
}

impl RemoteObject {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_length(&self) -> u64 {
        self.sealed.len() as u64
    }

    pub fn open(self) -> EnvelopeResult<Vec<u8>> {
        self.cipher.open(&self.sealed).map_err(|e| match e {
            CryptoError::Authentication => EnvelopeError::CorruptContent,
            other => other.into(),
        })
    }
}

pub struct RemoteClient {
    base: String,
    http: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl RemoteClient {
    pub fn new(base: &str) -> EnvelopeResult<Self> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| EnvelopeError::Config(format!("TLS setup: {e}")))?
            .https_or_http()
            .enable_http1()
            .build();
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http: Client::builder(TokioExecutor::new()).build(https),
        })
    }

    /// Seal `content` under `password` and hand it to the bucket through a
    /// presigned upload.
    pub async fn upload(
        &self,
        password: &SecretString,
        kdf: KdfSpec,
        filename: &str,
        content: &[u8],
    ) -> EnvelopeResult<RemoteUpload> {
        let derived = derive(&kdf, password).await?;
        let cipher = CipherBox::from_key(&derived);
        drop(derived);

        let sealed_name = codec::encode(&cipher.seal(filename.as_bytes())?);
        let sealed_body = cipher.seal(content)?;

        let mut fields: Vec<_> = ObjectMetadata::new(sealed_name, kdf).to_map().into_iter().collect();
        fields.sort();
        let query = fields
            .iter()
            .map(|(name, value)| format!("{name}={}", codec::escape_for_url(value)))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{}/api/upload?{query}", self.base);
        let (status, _, body) = self.send(Method::GET, &url, &HashMap::new(), Bytes::new()).await?;
        check(status, &body)?;
        let slot: UploadSlot = serde_json::from_slice(&body)
            .map_err(|e| EnvelopeError::Decode(format!("upload slot: {e}")))?;
        debug!(key = %slot.key, "upload slot issued");

        let method = parse_method(&slot.request.method)?;
        let (status, _, body) = self
            .send(method, &slot.request.url, &slot.request.headers, Bytes::from(sealed_body))
            .await?;
        check(status, &body)?;

        Ok(RemoteUpload {
            key: slot.key,
            locator: slot.locator,
        })
    }

    /// Fetch the sealed object for `key` and open its filename.
    ///
    /// An unknown key and a wrong password fail as
    /// [`EnvelopeError::NotFound`] and [`EnvelopeError::WrongPassword`].
    pub async fn open_filename(&self, key: &str, password: &SecretString) -> EnvelopeResult<RemoteObject> {
        let url = format!("{}/api/download?key={}", self.base, codec::escape_for_url(key));
        let (status, _, body) = self.send(Method::GET, &url, &HashMap::new(), Bytes::new()).await?;
        check_denial(status)?;
        check(status, &body)?;
        let request: Presigned = serde_json::from_slice(&body)
            .map_err(|e| EnvelopeError::Decode(format!("download request: {e}")))?;

        let method = parse_method(&request.method)?;
        let (status, headers, sealed) = self
            .send(method, &request.url, &request.headers, Bytes::new())
            .await?;
        check_denial(status)?;
        check(status, &sealed)?;

        let metadata = ObjectMetadata::from_map(&user_metadata(&headers))?;
        let sealed_name = codec::decode(&metadata.sealed_filename)?;
        let derived = derive(&metadata.kdf, password).await?;
        let cipher = CipherBox::from_key(&derived);
        drop(derived);

        let filename = cipher
            .open(&sealed_name)
            .map_err(|e| match e {
                CryptoError::Authentication => EnvelopeError::WrongPassword,
                other => other.into(),
            })
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|_| EnvelopeError::CorruptMetadata("filename is not UTF-8".into()))
            })?;

        Ok(RemoteObject {
            filename,
            sealed,
            cipher,
        })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> EnvelopeResult<(StatusCode, HeaderMap, Bytes)> {
        let mut builder = Request::builder().method(method.clone()).uri(url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| EnvelopeError::Io(format!("building {method} request: {e}")))?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| EnvelopeError::Io(format!("{method} request failed: {e}")))?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| EnvelopeError::Io(format!("reading response: {e}")))?
            .to_bytes();
        debug!(%method, status = parts.status.as_u16(), bytes = body.len(), "response");
        Ok((parts.status, parts.headers, body))
    }
}

fn parse_method(method: &str) -> EnvelopeResult<Method> {
    Method::from_bytes(method.as_bytes())
        .map_err(|_| EnvelopeError::Decode(format!("unusable HTTP method {method:?}")))
}

/// On the download path the server and the bucket refuse unknown keys in
/// these ways; all of them read as "not found".
fn check_denial(status: StatusCode) -> EnvelopeResult<()> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            Err(EnvelopeError::NotFound)
        }
        _ => Ok(()),
    }
}

fn check(status: StatusCode, body: &[u8]) -> EnvelopeResult<()> {
    if status.is_success() {
        return Ok(());
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    Err(if status.is_server_error() {
        EnvelopeError::Io(format!("{status}: {text}"))
    } else {
        EnvelopeError::Unsupported(format!("request refused ({status}): {text}"))
    })
}

fn user_metadata(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let field = name.as_str().strip_prefix(META_PREFIX)?;
            Some((field.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderName, HeaderValue};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use ccfs_core::config::ServerConfig;
    use ccfs_crypto::{KdfKind, KdfParams};
    use ccfs_envelope::{Envelope, EnvelopeConfig};
    use ccfs_storage::{AnyStore, MemoryStore, ObjectStore};

    fn fast_params() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Stand-in for the bucket: presigned URLs from the store point here.
    fn bucket(store: MemoryStore) -> Router {
        Router::new()
            .route("/bucket/{key}", get(bucket_get).put(bucket_put))
            .with_state(store)
    }

    async fn bucket_put(
        State(store): State<MemoryStore>,
        Path(key): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        match store.put(&key, body.to_vec(), user_metadata(&headers), None).await {
            Ok(()) => StatusCode::OK,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    async fn bucket_get(State(store): State<MemoryStore>, Path(key): Path<String>) -> Response {
        let (Ok(head), Ok(body)) = (store.head(&key).await, store.get(&key).await) else {
            return StatusCode::NOT_FOUND.into_response();
        };
        let mut headers = HeaderMap::new();
        for (field, value) in head.user_metadata {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(format!("{META_PREFIX}{field}")),
                HeaderValue::try_from(value),
            ) {
                headers.insert(name, value);
            }
        }
        (headers, body).into_response()
    }

    /// ccfsd and the fake bucket on one loopback listener.
    async fn serve() -> (String, MemoryStore, Envelope<AnyStore>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let store = MemoryStore::new().with_url_base(&format!("{base}/bucket"));
        let envelope = Envelope::new(
            AnyStore::Memory(store.clone()),
            EnvelopeConfig {
                public_url: base.clone(),
                kdf_params: fast_params(),
                ..Default::default()
            },
        );
        let app = ccfsd::router(ccfsd::AppState::new(envelope.clone(), 1), &ServerConfig::default())
            .merge(bucket(store.clone()));
        tokio::spawn(async move { axum::serve(listener, app).await });
        (base, store, envelope)
    }

    #[tokio::test]
    async fn test_upload_then_download_through_server() {
        let (base, store, envelope) = serve().await;
        let client = RemoteClient::new(&base).unwrap();
        let password = SecretString::from("correct-horse");

        let upload = client
            .upload(&password, KdfSpec::Sha256, "report.pdf", b"%PDF-1.7 numbers")
            .await
            .unwrap();
        assert_eq!(upload.locator, format!("{base}/download/{}", upload.key));
        assert_eq!(store.len(), 1);

        let object = client.open_filename(&upload.key, &password).await.unwrap();
        assert_eq!(object.filename(), "report.pdf");
        assert_eq!(object.open().unwrap(), b"%PDF-1.7 numbers");

        // The server opens what the client sealed
        let delivered = envelope.download(&upload.key, &password).await.unwrap();
        assert_eq!(delivered.content, b"%PDF-1.7 numbers");
    }

    #[tokio::test]
    async fn test_argon2id_client_within_server_params() {
        let (base, _store, envelope) = serve().await;
        let client = RemoteClient::new(&base).unwrap();
        let password = SecretString::from("pw");

        let kdf = KdfSpec::generate(KdfKind::Argon2id, fast_params());
        let upload = client.upload(&password, kdf, "a.txt", b"salted").await.unwrap();

        let object = client.open_filename(&upload.key, &password).await.unwrap();
        assert_eq!(object.open().unwrap(), b"salted");
        assert_eq!(envelope.inspect(&upload.key).await.unwrap().kdf, KdfKind::Argon2id);
    }

    #[tokio::test]
    async fn test_denials() {
        let (base, _store, _envelope) = serve().await;
        let client = RemoteClient::new(&base).unwrap();
        let upload = client
            .upload(&SecretString::from("right"), KdfSpec::Sha256, "a.txt", b"x")
            .await
            .unwrap();

        let wrong = client.open_filename(&upload.key, &SecretString::from("wrong")).await;
        assert_eq!(wrong.err().map(|e| e.kind()), Some("wrong_password"));

        let unknown = ccfs_core::ObjectKey::generate().to_string();
        let missing = client.open_filename(&unknown, &SecretString::from("right")).await;
        assert_eq!(missing.err().map(|e| e.kind()), Some("not_found"));

        let malformed = client.open_filename("nope", &SecretString::from("right")).await;
        assert_eq!(malformed.err().map(|e| e.kind()), Some("not_found"));
    }

    #[tokio::test]
    async fn test_heavier_kdf_refused_by_server() {
        let (base, store, _envelope) = serve().await;
        let client = RemoteClient::new(&base).unwrap();

        let kdf = KdfSpec::generate(KdfKind::Argon2id, KdfParams::default());
        let result = client
            .upload(&SecretString::from("pw"), kdf, "a.txt", b"x")
            .await;
        assert!(matches!(result, Err(EnvelopeError::Unsupported(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_user_metadata_strips_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-meta-filename", HeaderValue::from_static("QUJD"));
        headers.insert("content-type", HeaderValue::from_static("application/octet-stream"));
        let map = user_metadata(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["filename"], "QUJD");
    }
}
