//! The offline cache manager.
//!
//! Owns the cache store handle and a lazily-built fetch client, and
//! implements the three event handlers behind [`dispatch`]. Handlers run on
//! the gateway's connection tasks and suspend at every network and cache
//! operation; the store is never locked across a suspension point, so two
//! navigations to the same URL may race their snapshot writes. Both are
//! snapshots of the same resource, and the last write wins.
//!
//! [`dispatch`]: OfflineWorker::dispatch

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};
use url::Url;

use kiri_client::{FetchClient, FetchConfig, FetchResponse, resolve};
use kiri_core::{AppConfig, AssetManifest, CacheDb, Error, StoredResponse};

use crate::lifecycle::WorkerState;
use crate::request::{InterceptedRequest, RequestClass, ServedFrom, ServedResponse};

/// Response headers never replayed to the page: hop-by-hop, plus the ones
/// the transport recomputes (bodies are stored decoded).
const SKIP_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "content-encoding",
    "trailer",
    "upgrade",
];

/// Snapshot of the worker for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub state: String,
    pub generation: String,
    pub entries: u64,
}

/// One worker version: a cache generation, the manifest that populates it,
/// and the fetch strategies that serve the controlled scope.
pub struct OfflineWorker {
    config: AppConfig,
    manifest: AssetManifest,
    origin: Url,
    cache: CacheDb,
    client: OnceCell<FetchClient>,
    state: RwLock<WorkerState>,
}

impl OfflineWorker {
    /// Create a worker version in the `installing` state.
    pub fn new(config: AppConfig, manifest: AssetManifest, cache: CacheDb) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", config.origin)))?;

        Ok(Self {
            config,
            manifest,
            origin,
            cache,
            client: OnceCell::new(),
            state: RwLock::new(WorkerState::Installing),
        })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Status snapshot for the gateway's inspection endpoint.
    pub async fn status(&self) -> Result<WorkerStatus, Error> {
        Ok(WorkerStatus {
            state: self.state().await.to_string(),
            generation: self.config.cache_name.clone(),
            entries: self.cache.count_entries(&self.config.cache_name).await?,
        })
    }

    /// The fetch client, built on first use.
    async fn client(&self) -> Result<&FetchClient, Error> {
        self.client
            .get_or_try_init(|| async {
                FetchClient::new(FetchConfig {
                    user_agent: self.config.user_agent.clone(),
                    max_bytes: self.config.max_bytes,
                    timeout: self.config.timeout(),
                    ..Default::default()
                })
            })
            .await
    }

    /// Install: populate the cache generation from the asset manifest.
    ///
    /// Does not complete until every manifest asset is fetched and stored.
    /// Any failure is fatal for this version: it goes redundant, activation
    /// is blocked, and whatever generation was previously active stays
    /// untouched. Entries already stored before the failure remain in place;
    /// they are unreachable until some later version of the same name
    /// installs and activates.
    pub(crate) async fn install(&self) -> Result<u64, Error> {
        {
            let state = self.state().await;
            if state != WorkerState::Installing {
                return Err(Error::InvalidState { expected: "installing".into(), actual: state.to_string() });
            }
        }

        match self.populate().await {
            Ok(cached) => {
                *self.state.write().await = WorkerState::Waiting;
                tracing::info!(generation = %self.config.cache_name, cached, "install complete");
                Ok(cached)
            }
            Err(err) => {
                *self.state.write().await = WorkerState::Redundant;
                tracing::warn!(generation = %self.config.cache_name, error = %err, "install failed");
                Err(Error::InstallFailed(err.to_string()))
            }
        }
    }

    async fn populate(&self) -> Result<u64, Error> {
        self.cache.open_generation(&self.config.cache_name).await?;

        let client = self.client().await?;
        let mut cached = 0u64;

        for asset in self.manifest.iter() {
            let url = resolve(&self.origin, asset).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            let response = client.fetch(&url).await?;

            // the addAll contract: a completed non-success response fails
            // install just like a transport error
            if !response.status.is_success() {
                return Err(Error::Fetch(format!("{} answered {}", url, response.status.as_u16())));
            }

            self.cache.put_entry(&self.snapshot("GET", &url, &response)).await?;
            cached += 1;
        }

        Ok(cached)
    }

    /// Activate: sweep every cache generation but the current one.
    ///
    /// Legal only from `waiting`, which a failed install never reaches.
    /// This sweep is the sole storage-reclaim mechanism; there is no
    /// size-based eviction, TTL, or LRU anywhere else.
    pub(crate) async fn activate(&self) -> Result<u64, Error> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Waiting {
                return Err(Error::InvalidState { expected: "waiting".into(), actual: state.to_string() });
            }
            *state = WorkerState::Activating;
        }

        match self.cache.delete_other_generations(&self.config.cache_name).await {
            Ok(purged) => {
                *self.state.write().await = WorkerState::Active;
                tracing::info!(generation = %self.config.cache_name, purged, "worker active");
                Ok(purged)
            }
            Err(err) => {
                *self.state.write().await = WorkerState::Redundant;
                Err(err)
            }
        }
    }

    /// Handle a fetch event: classify, then run the class's strategy.
    ///
    /// Only an active worker intercepts. Every path resolves: a served
    /// response or an error the gateway turns into a failed load.
    pub(crate) async fn handle_fetch(&self, request: InterceptedRequest) -> Result<ServedResponse, Error> {
        {
            let state = self.state().await;
            if !state.can_intercept_fetch() {
                return Err(Error::InvalidState { expected: "active".into(), actual: state.to_string() });
            }
        }

        let url = resolve(&self.origin, &request.path_and_query).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        match request.classify() {
            RequestClass::Navigation => self.network_first(&request, &url).await,
            RequestClass::Asset => self.cache_first(&request, &url).await,
        }
    }

    /// Navigation strategy: network-first with cache fallback and refresh.
    ///
    /// A completed response is snapshotted into the current generation and
    /// served; the snapshot write is best-effort, and if storage fails the
    /// resource simply stays uncached while the response is served anyway. A
    /// transport failure falls back to the cache; a miss there propagates
    /// the failure. No retries, no added timeout.
    async fn network_first(&self, request: &InterceptedRequest, url: &Url) -> Result<ServedResponse, Error> {
        let client = self.client().await?;

        match client.forward(&request.method, url, &request.headers, request.body.clone()).await {
            Ok(response) => {
                let snapshot = self.snapshot(&request.method, url, &response);
                if let Err(err) = self.cache.put_entry(&snapshot).await {
                    tracing::warn!(url = %url, error = %err, "navigation snapshot not stored");
                }
                Ok(serve_network(response))
            }
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "navigation fetch failed, falling back to cache");
                match self.cache.match_entry(&self.config.cache_name, &request.method, url.as_str()).await? {
                    Some(entry) => Ok(serve_cached(entry)),
                    None => Err(err),
                }
            }
        }
    }

    /// Asset strategy: cache-first with network fallback.
    ///
    /// A hit never touches the network. A miss is relayed upstream and
    /// served directly without being stored: only install-time population
    /// and navigation refresh write to the cache, which bounds growth to
    /// the manifest plus visited pages.
    async fn cache_first(&self, request: &InterceptedRequest, url: &Url) -> Result<ServedResponse, Error> {
        if let Some(entry) = self.cache.match_entry(&self.config.cache_name, &request.method, url.as_str()).await? {
            tracing::debug!(url = %url, "asset served from cache");
            return Ok(serve_cached(entry));
        }

        let client = self.client().await?;
        let response = client.forward(&request.method, url, &request.headers, request.body.clone()).await?;
        Ok(serve_network(response))
    }

    fn snapshot(&self, method: &str, url: &Url, response: &FetchResponse) -> StoredResponse {
        StoredResponse::new(
            &self.config.cache_name,
            method,
            url.as_str(),
            response.status.as_u16(),
            response.content_type.clone(),
            &replayable_headers(response),
            response.bytes.to_vec(),
        )
    }
}

fn replayable_headers(response: &FetchResponse) -> Vec<(String, String)> {
    response
        .headers
        .iter()
        .filter(|(name, _)| !SKIP_RESPONSE_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

fn serve_network(response: FetchResponse) -> ServedResponse {
    let headers = replayable_headers(&response);
    ServedResponse {
        status: response.status.as_u16(),
        headers,
        body: response.bytes,
        served_from: ServedFrom::Network,
    }
}

fn serve_cached(entry: StoredResponse) -> ServedResponse {
    let headers = entry.headers();
    ServedResponse {
        status: entry.status,
        headers,
        body: Bytes::from(entry.body),
        served_from: ServedFrom::Cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventOutcome, WorkerEvent};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn navigate(path_and_query: &str) -> InterceptedRequest {
        InterceptedRequest::get(path_and_query).with_header("sec-fetch-mode", "navigate")
    }

    async fn worker_for(server_uri: &str, cache: CacheDb, generation: &str, manifest: &[&str]) -> OfflineWorker {
        let config = AppConfig {
            origin: server_uri.to_string(),
            cache_name: generation.to_string(),
            ..Default::default()
        };
        let manifest = AssetManifest::new(manifest.iter().map(|s| s.to_string()));
        OfflineWorker::new(config, manifest, cache).unwrap()
    }

    async fn mount_shell(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>kiri</html>"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/css")
                    .set_body_string("body { margin: 0 }"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_install_caches_every_manifest_asset() {
        let server = MockServer::start().await;
        mount_shell(&server).await;
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache.clone(), "kiri", &["/", "/app.css"]).await;

        let outcome = worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Installed { cached: 2 }));
        assert_eq!(worker.state().await, WorkerState::Waiting);

        for asset in ["/", "/app.css"] {
            let url = format!("{}{}", server.uri(), asset);
            let entry = cache.match_entry("kiri", "GET", &url).await.unwrap();
            assert!(entry.is_some(), "manifest asset {asset} not cached");
        }
    }

    #[tokio::test]
    async fn test_install_failure_blocks_activation() {
        let server = MockServer::start().await;
        mount_shell(&server).await;
        // "/broken.js" has no mock; wiremock answers 404
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &["/", "/broken.js"]).await;

        let result = worker.dispatch(WorkerEvent::Install).await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);

        let result = worker.dispatch(WorkerEvent::Activate).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_activate_sweeps_superseded_generations() {
        let server = MockServer::start().await;
        mount_shell(&server).await;
        let cache = CacheDb::open_in_memory().await.unwrap();

        let v1 = worker_for(&server.uri(), cache.clone(), "kiri-v1", &["/"]).await;
        v1.dispatch(WorkerEvent::Install).await.unwrap();
        v1.dispatch(WorkerEvent::Activate).await.unwrap();

        let v2 = worker_for(&server.uri(), cache.clone(), "kiri-v2", &["/"]).await;
        v2.dispatch(WorkerEvent::Install).await.unwrap();
        let outcome = v2.dispatch(WorkerEvent::Activate).await.unwrap();

        assert!(matches!(outcome, EventOutcome::Activated { purged: 1 }));
        assert_eq!(cache.list_generations().await.unwrap(), vec!["kiri-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_requires_active_state() {
        let server = MockServer::start().await;
        mount_shell(&server).await;
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &["/"]).await;

        worker.dispatch(WorkerEvent::Install).await.unwrap();

        let result = worker.handle_fetch(navigate("/")).await;
        assert!(matches!(result, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_cached_asset_never_touches_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body { margin: 0 }"))
            .expect(1) // install only; both asset fetches must hit the cache
            .mount(&server)
            .await;

        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &["/app.css"]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        for _ in 0..2 {
            let served = worker.handle_fetch(InterceptedRequest::get("/app.css")).await.unwrap();
            assert_eq!(served.served_from, ServedFrom::Cache);
            assert_eq!(&served.body[..], b"body { margin: 0 }");
        }

        server.verify().await;
    }

    #[tokio::test]
    async fn test_navigation_refresh_replays_stored_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>about the lab</html>"),
            )
            .mount(&server)
            .await;

        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &[]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        let online = worker.handle_fetch(navigate("/about")).await.unwrap();
        assert_eq!(online.served_from, ServedFrom::Network);

        drop(server); // origin goes away

        let offline = worker.handle_fetch(navigate("/about")).await.unwrap();
        assert_eq!(offline.served_from, ServedFrom::Cache);
        assert_eq!(offline.status, 200);
        assert_eq!(offline.body, online.body);
    }

    #[tokio::test]
    async fn test_offline_navigation_miss_propagates() {
        let server = MockServer::start().await;
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &[]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        drop(server);

        let result = worker.handle_fetch(navigate("/never-visited")).await;
        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_offline_shell_scenario() {
        let server = MockServer::start().await;
        mount_shell(&server).await;
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &["/", "/app.css"]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        drop(server);

        let shell = worker.handle_fetch(navigate("/")).await.unwrap();
        assert_eq!(shell.served_from, ServedFrom::Cache);
        assert_eq!(&shell.body[..], b"<html>kiri</html>");

        let css = worker.handle_fetch(InterceptedRequest::get("/app.css")).await.unwrap();
        assert_eq!(css.served_from, ServedFrom::Cache);

        let missing = worker.handle_fetch(InterceptedRequest::get("/missing.js")).await;
        assert!(matches!(missing, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_asset_miss_is_fetched_but_not_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]))
            .expect(2) // both requests must reach the origin
            .mount(&server)
            .await;

        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache.clone(), "kiri", &[]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        for _ in 0..2 {
            let served = worker.handle_fetch(InterceptedRequest::get("/logo.png")).await.unwrap();
            assert_eq!(served.served_from, ServedFrom::Network);
        }

        assert_eq!(cache.count_entries("kiri").await.unwrap(), 0);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_asset_error_status_is_relayed() {
        let server = MockServer::start().await;
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &[]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        // no mock mounted: wiremock answers 404, which is a completed
        // response and must be relayed, not treated as a failure
        let served = worker.handle_fetch(InterceptedRequest::get("/gone.js")).await.unwrap();
        assert_eq!(served.status, 404);
        assert_eq!(served.served_from, ServedFrom::Network);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let server = MockServer::start().await;
        mount_shell(&server).await;
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = worker_for(&server.uri(), cache, "kiri", &["/", "/app.css"]).await;
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        let status = worker.status().await.unwrap();
        assert_eq!(status.state, "active");
        assert_eq!(status.generation, "kiri");
        assert_eq!(status.entries, 2);
    }
}
