//! Apollo config service client.
//!
//! Namespaces are read through the non-cached config endpoint:
//!
//! ```text
//! GET {api}/configs/{app_id}/{cluster}/{namespace}?releaseKey={key}
//!   200 → { "configurations": { … }, "releaseKey": "…" }
//!   304 → unchanged since releaseKey
//!   404 → namespace does not exist
//! ```
//!
//! [`ApolloClient::poll_once`] re-reads every namespace, diffs the returned
//! `configurations` against the cached copy and delivers one
//! [`ChangeBatch`] per namespace that moved. The cache is updated before
//! listeners run and no lock is held while they do, so listeners may call
//! [`ConfigSource::fetch_namespace`] re-entrantly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

use confd_core::{config::ApolloConfig, ChangeBatch, KeyChange, NamespaceContent};
use confd_sync::{ChangeListener, ConfigSource, SourceError};

/// Body of a 200 response from the config endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub configurations: BTreeMap<String, String>,
    #[serde(rename = "releaseKey", default)]
    pub release_key: String,
}

#[derive(Debug)]
enum Fetched {
    Unchanged,
    Updated(ConfigResponse),
}

#[derive(Debug, Clone, Default)]
struct CachedNamespace {
    release_key: String,
    configurations: BTreeMap<String, String>,
}

/// Polling [`ConfigSource`] backed by the Apollo HTTP API.
pub struct ApolloClient {
    agent: ureq::Agent,
    api: String,
    app_id: String,
    cluster: String,
    namespaces: Vec<String>,
    cache: Mutex<BTreeMap<String, CachedNamespace>>,
    listeners: Mutex<Vec<Arc<dyn ChangeListener>>>,
}

impl ApolloClient {
    pub fn new(config: &ApolloConfig) -> Self {
        if !config.secret.is_empty() {
            tracing::warn!(
                app_id = %config.app_id,
                "apollo.secret is set but request signing is not supported; requests are unsigned",
            );
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        Self {
            agent,
            api: config.api.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            cluster: config.cluster.clone(),
            namespaces: config.namespaces.clone(),
            cache: Mutex::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn url(&self, namespace: &str) -> String {
        format!(
            "{}/configs/{}/{}/{}",
            self.api, self.app_id, self.cluster, namespace
        )
    }

    fn request(&self, namespace: &str, release_key: &str) -> Result<Fetched, SourceError> {
        let transport = |message: String| SourceError::Transport {
            namespace: namespace.to_string(),
            message,
        };

        let mut request = self.agent.get(&self.url(namespace));
        if !release_key.is_empty() {
            request = request.query("releaseKey", release_key);
        }
        match request.call() {
            Ok(response) if response.status() == 304 => Ok(Fetched::Unchanged),
            Ok(response) => response
                .into_json::<ConfigResponse>()
                .map(Fetched::Updated)
                .map_err(|err| transport(format!("invalid response body: {err}"))),
            Err(ureq::Error::Status(404, _)) => Err(SourceError::NamespaceNotFound {
                namespace: namespace.to_string(),
            }),
            Err(ureq::Error::Status(code, _)) => Err(transport(format!("HTTP {code}"))),
            Err(err) => Err(transport(err.to_string())),
        }
    }

    /// Re-read one namespace; `None` when nothing moved.
    pub fn poll_namespace(&self, namespace: &str) -> Result<Option<ChangeBatch>, SourceError> {
        let release_key = self
            .lock_cache()
            .get(namespace)
            .map(|cached| cached.release_key.clone())
            .unwrap_or_default();

        let response = match self.request(namespace, &release_key)? {
            Fetched::Unchanged => return Ok(None),
            Fetched::Updated(response) => response,
        };

        let changes = {
            let mut cache = self.lock_cache();
            let entry = cache.entry(namespace.to_string()).or_default();
            let changes = diff_configurations(&entry.configurations, &response.configurations);
            entry.release_key = response.release_key;
            entry.configurations = response.configurations;
            changes
        };

        if changes.is_empty() {
            return Ok(None);
        }
        Ok(Some(ChangeBatch::new(namespace, changes)))
    }

    /// Poll every configured namespace and deliver the resulting batches.
    ///
    /// Per-namespace failures are logged and skipped. Returns the number of
    /// batches delivered.
    pub fn poll_once(&self) -> usize {
        let mut delivered = 0;
        for namespace in &self.namespaces {
            match self.poll_namespace(namespace) {
                Ok(Some(batch)) => {
                    tracing::info!(
                        namespace = %namespace,
                        changes = batch.changes.len(),
                        "namespace changed",
                    );
                    self.dispatch(&batch);
                    delivered += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(namespace = %namespace, error = %err, "poll failed");
                }
            }
        }
        delivered
    }

    fn dispatch(&self, batch: &ChangeBatch) {
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_batch(batch);
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, BTreeMap<String, CachedNamespace>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigSource for ApolloClient {
    /// Serve from the cache when the namespace has been read before,
    /// otherwise fetch it and seed the cache.
    fn fetch_namespace(&self, namespace: &str) -> Result<NamespaceContent, SourceError> {
        let cached = self
            .lock_cache()
            .get(namespace)
            .map(|cached| cached.configurations.clone());

        let configurations = match cached {
            Some(configurations) => configurations,
            None => match self.request(namespace, "")? {
                Fetched::Updated(response) => {
                    let configurations = response.configurations.clone();
                    self.lock_cache().insert(
                        namespace.to_string(),
                        CachedNamespace {
                            release_key: response.release_key,
                            configurations: response.configurations,
                        },
                    );
                    configurations
                }
                Fetched::Unchanged => {
                    return Err(SourceError::Transport {
                        namespace: namespace.to_string(),
                        message: "unexpected 304 without a release key".to_string(),
                    })
                }
            },
        };

        NamespaceContent::from_entries(namespace, configurations).ok_or_else(|| {
            SourceError::MissingContent {
                namespace: namespace.to_string(),
            }
        })
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

/// Key-level changes turning `old` into `new`, in key order.
pub fn diff_configurations(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Vec<KeyChange> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|key| match (old.get(key), new.get(key)) {
            (None, Some(value)) => Some(KeyChange::added(key.as_str(), value.as_str())),
            (Some(before), Some(after)) if before != after => Some(KeyChange::modified(
                key.as_str(),
                before.as_str(),
                after.as_str(),
            )),
            (Some(before), None) => Some(KeyChange::deleted(key.as_str(), Some(before.clone()))),
            _ => None,
        })
        .collect()
}
