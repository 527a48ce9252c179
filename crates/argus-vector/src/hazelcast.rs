use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use argus_commons::models::settings_model::HazelcastSettings;
use async_trait::async_trait;
use log::{
    debug,
    info,
    warn,
};
use reqwest::{
    Client,
    Method,
};
use tokio::time::sleep;

use crate::map::{
    DistributedMap,
    MapError,
};

/// Hazelcast's REST map API has no key enumeration, so the client keeps a
/// JSON key index under a reserved entry. Coordinator instances own their
/// map exclusively (no HA replication), which makes the single-writer
/// read-modify-write on the index safe.
const INDEX_KEY: &str = "__argus_index__";

const MAX_PASSES: u32 = 2;

/// Distributed map over Hazelcast's REST map endpoints
/// (`/hazelcast/rest/maps/<map>/<key>`), with address failover and an HTTP
/// client rebuild after a sustained failure streak.
pub struct HazelcastRestMap {
    settings: HazelcastSettings,
    http: Mutex<Client>,
    failing_since: Mutex<Option<Instant>>,
}

impl HazelcastRestMap {
    pub fn new(settings: HazelcastSettings) -> Result<Self, MapError> {
        let http = build_client(&settings)?;
        info!(
            "Hazelcast map client ready (cluster {}, map {}, {} address(es))",
            settings.cluster_name,
            settings.alerts_map_name,
            settings.addresses.len()
        );
        Ok(HazelcastRestMap {
            settings,
            http: Mutex::new(http),
            failing_since: Mutex::new(None),
        })
    }

    fn client(&self) -> Client {
        self.http.lock().unwrap().clone()
    }

    fn note_success(&self) {
        *self.failing_since.lock().unwrap() = None;
    }

    fn note_failure(&self) {
        let mut failing_since = self.failing_since.lock().unwrap();
        match *failing_since {
            None => *failing_since = Some(Instant::now()),
            Some(since) => {
                let threshold =
                    std::time::Duration::from_millis(self.settings.client_recreate_threshold_ms);
                if since.elapsed() >= threshold {
                    if let Ok(client) = build_client(&self.settings) {
                        *self.http.lock().unwrap() = client;
                        info!(
                            "recreated Hazelcast HTTP client after {}ms of failures",
                            self.settings.client_recreate_threshold_ms
                        );
                    }
                    *failing_since = Some(Instant::now());
                }
            }
        }
    }

    async fn execute(
        &self, method: Method, key: &str, body: Option<String>,
    ) -> Result<reqwest::Response, MapError> {
        let mut last_error = "no Hazelcast addresses configured".to_string();

        for pass in 1..=MAX_PASSES {
            for address in &self.settings.addresses {
                let url = key_url(address, &self.settings.alerts_map_name, key);
                let mut request = self.client().request(method.clone(), &url);
                if let Some(body) = &body {
                    request = request
                        .header("Content-Type", "text/plain")
                        .body(body.clone());
                }
                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        self.note_success();
                        return Ok(response);
                    }
                    Ok(response) => {
                        last_error = format!("HTTP {} from {address}", response.status().as_u16());
                    }
                    Err(e) => {
                        last_error = format!("{address}: {e}");
                    }
                }
            }

            if pass < MAX_PASSES && !self.settings.addresses.is_empty() {
                let backoff = self.settings.connection_retry.backoff(pass);
                debug!("Hazelcast pass {pass} failed ({last_error}); backing off {backoff:?}");
                sleep(backoff).await;
            }
        }

        self.note_failure();
        Err(MapError::Transport(last_error))
    }

    async fn read_index(&self) -> Result<Vec<String>, MapError> {
        match self.get(INDEX_KEY).await? {
            None => Ok(Vec::new()),
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| MapError::CorruptIndex(e.to_string()))
            }
        }
    }

    async fn write_index(&self, keys: &[String]) -> Result<(), MapError> {
        let encoded = serde_json::to_string(keys)
            .map_err(|e| MapError::CorruptIndex(e.to_string()))?;
        self.execute(Method::POST, INDEX_KEY, Some(encoded)).await?;
        Ok(())
    }

    async fn index_insert(&self, key: &str) {
        let result = async {
            let mut keys = self.read_index().await?;
            if !keys.iter().any(|existing| existing == key) {
                keys.push(key.to_string());
                self.write_index(&keys).await?;
            }
            Ok::<(), MapError>(())
        }
        .await;
        if let Err(e) = result {
            warn!("failed to add {key} to the Hazelcast key index: {e}");
        }
    }

    async fn index_remove(&self, key: &str) {
        let result = async {
            let mut keys = self.read_index().await?;
            let before = keys.len();
            keys.retain(|existing| existing != key);
            if keys.len() != before {
                self.write_index(&keys).await?;
            }
            Ok::<(), MapError>(())
        }
        .await;
        if let Err(e) = result {
            warn!("failed to remove {key} from the Hazelcast key index: {e}");
        }
    }
}

#[async_trait]
impl DistributedMap for HazelcastRestMap {
    async fn get(&self, key: &str) -> Result<Option<String>, MapError> {
        let response = self.execute(Method::GET, key, None).await?;
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| MapError::Transport(e.to_string()))?;
        if body.is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), MapError> {
        self.execute(Method::POST, key, Some(value.to_string()))
            .await?;
        self.index_insert(key).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MapError> {
        self.execute(Method::DELETE, key, None).await?;
        self.index_remove(key).await;
        Ok(())
    }

    async fn entries(&self) -> Result<HashMap<String, String>, MapError> {
        let keys = self.read_index().await?;
        let mut entries = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(&key).await? {
                entries.insert(key, value);
            }
        }
        Ok(entries)
    }
}

fn build_client(settings: &HazelcastSettings) -> Result<Client, MapError> {
    Client::builder()
        .timeout(settings.connection_retry.cluster_connect_timeout())
        .build()
        .map_err(|e| MapError::Transport(e.to_string()))
}

fn key_url(address: &str, map_name: &str, key: &str) -> String {
    format!("http://{address}/hazelcast/rest/maps/{map_name}/{key}")
}
