//! Roster discovery in remote object storage.
//!
//! Uploads land under dated folders (`<prefix>/2026-10-18/...`). The newest
//! object whose name looks like a roster is downloaded and parsed.

use super::RosterSource;
use crate::error::{DirectoryError, Result};
use crate::roster::{first_delimited, parse_roster};
use async_trait::async_trait;
use auditflow_intake::Classifier;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
const MAX_LIST_PAGES: usize = 20;
const MAX_ROSTER_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl ObjectInfo {
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn describe(&self) -> String;

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    async fn download(&self, name: &str) -> Result<Vec<u8>>;
}

/// Google Cloud Storage over its JSON API.
pub struct GcsObjectStore {
    bucket: String,
    endpoint: Url,
    token: Option<String>,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    name: String,
    #[serde(default)]
    time_created: Option<DateTime<Utc>>,
    /// GCS reports sizes as decimal strings.
    #[serde(default)]
    size: Option<String>,
}

impl From<ListItem> for ObjectInfo {
    fn from(item: ListItem) -> Self {
        ObjectInfo {
            size: item.size.and_then(|size| size.parse().ok()),
            created: item.time_created,
            name: item.name,
        }
    }
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(DEFAULT_GCS_ENDPOINT)
            .map_err(|err| DirectoryError::ObjectStore(err.to_string()))?;
        Ok(Self {
            bucket: bucket.into(),
            endpoint,
            token: None,
            http_client,
        })
    }

    /// Point at an emulator or proxy instead of the public endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|err| DirectoryError::ObjectStore(format!("Invalid endpoint '{}': {}", endpoint, err)))?;
        Ok(self)
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }

    fn objects_url(&self) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::ObjectStore("Endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o"]);
        Ok(url)
    }

    fn list_url(&self, prefix: &str, page_token: Option<&str>) -> Result<Url> {
        let mut url = self.objects_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            query.append_pair("fields", "items(name,timeCreated,size),nextPageToken");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    fn media_url(&self, name: &str) -> Result<Url> {
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::ObjectStore("Endpoint cannot be a base URL".into()))?
            .push(name);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http_client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn describe(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let url = self.list_url(prefix, page_token.as_deref())?;
            let page: ListResponse = self
                .request(url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            objects.extend(page.items.into_iter().map(ObjectInfo::from));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(objects),
            }
        }
        info!(bucket = %self.bucket, prefix, "Object listing truncated after {} pages", MAX_LIST_PAGES);
        Ok(objects)
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.media_url(name)?;
        let bytes = self
            .request(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

/// Newest roster-looking object under a prefix.
pub struct ObjectStoreRosterSource {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    classifier: Classifier,
}

impl ObjectStoreRosterSource {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, classifier: Classifier) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            classifier,
        }
    }

    /// Newest first by creation time; undated objects last, then by name
    /// descending so dated folders still order sensibly.
    fn pick<'a>(&self, objects: &'a mut [ObjectInfo]) -> Option<(&'a ObjectInfo, u8)> {
        objects.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.name.cmp(&a.name)));
        let candidates = objects.iter().filter(|object| {
            self.classifier.is_roster_file(object.basename())
                && !object.size.is_some_and(|size| size > MAX_ROSTER_BYTES)
        });
        first_delimited(candidates, |object| object.basename())
    }
}

#[async_trait]
impl RosterSource for ObjectStoreRosterSource {
    fn describe(&self) -> String {
        format!("object-store:{}/{}", self.store.describe(), self.prefix)
    }

    async fn names(&self) -> Result<Vec<String>> {
        let mut objects = self.store.list(&self.prefix).await?;
        let Some((object, delimiter)) = self.pick(&mut objects) else {
            debug!(prefix = %self.prefix, "No roster object found");
            return Ok(Vec::new());
        };
        debug!(object = %object.name, "Downloading roster object");
        let bytes = self.store.download(&object.name).await?;
        parse_roster(&bytes, delimiter, &object.name)
    }
}
