use anyhow::{anyhow, ensure, Context, Result};
use tracing::debug;

/// A fully qualified object storage location, `s3://bucket/key`.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUri {
    pub bucket: String,
    pub key: String,
}

impl StorageUri {
    pub fn parse(uri: &str) -> Result<StorageUri> {
        let rest = uri
            .strip_prefix("s3://")
            .with_context(|| format!("storage uri without s3:// scheme: {}", uri))?;
        let mut parts = rest.splitn(2, '/');
        let bucket = parts.next().unwrap_or_default();
        let key = parts.next().unwrap_or_default();
        ensure!(!bucket.is_empty(), "storage uri without a bucket: {}", uri);
        ensure!(!key.is_empty(), "storage uri without a key: {}", uri);
        Ok(StorageUri {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        })
    }

    /// Key with the trailing filename stripped, empty for root-level keys.
    pub fn directory(&self) -> &str {
        match self.key.rfind('/') {
            Some(idx) => &self.key[..idx],
            None => "",
        }
    }

    /// Trailing filename of the key.
    pub fn filename(&self) -> &str {
        match self.key.rfind('/') {
            Some(idx) => &self.key[idx + 1..],
            None => &self.key,
        }
    }
}

impl std::fmt::Display for StorageUri {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Blocking byte-level access to object storage.
pub trait ObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Path-style HTTP client for an object storage endpoint.
pub struct HttpObjectStore {
    endpoint: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> HttpObjectStore {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        HttpObjectStore { endpoint, token }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }
}

impl ObjectStore for HttpObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, key);
        debug!("GET {}", url);
        async_std::task::block_on(async {
            let mut req = surf::get(&url);
            if let Some(token) = &self.token {
                req = req.set_header("Authorization", format!("Bearer {}", token));
            }
            let mut res = req.await.map_err(|e| anyhow!("GET {} failed: {}", url, e))?;
            ensure!(
                res.status().is_success(),
                "GET {} returned status {}",
                url,
                res.status()
            );
            res.body_bytes()
                .await
                .map_err(|e| anyhow!("reading body of {} failed: {}", url, e))
        })
        .with_context(|| format!("fetching object s3://{}/{}", bucket, key))
    }

    fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(bucket, key);
        debug!("PUT {} ({} bytes)", url, body.len());
        async_std::task::block_on(async {
            let mut req = surf::put(&url).body_bytes(&body);
            if let Some(token) = &self.token {
                req = req.set_header("Authorization", format!("Bearer {}", token));
            }
            let res = req.await.map_err(|e| anyhow!("PUT {} failed: {}", url, e))?;
            ensure!(
                res.status().is_success(),
                "PUT {} returned status {}",
                url,
                res.status()
            );
            Ok(())
        })
        .with_context(|| format!("storing object s3://{}/{}", bucket, key))
    }
}
