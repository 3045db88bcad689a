//! A minimal S3-like pod. This is intentionally not a full S3 client —
//! concrete storage backends only need to honor the [`Pod`] contract. It
//! speaks to any endpoint exposing a flat
//! `PUT`/`GET`/`DELETE`/list-by-prefix REST surface keyed by path, which is
//! enough to exercise the pod interface against an S3-compatible store in
//! integration environments.

use super::Pod;
use crate::error::{Error, Result};

pub struct S3Pod {
    bucket: String,
    prefix: String,
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl S3Pod {
    pub fn new(bucket: String, prefix: String) -> S3Pod {
        let endpoint = std::env::var("LAKOTA_S3_ENDPOINT")
            .unwrap_or_else(|_| "https://s3.amazonaws.com".to_string());
        return S3Pod { bucket, prefix, client: reqwest::blocking::Client::new(), endpoint };
    }

    fn object_url(&self, key: &str) -> String {
        return format!("{}/{}/{}/{}", self.endpoint, self.bucket, self.prefix, key);
    }
}

impl Pod for S3Pod {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(self.object_url(key))
            .send()
            .map_err(|e| Error::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(key));
        }
        let resp = resp.error_for_status().map_err(|e| Error::Transport(e.to_string()))?;
        return resp.bytes().map(|b| b.to_vec()).map_err(|e| Error::Transport(e.to_string()));
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.client
            .put(self.object_url(key))
            .body(bytes.to_vec())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Transport(e.to_string()))?;
        return Ok(());
    }

    fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        // Delegates to the recursive listing; a flat REST surface has no
        // notion of "directly under" without a real bucket listing API.
        return self.walk(prefix);
    }

    fn rm(&self, key: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.object_url(key))
            .send()
            .map_err(|e| Error::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(key));
        }
        return Ok(());
    }

    fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}?list-type=2&prefix={}/{}", self.endpoint, self.bucket, self.prefix, prefix);
        let resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Transport(e.to_string()))?;
        let body: ListResponse = resp.json().map_err(|e| Error::Transport(e.to_string()))?;
        return Ok(body.keys);
    }
}

#[derive(serde::Deserialize)]
struct ListResponse {
    keys: Vec<String>,
}
