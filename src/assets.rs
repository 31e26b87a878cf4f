// src/assets.rs

//! Cover images live on an external asset host. Handlers talk to it through
//! [`AssetHost`] so tests and asset-less deployments can swap it out.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AssetConfig;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Image uploads are not configured")]
    NotConfigured,

    #[error("Only jpg, jpeg, png and webp images are allowed")]
    UnsupportedFormat,

    #[error("Image exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("asset host request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("asset host answered {0}")]
    Rejected(u16),

    #[error("asset host response carried no url")]
    MissingUrl,
}

/// A cover image file pulled out of a multipart form.
#[derive(Debug, Clone)]
pub struct CoverUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl CoverUpload {
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    pub fn validate(&self, max_bytes: usize) -> Result<(), AssetError> {
        match self.extension() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => return Err(AssetError::UnsupportedFormat),
        }
        if self.bytes.len() > max_bytes {
            return Err(AssetError::TooLarge { limit: max_bytes });
        }
        Ok(())
    }
}

#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Stores the image and returns its public URL.
    async fn upload(&self, cover: CoverUpload) -> Result<String, AssetError>;

    async fn destroy(&self, url: &str) -> Result<(), AssetError>;
}

/// Asset-host identifier for an uploaded URL: `<folder>/<name>` without extension.
pub fn public_id(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
    let file = segments.next()?;
    let folder = segments.next()?;
    let stem = file.split('.').next().filter(|s| !s.is_empty())?;
    Some(format!("{folder}/{stem}"))
}

pub struct HttpAssetHost {
    http: reqwest::Client,
    config: AssetConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl HttpAssetHost {
    pub fn new(config: AssetConfig) -> Self {
        HttpAssetHost {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl AssetHost for HttpAssetHost {
    async fn upload(&self, cover: CoverUpload) -> Result<String, AssetError> {
        let endpoint = self
            .config
            .upload_url
            .as_deref()
            .ok_or(AssetError::NotConfigured)?;

        let mut part = Part::bytes(cover.bytes).file_name(cover.file_name.clone());
        if let Some(content_type) = &cover.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .text("folder", self.config.folder.clone())
            .part("file", part);

        debug!("Uploading {} to asset host", cover.file_name);
        let response = self
            .authorize(self.http.post(endpoint))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AssetError::Rejected(response.status().as_u16()));
        }

        let body: UploadResponse = response.json().await?;
        let url = body.secure_url.or(body.url).ok_or(AssetError::MissingUrl)?;
        info!("Uploaded cover image {}", url);
        Ok(url)
    }

    async fn destroy(&self, url: &str) -> Result<(), AssetError> {
        let (Some(endpoint), Some(public_id)) = (self.config.destroy_url.as_deref(), public_id(url))
        else {
            return Ok(());
        };

        let response = self
            .authorize(self.http.post(endpoint))
            .json(&serde_json::json!({ "public_id": public_id }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AssetError::Rejected(response.status().as_u16()));
        }
        info!("Destroyed asset {}", public_id);
        Ok(())
    }
}

/// Used when no asset host is configured: uploads are refused, destroys are no-ops.
pub struct DisabledAssetHost;

#[async_trait]
impl AssetHost for DisabledAssetHost {
    async fn upload(&self, _cover: CoverUpload) -> Result<String, AssetError> {
        Err(AssetError::NotConfigured)
    }

    async fn destroy(&self, _url: &str) -> Result<(), AssetError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cover(name: &str, size: usize) -> CoverUpload {
        CoverUpload {
            file_name: name.into(),
            content_type: None,
            bytes: vec![0; size],
        }
    }

    #[test]
    fn accepts_known_image_types() {
        assert!(cover("shot.PNG", 10).validate(100).is_ok());
        assert!(cover("a.b.webp", 10).validate(100).is_ok());
    }

    #[test]
    fn rejects_other_types_and_oversized_files() {
        assert!(matches!(
            cover("notes.txt", 10).validate(100),
            Err(AssetError::UnsupportedFormat)
        ));
        assert!(matches!(
            cover("noext", 10).validate(100),
            Err(AssetError::UnsupportedFormat)
        ));
        assert!(matches!(
            cover("big.jpg", 101).validate(100),
            Err(AssetError::TooLarge { limit: 100 })
        ));
    }

    #[test]
    fn public_id_is_folder_and_stem() {
        assert_eq!(
            public_id("https://res.example.com/img/upload/v123/projects/abc123.jpg").as_deref(),
            Some("projects/abc123")
        );
        assert_eq!(
            public_id("https://cdn.example.com/collabhub/cover.png?x=1").as_deref(),
            Some("collabhub/cover")
        );
        assert_eq!(public_id("cover.png"), None);
    }

    #[actix_web::test]
    async fn disabled_host_refuses_uploads() {
        let host = DisabledAssetHost;
        assert!(matches!(
            host.upload(cover("a.png", 1)).await,
            Err(AssetError::NotConfigured)
        ));
        assert!(host.destroy("https://x/y/z.png").await.is_ok());
    }
}
