//! Product image storage.
//!
//! Two backends, chosen by [`StorageConfig`]:
//!
//! - **Filesystem**: objects are files under a root directory, usually the
//!   directory the storefront serves at `/media`.
//! - **Http**: an object API addressed as `{endpoint}/object/{bucket}/{key}`,
//!   written with `PUT` and removed with `DELETE`, authenticated by a bearer
//!   token.
//!
//! Keys look like `products/{product_id}/{uuid}.{ext}`. The extension comes
//! from the validated image type, never from the uploaded file name.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use marketstall_core::ProductId;

use crate::config::StorageConfig;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Declared content type is not an accepted image type.
    #[error("unsupported image type: {0} (expected jpeg, png, webp or gif)")]
    UnsupportedType(String),

    /// File content does not match the declared type.
    #[error("file content is not a valid {0} image")]
    ContentMismatch(&'static str),

    /// Upload is empty.
    #[error("image is empty")]
    Empty,

    /// Upload exceeds [`MAX_IMAGE_BYTES`].
    #[error("image is {size} bytes; the limit is {max} bytes")]
    TooLarge {
        /// Upload size.
        size: usize,
        /// Limit.
        max: usize,
    },

    /// Key is not a relative path of normal segments.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Configured endpoint is not a usable base URL.
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),

    /// Filesystem failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Object API unreachable.
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Object API answered with an error status.
    #[error("storage returned {status} for {key}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Object key.
        key: String,
    },
}

impl StorageError {
    /// The client sent something unacceptable, as opposed to a backend failure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType(_) | Self::ContentMismatch(_) | Self::Empty | Self::TooLarge { .. }
        )
    }
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageType {
    /// Parse a `Content-Type` value, ignoring parameters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnsupportedType` for anything else.
    pub fn from_content_type(content_type: &str) -> Result<Self, StorageError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "image/webp" => Ok(Self::Webp),
            "image/gif" => Ok(Self::Gif),
            _ => Err(StorageError::UnsupportedType(essence)),
        }
    }

    /// File extension used in storage keys.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    /// Canonical MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Whether `bytes` start with this format's signature.
    #[must_use]
    pub fn matches(self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
            Self::Webp => bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()),
        }
    }
}

/// Check an upload and determine its type.
///
/// # Errors
///
/// Returns a client error if the upload is empty, too large, of an
/// unsupported type, or does not match its declared type.
pub fn validate_image(content_type: &str, bytes: &[u8]) -> Result<ImageType, StorageError> {
    if bytes.is_empty() {
        return Err(StorageError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(StorageError::TooLarge {
            size: bytes.len(),
            max: MAX_IMAGE_BYTES,
        });
    }
    let image_type = ImageType::from_content_type(content_type)?;
    if !image_type.matches(bytes) {
        return Err(StorageError::ContentMismatch(image_type.extension()));
    }
    Ok(image_type)
}

/// Storage key for a new product image.
#[must_use]
pub fn product_image_key(product_id: ProductId, image_type: ImageType) -> String {
    format!(
        "products/{product_id}/{}.{}",
        Uuid::new_v4(),
        image_type.extension()
    )
}

/// Reject keys that could escape the storage root.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.contains('\\')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_owned()))
    }
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[derive(Clone)]
enum Backend {
    Filesystem {
        root: PathBuf,
    },
    Http {
        client: reqwest::Client,
        endpoint: Url,
        bucket: String,
        token: SecretString,
    },
}

/// Product image storage.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct ImageStorage {
    backend: Backend,
    public_url: String,
}

impl ImageStorage {
    /// Build storage from configuration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidEndpoint` if the http endpoint does not
    /// parse as a base URL.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        match config {
            StorageConfig::Filesystem { dir, public_url } => Ok(Self {
                backend: Backend::Filesystem { root: dir.clone() },
                public_url: public_url.clone(),
            }),
            StorageConfig::Http {
                endpoint,
                bucket,
                token,
                public_url,
            } => {
                let endpoint = Url::parse(endpoint)
                    .map_err(|e| StorageError::InvalidEndpoint(e.to_string()))?;
                if endpoint.cannot_be_a_base() {
                    return Err(StorageError::InvalidEndpoint(endpoint.to_string()));
                }
                Ok(Self {
                    backend: Backend::Http {
                        client: reqwest::Client::new(),
                        endpoint,
                        bucket: bucket.clone(),
                        token: token.clone(),
                    },
                    public_url: public_url.clone(),
                })
            }
        }
    }

    /// Public URL of a stored key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_url.trim_end_matches('/'))
    }

    /// Validate and store a product image under a fresh key.
    ///
    /// # Errors
    ///
    /// Returns a client error for unacceptable uploads, or a backend error if
    /// the write fails.
    pub async fn put_product_image(
        &self,
        product_id: ProductId,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredObject, StorageError> {
        let image_type = validate_image(content_type, bytes)?;
        let key = product_image_key(product_id, image_type);
        self.put(&key, image_type.mime(), bytes).await?;

        tracing::info!(%product_id, key = %key, size = bytes.len(), "product image stored");
        Ok(StoredObject {
            url: self.public_url(&key),
            key,
        })
    }

    /// Write an object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for unsafe keys, or a backend error.
    pub async fn put(&self, key: &str, content_type: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;

        match &self.backend {
            Backend::Filesystem { root } => {
                let path = root.join(key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let tmp = path.with_extension("tmp");
                tokio::fs::write(&tmp, bytes).await?;
                tokio::fs::rename(&tmp, &path).await?;
            }
            Backend::Http {
                client,
                endpoint,
                bucket,
                token,
            } => {
                let response = client
                    .put(object_url(endpoint, bucket, key)?)
                    .bearer_auth(token.expose_secret())
                    .header(CONTENT_TYPE, content_type)
                    .timeout(HTTP_TIMEOUT)
                    .body(bytes.to_vec())
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(StorageError::Status {
                        status: response.status().as_u16(),
                        key: key.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Remove an object. Removing a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for unsafe keys, or a backend error.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        match &self.backend {
            Backend::Filesystem { root } => match tokio::fs::remove_file(root.join(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
            Backend::Http {
                client,
                endpoint,
                bucket,
                token,
            } => {
                let response = client
                    .delete(object_url(endpoint, bucket, key)?)
                    .bearer_auth(token.expose_secret())
                    .timeout(HTTP_TIMEOUT)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() && status != StatusCode::NOT_FOUND {
                    return Err(StorageError::Status {
                        status: status.as_u16(),
                        key: key.to_owned(),
                    });
                }
            }
        }

        tracing::info!(key = %key, "object deleted");
        Ok(())
    }
}

/// `{endpoint}/object/{bucket}/{key}` with every segment percent-encoded.
fn object_url(endpoint: &Url, bucket: &str, key: &str) -> Result<Url, StorageError> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| StorageError::InvalidEndpoint(endpoint.to_string()))?
        .pop_if_empty()
        .push("object")
        .push(bucket)
        .extend(key.split('/'));
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(
            ImageType::from_content_type("image/PNG; charset=binary").unwrap(),
            ImageType::Png
        );
        assert_eq!(ImageType::from_content_type("image/jpg").unwrap(), ImageType::Jpeg);
        assert!(matches!(
            ImageType::from_content_type("image/svg+xml"),
            Err(StorageError::UnsupportedType(t)) if t == "image/svg+xml"
        ));
    }

    #[test]
    fn test_signatures() {
        assert!(ImageType::Png.matches(PNG));
        assert!(ImageType::Jpeg.matches(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(ImageType::Gif.matches(b"GIF89a...."));
        assert!(ImageType::Webp.matches(b"RIFF\x10\0\0\0WEBPVP8 "));
        assert!(!ImageType::Webp.matches(b"RIFF\x10\0\0\0WAVE"));
    }

    #[test]
    fn test_validate_image_limits() {
        assert!(matches!(validate_image("image/png", b""), Err(StorageError::Empty)));

        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image("image/png", &big),
            Err(StorageError::TooLarge { .. })
        ));

        assert!(matches!(
            validate_image("image/jpeg", PNG),
            Err(StorageError::ContentMismatch("jpg"))
        ));
        assert_eq!(validate_image("image/png", PNG).unwrap(), ImageType::Png);
    }

    #[test]
    fn test_product_image_key_shape() {
        let key = product_image_key(ProductId::new(42), ImageType::Webp);
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "products");
        assert_eq!(parts[1], "42");
        assert!(parts[2].ends_with(".webp"));
        assert!(Uuid::parse_str(parts[2].trim_end_matches(".webp")).is_ok());
    }

    #[test]
    fn test_unsafe_keys_rejected() {
        assert!(validate_key("products/1/a.png").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs/path.png").is_err());
        assert!(validate_key("products/./a.png").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let endpoint = Url::parse("https://objects.internal/api/").unwrap();
        let url = object_url(&endpoint, "images", "products/1/a b.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://objects.internal/api/object/images/products/1/a%20b.png"
        );
    }

    #[test]
    fn test_public_url_joins_cleanly() {
        let storage = ImageStorage::new(&StorageConfig::Filesystem {
            dir: PathBuf::from("media"),
            public_url: "https://shop.test/media/".to_string(),
        })
        .unwrap();
        assert_eq!(
            storage.public_url("products/1/x.png"),
            "https://shop.test/media/products/1/x.png"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = ImageStorage::new(&StorageConfig::Http {
            endpoint: "not a url".to_string(),
            bucket: "b".to_string(),
            token: SecretString::from("t"),
            public_url: "https://cdn.test".to_string(),
        });
        assert!(matches!(result, Err(StorageError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_filesystem_put_and_delete() {
        let root = std::env::temp_dir().join(format!("ms-storage-{}", Uuid::new_v4()));
        let storage = ImageStorage::new(&StorageConfig::Filesystem {
            dir: root.clone(),
            public_url: "/media".to_string(),
        })
        .unwrap();

        let stored = storage
            .put_product_image(ProductId::new(7), "image/png", PNG)
            .await
            .unwrap();
        assert!(stored.key.starts_with("products/7/"));
        assert_eq!(stored.url, format!("/media/{}", stored.key));
        assert_eq!(tokio::fs::read(root.join(&stored.key)).await.unwrap(), PNG);

        storage.delete(&stored.key).await.unwrap();
        assert!(!root.join(&stored.key).exists());
        // Deleting again is not an error.
        storage.delete(&stored.key).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
