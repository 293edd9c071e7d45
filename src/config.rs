/// Configuration management for the media service
use crate::error::{MediaError, MediaResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub variants: VariantConfig,
    pub presenter: PresenterConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    pub upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub media_db: PathBuf,
    /// Root directory for content-addressed blobs
    pub blob_directory: PathBuf,
    /// Scratch directory for in-flight uploads and edits
    pub tmp_directory: PathBuf,
}

/// Responsive variant matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Target widths; None means "original size"
    pub widths: Vec<Option<u32>>,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            widths: vec![Some(320), Some(640), Some(960), Some(1280), None],
        }
    }
}

/// Presenter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenterConfig {
    /// Path prefix under which stored files are served
    pub web_path: String,
    /// Absolute base URL, used when external URLs are requested
    pub public_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MediaResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MEDIA_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("MEDIA_PORT")
            .unwrap_or_else(|_| "2680".to_string())
            .parse()
            .map_err(|_| MediaError::Validation("Invalid port number".to_string()))?;
        let version = env::var("MEDIA_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let upload_limit = env::var("MEDIA_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10 * 1024 * 1024);

        let data_directory: PathBuf = env::var("MEDIA_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let media_db = env::var("MEDIA_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("media.sqlite"));
        let blob_directory = env::var("MEDIA_BLOB_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("files"));
        let tmp_directory = env::var("MEDIA_TMP_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("tmp"));

        let widths = match env::var("MEDIA_VARIANT_WIDTHS") {
            Ok(raw) => parse_widths(&raw)?,
            Err(_) => VariantConfig::default().widths,
        };

        let web_path =
            env::var("MEDIA_WEB_PATH").unwrap_or_else(|_| "/files".to_string());
        let public_url = env::var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                media_db,
                blob_directory,
                tmp_directory,
            },
            variants: VariantConfig { widths },
            presenter: PresenterConfig {
                web_path,
                public_url,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MediaError::Validation("Hostname cannot be empty".to_string()));
        }
        if self.variants.widths.is_empty() {
            return Err(MediaError::Validation(
                "At least one variant width is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a width list such as "320,640,960,original"
fn parse_widths(raw: &str) -> MediaResult<Vec<Option<u32>>> {
    raw.split(',')
        .map(|part| {
            let part = part.trim();
            if part.eq_ignore_ascii_case("original") {
                Ok(None)
            } else {
                part.parse::<u32>()
                    .map(Some)
                    .map_err(|_| MediaError::Validation(format!("Invalid variant width: {part}")))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_width_list_with_original_marker() {
        let widths = parse_widths("320, 640,original").unwrap();
        assert_eq!(widths, vec![Some(320), Some(640), None]);
    }

    #[test]
    fn rejects_bad_width() {
        assert!(parse_widths("320,huge").is_err());
    }
}
