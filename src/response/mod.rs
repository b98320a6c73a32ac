//! Response handling - base64 payloads, file storage, and URL generation

pub mod base64;
pub mod file;

use crate::api::schema::ImageData;
use crate::engine::InferenceOutput;
use crate::error::Result;

/// Response format options of the images API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Base64 encoded JSON
    B64Json,
    /// URL to the stored image
    Url,
}

impl ResponseFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "b64_json" | "base64" => Self::B64Json,
            _ => Self::Url,
        }
    }
}

/// Renders inference outputs into API image entries
pub struct ResponseHandler {
    store: file::FileStore,
    url_prefix: String,
}

impl ResponseHandler {
    pub fn new(base_path: impl Into<std::path::PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            store: file::FileStore::new(base_path),
            url_prefix: url_prefix.into(),
        }
    }

    /// Render one generated image in the requested format
    pub async fn render(&self, output: &InferenceOutput, format: ResponseFormat) -> Result<ImageData> {
        match format {
            ResponseFormat::B64Json => Ok(ImageData {
                b64_json: Some(base64::encode(&output.image)),
                url: None,
                revised_prompt: None,
                seed: Some(output.seed),
            }),
            ResponseFormat::Url => {
                let filename = self.store.save(&output.image).await?;
                let url = format!("{}/{}", self.url_prefix.trim_end_matches('/'), filename);
                Ok(ImageData {
                    b64_json: None,
                    url: Some(url),
                    revised_prompt: None,
                    seed: Some(output.seed),
                })
            }
        }
    }

    /// Age-based cleanup of stored images
    pub async fn cleanup(&self, max_age_secs: u64) -> Result<usize> {
        self.store.cleanup(max_age_secs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_format_from_str() {
        assert_eq!(ResponseFormat::from_str("b64_json"), ResponseFormat::B64Json);
        assert_eq!(ResponseFormat::from_str("base64"), ResponseFormat::B64Json);
        assert_eq!(ResponseFormat::from_str("url"), ResponseFormat::Url);
        assert_eq!(ResponseFormat::from_str("unknown"), ResponseFormat::Url); // Default
    }

    #[test]
    fn test_response_format_case_insensitive() {
        assert_eq!(ResponseFormat::from_str("B64_JSON"), ResponseFormat::B64Json);
        assert_eq!(ResponseFormat::from_str("URL"), ResponseFormat::Url);
    }

    #[tokio::test]
    async fn test_render_b64_json() {
        let handler = ResponseHandler::new("/tmp/unused", "http://localhost:8000/images");
        let output = InferenceOutput {
            image: b"fake image".to_vec(),
            seed: 9,
        };
        let data = handler.render(&output, ResponseFormat::B64Json).await.unwrap();
        let b64 = data.b64_json.unwrap();
        assert_eq!(base64::decode(&b64).unwrap(), b"fake image");
        assert!(data.url.is_none());
        assert_eq!(data.seed, Some(9));
    }

    #[tokio::test]
    async fn test_render_url_saves_and_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ResponseHandler::new(dir.path(), "http://localhost:8000/images/");
        let output = InferenceOutput {
            image: b"fake image".to_vec(),
            seed: 1,
        };
        let data = handler.render(&output, ResponseFormat::Url).await.unwrap();
        let url = data.url.unwrap();
        assert!(url.starts_with("http://localhost:8000/images/"));
        assert!(data.b64_json.is_none());
    }
}
