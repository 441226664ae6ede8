use std::sync::Arc;

use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::extract::parse_model_text;
use super::vision::{backend_from_config, EncodedImage, VisionBackend};
use super::AnalysisOutcome;
use crate::config::AnalysisConfig;
use crate::errors::{AnalysisError, AppError, ValidationError};

pub const ANALYSIS_INSTRUCTION: &str = "Analyze this food image. Identify the food items, \
estimate the portion and give nutritional values per portion in grams (calories in kcal). \
Respond ONLY with a JSON object of this form: \
{\"name\": string, \"foodItems\": string[], \"calories\": number, \"protein\": number, \
\"carbs\": number, \"fat\": number, \"fiber\": number, \
\"category\": \"Breakfast\" | \"Lunch\" | \"Dinner\" | \"Snack\"}. \
Do not include any other text.";

/// Raw uploaded image.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Bytes,
    pub media_type: String,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }
}

pub struct ImageAnalysisClient {
    backend: Arc<dyn VisionBackend>,
    max_image_bytes: usize,
    supported_types: Vec<String>,
    in_flight: Mutex<()>,
}

impl ImageAnalysisClient {
    pub fn new(
        backend: Arc<dyn VisionBackend>,
        max_image_bytes: usize,
        supported_types: Vec<String>,
    ) -> Self {
        Self {
            backend,
            max_image_bytes,
            supported_types,
            in_flight: Mutex::new(()),
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let backend: Arc<dyn VisionBackend> = backend_from_config(cfg)?.into();
        Ok(Self::new(
            backend,
            cfg.max_image_bytes,
            cfg.supported_types.clone(),
        ))
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn validate(&self, image: &ImagePayload) -> Result<(), ValidationError> {
        if image.bytes.is_empty() {
            return Err(ValidationError::EmptyImage);
        }
        if image.bytes.len() > self.max_image_bytes {
            return Err(ValidationError::ImageTooLarge {
                size: image.bytes.len(),
                max: self.max_image_bytes,
            });
        }
        let media_type = image.media_type.trim().to_ascii_lowercase();
        if !self.supported_types.iter().any(|t| *t == media_type) {
            return Err(ValidationError::UnsupportedMediaType(image.media_type.clone()));
        }
        Ok(())
    }

    /// Identifies the food in `image` and estimates its macros. At most one
    /// analysis runs at a time; a concurrent call fails with `Busy`.
    #[instrument(skip_all, fields(backend = self.backend.name(), size = image.bytes.len()))]
    pub async fn analyze(&self, image: &ImagePayload) -> Result<AnalysisOutcome, AppError> {
        self.validate(image)?;
        let _slot = self.in_flight.try_lock().map_err(|_| {
            warn!("analysis rejected, another one is running");
            AnalysisError::Busy
        })?;

        let encoded = EncodedImage {
            media_type: image.media_type.trim().to_ascii_lowercase(),
            base64: Base64::encode_string(&image.bytes),
        };
        let text = self.backend.describe(ANALYSIS_INSTRUCTION, &encoded).await?;
        let outcome = parse_model_text(&text)?;
        info!(name = %outcome.entry.name, calories = outcome.entry.calories, "image analyzed");
        Ok(outcome)
    }
}
