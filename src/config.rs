use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProvider {
    Gemini,
    OpenAi,
}

impl AnalysisProvider {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => anyhow::bail!("unknown ANALYSIS_PROVIDER {other:?}"),
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-flash",
            Self::OpenAi => "gpt-4o",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub provider: AnalysisProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_image_bytes: usize,
    pub supported_types: Vec<String>,
}

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SUPPORTED_TYPES: &str = "image/jpeg,image/png,image/webp";

impl AnalysisConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let provider = std::env::var("ANALYSIS_PROVIDER")
            .ok()
            .map(|v| AnalysisProvider::parse(&v))
            .transpose()?
            .unwrap_or(AnalysisProvider::Gemini);
        Ok(Self {
            provider,
            api_key: std::env::var("ANALYSIS_API_KEY").unwrap_or_default(),
            base_url: std::env::var("ANALYSIS_BASE_URL")
                .unwrap_or_else(|_| provider.default_base_url().into()),
            model: std::env::var("ANALYSIS_MODEL")
                .unwrap_or_else(|_| provider.default_model().into()),
            max_image_bytes: std::env::var("MAX_IMAGE_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
            supported_types: parse_types(
                &std::env::var("SUPPORTED_IMAGE_TYPES")
                    .unwrap_or_else(|_| DEFAULT_SUPPORTED_TYPES.into()),
            ),
        })
    }
}

fn parse_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Absent means local-only mode: no remote data service, no accounts.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub analysis: AnalysisConfig,
    pub cache_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "lifebalance".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "lifebalance-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        Ok(Self {
            database_url,
            jwt,
            analysis: AnalysisConfig::from_env()?,
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".lifebalance-cache")),
        })
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn supported_types_are_trimmed_and_lowercased() {
        assert_eq!(
            parse_types(" image/JPEG, image/png ,,image/webp"),
            vec!["image/jpeg", "image/png", "image/webp"]
        );
    }

    #[test]
    fn provider_names() {
        assert_eq!(AnalysisProvider::parse("Gemini").unwrap(), AnalysisProvider::Gemini);
        assert_eq!(AnalysisProvider::parse("openai").unwrap(), AnalysisProvider::OpenAi);
        assert!(AnalysisProvider::parse("llama").is_err());
    }
}
