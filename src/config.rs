//! Process configuration loaded from the environment.
//!
//! The binary calls `dotenvy::dotenv()` before reading these, so a local
//! `.env` file works the same as real environment variables.

use std::env;
use std::path::PathBuf;

use crate::split::SplitConfig;
use crate::types::ArchiveError;

/// Credentials and model settings for the remote embedding endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    /// Base URL of an OpenAI-compatible API (the `/embeddings` suffix is
    /// appended by the client).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub database_path: PathBuf,
    /// `None` when `EMBEDDINGS_URL`/`EMBEDDINGS_API_KEY` are unset; the
    /// gateway then comes up in degraded mode instead of failing startup.
    pub embeddings: Option<EmbeddingsConfig>,
    pub split: SplitConfig,
    pub port: u16,
}

impl ArchiveConfig {
    pub fn from_env() -> Result<Self, ArchiveError> {
        let database_path = env::var("ARCHIVIST_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./archivist.sqlite"));

        let embeddings = match (env::var("EMBEDDINGS_URL"), env::var("EMBEDDINGS_API_KEY")) {
            (Ok(base_url), Ok(api_key)) => Some(EmbeddingsConfig {
                base_url,
                api_key,
                model: env::var("EMBEDDINGS_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                dimensions: parsed_var("EMBEDDINGS_DIMENSIONS", 1536)?,
            }),
            _ => None,
        };

        let split = SplitConfig::new(
            parsed_var("ARCHIVIST_CHUNK_SIZE", 1000)?,
            parsed_var("ARCHIVIST_CHUNK_OVERLAP", 200)?,
        )?;

        Ok(Self {
            database_path,
            embeddings,
            split,
            port: parsed_var("PORT", 8002)?,
        })
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ArchiveError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| ArchiveError::Config(format!("invalid {name} '{raw}': {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names; the process environment is
    // shared across the test harness.

    #[test]
    fn parsed_var_uses_default_when_unset() {
        let value: usize = parsed_var("ARCHIVIST_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parsed_var_rejects_garbage() {
        unsafe { env::set_var("ARCHIVIST_TEST_GARBAGE_VAR", "not-a-number") };
        let result: Result<usize, _> = parsed_var("ARCHIVIST_TEST_GARBAGE_VAR", 1);
        assert!(matches!(result, Err(ArchiveError::Config(_))));
    }

    #[test]
    fn parsed_var_reads_set_value() {
        unsafe { env::set_var("ARCHIVIST_TEST_PORT_VAR", "9001") };
        let value: u16 = parsed_var("ARCHIVIST_TEST_PORT_VAR", 8002).unwrap();
        assert_eq!(value, 9001);
    }
}
