//! Generation service: resolves a domain and runs the decode pipeline.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::catalog::parse_domain;
use crate::error::{Error, Result};
use crate::generation::{beam_search, DecodingConfig};
use crate::registry::ModelRegistry;
use crate::runtime::types::{GenerationRequest, GenerationResult};

/// Dispatches requests to the registry's loaded models.
///
/// Decoding always uses [`DecodingConfig::default`]. Cloning is cheap and
/// shares the registry.
#[derive(Clone)]
pub struct GenerationService {
    registry: Arc<ModelRegistry>,
    decoding: DecodingConfig,
}

impl GenerationService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            decoding: DecodingConfig::default(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn decoding(&self) -> &DecodingConfig {
        &self.decoding
    }

    /// Run generation on the calling thread.
    pub fn generate_blocking(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let key = request.domain_key.as_str();
        let model = self
            .registry
            .get(key)
            .ok_or_else(|| Error::ModelUnavailable(key.to_string()))?;
        let domain_key = parse_domain(key)
            .map(|d| d.key().to_string())
            .unwrap_or_else(|_| key.to_string());

        let started = Instant::now();
        let input_ids = model
            .tokenizer()
            .encode(&request.input_text, self.decoding.max_input_tokens)
            .map_err(|e| Error::generation_failed(&domain_key, e))?;
        debug!("Encoded {} input tokens for {}", input_ids.len(), domain_key);

        let output = {
            let mut generator = model
                .lock_generator()
                .map_err(|e| Error::generation_failed(&domain_key, e))?;
            beam_search(&mut **generator, &input_ids, &self.decoding)
                .map_err(|e| Error::generation_failed(&domain_key, e))?
        };

        let output_text = model
            .tokenizer()
            .decode(&output.tokens)
            .map_err(|e| Error::generation_failed(&domain_key, e))?;
        let generation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Generated {} tokens for {} in {:.1}ms",
            output.tokens.len(),
            domain_key,
            generation_time_ms
        );

        Ok(GenerationResult {
            domain_key,
            input_text: request.input_text.clone(),
            output_text,
            tokens_generated: output.tokens.len(),
            generation_time_ms,
        })
    }

    /// Run generation on the blocking thread pool.
    pub async fn generate(&self, domain_key: &str, input_text: &str) -> Result<GenerationResult> {
        let request = GenerationRequest::new(domain_key, input_text);
        let service = self.clone();

        tokio::task::spawn_blocking(move || service.generate_blocking(&request))
            .await
            .map_err(|e| {
                Error::generation_failed(domain_key, format!("generation task failed: {e}"))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Domain;
    use crate::device::DeviceProfile;
    use crate::models::TextCodec;
    use crate::testing::{default_specs, ByteCodec, FakeBehavior, FakeSource};

    fn service(source: FakeSource) -> GenerationService {
        let mut registry = ModelRegistry::new(DeviceProfile::cpu(), default_specs());
        registry.load_all(&source);
        GenerationService::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn ecommerce_request_produces_output() {
        let service = service(FakeSource::new());
        let result = service.generate("ecommerce", "track parcel").await.unwrap();

        assert_eq!(result.domain_key, "ecommerce");
        assert_eq!(result.input_text, "track parcel");
        assert_eq!(result.output_text, "track parcel");
        assert_eq!(result.tokens_generated, "track parcel".len());
    }

    #[tokio::test]
    async fn unknown_domain_is_unavailable() {
        let service = service(FakeSource::new());
        let err = service.generate("legal", "hello").await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.to_string(), "Model 'legal' not loaded.");
    }

    #[tokio::test]
    async fn failed_domain_is_unavailable() {
        let service = service(FakeSource::new().with(Domain::Medical, FakeBehavior::LoadError));
        let err = service.generate("medical", "I feel dizzy").await.unwrap_err();
        assert!(matches!(err, Error::ModelUnavailable(ref key) if key == "medical"));

        let ok = service.generate("restaurant", "table for two").await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn generator_failure_is_generation_failed() {
        let service = service(
            FakeSource::new().with(Domain::Classify, FakeBehavior::BrokenGenerator),
        );
        let err = service.generate("classify", "refund").await.unwrap_err();
        match err {
            Error::GenerationFailed { domain, reason } => {
                assert_eq!(domain, "classify");
                assert!(reason.contains("out of memory"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn long_input_is_truncated_not_rejected() {
        let service = service(FakeSource::new());
        let text: String = (0..600).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        assert!(ByteCodec.encode(&text, usize::MAX).unwrap().len() > 512);

        let result = service.generate("ecommerce", &text).await.unwrap();
        assert!(!result.output_text.is_empty());
        assert!(result.tokens_generated < service.decoding().max_length);
    }

    #[tokio::test]
    async fn empty_input_is_accepted() {
        let service = service(FakeSource::new());
        let result = service.generate("medical", "").await.unwrap();
        assert_eq!(result.input_text, "");
        assert_eq!(result.output_text, "");
    }

    #[test]
    fn blocking_generation_is_deterministic_and_bounded() {
        let service = service(FakeSource::new());
        let request = GenerationRequest::new("restaurant", "do you have vegan options");
        let first = service.generate_blocking(&request).unwrap();
        let second = service.generate_blocking(&request).unwrap();

        assert_eq!(first.output_text, second.output_text);
        assert!(!first.output_text.is_empty());
        assert!(first.tokens_generated < 150);
    }

    #[test]
    fn key_lookup_is_case_insensitive() {
        let service = service(FakeSource::new());
        let result = service
            .generate_blocking(&GenerationRequest::new("ECommerce", "hi"))
            .unwrap();
        assert_eq!(result.domain_key, "ecommerce");
    }
}
