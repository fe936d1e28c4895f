//! Text tokenization backed by HuggingFace `tokenizer.json` files.

use std::fs;
use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::TextCodec;

pub struct Tokenizer {
    inner: HfTokenizer,
}

impl Tokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            Error::TokenizationError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let tokenizer = Self::from_bytes(&bytes)?;
        debug!(
            "Loaded tokenizer from {:?} ({} tokens)",
            path,
            tokenizer.vocab_size()
        );
        Ok(tokenizer)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner =
            HfTokenizer::from_bytes(bytes).map_err(|e| Error::TokenizationError(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }
}

impl TextCodec for Tokenizer {
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        let ids = encoding.get_ids();
        if ids.len() <= max_tokens {
            return Ok(ids.to_vec());
        }

        // Cut content but keep the trailing specials (T5 appends `</s>`).
        let trailing = encoding
            .get_special_tokens_mask()
            .iter()
            .rev()
            .take_while(|mask| **mask == 1)
            .count()
            .min(max_tokens);
        let mut truncated = Vec::with_capacity(max_tokens);
        truncated.extend_from_slice(&ids[..max_tokens - trailing]);
        truncated.extend_from_slice(&ids[ids.len() - trailing..]);

        debug!(
            "Truncated input from {} to {} tokens",
            ids.len(),
            truncated.len()
        );
        Ok(truncated)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| Error::TokenizationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Word-level tokenizer with a T5-style `</s>` post-processor.
    const TOKENIZER_JSON: &str = r#"{
      "version": "1.0",
      "truncation": null,
      "padding": null,
      "added_tokens": [
        {"id": 0, "content": "<pad>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
        {"id": 1, "content": "</s>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
        {"id": 2, "content": "<unk>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
      ],
      "normalizer": null,
      "pre_tokenizer": {"type": "Whitespace"},
      "post_processor": {
        "type": "TemplateProcessing",
        "single": [
          {"Sequence": {"id": "A", "type_id": 0}},
          {"SpecialToken": {"id": "</s>", "type_id": 0}}
        ],
        "pair": [
          {"Sequence": {"id": "A", "type_id": 0}},
          {"SpecialToken": {"id": "</s>", "type_id": 0}},
          {"Sequence": {"id": "B", "type_id": 0}},
          {"SpecialToken": {"id": "</s>", "type_id": 0}}
        ],
        "special_tokens": {
          "</s>": {"id": "</s>", "ids": [1], "tokens": ["</s>"]}
        }
      },
      "decoder": null,
      "model": {
        "type": "WordLevel",
        "vocab": {"<pad>": 0, "</s>": 1, "<unk>": 2, "my": 3, "order": 4, "has": 5, "not": 6, "arrived": 7},
        "unk_token": "<unk>"
      }
    }"#;

    fn tokenizer() -> Tokenizer {
        Tokenizer::from_bytes(TOKENIZER_JSON.as_bytes()).unwrap()
    }

    #[test]
    fn encode_appends_eos() {
        let ids = tokenizer().encode("my order has not arrived", 512).unwrap();
        assert_eq!(ids, vec![3, 4, 5, 6, 7, 1]);
    }

    #[test]
    fn long_input_is_truncated_keeping_eos() {
        let text = vec!["order"; 600].join(" ");
        let ids = tokenizer().encode(&text, 512).unwrap();
        assert_eq!(ids.len(), 512);
        assert_eq!(ids[510], 4);
        assert_eq!(ids[511], 1);
    }

    #[test]
    fn empty_input_still_encodes_eos() {
        assert_eq!(tokenizer().encode("", 512).unwrap(), vec![1]);
    }

    #[test]
    fn decode_skips_special_tokens() {
        let text = tokenizer().decode(&[0, 3, 4, 7, 1]).unwrap();
        assert_eq!(text, "my order arrived");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOKENIZER_JSON.as_bytes()).unwrap();
        let tokenizer = Tokenizer::from_file(file.path()).unwrap();
        assert!(tokenizer.vocab_size() >= 8);
        assert_eq!(tokenizer.token_to_id("</s>"), Some(1));
    }

    #[test]
    fn missing_file_is_tokenization_error() {
        let err = Tokenizer::from_file(Path::new("/nonexistent/tokenizer.json"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::TokenizationError(_)));
    }
}
