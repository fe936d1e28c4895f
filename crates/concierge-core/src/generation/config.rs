use serde::{Deserialize, Serialize};

/// Decoding parameters applied identically to every domain.
///
/// The service always uses [`DecodingConfig::default`]; the values are part
/// of the output contract and are not tunable per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingConfig {
    /// Encoder input budget in tokens, including the trailing `</s>`
    pub max_input_tokens: usize,
    /// Beam width
    pub num_beams: usize,
    /// Maximum decoder sequence length, counting the decoder start token
    pub max_length: usize,
    /// Stop as soon as `num_beams` hypotheses have finished
    pub early_stopping: bool,
    /// Forbid any repeated n-gram of this size within one sequence (0 disables)
    pub no_repeat_ngram_size: usize,
    /// Exponent applied to the generated length when ranking hypotheses
    pub length_penalty: f32,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 512,
            num_beams: 5,
            max_length: 150,
            early_stopping: true,
            no_repeat_ngram_size: 2,
            length_penalty: 1.0,
        }
    }
}
