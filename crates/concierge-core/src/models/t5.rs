//! Native T5 conditional-generation model.

use std::fs;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use tracing::info;

use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::models::source::{ModelFiles, WeightsFormat};
use crate::models::{DecoderTokens, Seq2SeqModel};

pub struct T5Generator {
    model: T5ForConditionalGeneration,
    device: Device,
    tokens: DecoderTokens,
}

impl T5Generator {
    pub fn load(files: &ModelFiles, device: &DeviceProfile, dtype: Option<&str>) -> Result<Self> {
        let config_str = fs::read_to_string(&files.config)?;
        let mut config: T5Config = serde_json::from_str(&config_str)?;
        // Beams are reordered every step, so each step replays the full
        // prefix instead of keeping a per-sequence KV cache.
        config.use_cache = false;

        let dtype = device.select_dtype(dtype);
        let vb = match files.format {
            WeightsFormat::Safetensors => unsafe {
                VarBuilder::from_mmaped_safetensors(&files.weights, dtype, &device.device)?
            },
            WeightsFormat::Pytorch => {
                let path = files.weights.first().ok_or_else(|| {
                    Error::ModelLoadError("No pytorch weights file".to_string())
                })?;
                VarBuilder::from_pth(path, dtype, &device.device)?
            }
        };

        let model = T5ForConditionalGeneration::load(vb, &config)?;
        let tokens = DecoderTokens {
            decoder_start: config
                .decoder_start_token_id
                .unwrap_or(config.pad_token_id) as u32,
            eos: config.eos_token_id as u32,
        };

        info!(
            "Loaded T5 model ({} layers, d_model {}) on {:?} as {:?}",
            config.num_layers, config.d_model, device.kind, dtype
        );

        Ok(Self {
            model,
            device: device.device.clone(),
            tokens,
        })
    }
}

impl Seq2SeqModel for T5Generator {
    fn decoder_tokens(&self) -> DecoderTokens {
        self.tokens
    }

    fn encode(&mut self, input_ids: &[u32]) -> Result<Tensor> {
        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        Ok(self.model.encode(&input)?)
    }

    fn next_token_logits(
        &mut self,
        encoder_output: &Tensor,
        prefixes: &[Vec<u32>],
    ) -> Result<Tensor> {
        let batch = prefixes.len();
        let seq_len = prefixes.first().map(Vec::len).unwrap_or(0);
        if batch == 0 || seq_len == 0 {
            return Err(Error::InvalidInput("Empty decoder prefix batch".to_string()));
        }
        if prefixes.iter().any(|p| p.len() != seq_len) {
            return Err(Error::InvalidInput(
                "Decoder prefixes must share one length".to_string(),
            ));
        }

        let flat: Vec<u32> = prefixes.iter().flatten().copied().collect();
        let decoder_input = Tensor::new(flat.as_slice(), &self.device)?.reshape((batch, seq_len))?;
        let encoder_output = if batch > 1 {
            encoder_output.repeat((batch, 1, 1))?
        } else {
            encoder_output.clone()
        };

        let logits = self.model.decode(&decoder_input, &encoder_output)?;
        Ok(logits.to_dtype(DType::F32)?)
    }
}
