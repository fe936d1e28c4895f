//! Beam search over a [`Seq2SeqModel`].
//!
//! Each step scores every live beam, masks continuations that would repeat
//! an n-gram, and keeps the best `2 * num_beams` candidates across all beams.
//! Candidates ending in EOS become finished hypotheses when they rank within
//! the first `num_beams`; the rest fill the next set of live beams.

use std::cmp::Ordering;

use candle_core::D;
use tracing::trace;

use crate::error::{Error, Result};
use crate::models::Seq2SeqModel;

use super::config::DecodingConfig;
use super::ngram::apply_no_repeat_ngram;

/// Best hypothesis produced by [`beam_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct BeamOutput {
    /// Generated ids without the decoder start token or trailing EOS
    pub tokens: Vec<u32>,
    /// Length-normalized log-probability
    pub score: f32,
    /// Whether the hypothesis ended with EOS rather than hitting the length cap
    pub finished: bool,
}

#[derive(Debug, Clone)]
struct Beam {
    /// Full decoder sequence, starting with the decoder start token
    tokens: Vec<u32>,
    /// Sum of token log-probabilities
    score: f32,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    normalized: f32,
    finished: bool,
}

struct FinishedHypotheses {
    hypotheses: Vec<Hypothesis>,
    num_beams: usize,
    length_penalty: f32,
}

impl FinishedHypotheses {
    fn new(num_beams: usize, length_penalty: f32) -> Self {
        Self {
            hypotheses: Vec::with_capacity(num_beams + 1),
            num_beams,
            length_penalty,
        }
    }

    fn normalize(&self, score: f32, generated_len: usize) -> f32 {
        score / (generated_len.max(1) as f32).powf(self.length_penalty)
    }

    fn worst_score(&self) -> f32 {
        self.hypotheses
            .last()
            .map(|h| h.normalized)
            .unwrap_or(f32::NEG_INFINITY)
    }

    fn add(&mut self, tokens: Vec<u32>, score: f32, finished: bool) {
        if score == f32::NEG_INFINITY {
            return;
        }
        // Decoder start token is not counted as generated.
        let normalized = self.normalize(score, tokens.len() - 1);
        if self.hypotheses.len() >= self.num_beams && normalized <= self.worst_score() {
            return;
        }

        // Stable insert keeps earlier hypotheses ahead on ties.
        let position = self
            .hypotheses
            .iter()
            .position(|h| normalized > h.normalized)
            .unwrap_or(self.hypotheses.len());
        self.hypotheses.insert(
            position,
            Hypothesis {
                tokens,
                normalized,
                finished,
            },
        );
        self.hypotheses.truncate(self.num_beams);
    }

    fn is_done(&self, early_stopping: bool, best_live_score: f32, cur_len: usize) -> bool {
        if self.hypotheses.len() < self.num_beams {
            return false;
        }
        if early_stopping {
            return true;
        }
        let best_attainable = self.normalize(best_live_score, cur_len.saturating_sub(1));
        self.worst_score() >= best_attainable
    }

    fn into_best(self) -> Option<Hypothesis> {
        self.hypotheses.into_iter().next()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f32,
    beam: usize,
    token: u32,
}

/// Descending score; ties broken by beam index then token id so the search
/// is fully deterministic.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.beam.cmp(&b.beam))
        .then(a.token.cmp(&b.token))
}

/// Insert into a bounded list kept in `rank` order.
fn push_bounded(top: &mut Vec<Candidate>, candidate: Candidate, limit: usize) {
    if top.len() == limit {
        match top.last() {
            Some(last) if rank(&candidate, last) == Ordering::Less => {}
            _ => return,
        }
    }
    let position = top
        .iter()
        .position(|c| rank(&candidate, c) == Ordering::Less)
        .unwrap_or(top.len());
    top.insert(position, candidate);
    top.truncate(limit);
}

/// Run beam search from already-encoded input ids.
pub fn beam_search(
    model: &mut dyn Seq2SeqModel,
    input_ids: &[u32],
    config: &DecodingConfig,
) -> Result<BeamOutput> {
    if config.num_beams == 0 {
        return Err(Error::InvalidInput("num_beams must be at least 1".to_string()));
    }
    if config.max_length < 2 {
        return Err(Error::InvalidInput("max_length must be at least 2".to_string()));
    }

    let special = model.decoder_tokens();
    let encoder_output = model.encode(input_ids)?;
    let num_candidates = 2 * config.num_beams;

    let mut beams = vec![Beam {
        tokens: vec![special.decoder_start],
        score: 0.0,
    }];
    let mut finished = FinishedHypotheses::new(config.num_beams, config.length_penalty);
    let mut done = false;

    while beams[0].tokens.len() < config.max_length {
        let prefixes: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let logits = model.next_token_logits(&encoder_output, &prefixes)?;
        let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?.to_vec2::<f32>()?;
        if log_probs.len() != beams.len() {
            return Err(Error::InferenceError(format!(
                "Model returned {} logit rows for {} beams",
                log_probs.len(),
                beams.len()
            )));
        }

        let mut top = Vec::with_capacity(num_candidates + 1);
        for (beam_idx, (beam, mut row)) in beams.iter().zip(log_probs).enumerate() {
            apply_no_repeat_ngram(&mut row, &beam.tokens, config.no_repeat_ngram_size);
            for (token, log_prob) in row.into_iter().enumerate() {
                if log_prob == f32::NEG_INFINITY || log_prob.is_nan() {
                    continue;
                }
                push_bounded(
                    &mut top,
                    Candidate {
                        score: beam.score + log_prob,
                        beam: beam_idx,
                        token: token as u32,
                    },
                    num_candidates,
                );
            }
        }

        let mut next_beams = Vec::with_capacity(config.num_beams);
        for (global_rank, candidate) in top.into_iter().enumerate() {
            let mut tokens = beams[candidate.beam].tokens.clone();
            tokens.push(candidate.token);

            if candidate.token == special.eos {
                if global_rank < config.num_beams {
                    finished.add(tokens, candidate.score, true);
                }
            } else {
                next_beams.push(Beam {
                    tokens,
                    score: candidate.score,
                });
                if next_beams.len() == config.num_beams {
                    break;
                }
            }
        }

        let cur_len = beams[0].tokens.len() + 1;
        let best_live = next_beams
            .first()
            .map(|b| b.score)
            .unwrap_or(f32::NEG_INFINITY);
        trace!(
            "beam step len={} live={} finished={}",
            cur_len,
            next_beams.len(),
            finished.hypotheses.len()
        );

        if finished.is_done(config.early_stopping, best_live, cur_len) {
            done = true;
            break;
        }
        if next_beams.is_empty() {
            break;
        }
        beams = next_beams;
    }

    // Length cap reached: live beams compete with finished hypotheses.
    if !done {
        for beam in beams {
            finished.add(beam.tokens, beam.score, false);
        }
    }

    let best = finished
        .into_best()
        .ok_or_else(|| Error::InferenceError("Beam search produced no hypotheses".to_string()))?;

    let mut tokens = best.tokens;
    if tokens.first() == Some(&special.decoder_start) {
        tokens.remove(0);
    }
    if best.finished && tokens.last() == Some(&special.eos) {
        tokens.pop();
    }

    Ok(BeamOutput {
        tokens,
        score: best.normalized,
        finished: best.finished,
    })
}
