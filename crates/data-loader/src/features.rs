//! Audio feature normalization and similarity helpers.
//!
//! Raw catalogue values live on mixed scales (BPM, dB, milliseconds). Every
//! comparison between tracks goes through [`NormalizedFeatures`], which maps
//! each attribute onto [0,1].

use crate::types::{AudioFeatures, Track};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const TEMPO_FLOOR_BPM: f32 = 60.0;
const TEMPO_SPAN_BPM: f32 = 140.0;
const LOUDNESS_FLOOR_DB: f32 = -60.0;
const LOUDNESS_SPAN_DB: f32 = 60.0;
const DURATION_FLOOR_SECS: f32 = 30.0;
const DURATION_SPAN_SECS: f32 = 570.0;

/// Audio attributes mapped onto [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatures {
    pub danceability: f32,
    pub energy: f32,
    pub valence: f32,
    pub acousticness: f32,
    pub instrumentalness: f32,
    pub speechiness: f32,
    pub liveness: f32,
    pub tempo: f32,
    pub loudness: f32,
    pub duration: Option<f32>,
}

impl NormalizedFeatures {
    /// Number of dimensions in [`NormalizedFeatures::vector`]
    pub const DIMENSIONS: usize = 7;

    /// The vector compared by the content scorer:
    /// danceability, energy, valence, acousticness, instrumentalness, tempo, loudness
    pub fn vector(&self) -> [f32; Self::DIMENSIONS] {
        [
            self.danceability,
            self.energy,
            self.valence,
            self.acousticness,
            self.instrumentalness,
            self.tempo,
            self.loudness,
        ]
    }
}

/// Normalize raw audio features.
///
/// Unit-interval attributes are clamped; tempo maps 60-200 BPM, loudness
/// maps -60-0 dB and duration maps 30-600 s onto [0,1].
pub fn normalize_audio_features(
    features: &AudioFeatures,
    duration_ms: Option<u32>,
) -> NormalizedFeatures {
    NormalizedFeatures {
        danceability: unit(features.danceability),
        energy: unit(features.energy),
        valence: unit(features.valence),
        acousticness: unit(features.acousticness),
        instrumentalness: unit(features.instrumentalness),
        speechiness: unit(features.speechiness),
        liveness: unit(features.liveness),
        tempo: unit((features.tempo - TEMPO_FLOOR_BPM) / TEMPO_SPAN_BPM),
        loudness: unit((features.loudness - LOUDNESS_FLOOR_DB) / LOUDNESS_SPAN_DB),
        duration: duration_ms.map(|ms| {
            let secs = ms as f32 / 1000.0;
            unit((secs - DURATION_FLOOR_SECS) / DURATION_SPAN_SECS)
        }),
    }
}

/// Normalized features of a track, if the catalogue has audio analysis for it
pub fn track_features(track: &Track) -> Option<NormalizedFeatures> {
    track
        .audio
        .as_ref()
        .map(|audio| normalize_audio_features(audio, track.duration_ms))
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Per-attribute weights for [`audio_similarity`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioWeights {
    pub danceability: f32,
    pub energy: f32,
    pub valence: f32,
    pub acousticness: f32,
    pub instrumentalness: f32,
    pub tempo: f32,
    pub loudness: f32,
}

impl Default for AudioWeights {
    fn default() -> Self {
        Self {
            danceability: 0.20,
            energy: 0.20,
            valence: 0.15,
            acousticness: 0.10,
            instrumentalness: 0.10,
            tempo: 0.15,
            loudness: 0.10,
        }
    }
}

impl AudioWeights {
    /// Weights in the same order as [`NormalizedFeatures::vector`]
    pub fn as_array(&self) -> [f32; NormalizedFeatures::DIMENSIONS] {
        [
            self.danceability,
            self.energy,
            self.valence,
            self.acousticness,
            self.instrumentalness,
            self.tempo,
            self.loudness,
        ]
    }

    pub fn sum(&self) -> f32 {
        self.as_array().iter().sum()
    }

    /// Rescale so the weights sum to 1. All-zero weights are left untouched.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return *self;
        }
        Self {
            danceability: self.danceability / total,
            energy: self.energy / total,
            valence: self.valence / total,
            acousticness: self.acousticness / total,
            instrumentalness: self.instrumentalness / total,
            tempo: self.tempo / total,
            loudness: self.loudness / total,
        }
    }
}

/// Weighted closeness of two tracks: `Σ w·(1 − |a − b|) / Σ w`, in [0,1]
pub fn audio_similarity(a: &NormalizedFeatures, b: &NormalizedFeatures, weights: &AudioWeights) -> f32 {
    let total = weights.sum();
    if total <= 0.0 {
        return 0.0;
    }

    let weighted: f32 = a
        .vector()
        .iter()
        .zip(b.vector().iter())
        .zip(weights.as_array().iter())
        .map(|((x, y), w)| w * (1.0 - (x - y).abs()))
        .sum();

    weighted / total
}

/// Cosine similarity; 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// `1 / (1 + euclidean distance)`
pub fn euclidean_similarity(a: &[f32], b: &[f32]) -> f32 {
    let distance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt();
    1.0 / (1.0 + distance)
}

/// |A ∩ B| / |A ∪ B|; 0 when both sets are empty
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_audio() -> AudioFeatures {
        AudioFeatures {
            danceability: 0.5,
            energy: 1.3,
            valence: -0.2,
            acousticness: 0.25,
            instrumentalness: 0.0,
            speechiness: 0.1,
            liveness: 0.2,
            tempo: 130.0,
            loudness: -12.0,
        }
    }

    #[test]
    fn test_normalization_ranges() {
        let normalized = normalize_audio_features(&sample_audio(), Some(315_000));

        assert_eq!(normalized.energy, 1.0);
        assert_eq!(normalized.valence, 0.0);
        assert!((normalized.tempo - 0.5).abs() < 1e-6);
        assert!((normalized.loudness - 0.8).abs() < 1e-6);
        assert!((normalized.duration.unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tempo_clamped() {
        let mut audio = sample_audio();
        audio.tempo = 240.0;
        assert_eq!(normalize_audio_features(&audio, None).tempo, 1.0);
        audio.tempo = 40.0;
        assert_eq!(normalize_audio_features(&audio, None).tempo, 0.0);
    }

    #[test]
    fn test_audio_similarity_identical() {
        let features = normalize_audio_features(&sample_audio(), None);
        let similarity = audio_similarity(&features, &features, &AudioWeights::default());
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_weights_normalized() {
        let weights = AudioWeights {
            danceability: 2.0,
            energy: 2.0,
            ..AudioWeights::default()
        };
        assert!((weights.normalized().sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_similarity() {
        assert_eq!(euclidean_similarity(&[1.0, 1.0], &[1.0, 1.0]), 1.0);
        assert!((euclidean_similarity(&[0.0, 0.0], &[3.0, 4.0]) - 1.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<String> = ["rock", "indie"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["indie", "pop"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }
}
