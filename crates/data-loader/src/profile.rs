//! Listener profiles derived from the interaction log.
//!
//! A [`UserProfile`] is recomputed on demand from a user's history and is
//! never maintained incrementally.

use crate::error::{DataLoadError, Result};
use crate::features::jaccard;
use crate::types::{AudioAttribute, Catalog, Track, TrackId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Ratings at or above this count as "liked"
pub const LIKED_RATING_THRESHOLD: f32 = 4.0;

const GENRE_DISTANCE_WEIGHT: f32 = 0.4;
const POPULARITY_DISTANCE_WEIGHT: f32 = 0.3;
const AUDIO_DISTANCE_WEIGHT: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f32,
    pub std: f32,
}

/// Aggregate taste of one listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Every track the user has interacted with
    pub listened: HashSet<TrackId>,
    /// Tracks rated at or above [`LIKED_RATING_THRESHOLD`], in log order
    pub liked: Vec<TrackId>,
    /// Genre -> number of listened tracks carrying it
    pub preferred_genres: HashMap<String, u32>,
    pub avg_popularity: f32,
    pub popularity_variance: f32,
    pub audio_preferences: BTreeMap<AudioAttribute, FeatureStats>,
    pub avg_rating: f32,
    pub avg_release_year: Option<f32>,
}

impl UserProfile {
    fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            listened: HashSet::new(),
            liked: Vec::new(),
            preferred_genres: HashMap::new(),
            avg_popularity: 0.0,
            popularity_variance: 0.0,
            audio_preferences: BTreeMap::new(),
            avg_rating: 0.0,
            avg_release_year: None,
        }
    }

    /// Genres the user has listened to
    pub fn genre_set(&self) -> BTreeSet<String> {
        self.preferred_genres.keys().cloned().collect()
    }

    /// Genres sorted by listen count, most frequent first
    pub fn top_genres(&self, n: usize) -> Vec<(&str, u32)> {
        let mut genres: Vec<(&str, u32)> = self
            .preferred_genres
            .iter()
            .map(|(genre, &count)| (genre.as_str(), count))
            .collect();
        genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        genres.truncate(n);
        genres
    }

    /// How far a track sits from this listener's taste, in [0,1].
    ///
    /// Weighted 0.4 genre dissimilarity (`1 − Jaccard`, only when both
    /// sides have genres), 0.3 popularity gap and 0.3 mean absolute gap
    /// over the profile's audio attributes.
    pub fn distance_to(&self, track: &Track) -> f32 {
        let mut distance = 0.0;

        let profile_genres = self.genre_set();
        if !track.genres.is_empty() && !profile_genres.is_empty() {
            distance += (1.0 - jaccard(&track.genres, &profile_genres)) * GENRE_DISTANCE_WEIGHT;
        }

        let popularity_gap = (track.popularity as f32 - self.avg_popularity).abs() / 100.0;
        distance += popularity_gap * POPULARITY_DISTANCE_WEIGHT;

        if let Some(audio) = &track.audio {
            let diffs: Vec<f32> = self
                .audio_preferences
                .iter()
                .map(|(&attr, stats)| (audio.get(attr) - stats.mean).abs())
                .collect();
            if !diffs.is_empty() {
                let mean_diff = diffs.iter().sum::<f32>() / diffs.len() as f32;
                distance += mean_diff * AUDIO_DISTANCE_WEIGHT;
            }
        }

        distance
    }
}

/// Build a profile from a user's interaction history.
///
/// Fails when the user has no interactions at all.
pub fn build_user_profile(catalog: &Catalog, user_id: &str) -> Result<UserProfile> {
    let interactions = catalog.get_user_interactions(user_id);
    if interactions.is_empty() {
        return Err(DataLoadError::MissingReference {
            entity: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    let mut profile = UserProfile::empty(user_id.to_string());

    let total_rating: f32 = interactions.iter().map(|i| i.rating).sum();
    profile.avg_rating = total_rating / interactions.len() as f32;

    let mut tracks: Vec<&Track> = Vec::new();
    for interaction in interactions {
        if interaction.rating >= LIKED_RATING_THRESHOLD
            && !profile.liked.contains(&interaction.track_id)
        {
            profile.liked.push(interaction.track_id.clone());
        }
        if profile.listened.insert(interaction.track_id.clone()) {
            if let Some(track) = catalog.get_track(&interaction.track_id) {
                tracks.push(track);
            }
        }
    }

    for track in &tracks {
        for genre in &track.genres {
            *profile.preferred_genres.entry(genre.clone()).or_insert(0) += 1;
        }
    }

    let popularities: Vec<f32> = tracks.iter().map(|t| t.popularity as f32).collect();
    let (mean, variance) = mean_and_variance(&popularities);
    profile.avg_popularity = mean;
    profile.popularity_variance = variance;

    for attr in AudioAttribute::PROFILE {
        let values: Vec<f32> = tracks
            .iter()
            .filter_map(|t| t.audio.as_ref().map(|a| a.get(attr)))
            .collect();
        if values.is_empty() {
            continue;
        }
        let (mean, variance) = mean_and_variance(&values);
        profile.audio_preferences.insert(
            attr,
            FeatureStats {
                mean,
                std: variance.sqrt(),
            },
        );
    }

    let years: Vec<f32> = tracks
        .iter()
        .filter_map(|t| t.release_year())
        .map(|y| y as f32)
        .collect();
    if !years.is_empty() {
        profile.avg_release_year = Some(years.iter().sum::<f32>() / years.len() as f32);
    }

    Ok(profile)
}

/// Population mean and variance; (0, 0) for an empty slice
fn mean_and_variance(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    (mean, variance)
}
