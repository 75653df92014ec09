//! Core domain types for the music catalogue.
//!
//! This module defines the data structures shared by every other crate:
//! tracks with their audio attributes, artists, the interaction log and
//! the recommendation records the pipeline produces.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

// =============================================================================
// Type Aliases
// =============================================================================

/// Catalogue identifier for a track (a Spotify-style base62 id)
pub type TrackId = String;

/// Catalogue identifier for an artist
pub type ArtistId = String;

/// Identifier for a listener
pub type UserId = String;

// =============================================================================
// Audio Attributes
// =============================================================================

/// Raw audio analysis values for a track.
///
/// The unit-interval attributes come straight from the catalogue. `tempo` is
/// in BPM and `loudness` in dB; see [`crate::features`] for the [0,1]
/// normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub danceability: f32,
    pub energy: f32,
    pub valence: f32,
    pub acousticness: f32,
    pub instrumentalness: f32,
    #[serde(default)]
    pub speechiness: f32,
    #[serde(default)]
    pub liveness: f32,
    pub tempo: f32,
    pub loudness: f32,
}

/// Named audio attribute, used to address a single value of [`AudioFeatures`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioAttribute {
    Danceability,
    Energy,
    Valence,
    Acousticness,
    Instrumentalness,
    Speechiness,
    Liveness,
    Tempo,
    Loudness,
}

impl AudioAttribute {
    /// Attributes tracked in a listener's audio preferences
    pub const PROFILE: [AudioAttribute; 4] = [
        AudioAttribute::Danceability,
        AudioAttribute::Energy,
        AudioAttribute::Valence,
        AudioAttribute::Acousticness,
    ];

    /// Attributes forming the vector used for intra-list diversity
    pub const DIVERSITY_VECTOR: [AudioAttribute; 5] = [
        AudioAttribute::Danceability,
        AudioAttribute::Energy,
        AudioAttribute::Valence,
        AudioAttribute::Acousticness,
        AudioAttribute::Instrumentalness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioAttribute::Danceability => "danceability",
            AudioAttribute::Energy => "energy",
            AudioAttribute::Valence => "valence",
            AudioAttribute::Acousticness => "acousticness",
            AudioAttribute::Instrumentalness => "instrumentalness",
            AudioAttribute::Speechiness => "speechiness",
            AudioAttribute::Liveness => "liveness",
            AudioAttribute::Tempo => "tempo",
            AudioAttribute::Loudness => "loudness",
        }
    }
}

impl AudioFeatures {
    /// Read one attribute by name
    pub fn get(&self, attribute: AudioAttribute) -> f32 {
        match attribute {
            AudioAttribute::Danceability => self.danceability,
            AudioAttribute::Energy => self.energy,
            AudioAttribute::Valence => self.valence,
            AudioAttribute::Acousticness => self.acousticness,
            AudioAttribute::Instrumentalness => self.instrumentalness,
            AudioAttribute::Speechiness => self.speechiness,
            AudioAttribute::Liveness => self.liveness,
            AudioAttribute::Tempo => self.tempo,
            AudioAttribute::Loudness => self.loudness,
        }
    }
}

// =============================================================================
// Catalogue Entities
// =============================================================================

/// A track in the catalogue. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artist_id: ArtistId,
    #[serde(default)]
    pub artist_name: String,
    /// Mainstream reach, 0-100
    pub popularity: u8,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, depending on the release precision
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    /// Missing when the catalogue has no audio analysis for the track
    #[serde(default)]
    pub audio: Option<AudioFeatures>,
    #[serde(default)]
    pub duration_ms: Option<u32>,
}

impl Track {
    /// Release year parsed from the leading four digits of `release_date`
    pub fn release_year(&self) -> Option<i32> {
        let date = self.release_date.as_deref()?;
        let year = date.get(0..4)?;
        if !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        year.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub popularity: u8,
    #[serde(default)]
    pub genres: BTreeSet<String>,
}

/// One entry of the append-only interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub track_id: TrackId,
    pub rating: f32,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Precomputed interaction statistics for a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub avg_rating: f32,
    pub interaction_count: u32,
    /// `avg_rating * ln(count + 1)`
    pub popularity_score: f32,
}

// =============================================================================
// Recommendation Records
// =============================================================================

/// Where a recommendation's score came from and what the debiasing stages
/// did to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Weighted contribution of each blended source
    pub collaborative: f32,
    pub content: f32,
    pub popularity: f32,
    pub diversity: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diversity_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exploration_score: Option<f32>,

    #[serde(default)]
    pub needs_niche_replacement: bool,
    #[serde(default)]
    pub needs_bias_correction: bool,
    /// Added by an exploration strategy rather than ranked in
    #[serde(default)]
    pub explored: bool,
    /// Swapped in from the candidate pool by a debiasing transform
    #[serde(default)]
    pub injected: bool,
}

/// A scored track produced for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub track_id: TrackId,
    pub score: f32,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Recommendation {
    pub fn new(track_id: impl Into<TrackId>, score: f32) -> Self {
        Self {
            track_id: track_id.into(),
            score,
            provenance: Provenance::default(),
        }
    }
}

/// Stable sort by descending score. Equal scores keep their input order.
pub fn sort_by_score(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

// =============================================================================
// Catalog - The In-Memory Reference Store
// =============================================================================

/// Holds all tracks, artists and interactions plus the lookup indices the
/// scorers and transforms need.
#[derive(Debug)]
pub struct Catalog {
    // Primary data stores
    pub(crate) tracks: HashMap<TrackId, Track>,
    pub(crate) artists: HashMap<ArtistId, Artist>,

    // Interaction indices
    pub(crate) user_interactions: HashMap<UserId, Vec<Interaction>>,
    pub(crate) track_interactions: HashMap<TrackId, Vec<Interaction>>,

    // Secondary indices
    pub(crate) genre_index: HashMap<String, Vec<TrackId>>,
    pub(crate) artist_index: HashMap<ArtistId, Vec<TrackId>>,

    // Precomputed statistics
    pub(crate) track_stats: HashMap<TrackId, TrackStats>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tracks: HashMap::new(),
            artists: HashMap::new(),
            user_interactions: HashMap::new(),
            track_interactions: HashMap::new(),
            genre_index: HashMap::new(),
            artist_index: HashMap::new(),
            track_stats: HashMap::new(),
        }
    }

    pub fn get_track(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn get_artist(&self, id: &str) -> Option<&Artist> {
        self.artists.get(id)
    }

    /// All interactions logged by a user, in insertion order.
    ///
    /// Returns an empty slice for unknown users.
    pub fn get_user_interactions(&self, user_id: &str) -> &[Interaction] {
        self.user_interactions
            .get(user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_track_interactions(&self, track_id: &str) -> &[Interaction] {
        self.track_interactions
            .get(track_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_tracks_by_genre(&self, genre: &str) -> &[TrackId] {
        self.genre_index
            .get(genre)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_tracks_by_artist(&self, artist_id: &str) -> &[TrackId] {
        self.artist_index
            .get(artist_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_track_stats(&self, track_id: &str) -> Option<&TrackStats> {
        self.track_stats.get(track_id)
    }

    /// Popularity of the track's artist, falling back to the track's own
    /// popularity when the artist is not in the catalogue.
    pub fn artist_popularity(&self, track: &Track) -> u8 {
        self.artists
            .get(&track.artist_id)
            .map(|a| a.popularity)
            .unwrap_or(track.popularity)
    }

    /// Every track id, sorted so iteration order is reproducible
    pub fn all_track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self.tracks.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Every user with at least one interaction, sorted
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_interactions.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Every genre tag present in the catalogue
    pub fn all_genres(&self) -> BTreeSet<String> {
        self.genre_index.keys().cloned().collect()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn artists(&self) -> impl Iterator<Item = &Artist> {
        self.artists.values()
    }

    /// The whole interaction log, grouped by user
    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.user_interactions.values().flatten()
    }

    pub fn insert_track(&mut self, track: Track) {
        self.tracks.insert(track.id.clone(), track);
    }

    pub fn insert_artist(&mut self, artist: Artist) {
        self.artists.insert(artist.id.clone(), artist);
    }

    /// Append an interaction to both the user and track indices
    pub fn insert_interaction(&mut self, interaction: Interaction) {
        self.track_interactions
            .entry(interaction.track_id.clone())
            .or_default()
            .push(interaction.clone());

        self.user_interactions
            .entry(interaction.user_id.clone())
            .or_default()
            .push(interaction);
    }

    /// (users, tracks, interactions)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_interactions = self.user_interactions.values().map(|v| v.len()).sum();
        (self.user_interactions.len(), self.tracks.len(), total_interactions)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
