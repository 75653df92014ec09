//! Catalog building and indexing logic.
//!
//! - Load the JSON catalogue files in parallel
//! - Build secondary indices (genre, artist)
//! - Compute per-track interaction statistics
//! - Validate referential integrity

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

impl Catalog {
    /// Load a catalogue directory.
    ///
    /// `tracks.json` and `interactions.json` are required. `artists.json` is
    /// optional; without it, artist popularity falls back to track
    /// popularity and no artist genres are inherited.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        info!("Loading catalogue from {:?}", data_dir);

        let tracks_path = data_dir.join("tracks.json");
        let artists_path = data_dir.join("artists.json");
        let interactions_path = data_dir.join("interactions.json");

        let ((tracks, artists), interactions) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_tracks(&tracks_path),
                    || {
                        if artists_path.exists() {
                            parser::parse_artists(&artists_path)
                        } else {
                            Ok(Vec::new())
                        }
                    },
                )
            },
            || parser::parse_interactions(&interactions_path),
        );

        let tracks = tracks?;
        let artists = artists?;
        let interactions = interactions?;

        info!(
            "Parsed {} tracks, {} artists, {} interactions",
            tracks.len(),
            artists.len(),
            interactions.len()
        );

        Self::from_parts(tracks, artists, interactions)
    }

    /// Build a fully indexed and validated catalogue from in-memory records
    pub fn from_parts(
        tracks: Vec<Track>,
        artists: Vec<Artist>,
        interactions: Vec<Interaction>,
    ) -> Result<Self> {
        let mut catalog = Catalog::new();

        for artist in artists {
            catalog.insert_artist(artist);
        }
        for track in tracks {
            catalog.insert_track(track);
        }
        for interaction in interactions {
            catalog.insert_interaction(interaction);
        }

        catalog.build_secondary_indices();
        catalog.compute_track_stats();
        catalog.validate()?;

        let (users, tracks, interactions) = catalog.counts();
        info!(
            "Catalog ready: {} users, {} tracks, {} interactions",
            users, tracks, interactions
        );
        Ok(catalog)
    }

    /// Build the genre and artist indices.
    ///
    /// Tracks without genre tags inherit their artist's genres first, so the
    /// genre index covers them too. Index lists are sorted by track id.
    pub fn build_secondary_indices(&mut self) {
        self.genre_index.clear();
        self.artist_index.clear();

        for track in self.tracks.values_mut() {
            if track.genres.is_empty() {
                if let Some(artist) = self.artists.get(&track.artist_id) {
                    track.genres = artist.genres.clone();
                }
            }
        }

        for (track_id, track) in &self.tracks {
            for genre in &track.genres {
                self.genre_index
                    .entry(genre.clone())
                    .or_default()
                    .push(track_id.clone());
            }
            self.artist_index
                .entry(track.artist_id.clone())
                .or_default()
                .push(track_id.clone());
        }

        for ids in self.genre_index.values_mut() {
            ids.sort_unstable();
        }
        for ids in self.artist_index.values_mut() {
            ids.sort_unstable();
        }

        debug!(
            "Indexed {} genres across {} artists",
            self.genre_index.len(),
            self.artist_index.len()
        );
    }

    /// Compute mean rating, interaction count and popularity score per track
    pub fn compute_track_stats(&mut self) {
        self.track_stats = self
            .track_interactions
            .par_iter()
            .map(|(track_id, interactions)| {
                let interaction_count = interactions.len() as u32;
                let avg_rating = if interaction_count > 0 {
                    let total: f32 = interactions.iter().map(|i| i.rating).sum();
                    total / interaction_count as f32
                } else {
                    0.0
                };

                (
                    track_id.clone(),
                    TrackStats {
                        avg_rating,
                        interaction_count,
                        popularity_score: compute_popularity_score(avg_rating, interaction_count),
                    },
                )
            })
            .collect();
    }

    /// Check referential integrity and value ranges
    pub fn validate(&self) -> Result<()> {
        for interactions in self.user_interactions.values() {
            for interaction in interactions {
                if !self.tracks.contains_key(&interaction.track_id) {
                    return Err(DataLoadError::MissingReference {
                        entity: "Track".to_string(),
                        id: interaction.track_id.clone(),
                    });
                }
                if !interaction.rating.is_finite() {
                    return Err(DataLoadError::InvalidValue {
                        field: "rating".to_string(),
                        value: interaction.rating.to_string(),
                    });
                }
            }
        }

        for track in self.tracks.values() {
            if track.popularity > 100 {
                return Err(DataLoadError::InvalidValue {
                    field: format!("popularity of track {}", track.id),
                    value: track.popularity.to_string(),
                });
            }
            if !self.artists.is_empty() && !self.artists.contains_key(&track.artist_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "Artist".to_string(),
                    id: track.artist_id.clone(),
                });
            }
            if let Some(audio) = &track.audio {
                let all_finite = AudioAttribute::DIVERSITY_VECTOR
                    .into_iter()
                    .chain([AudioAttribute::Tempo, AudioAttribute::Loudness])
                    .all(|attr| audio.get(attr).is_finite());
                if !all_finite {
                    return Err(DataLoadError::ValidationError(format!(
                        "track {} has non-finite audio features",
                        track.id
                    )));
                }
            }
        }

        for artist in self.artists.values() {
            if artist.popularity > 100 {
                return Err(DataLoadError::InvalidValue {
                    field: format!("popularity of artist {}", artist.id),
                    value: artist.popularity.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// `avg_rating * ln(count + 1)`: rewards both high ratings and many ratings
fn compute_popularity_score(avg_rating: f32, interaction_count: u32) -> f32 {
    avg_rating * (interaction_count as f32 + 1.0).ln()
}
