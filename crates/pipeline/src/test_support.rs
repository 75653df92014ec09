//! Shared fixtures for the transform tests.

use data_loader::{
    build_user_profile, Artist, AudioFeatures, Catalog, Interaction, Recommendation, Track,
    UserProfile,
};

pub(crate) fn track(id: &str, artist_id: &str, popularity: u8, genre: &str, energy: f32) -> Track {
    Track {
        id: id.to_string(),
        name: id.to_string(),
        artist_id: artist_id.to_string(),
        artist_name: artist_id.to_string(),
        popularity,
        release_date: Some("2015-06-01".to_string()),
        genres: [genre.to_string()].into_iter().collect(),
        audio: Some(AudioFeatures {
            danceability: energy,
            energy,
            valence: 0.5,
            acousticness: 1.0 - energy,
            instrumentalness: 0.1,
            speechiness: 0.05,
            liveness: 0.1,
            tempo: 120.0,
            loudness: -8.0,
        }),
        duration_ms: Some(210_000),
    }
}

fn artist(id: &str, popularity: u8) -> Artist {
    Artist {
        id: id.to_string(),
        name: id.to_string(),
        popularity,
        genres: Default::default(),
    }
}

fn rating(user: &str, track: &str, rating: f32) -> Interaction {
    Interaction {
        user_id: user.to_string(),
        track_id: track.to_string(),
        rating,
        timestamp: None,
    }
}

/// Three mainstream hits, two mid-tier tracks and three niche tracks.
/// "listener" has only heard the hits and one mid-tier track.
pub(crate) fn create_test_catalog() -> Catalog {
    let tracks = vec![
        track("hit1", "star", 95, "pop", 0.9),
        track("hit2", "star", 90, "pop", 0.8),
        track("hit3", "star2", 88, "dance", 0.85),
        track("mid1", "established", 65, "rock", 0.6),
        track("mid2", "emerging", 50, "indie", 0.5),
        track("deep1", "niche-a", 12, "folk", 0.2),
        track("deep2", "niche-a", 8, "ambient", 0.1),
        track("deep3", "niche-b", 20, "jazz", 0.3),
    ];
    let artists = vec![
        artist("star", 95),
        artist("star2", 85),
        artist("established", 70),
        artist("emerging", 45),
        artist("niche-a", 10),
        artist("niche-b", 20),
    ];
    let interactions = vec![
        rating("listener", "hit1", 5.0),
        rating("listener", "hit2", 4.5),
        rating("listener", "hit3", 4.0),
        rating("listener", "mid1", 3.0),
        rating("other", "deep1", 5.0),
        rating("other", "mid2", 4.0),
    ];

    Catalog::from_parts(tracks, artists, interactions).unwrap()
}

pub(crate) fn listener_profile(catalog: &Catalog) -> UserProfile {
    build_user_profile(catalog, "listener").unwrap()
}

pub(crate) fn recs(entries: &[(&str, f32)]) -> Vec<Recommendation> {
    entries
        .iter()
        .map(|&(id, score)| Recommendation::new(id, score))
        .collect()
}

pub(crate) fn ids(recommendations: &[Recommendation]) -> Vec<&str> {
    recommendations.iter().map(|r| r.track_id.as_str()).collect()
}
