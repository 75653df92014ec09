//! Benchmarks for the per-source scorers
//!
//! Run with: cargo bench --package sources
//!
//! Uses a seeded synthetic catalogue so the numbers are comparable between runs.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_loader::{AudioFeatures, Interaction, Track};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sources::{
    ContentSimilarity, MlpConfig, NeuralCollaborativeFilter, PopularityScorer, Scorer,
    ScoringRequest, SimilarityMetric,
};

const TRACKS: usize = 1_000;
const USERS: usize = 200;
const INTERACTIONS_PER_USER: usize = 25;

fn synthetic_tracks(rng: &mut StdRng) -> Vec<Track> {
    (0..TRACKS)
        .map(|i| Track {
            id: format!("track-{i:05}"),
            name: format!("Track {i}"),
            artist_id: format!("artist-{}", i % 150),
            artist_name: String::new(),
            popularity: rng.random_range(0..=100),
            release_date: Some(format!("{}", rng.random_range(1960..2025))),
            genres: Default::default(),
            audio: Some(AudioFeatures {
                danceability: rng.random(),
                energy: rng.random(),
                valence: rng.random(),
                acousticness: rng.random(),
                instrumentalness: rng.random(),
                speechiness: rng.random(),
                liveness: rng.random(),
                tempo: rng.random_range(60.0..200.0),
                loudness: rng.random_range(-30.0..0.0),
            }),
            duration_ms: Some(rng.random_range(90_000..400_000)),
        })
        .collect()
}

fn synthetic_log(rng: &mut StdRng) -> Vec<Interaction> {
    (0..USERS)
        .flat_map(|u| (0..INTERACTIONS_PER_USER).map(move |_| u))
        .map(|u| Interaction {
            user_id: format!("user-{u:04}"),
            track_id: format!("track-{:05}", rng.random_range(0..TRACKS)),
            rating: rng.random_range(1..=5) as f32,
            timestamp: None,
        })
        .collect()
}

fn pool() -> Vec<String> {
    (0..TRACKS).step_by(2).map(|i| format!("track-{i:05}")).collect()
}

fn liked() -> Vec<String> {
    (1..TRACKS).step_by(97).map(|i| format!("track-{i:05}")).collect()
}

fn bench_content_fit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let tracks = synthetic_tracks(&mut rng);

    c.bench_function("content_fit_1k", |b| {
        b.iter(|| {
            let mut model = ContentSimilarity::new(SimilarityMetric::Cosine);
            model.fit(black_box(&tracks)).unwrap();
            black_box(model)
        })
    });
}

fn bench_scoring(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let tracks = synthetic_tracks(&mut rng);
    let log = synthetic_log(&mut rng);

    let mut content = ContentSimilarity::new(SimilarityMetric::WeightedAudio);
    content.fit(&tracks).unwrap();

    let mut popularity = PopularityScorer::new();
    popularity.fit(&log).unwrap();

    let mut collaborative = NeuralCollaborativeFilter::with_config(MlpConfig {
        hidden_layers: vec![32, 16],
        max_iter: 20,
        ..MlpConfig::default()
    });
    collaborative.fit(&log).unwrap();

    let request = ScoringRequest::new("user-0001", liked(), pool(), 40);

    c.bench_function("content_score_pool", |b| {
        b.iter(|| black_box(content.score(black_box(&request))))
    });
    c.bench_function("popularity_score_pool", |b| {
        b.iter(|| black_box(popularity.score(black_box(&request))))
    });
    c.bench_function("collaborative_score_pool", |b| {
        b.iter(|| black_box(collaborative.score(black_box(&request))))
    });
}

criterion_group!(benches, bench_content_fit, bench_scoring);
criterion_main!(benches);
