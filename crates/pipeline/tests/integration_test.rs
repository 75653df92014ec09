//! Integration tests for the pipeline.
//!
//! Blend real scorer output over a small catalogue, then run the full
//! debiasing chain on it.

use data_loader::{build_user_profile, Artist, AudioFeatures, Catalog, Interaction, Track, TrackId};
use pipeline::transforms::*;
use pipeline::{
    DebiasPipeline, DiversityAdjustment, ExplorationStrategy, Explorer, HybridBlender,
    TransformContext,
};
use sources::{ContentSimilarity, PopularityScorer, ScoreSource, Scorer, ScoringRequest};

const GENRES: [&str; 5] = ["pop", "rock", "jazz", "folk", "electronic"];

fn create_test_catalog() -> Catalog {
    let artists: Vec<Artist> = (0..8)
        .map(|a| Artist {
            id: format!("artist-{a}"),
            name: format!("Artist {a}"),
            popularity: (a * 13) as u8,
            genres: Default::default(),
        })
        .collect();

    let tracks: Vec<Track> = (0..24)
        .map(|i| {
            let x = i as f32 / 24.0;
            Track {
                id: format!("t{i:02}"),
                name: format!("Track {i}"),
                artist_id: format!("artist-{}", i % 8),
                artist_name: format!("Artist {}", i % 8),
                popularity: ((i % 8) * 13 + i / 8) as u8,
                release_date: Some(format!("{}-01-01", 1990 + i)),
                genres: [GENRES[i % GENRES.len()].to_string()].into_iter().collect(),
                audio: Some(AudioFeatures {
                    danceability: x,
                    energy: 1.0 - x,
                    valence: (x * 3.0).fract(),
                    acousticness: x * 0.5,
                    instrumentalness: 0.1,
                    speechiness: 0.05,
                    liveness: 0.1,
                    tempo: 80.0 + 100.0 * x,
                    loudness: -20.0 + 15.0 * x,
                }),
                duration_ms: Some(180_000 + i as u32 * 1_000),
            }
        })
        .collect();

    let mut interactions = Vec::new();
    for u in 0..6 {
        for k in 0..6 {
            let t = (u * 3 + k * 5) % 24;
            interactions.push(Interaction {
                user_id: format!("u{u}"),
                track_id: format!("t{t:02}"),
                rating: 1.0 + ((u + k) % 5) as f32,
                timestamp: Some(1_600_000_000 + (u * 100 + k) as i64),
            });
        }
    }

    Catalog::from_parts(tracks, artists, interactions).unwrap()
}

fn full_pipeline(catalog: &Catalog) -> DebiasPipeline {
    let mut adversarial = AdversarialDebiaser::new();
    adversarial.train_on_histories(catalog).unwrap();

    DebiasPipeline::new()
        .add_transform(PopularityDebiaser::fit(0.5, catalog))
        .add_transform(FairnessEnforcer::new())
        .add_transform(DiversityInjector::default())
        .add_transform(adversarial)
}

#[test]
fn test_blend_then_debias() {
    let catalog = create_test_catalog();
    let profile = build_user_profile(&catalog, "u0").unwrap();

    let mut content = ContentSimilarity::default();
    content.fit(catalog.tracks()).unwrap();
    let mut popularity = PopularityScorer::new();
    popularity.fit(catalog.interactions()).unwrap();

    let pool: Vec<TrackId> = catalog
        .all_track_ids()
        .into_iter()
        .filter(|id| !profile.listened.contains(id))
        .collect();
    let n = 8;
    let request = ScoringRequest::new("u0", profile.liked.clone(), pool.clone(), n * 2);
    let source_scores = vec![
        (ScoreSource::Content, content.score(&request)),
        (ScoreSource::Popularity, popularity.score(&request)),
    ];

    let adjustment = DiversityAdjustment {
        profile: &profile,
        catalog: &catalog,
        boost: 0.5,
    };
    let blended = HybridBlender::default().blend_all(&pool, &source_scores, Some(&adjustment));
    assert_eq!(blended.len(), pool.len());
    assert!(blended.windows(2).all(|w| w[0].score >= w[1].score));

    let (top, overflow) = blended.split_at(n);
    let context = TransformContext::new(&catalog)
        .with_profile(Some(&profile))
        .with_candidates(overflow);
    let out = full_pipeline(&catalog).apply(top.to_vec(), &context).unwrap();

    assert!(out.len() <= n);
    assert!(out.iter().all(|r| r.score.is_finite()));
    assert!(out.iter().all(|r| !profile.listened.contains(&r.track_id)));

    let mut unique: Vec<&str> = out.iter().map(|r| r.track_id.as_str()).collect();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), out.len());
}

#[test]
fn test_cold_start_listener() {
    let catalog = create_test_catalog();
    let mut popularity = PopularityScorer::new();
    popularity.fit(catalog.interactions()).unwrap();

    let pool = catalog.all_track_ids();
    let request = ScoringRequest::new("newcomer", vec![], pool.clone(), 10);
    let source_scores = vec![(ScoreSource::Popularity, popularity.score(&request))];
    let blended = HybridBlender::default().blend(&pool, &source_scores, None, 5);
    assert_eq!(blended.len(), 5);

    // No profile: injection is skipped, everything else still runs
    let context = TransformContext::new(&catalog);
    let out = full_pipeline(&catalog).apply(blended, &context).unwrap();
    assert_eq!(out.len(), 5);
}

#[test]
fn test_exploration_after_debiasing() {
    let catalog = create_test_catalog();
    let blended = HybridBlender::default().blend_all(&catalog.all_track_ids(), &[], None);
    let (top, overflow) = blended.split_at(10);

    let pipeline = DebiasPipeline::new()
        .add_transform(FairnessEnforcer::new())
        .add_transform(
            Explorer::new(ExplorationStrategy::EpsilonGreedy { epsilon: 0.3 }).with_seed(42),
        );
    let context = TransformContext::new(&catalog).with_candidates(overflow);
    let out = pipeline.apply(top.to_vec(), &context).unwrap();

    assert_eq!(out.len(), 10);
    assert_eq!(out.iter().filter(|r| r.provenance.explored).count(), 3);
}

#[test]
fn test_empty_list_passes_through() {
    let catalog = create_test_catalog();
    let profile = build_user_profile(&catalog, "u1").unwrap();
    let context = TransformContext::new(&catalog).with_profile(Some(&profile));
    let out = full_pipeline(&catalog).apply(Vec::new(), &context).unwrap();
    assert!(out.is_empty());
}
