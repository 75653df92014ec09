use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{Catalog, Recommendation, Track, UserId, build_user_profile};
use rand::seq::IndexedRandom;
use server::{
    Activity, EngineConfig, ListeningContext, Mood, RecommendationOrchestrator,
    RecommendationRequest, TimeOfDay,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// TuneRecs - Hybrid Music Recommendation Engine
#[derive(Parser)]
#[command(name = "tune-recs")]
#[command(about = "Music recommendations blended from collaborative, content and popularity signals, then debiased", long_about = None)]
struct Cli {
    /// Directory holding tracks.json, artists.json and interactions.json
    #[arg(short, long, default_value = "data/catalog")]
    data_dir: PathBuf,

    /// TOML config file (falls back to $TUNE_RECS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get track recommendations for a listener
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations (default from config)
        #[arg(long)]
        limit: Option<usize>,

        /// How hard to push away from the listener's usual taste, in [0, 1]
        #[arg(long)]
        diversity_boost: Option<f32>,

        /// Current mood, e.g. calm or party
        #[arg(long)]
        mood: Option<Mood>,

        /// Current activity, e.g. studying or exercising
        #[arg(long)]
        activity: Option<Activity>,

        /// morning, day, evening, night, or "now" for the local clock
        #[arg(long, value_parser = parse_time_of_day)]
        time_of_day: Option<TimeOfDay>,

        /// Show the score breakdown and debiasing flags
        #[arg(long)]
        explain: bool,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a listener's taste profile
    Profile {
        #[arg(long)]
        user_id: UserId,
    },

    /// Search tracks by title or artist
    Search {
        /// Case-insensitive substring
        #[arg(long)]
        query: String,
    },

    /// Tracks that sound like a given track
    Similar {
        #[arg(long)]
        track_id: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Hold out part of a listener's liked tracks and score a list against them
    Evaluate {
        #[arg(long)]
        user_id: UserId,

        #[arg(long, default_value = "10")]
        limit: usize,

        /// Fraction of liked tracks held out as ground truth
        #[arg(long, default_value = "0.2")]
        holdout: f32,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();
    info!(
        cache_ttl = config.cache.ttl_seconds,
        exploration = config.exploration.enabled,
        "Configuration resolved"
    );

    println!("Loading catalogue from {}...", cli.data_dir.display());
    let start = Instant::now();
    let catalog = Arc::new(
        Catalog::load_from_dir(&cli.data_dir).context("Failed to load catalogue")?,
    );
    let (tracks, artists, interactions) = catalog.counts();
    println!(
        "{} Loaded {} tracks, {} artists, {} interactions in {:?}",
        "✓".green(),
        tracks,
        artists,
        interactions,
        start.elapsed()
    );

    match cli.command {
        Commands::Recommend {
            user_id,
            limit,
            diversity_boost,
            mood,
            activity,
            time_of_day,
            explain,
            json,
        } => {
            let listening = ListeningContext {
                mood,
                activity,
                time_of_day,
            };
            let orchestrator = RecommendationOrchestrator::new(catalog, config).await?;
            handle_recommend(
                &orchestrator,
                user_id,
                limit,
                diversity_boost,
                listening,
                explain,
                json,
            )
            .await?
        }
        Commands::Profile { user_id } => handle_profile(&catalog, &user_id)?,
        Commands::Search { query } => handle_search(&catalog, &query),
        Commands::Similar { track_id, limit } => {
            let orchestrator = RecommendationOrchestrator::new(catalog, config).await?;
            handle_similar(&orchestrator, &track_id, limit)?
        }
        Commands::Evaluate {
            user_id,
            limit,
            holdout,
        } => {
            let orchestrator = RecommendationOrchestrator::new(catalog, config).await?;
            let report = orchestrator.evaluate_holdout(&user_id, limit, holdout).await?;
            println!("{}", report.to_json_pretty()?);
        }
        Commands::Benchmark { requests } => {
            let orchestrator = RecommendationOrchestrator::new(catalog, config).await?;
            handle_benchmark(orchestrator, requests).await?
        }
    }

    Ok(())
}

fn parse_time_of_day(value: &str) -> Result<TimeOfDay, String> {
    if value.eq_ignore_ascii_case("now") {
        Ok(TimeOfDay::now())
    } else {
        value.parse()
    }
}

async fn handle_recommend(
    orchestrator: &RecommendationOrchestrator,
    user_id: UserId,
    limit: Option<usize>,
    diversity_boost: Option<f32>,
    listening: ListeningContext,
    explain: bool,
    json: bool,
) -> Result<()> {
    let mut request = RecommendationRequest::new(user_id.clone());
    request.limit = limit;
    request.diversity_boost = diversity_boost;
    if !listening.is_empty() {
        request = request.with_context(listening);
    }

    let recommendations = orchestrator.get_recommendations(request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("Recommendations for {}:", user_id).bold().blue()
    );
    print_recommendations(orchestrator.catalog(), &recommendations, explain);
    Ok(())
}

fn handle_profile(catalog: &Catalog, user_id: &str) -> Result<()> {
    let profile = build_user_profile(catalog, user_id)
        .with_context(|| format!("No listening history for {}", user_id))?;

    println!("{}", format!("Listener: {}", user_id).bold().blue());
    println!("{}Tracks heard: {}", "• ".green(), profile.listened.len());
    println!("{}Tracks liked: {}", "• ".green(), profile.liked.len());
    println!("{}Average rating: {:.2}", "• ".cyan(), profile.avg_rating);
    println!(
        "{}Average popularity: {:.1} (variance {:.1})",
        "• ".cyan(),
        profile.avg_popularity,
        profile.popularity_variance
    );
    if let Some(year) = profile.avg_release_year {
        println!("{}Average release year: {:.0}", "• ".cyan(), year);
    }

    println!("Top genres:");
    for (genre, count) in profile.top_genres(5) {
        println!("  - {} ({} tracks)", genre, count);
    }

    println!("Audio preferences:");
    for (attribute, stats) in &profile.audio_preferences {
        println!(
            "  - {}: {:.2} ± {:.2}",
            attribute.as_str(),
            stats.mean,
            stats.std
        );
    }

    let mut top_rated: Vec<_> = catalog.get_user_interactions(user_id).iter().collect();
    top_rated.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(std::cmp::Ordering::Equal));
    println!("Top rated tracks:");
    for interaction in top_rated.iter().take(5) {
        if let Some(track) = catalog.get_track(&interaction.track_id) {
            println!(
                "  - {} by {} (rating: {})",
                track.name, track.artist_name, interaction.rating
            );
        }
    }
    Ok(())
}

fn handle_search(catalog: &Catalog, query: &str) {
    let needle = query.to_lowercase();

    // (exact match rank, popularity, track)
    let mut matches: Vec<(u8, u8, &Track)> = catalog
        .tracks()
        .filter_map(|track| {
            let name = track.name.to_lowercase();
            let artist = track.artist_name.to_lowercase();
            if name == needle || artist == needle {
                Some((0, track.popularity, track))
            } else if name.contains(&needle) || artist.contains(&needle) {
                Some((1, track.popularity, track))
            } else {
                None
            }
        })
        .collect();
    matches.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.id.cmp(&b.2.id))
    });

    println!("{}", format!("Search results for '{}':", query).bold().blue());
    if matches.is_empty() {
        println!("  (no matches)");
    }
    for (_, popularity, track) in matches.iter().take(20) {
        println!(
            "{}: {} by {} [{}] popularity {}",
            track.id,
            track.name,
            track.artist_name,
            genres_of(track),
            popularity
        );
    }
}

fn handle_similar(orchestrator: &RecommendationOrchestrator, track_id: &str, limit: usize) -> Result<()> {
    let catalog = orchestrator.catalog();
    let seed = catalog
        .get_track(track_id)
        .ok_or_else(|| anyhow!("Track {} not found", track_id))?;
    let similar = orchestrator.similar_tracks(track_id, limit)?;

    println!(
        "{}",
        format!("Tracks similar to {} by {}:", seed.name, seed.artist_name)
            .bold()
            .blue()
    );
    print_recommendations(catalog, &similar, false);
    Ok(())
}

async fn handle_benchmark(orchestrator: RecommendationOrchestrator, requests: usize) -> Result<()> {
    if requests == 0 {
        bail!("benchmark needs at least one request");
    }
    let users = orchestrator.catalog().user_ids();
    if users.is_empty() {
        bail!("catalogue has no listeners to benchmark with");
    }

    let user_ids: Vec<UserId> = {
        let mut rng = rand::rng();
        (0..requests)
            .filter_map(|_| users.choose(&mut rng).cloned())
            .collect()
    };

    let wall_clock = Instant::now();
    let mut handles = vec![];
    for user in user_ids {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let start = Instant::now();
            orchestrator
                .get_recommendations(RecommendationRequest::new(user))
                .await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(handles.len());
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall_clock.elapsed();

    timings.sort();
    let percentile = |p: f32| timings[((timings.len() as f32 * p) as usize).min(timings.len() - 1)];
    let avg_latency = timings.iter().sum::<Duration>() / timings.len() as u32;

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {}", timings.len());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!(
        "Throughput: {:.2} requests/second",
        timings.len() as f32 / total_time.as_secs_f32()
    );
    println!("Cached lists: {}", orchestrator.cache().len());
    Ok(())
}

fn genres_of(track: &Track) -> String {
    track.genres.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn print_recommendations(catalog: &Catalog, recommendations: &[Recommendation], explain: bool) {
    if recommendations.is_empty() {
        println!("  (nothing to recommend)");
        return;
    }

    for (i, rec) in recommendations.iter().enumerate() {
        let rank = (i + 1).to_string().green();
        match catalog.get_track(&rec.track_id) {
            Some(track) => println!(
                "{}. {} by {} ({}) [{}] - Score: {:.3}",
                rank,
                track.name,
                track.artist_name,
                track
                    .release_year()
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "????".to_string()),
                genres_of(track),
                rec.score
            ),
            None => println!("{}. {} - Score: {:.3}", rank, rec.track_id, rec.score),
        }

        if explain {
            let p = &rec.provenance;
            println!(
                "   collaborative {:.3} + content {:.3} + popularity {:.3} + diversity {:.3}",
                p.collaborative, p.content, p.popularity, p.diversity
            );
            if let Some(original) = p.original_score {
                println!("   score before debiasing: {:.3}", original);
            }
            let flags: Vec<&str> = [
                (p.injected, "injected"),
                (p.explored, "explored"),
                (p.needs_niche_replacement, "needs niche replacement"),
                (p.needs_bias_correction, "bias corrected"),
            ]
            .into_iter()
            .filter_map(|(set, label)| set.then_some(label))
            .collect();
            if !flags.is_empty() {
                println!("   {}", flags.join(", ").yellow());
            }
        }
    }
}
