//! Listening-context weighting.
//!
//! A listener may say what they are doing right now: a mood, an activity
//! and a time of day. Each one multiplies a track's score by the boosts
//! whose audio conditions the track meets, e.g. a calm mood rewards low
//! energy (×1.4) and high acousticness (×1.3). Tracks without audio
//! features, and requests without a context, are left alone.

use crate::traits::{Transform, TransformContext};
use anyhow::Result;
use chrono::{Local, Timelike};
use data_loader::{sort_by_score, AudioFeatures, Recommendation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Sad,
    Energetic,
    Calm,
    Focused,
    Party,
    Romantic,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Working,
    Exercising,
    Studying,
    Relaxing,
    Commuting,
    Socializing,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    /// 5-11 morning, 12-16 day, 17-21 evening, otherwise night
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Day,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// From the local wall clock
    pub fn now() -> Self {
        Self::from_hour(Local::now().hour())
    }
}

fn parse_named<T: Copy>(value: &str, names: &[(&str, T)], what: &str) -> Result<T, String> {
    let wanted = value.trim().to_ascii_lowercase();
    names
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|&(_, variant)| variant)
        .ok_or_else(|| format!("unknown {what} {value:?}"))
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Mood::*;
        parse_named(
            s,
            &[
                ("happy", Happy),
                ("sad", Sad),
                ("energetic", Energetic),
                ("calm", Calm),
                ("focused", Focused),
                ("party", Party),
                ("romantic", Romantic),
                ("neutral", Neutral),
            ],
            "mood",
        )
    }
}

impl FromStr for Activity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Activity::*;
        parse_named(
            s,
            &[
                ("working", Working),
                ("exercising", Exercising),
                ("studying", Studying),
                ("relaxing", Relaxing),
                ("commuting", Commuting),
                ("socializing", Socializing),
                ("general", General),
            ],
            "activity",
        )
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use TimeOfDay::*;
        parse_named(
            s,
            &[("morning", Morning), ("day", Day), ("evening", Evening), ("night", Night)],
            "time of day",
        )
    }
}

/// Product of the factors whose condition holds
fn boost(rules: &[(bool, f32)]) -> f32 {
    rules
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, factor)| factor)
        .product()
}

fn between(value: f32, low: f32, high: f32) -> bool {
    value > low && value < high
}

fn mood_weight(mood: Mood, a: &AudioFeatures) -> f32 {
    match mood {
        Mood::Happy => boost(&[(a.valence > 0.7, 1.3), (a.energy > 0.6, 1.2), (a.danceability > 0.7, 1.1)]),
        Mood::Sad => boost(&[(a.valence < 0.4, 1.3), (a.acousticness > 0.6, 1.2), (a.energy < 0.4, 1.1)]),
        Mood::Energetic => boost(&[(a.energy > 0.8, 1.4), (a.tempo > 120.0, 1.3), (a.danceability > 0.8, 1.2)]),
        Mood::Calm => boost(&[
            (a.energy < 0.3, 1.4),
            (a.acousticness > 0.8, 1.3),
            (a.instrumentalness > 0.6, 1.2),
        ]),
        Mood::Focused => boost(&[
            (a.instrumentalness > 0.7, 1.4),
            (a.speechiness < 0.1, 1.3),
            (between(a.energy, 0.4, 0.7), 1.2),
        ]),
        Mood::Party => boost(&[(a.danceability > 0.8, 1.4), (a.energy > 0.8, 1.3), (a.valence > 0.7, 1.2)]),
        Mood::Romantic => boost(&[
            (between(a.valence, 0.5, 0.8), 1.3),
            (a.acousticness > 0.6, 1.2),
            (between(a.energy, 0.3, 0.6), 1.1),
        ]),
        Mood::Neutral => 1.0,
    }
}

fn activity_weight(activity: Activity, a: &AudioFeatures) -> f32 {
    match activity {
        Activity::Working => boost(&[
            (a.instrumentalness > 0.8, 1.4),
            (a.speechiness < 0.05, 1.3),
            (between(a.energy, 0.3, 0.6), 1.2),
        ]),
        Activity::Exercising => boost(&[(a.energy > 0.8, 1.4), (a.tempo > 120.0, 1.3), (a.danceability > 0.7, 1.2)]),
        Activity::Studying => boost(&[
            (a.instrumentalness > 0.9, 1.4),
            (a.speechiness < 0.05, 1.3),
            (a.energy < 0.4, 1.2),
        ]),
        Activity::Relaxing => boost(&[(a.energy < 0.3, 1.4), (a.acousticness > 0.8, 1.3), (a.tempo < 100.0, 1.2)]),
        Activity::Commuting => boost(&[(a.energy > 0.5, 1.3), (a.danceability > 0.6, 1.2), (a.valence > 0.5, 1.1)]),
        Activity::Socializing => boost(&[(a.danceability > 0.7, 1.4), (a.valence > 0.6, 1.3), (a.energy > 0.6, 1.2)]),
        Activity::General => 1.0,
    }
}

fn time_weight(time_of_day: TimeOfDay, a: &AudioFeatures) -> f32 {
    match time_of_day {
        TimeOfDay::Morning => boost(&[(a.energy > 0.6, 1.3), (a.valence > 0.6, 1.2), (a.tempo > 100.0, 1.1)]),
        TimeOfDay::Day => boost(&[(between(a.energy, 0.4, 0.7), 1.1)]),
        TimeOfDay::Evening => boost(&[(a.valence > 0.5, 1.2), (a.danceability > 0.6, 1.1)]),
        TimeOfDay::Night => boost(&[(a.energy < 0.4, 1.3), (a.acousticness > 0.6, 1.2), (a.tempo < 90.0, 1.1)]),
    }
}

/// What the listener is doing at request time; every part is optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListeningContext {
    pub mood: Option<Mood>,
    pub activity: Option<Activity>,
    pub time_of_day: Option<TimeOfDay>,
}

impl ListeningContext {
    pub fn is_empty(&self) -> bool {
        self.mood.is_none() && self.activity.is_none() && self.time_of_day.is_none()
    }

    /// Score multiplier for a track with these audio features
    pub fn weight(&self, audio: &AudioFeatures) -> f32 {
        self.mood.map_or(1.0, |m| mood_weight(m, audio))
            * self.activity.map_or(1.0, |a| activity_weight(a, audio))
            * self.time_of_day.map_or(1.0, |t| time_weight(t, audio))
    }

    /// Blend of the three weights (0.4 mood, 0.4 activity, 0.2 time), for
    /// explaining how well one track fits
    pub fn fit_score(&self, audio: &AudioFeatures) -> f32 {
        0.4 * self.mood.map_or(1.0, |m| mood_weight(m, audio))
            + 0.4 * self.activity.map_or(1.0, |a| activity_weight(a, audio))
            + 0.2 * self.time_of_day.map_or(1.0, |t| time_weight(t, audio))
    }
}

/// Reweights the list by the request's [`ListeningContext`]
#[derive(Debug, Clone, Default)]
pub struct ContextWeighter;

impl ContextWeighter {
    pub fn new() -> Self {
        Self
    }
}

impl Transform for ContextWeighter {
    fn name(&self) -> &str {
        "ContextWeighter"
    }

    #[instrument(skip_all, fields(count = recommendations.len()))]
    fn apply(
        &self,
        mut recommendations: Vec<Recommendation>,
        context: &TransformContext<'_>,
    ) -> Result<Vec<Recommendation>> {
        let Some(listening) = context.listening.filter(|l| !l.is_empty()) else {
            return Ok(recommendations);
        };

        let mut reweighted = 0;
        for rec in &mut recommendations {
            let Some(audio) = context.catalog.get_track(&rec.track_id).and_then(|t| t.audio.as_ref()) else {
                continue;
            };
            let weight = listening.weight(audio);
            if weight != 1.0 {
                rec.provenance.original_score.get_or_insert(rec.score);
                rec.score *= weight;
                reweighted += 1;
            }
        }
        debug!("Context reweighted {} entries", reweighted);

        sort_by_score(&mut recommendations);
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_catalog, ids, recs, track};

    fn audio(id: &str, energy: f32) -> AudioFeatures {
        track(id, "a", 50, "pop", energy).audio.unwrap()
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Day);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Calm".parse::<Mood>(), Ok(Mood::Calm));
        assert_eq!(" exercising ".parse::<Activity>(), Ok(Activity::Exercising));
        assert_eq!("night".parse::<TimeOfDay>(), Ok(TimeOfDay::Night));
        assert!("grumpy".parse::<Mood>().is_err());
    }

    #[test]
    fn test_weights_multiply() {
        // energy 0.9, danceability 0.9, valence 0.5, acousticness 0.1, tempo 120
        let loud = audio("loud", 0.9);

        let happy = ListeningContext {
            mood: Some(Mood::Happy),
            ..Default::default()
        };
        assert!((happy.weight(&loud) - 1.32).abs() < 1e-5);

        let happy_workout = ListeningContext {
            activity: Some(Activity::Exercising),
            ..happy
        };
        assert!((happy_workout.weight(&loud) - 1.32 * 1.68).abs() < 1e-4);

        let neutral = ListeningContext {
            mood: Some(Mood::Neutral),
            activity: Some(Activity::General),
            time_of_day: None,
        };
        assert_eq!(neutral.weight(&loud), 1.0);
        assert!((happy.fit_score(&loud) - (0.4 * 1.32 + 0.6)).abs() < 1e-5);
    }

    #[test]
    fn test_calm_listener_gets_quiet_tracks_first() {
        let catalog = create_test_catalog();
        let listening = ListeningContext {
            mood: Some(Mood::Calm),
            ..Default::default()
        };
        let context = TransformContext::new(&catalog).with_listening(Some(&listening));
        let list = recs(&[("hit1", 0.9), ("deep2", 0.6), ("deep1", 0.5)]);

        let out = ContextWeighter::new().apply(list, &context).unwrap();

        // deep2: low energy and acoustic, 0.6 * 1.82; deep1: low energy only, 0.5 * 1.4
        assert_eq!(ids(&out), vec!["deep2", "hit1", "deep1"]);
        assert!((out[0].score - 1.092).abs() < 1e-5);
        assert_eq!(out[0].provenance.original_score, Some(0.6));
        assert_eq!(out[1].provenance.original_score, None);
        assert!((out[2].score - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_without_context_is_identity() {
        let catalog = create_test_catalog();
        let list = recs(&[("deep2", 0.9), ("hit1", 0.6)]);

        let out = ContextWeighter::new()
            .apply(list.clone(), &TransformContext::new(&catalog))
            .unwrap();
        assert_eq!(out, list);

        let empty = ListeningContext::default();
        let context = TransformContext::new(&catalog).with_listening(Some(&empty));
        assert_eq!(ContextWeighter::new().apply(list.clone(), &context).unwrap(), list);
    }
}
