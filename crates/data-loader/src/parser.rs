//! JSON catalogue file parsing.
//!
//! Each catalogue file is a single JSON array:
//! - `tracks.json`: [`Track`] records
//! - `artists.json`: [`Artist`] records
//! - `interactions.json`: [`Interaction`] records

use crate::error::{DataLoadError, Result};
use crate::types::{Artist, Interaction, Track};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parse `tracks.json`
pub fn parse_tracks(path: &Path) -> Result<Vec<Track>> {
    read_json_array(path)
}

/// Parse `artists.json`
pub fn parse_artists(path: &Path) -> Result<Vec<Artist>> {
    read_json_array(path)
}

/// Parse `interactions.json`
pub fn parse_interactions(path: &Path) -> Result<Vec<Interaction>> {
    read_json_array(path)
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| DataLoadError::JsonError {
        file: path.display().to_string(),
        source,
    })
}
