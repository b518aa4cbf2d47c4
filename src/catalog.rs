//! Place catalog: the source of round targets.
//!
//! A catalog is a JSON document listing geotagged places. One is bundled into
//! the binary; players can point at their own file instead.

use crate::error::CatalogError;
use crate::geo::Coordinate;
use crate::round::RoundTarget;
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use log::warn;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

static PLACES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/places");

pub const DEFAULT_CATALOG: &str = "campus";

type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default, alias = "lng")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Place {
    /// Builds the round target for this place. A place without a complete
    /// coordinate yields a target with no location, which the engine treats
    /// as a blocked round.
    pub fn to_target(&self) -> Result<RoundTarget> {
        let location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)?),
            _ => {
                warn!("place {} has no coordinate, its round will be blocked", self.id);
                None
            }
        };
        Ok(RoundTarget {
            id: self.id,
            location,
            annotation: self.notes.clone().filter(|n| !n.trim().is_empty()),
            image: self.image_url.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub places: Vec<Place>,
}

impl Catalog {
    pub fn bundled(name: &str) -> Result<Self> {
        let file_name = format!("{name}.json");
        let file = PLACES_DIR
            .get_file(&file_name)
            .ok_or_else(|| CatalogError::MissingBundle(file_name.clone()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| CatalogError::MissingBundle(file_name.clone()))?;
        Self::from_json(contents)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        if let Some(dup) = catalog.places.iter().map(|p| p.id).duplicates().next() {
            return Err(CatalogError::DuplicatePlace(dup));
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    /// Picks `n` distinct places in random order.
    pub fn random_link<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<GameLink> {
        if n == 0 || n > self.places.len() {
            return Err(CatalogError::NotEnoughPlaces {
                wanted: n,
                available: self.places.len(),
            });
        }
        let mut ids: Vec<u32> = self.places.iter().map(|p| p.id).collect();
        ids.shuffle(rng);
        ids.truncate(n);
        Ok(GameLink { ids })
    }

    /// Resolves a link into round targets, in link order.
    pub fn targets_for(&self, link: &GameLink) -> Result<Vec<RoundTarget>> {
        link.ids
            .iter()
            .map(|&id| {
                self.get(id)
                    .ok_or(CatalogError::UnknownPlace(id))
                    .and_then(Place::to_target)
            })
            .collect()
    }
}

/// Hyphen-joined place ids that reproduce a session, e.g. `3-17-42-8-55`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLink {
    ids: Vec<u32>,
}

impl GameLink {
    pub fn new(ids: Vec<u32>) -> Result<Self> {
        if ids.is_empty() {
            return Err(CatalogError::BadLink("link has no places".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(CatalogError::BadLink(format!("place {dup} appears twice")));
        }
        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> String {
        format!("/play/{self}")
    }
}

impl fmt::Display for GameLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ids.iter().join("-"))
    }
}

/// Accepts `1-2-3` as well as `/play/1-2-3`.
impl FromStr for GameLink {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let hash = trimmed.strip_prefix("/play/").unwrap_or(trimmed);
        let ids = hash
            .split('-')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| CatalogError::BadLink(s.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(ids)
    }
}
