//! Roster collaborator: generates and holds the entrants of a race.

use crate::config::{RaceConfig, ENTRANT_COLORS, FALLBACK_COLOR};
use crate::rng::{RandomSource, RngFactory};
use crate::types::{Entrant, EntrantId};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

const ADJECTIVES: [&str; 16] = [
    "Swift", "Brave", "Lucky", "Quiet", "Wild", "Golden", "Noble", "Rapid",
    "Silent", "Proud", "Gentle", "Bold", "Clever", "Mighty", "Restless", "Shy",
];

const COAT_WORDS: [&str; 12] = [
    "Bay", "Chestnut", "Sorrel", "Ebony", "Silver", "Amber",
    "Crimson", "Ivory", "Copper", "Onyx", "Dapple", "Ash",
];

/// Read access to the current roster.
pub trait RosterProvider: Send + Sync {
    /// Returns every entrant, ordered by id.
    fn list_all(&self) -> Vec<Entrant>;
}

impl RosterProvider for Vec<Entrant> {
    fn list_all(&self) -> Vec<Entrant> {
        self.clone()
    }
}

/// In-memory roster generated from a random stream.
pub struct RosterStore {
    entrants: RwLock<Vec<Entrant>>,
    rng_factory: Arc<dyn RngFactory>,
    size: usize,
}

impl RosterStore {
    /// Creates an empty roster.
    pub fn new(rng_factory: Arc<dyn RngFactory>, config: &RaceConfig) -> Self {
        Self {
            entrants: RwLock::new(Vec::new()),
            rng_factory,
            size: config.roster_size,
        }
    }

    /// Replaces the roster with a freshly generated one and returns it.
    ///
    /// Conditions are drawn first, one per entrant in id order
    /// (`1 + floor(rng() * 100)`); names are drawn afterwards from the same
    /// stream, so they never shift a condition.
    pub fn generate(&self) -> Vec<Entrant> {
        let mut rng = self.rng_factory.create();

        let conditions: Vec<u8> = (0..self.size)
            .map(|_| condition_from(rng.next_f64()))
            .collect();

        let entrants: Vec<Entrant> = conditions
            .into_iter()
            .enumerate()
            .map(|(i, condition)| Entrant {
                id: (i + 1) as EntrantId,
                name: entrant_name(rng.as_mut()),
                color: ENTRANT_COLORS.get(i).copied().unwrap_or(FALLBACK_COLOR).to_string(),
                condition,
            })
            .collect();

        debug!(count = entrants.len(), "roster generated");
        *self.entrants.write().unwrap_or_else(PoisonError::into_inner) = entrants.clone();
        entrants
    }

    /// Empties the roster.
    pub fn reset(&self) {
        self.entrants.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Looks up an entrant by id.
    pub fn get(&self, id: EntrantId) -> Option<Entrant> {
        self.entrants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Number of entrants currently on the roster.
    pub fn len(&self) -> usize {
        self.entrants.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no roster has been generated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RosterProvider for RosterStore {
    fn list_all(&self) -> Vec<Entrant> {
        self.entrants.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn condition_from(draw: f64) -> u8 {
    (1.0 + (draw * 100.0).floor()).clamp(1.0, 100.0) as u8
}

fn entrant_name(rng: &mut (dyn RandomSource + Send)) -> String {
    let adjective = ADJECTIVES[index_from(rng.next_f64(), ADJECTIVES.len())];
    let coat = COAT_WORDS[index_from(rng.next_f64(), COAT_WORDS.len())];
    format!("{adjective} {coat}")
}

fn index_from(draw: f64, len: usize) -> usize {
    ((draw * len as f64).floor() as usize).min(len - 1)
}
