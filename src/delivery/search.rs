//! Debounced address search where only the newest query may deliver results.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::services::geocoding::{GeocodeCandidate, Geocoder};

/// Queries this short never reach the geocoder.
pub const MIN_QUERY_CHARS: usize = 3;

/// Hands out request tokens; issuing a new one invalidates all earlier ones.
#[derive(Debug, Clone, Default)]
pub struct LatestWins {
    current: Arc<Mutex<u64>>,
}

#[derive(Debug, Clone)]
pub struct RequestToken {
    id: u64,
    current: Arc<Mutex<u64>>,
}

impl LatestWins {
    pub fn issue(&self) -> RequestToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        RequestToken {
            id: *current,
            current: self.current.clone(),
        }
    }

    /// Invalidate whatever is in flight without starting anything new.
    pub fn invalidate(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

impl RequestToken {
    pub fn is_current(&self) -> bool {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) == self.id
    }

    /// Runs `deliver` only while this token is still the newest. No token can
    /// be issued between the check and the delivery.
    pub fn deliver_if_current(&self, deliver: impl FnOnce()) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != self.id {
            return false;
        }
        deliver();
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchUpdate {
    Suggestions {
        query: String,
        candidates: Vec<GeocodeCandidate>,
    },
    /// Transient failure; the input stays editable and nothing is retried.
    Failed { query: String, message: String },
}

pub fn is_searchable(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_CHARS
}

pub struct DebouncedSearch {
    geocoder: Arc<dyn Geocoder>,
    debounce: Duration,
    tokens: LatestWins,
    updates: mpsc::UnboundedSender<SearchUpdate>,
}

impl DebouncedSearch {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SearchUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let search = Self {
            geocoder,
            debounce,
            tokens: LatestWins::default(),
            updates,
        };
        (search, rx)
    }

    /// Register a keystroke. Earlier pending or in-flight queries are superseded.
    pub fn input(&self, query: &str) {
        let token = self.tokens.issue();
        let query = query.trim().to_string();

        if !is_searchable(&query) {
            let _ = self.updates.send(SearchUpdate::Suggestions {
                query,
                candidates: Vec::new(),
            });
            return;
        }

        let geocoder = self.geocoder.clone();
        let updates = self.updates.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !token.is_current() {
                return;
            }

            let result = geocoder.search(&query).await;
            if !token.is_current() {
                tracing::debug!(query = %query, "Discarding stale search result");
                return;
            }

            let update = match result {
                Ok(candidates) => SearchUpdate::Suggestions { query, candidates },
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Address search failed");
                    SearchUpdate::Failed {
                        query,
                        message: "Address search is unavailable right now. Please try again."
                            .to_string(),
                    }
                }
            };
            let delivered = token.deliver_if_current(|| {
                let _ = updates.send(update);
            });
            if !delivered {
                tracing::debug!("Discarding search result superseded while building it");
            }
        });
    }

    pub fn cancel(&self) {
        self.tokens.invalidate();
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.tokens.invalidate();
    }
}
