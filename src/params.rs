//! Keeps the selection in the URL query string.
//!
//! The query string is the source of truth: setters compute the next URL and
//! navigate to it, and every navigation re-reads the recognized parameters and
//! republishes only those whose value changed.

use crate::types::{Level, Selection};
use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct ParamSync {
    // Every pair of the current query, recognized or not, in URL order.
    pairs: Vec<(String, String)>,
    levels: [watch::Sender<String>; 5],
    selection: watch::Sender<Selection>,
}

impl Default for ParamSync {
    fn default() -> Self {
        ParamSync {
            pairs: Vec::new(),
            levels: std::array::from_fn(|_| watch::channel(String::new()).0),
            selection: watch::channel(Selection::default()).0,
        }
    }
}

impl ParamSync {
    /// Initial load from a raw query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let mut sync = ParamSync::default();
        sync.navigate(query);
        sync
    }

    /// A navigation happened: re-read all recognized parameters and return the
    /// levels whose value changed.
    pub fn navigate(&mut self, query: &str) -> Vec<Level> {
        self.pairs = parse_query(query);
        let selection = read_selection(&self.pairs);

        let mut changed = Vec::new();
        for level in Level::ALL {
            let value = selection.get(level);
            let modified = self.levels[level as usize].send_if_modified(|current| {
                if current.as_str() != value {
                    *current = value.to_string();
                    true
                } else {
                    false
                }
            });
            if modified {
                changed.push(level);
            }
        }

        if !changed.is_empty() {
            debug!(?changed, "query parameters changed");
            self.selection.send_replace(selection);
        }
        changed
    }

    /// Pushes `value` for `level` into the URL and returns the new query.
    ///
    /// Ancestors and unrecognized parameters are kept; descendants are dropped
    /// since they belonged to the previous value.
    pub fn set(&mut self, level: Level, value: &str) -> Result<String> {
        let mut next = Selection::default();
        for ancestor in level.ancestors() {
            next.set_raw(ancestor, self.current(ancestor));
        }
        next.set_raw(level, value);

        let extra = self
            .pairs
            .iter()
            .filter(|(key, _)| Level::from_param(key).is_none())
            .cloned();
        let query = encode_pairs(selection_pairs(&next).chain(extra))?;

        self.navigate(&query);
        Ok(query)
    }

    pub fn set_country(&mut self, country: &str) -> Result<String> {
        self.set(Level::Country, country)
    }

    pub fn set_province(&mut self, province: &str) -> Result<String> {
        self.set(Level::Province, province)
    }

    pub fn set_district(&mut self, district: &str) -> Result<String> {
        self.set(Level::District, district)
    }

    pub fn set_municipality(&mut self, municipality: &str) -> Result<String> {
        self.set(Level::Municipality, municipality)
    }

    pub fn set_ward(&mut self, ward: &str) -> Result<String> {
        self.set(Level::Ward, ward)
    }

    /// First value of a parameter the selection does not use, e.g. `q`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    /// Removes a non-selection parameter from the URL state, returning its
    /// first value. Selection levels are left alone.
    pub fn take(&mut self, key: &str) -> Option<String> {
        if Level::from_param(key).is_some() {
            return None;
        }
        let value = self.param(key).map(str::to_string);
        self.pairs.retain(|(k, _)| k != key);
        value
    }

    pub fn current(&self, level: Level) -> String {
        self.levels[level as usize].borrow().clone()
    }

    pub fn selection(&self) -> Selection {
        self.selection.borrow().clone()
    }

    /// The current query string, without the leading `?`.
    pub fn query(&self) -> Result<String> {
        encode_pairs(self.pairs.iter().cloned())
    }

    pub fn subscribe(&self, level: Level) -> watch::Receiver<String> {
        self.levels[level as usize].subscribe()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }
}

/// Query string carrying exactly the non-empty levels of `selection`.
pub fn encode(selection: &Selection) -> Result<String> {
    encode_pairs(selection_pairs(selection))
}

fn selection_pairs(selection: &Selection) -> impl Iterator<Item = (String, String)> + '_ {
    Level::ALL.into_iter().filter_map(|level| {
        let value = selection.get(level);
        (!value.is_empty()).then(|| (level.as_param().to_string(), value.to_string()))
    })
}

fn encode_pairs(pairs: impl Iterator<Item = (String, String)>) -> Result<String> {
    let pairs: Vec<(String, String)> = pairs.collect();
    serde_urlencoded::to_string(&pairs).context("Failed to encode query string")
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    let query = query.trim_start_matches('?');
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(query, error = %e, "ignoring malformed query string");
            Vec::new()
        }
    }
}

/// First value of each recognized parameter; anything that is not a plain
/// identifier reads as empty.
fn read_selection(pairs: &[(String, String)]) -> Selection {
    let mut selection = Selection::default();
    for level in Level::ALL {
        let Some((_, value)) = pairs.iter().find(|(key, _)| key == level.as_param()) else {
            continue;
        };
        if is_identifier(value) {
            selection.set_raw(level, value.as_str());
        } else {
            warn!(%level, %value, "ignoring malformed parameter value");
        }
    }
    selection
}

fn is_identifier(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
