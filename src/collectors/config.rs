use crate::collectors::{Scraper, ScraperType, all_factories};
use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::sync::Arc;

/// The scrapers enabled at startup, built once and shared by every request.
#[derive(Clone, Debug, Default)]
pub struct ScraperSet {
    scrapers: Arc<Vec<Arc<ScraperType>>>,
}

impl ScraperSet {
    #[must_use]
    pub fn new(scrapers: Vec<ScraperType>) -> Self {
        Self {
            scrapers: Arc::new(scrapers.into_iter().map(Arc::new).collect()),
        }
    }

    /// Builds the scrapers named in `names`, in the order given.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let factories = all_factories();
        let scrapers = names
            .iter()
            .map(|name| {
                let factory = factories
                    .get(name.as_str())
                    .ok_or_else(|| anyhow!("unknown scraper '{name}'"))?;
                factory()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(scrapers))
    }

    /// Narrows the set down to the `collect[]` selectors of a request.
    ///
    /// No selectors means every enabled scraper. Unknown selectors match
    /// nothing and repeated ones have no extra effect.
    #[must_use]
    pub fn select(&self, selectors: &[String]) -> Vec<Arc<ScraperType>> {
        if selectors.is_empty() {
            return self.scrapers.as_ref().clone();
        }

        let wanted: HashSet<&str> = selectors.iter().map(String::as_str).collect();

        self.scrapers
            .iter()
            .filter(|s| wanted.contains(s.name()))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.scrapers.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}
