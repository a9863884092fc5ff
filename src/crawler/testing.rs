//! In-process fetch sessions serving scripted pages

use crate::crawler::{FetchError, FetchSession, SessionFactory};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fake catalog: pages by URL, plus URLs that fail or panic on navigation
#[derive(Debug, Default)]
pub(crate) struct ScriptedSite {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    pub fn panicking(mut self, url: impl Into<String>) -> Self {
        self.panicking.insert(url.into());
        self
    }

    pub fn into_factory(self) -> ScriptedFactory {
        ScriptedFactory {
            site: Arc::new(self),
            visits: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Opens [`ScriptedSession`]s and counts their lifecycle
pub(crate) struct ScriptedFactory {
    site: Arc<ScriptedSite>,
    pub visits: Arc<Mutex<Vec<String>>>,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn session(&self) -> ScriptedSession {
        self.opened.fetch_add(1, Ordering::SeqCst);
        ScriptedSession {
            site: Arc::clone(&self.site),
            visits: Arc::clone(&self.visits),
            released: Arc::clone(&self.released),
            current: None,
        }
    }

    pub fn visited(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> Result<Box<dyn FetchSession>, FetchError> {
        Ok(Box::new(self.session()))
    }
}

pub(crate) struct ScriptedSession {
    site: Arc<ScriptedSite>,
    visits: Arc<Mutex<Vec<String>>>,
    released: Arc<AtomicUsize>,
    current: Option<String>,
}

#[async_trait]
impl FetchSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.current = None;
        self.visits.lock().unwrap().push(url.to_string());

        if self.site.panicking.contains(url) {
            panic!("scripted session crashed on {}", url);
        }
        if self.site.failing.contains(url) {
            return Err(FetchError::Navigation {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }

        match self.site.pages.get(url) {
            Some(body) => {
                self.current = Some(body.clone());
                Ok(())
            }
            None => Err(FetchError::Navigation {
                url: url.to_string(),
                message: "HTTP 404".to_string(),
            }),
        }
    }

    async fn wait_for_ready(&mut self, _timeout: Duration) -> Result<(), FetchError> {
        match self.current {
            Some(_) => Ok(()),
            None => Err(FetchError::NoPage),
        }
    }

    async fn try_reveal_more(&mut self) -> bool {
        false
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        self.current.clone().ok_or(FetchError::NoPage)
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renders a listing page linking to the given item paths
pub(crate) fn listing_page(item_paths: &[String]) -> String {
    let links: String = item_paths
        .iter()
        .map(|p| format!(r#"<a class="bookTitle" href="{}">Book</a>"#, p))
        .collect();
    format!("<html><body>{}</body></html>", links)
}

/// Renders an item page carrying title, author and a description of `description_len` chars
pub(crate) fn item_page(title: &str, author: &str, description_len: usize) -> String {
    format!(
        r#"<html><body>
             <h1 data-testid="bookTitle">{}</h1>
             <span data-testid="name">{}</span>
             <div data-testid="reviewHeader"><div>4.10</div></div>
             <div data-testid="description"><span>{}</span></div>
           </body></html>"#,
        title,
        author,
        "d".repeat(description_len)
    )
}
