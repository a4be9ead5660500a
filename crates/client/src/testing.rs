//! Test doubles shared by the unit tests in this crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use edgecache_core::{BufferedEvent, CacheDb, Error, VersionTags};
use url::Url;

use crate::background::EventSink;
use crate::origin::Origin;
use crate::request::RequestDescriptor;
use crate::response::OriginResponse;
use crate::state::{ProxyOptions, ProxyState};

const BASE: &str = "https://app.example.com";

#[derive(Debug, Clone)]
pub enum Behavior {
    Respond { status: u16, body: &'static str, delay: Duration },
    Fail,
    Hang,
}

/// Scripted origin. Unscripted URLs fail like an unreachable network.
#[derive(Default)]
pub struct FakeOrigin {
    routes: Mutex<HashMap<String, Behavior>>,
    calls: AtomicUsize,
}

impl FakeOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, status: u16, body: &'static str) -> Self {
        self.set(url, Behavior::Respond { status, body, delay: Duration::ZERO });
        self
    }

    pub fn hang(self, url: &str) -> Self {
        self.set(url, Behavior::Hang);
        self
    }

    pub fn set(&self, url: &str, behavior: Behavior) {
        self.routes.lock().unwrap().insert(url.to_string(), behavior);
    }

    /// Take the whole network down.
    pub fn go_offline(&self) {
        for behavior in self.routes.lock().unwrap().values_mut() {
            *behavior = Behavior::Fail;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    async fn fetch(&self, req: &RequestDescriptor) -> Result<OriginResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.routes.lock().unwrap().get(req.url.as_str()).cloned();
        match behavior {
            Some(Behavior::Respond { status, body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let mut headers = BTreeMap::new();
                headers.insert("content-type".to_string(), "text/plain".to_string());
                Ok(OriginResponse { final_url: req.url.clone(), status, headers, body: Bytes::from_static(body.as_bytes()) })
            }
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Network("hung".into()))
            }
            Some(Behavior::Fail) | None => Err(Error::Network(format!("unreachable: {}", req.url))),
        }
    }
}

pub fn tags() -> VersionTags {
    VersionTags::new("edgecache", "v1", "v1")
}

/// In-memory proxy over a fake origin, with a short fetch timeout.
pub async fn proxy(origin: FakeOrigin) -> (ProxyState, Arc<FakeOrigin>) {
    proxy_with_tags(origin, tags()).await
}

pub async fn proxy_with_tags(origin: FakeOrigin, tags: VersionTags) -> (ProxyState, Arc<FakeOrigin>) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let origin = Arc::new(origin);
    let options = ProxyOptions {
        tags,
        fetch_timeout: Duration::from_millis(200),
        origin_base: Some(Url::parse(BASE).unwrap()),
    };
    (ProxyState::new(db, origin.clone(), options), origin)
}

pub fn get(url: &str) -> RequestDescriptor {
    RequestDescriptor::get(Url::parse(url).unwrap())
}

/// Event sink that records every batch and can be told to fail.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<(String, Vec<BufferedEvent>)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<(String, Vec<BufferedEvent>)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, tag: &str, events: &[BufferedEvent]) -> Result<(), Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Network("sink unreachable".into()));
        }
        self.batches.lock().unwrap().push((tag.to_string(), events.to_vec()));
        Ok(())
    }
}
