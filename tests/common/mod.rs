//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use url::Url;

use tab_shield::clock::ManualClock;
use tab_shield::config::ShieldConfig;
use tab_shield::error::DispatchError;
use tab_shield::guard::Guard;
use tab_shield::net::{Dispatch, OutboundRequest, OutboundResponse};
use tab_shield::observability::MemorySink;

/// Records every call instead of touching the network.
#[derive(Default)]
pub struct SpyDispatcher {
    calls: AtomicUsize,
    seen: Mutex<Vec<(Url, HeaderMap)>>,
}

impl SpyDispatcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<(Url, HeaderMap)> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Dispatch for SpyDispatcher {
    async fn send(&self, url: Url, request: OutboundRequest) -> Result<OutboundResponse, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((url, request.headers));
        Ok(OutboundResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: b"ok".to_vec(),
        })
    }
}

pub fn test_config() -> ShieldConfig {
    let mut config = ShieldConfig::default();
    config.app.base_url = "https://app.example.com".into();
    config.app.cookie_domain = "app.example.com".into();
    config.app.trusted_origins = vec!["api.example.com".into()];
    config.rate_limit.limit = 5;
    config.rate_limit.window_secs = 60;
    config
}

/// A guard wired to test doubles. Not yet initialized.
pub struct Harness {
    pub guard: Arc<Guard>,
    pub spy: Arc<SpyDispatcher>,
    pub sink: Arc<MemorySink>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(config: &ShieldConfig) -> Harness {
    let spy = Arc::new(SpyDispatcher::default());
    let sink = Arc::new(MemorySink::new());
    let clock = ManualClock::shared();
    let guard = Guard::builder(config)
        .dispatcher(spy.clone())
        .sink(sink.clone())
        .clock(clock.clone())
        .build()
        .expect("test config is valid");
    Harness {
        guard: Arc::new(guard),
        spy,
        sink,
        clock,
    }
}

/// Same as [`harness`], already active.
pub fn active_harness(config: &ShieldConfig) -> Harness {
    let h = harness(config);
    h.guard.initialize().expect("guard initializes");
    h
}
