//! Request-side machinery for edgecache.
//!
//! [`ProxyState::dispatch`] is the entry point: it classifies a request with
//! the [`router`], runs the chosen [`Strategy`] against the store and origin,
//! and always produces a response. Lifecycle, background jobs, and
//! notifications hang off the same [`ProxyState`].

pub mod background;
pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod origin;
pub mod request;
pub mod response;
pub mod router;
pub mod state;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use background::{
    BackgroundConfig, BackgroundTasks, EventQueue, EventSink, EventSync, ExpirySweep, HttpEventSink, SyncTrigger,
};
pub use fetch::{FetchClient, FetchConfig};
pub use lifecycle::{LifecycleController, Phase};
pub use notify::{DisplayRequest, NotificationHook, NotificationHost, PushPayload};
pub use origin::Origin;
pub use request::RequestDescriptor;
pub use response::{OriginResponse, ProxyResponse, ResponseSource, SENTINEL_HEADER};
pub use state::{ProxyOptions, ProxyState};
pub use strategy::Strategy;
