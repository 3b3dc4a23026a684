//! Authority client seam
//!
//! The engine reaches the run authority only through [`AuthorityClient`].
//! Futures are boxed so the trait stays object safe and can be shared as
//! `Arc<dyn AuthorityClient>` across spawned tasks.
//!
//! [`LocalAuthorityClient`] serves an in-process [`RunAuthority`]. Payloads
//! and errors are pushed through their JSON wire form, so callers see exactly
//! what a remote client would: success bodies re-parsed, errors reduced to
//! [`WireError`] codes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cheerline_authority::RunAuthority;
use cheerline_core::{
    AudioRef, Error, Message, MessageId, NewMessage, NewRun, Result, Run, RunId, WireError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Boxed `Send` future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Client side of the run authority contract
pub trait AuthorityClient: Send + Sync {
    /// Create a run in `Created` state
    fn create_run(&self, new: NewRun) -> BoxFuture<'_, Result<Run>>;

    /// Fetch a run by id
    fn get_run(&self, run_id: RunId) -> BoxFuture<'_, Result<Run>>;

    /// Created -> Active
    fn start_run(&self, run_id: RunId) -> BoxFuture<'_, Result<Run>>;

    /// Active -> Completed
    fn complete_run(
        &self,
        run_id: RunId,
        distance_km: f64,
        duration_secs: u64,
    ) -> BoxFuture<'_, Result<Run>>;

    /// Append a message
    fn add_message(&self, run_id: RunId, new: NewMessage) -> BoxFuture<'_, Result<Message>>;

    /// All messages in threshold order
    fn list_messages(&self, run_id: RunId) -> BoxFuture<'_, Result<Vec<Message>>>;

    /// Set a message's played flag (idempotent)
    fn mark_message_played(
        &self,
        run_id: RunId,
        message_id: MessageId,
    ) -> BoxFuture<'_, Result<Message>>;

    /// Upload a clip and get its locator
    fn upload_audio(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<AudioRef>>;

    /// Binary retrieval of a clip
    fn fetch_audio(&self, locator: AudioRef) -> BoxFuture<'_, Result<Arc<Vec<u8>>>>;
}

/// Client over an in-process authority
#[derive(Clone)]
pub struct LocalAuthorityClient {
    authority: Arc<RunAuthority>,
    latency: Option<Duration>,
}

impl LocalAuthorityClient {
    /// Wrap an authority
    pub fn new(authority: Arc<RunAuthority>) -> Self {
        Self {
            authority,
            latency: None,
        }
    }

    /// Delay every response, to model a slow link
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The wrapped authority
    pub fn authority(&self) -> &Arc<RunAuthority> {
        &self.authority
    }

    fn respond<T, F>(&self, call: F) -> BoxFuture<'_, Result<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(&RunAuthority) -> Result<T> + Send + 'static,
    {
        let authority = Arc::clone(&self.authority);
        let latency = self.latency;
        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            over_wire(call(&authority))
        })
    }
}

/// Serialize a result the way the authority would answer it and parse it
/// back on the client side
fn over_wire<T>(result: Result<T>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    match result {
        Ok(value) => {
            let body = serde_json::to_vec(&value)
                .map_err(|e| Error::Internal(format!("response encoding failed: {}", e)))?;
            decode(&body)
        }
        Err(e) => {
            let body = serde_json::to_vec(&WireError::from(e))
                .map_err(|e| Error::Internal(format!("error encoding failed: {}", e)))?;
            let wire: WireError = decode(&body)?;
            Err(Error::from(wire))
        }
    }
}

/// Parse an authority response body. A body the client cannot read is the
/// authority's fault, not the caller's.
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Internal(format!("malformed response: {}", e)))
}

impl AuthorityClient for LocalAuthorityClient {
    fn create_run(&self, new: NewRun) -> BoxFuture<'_, Result<Run>> {
        self.respond(move |a| a.create_run(new))
    }

    fn get_run(&self, run_id: RunId) -> BoxFuture<'_, Result<Run>> {
        self.respond(move |a| a.get_run(&run_id))
    }

    fn start_run(&self, run_id: RunId) -> BoxFuture<'_, Result<Run>> {
        self.respond(move |a| a.start_run(&run_id))
    }

    fn complete_run(
        &self,
        run_id: RunId,
        distance_km: f64,
        duration_secs: u64,
    ) -> BoxFuture<'_, Result<Run>> {
        self.respond(move |a| a.complete_run(&run_id, distance_km, duration_secs))
    }

    fn add_message(&self, run_id: RunId, new: NewMessage) -> BoxFuture<'_, Result<Message>> {
        self.respond(move |a| a.add_message(&run_id, new))
    }

    fn list_messages(&self, run_id: RunId) -> BoxFuture<'_, Result<Vec<Message>>> {
        self.respond(move |a| a.list_messages(&run_id))
    }

    fn mark_message_played(
        &self,
        run_id: RunId,
        message_id: MessageId,
    ) -> BoxFuture<'_, Result<Message>> {
        self.respond(move |a| a.mark_message_played(&run_id, &message_id))
    }

    fn upload_audio(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<AudioRef>> {
        self.respond(move |a| a.upload_audio(bytes))
    }

    fn fetch_audio(&self, locator: AudioRef) -> BoxFuture<'_, Result<Arc<Vec<u8>>>> {
        // Binary retrieval: no JSON body, only the error is structured
        let authority = Arc::clone(&self.authority);
        let latency = self.latency;
        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            authority
                .fetch_audio(&locator)
                .map_err(|e| Error::from(WireError::from(e)))
        })
    }
}
