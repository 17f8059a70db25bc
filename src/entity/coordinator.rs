//! One state read per device per poll tick
//!
//! Several entities of a robot read the same `getRobotState` reply. The
//! wrapper keeps the last successful reply for `ttl` and hands it to every
//! reader; any other operation (a command) drops it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::DeviceApi;
use crate::error::RemoteError;

struct CachedReply {
    value: Value,
    expires_at: Instant,
}

pub struct SharedQuery {
    inner: Arc<dyn DeviceApi>,
    query: &'static str,
    ttl: Duration,
    cached: Mutex<Option<CachedReply>>,
}

impl SharedQuery {
    pub fn new(inner: Arc<dyn DeviceApi>, query: &'static str, ttl: Duration) -> Self {
        Self {
            inner,
            query,
            ttl,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DeviceApi for SharedQuery {
    async fn call(&self, operation: &str, args: &[Value]) -> Result<Value, RemoteError> {
        if operation != self.query || !args.is_empty() {
            *self.cached.lock().await = None;
            return self.inner.call(operation, args).await;
        }

        // Held across the remote call so concurrent readers wait for one reply
        let mut cached = self.cached.lock().await;
        if let Some(ref reply) = *cached {
            if reply.expires_at > Instant::now() {
                return Ok(reply.value.clone());
            }
        }

        let value = self.inner.call(operation, args).await?;
        *cached = Some(CachedReply {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(value)
    }
}
