//! Per-message handling: enrich, route by label, store, log the outcome.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use acars_core::enrich::ChannelPlan;
use acars_core::routing::{LabelPolicy, OnceKey, Outcome, Route};
use acars_core::types::AcarsMessage;

use crate::db::{MessageStore, StoreError};

/// Receives every successfully decoded message, in arrival order.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: AcarsMessage);
}

/// Applies the label policy against a store.
///
/// Without a store every non-skipped message is only logged, which keeps
/// the receiver useful while the database is unreachable.
pub struct Router {
    policy: LabelPolicy,
    channels: ChannelPlan,
    store: Option<Arc<dyn MessageStore>>,
}

impl Router {
    pub fn new(
        policy: LabelPolicy,
        channels: ChannelPlan,
        store: Option<Arc<dyn MessageStore>>,
    ) -> Self {
        Router {
            policy,
            channels,
            store,
        }
    }

    /// Route one message. Calls the store at most once; never retries.
    pub async fn dispatch(&self, message: &AcarsMessage) -> Outcome {
        let route = self.policy.route(&message.label);
        if route == Route::Skip {
            return Outcome::Skipped;
        }

        let Some(store) = &self.store else {
            return Outcome::NotStored;
        };

        if route == Route::InsertOnce {
            return match store.insert_if_absent(&OnceKey::of(message), message).await {
                Ok(0) => Outcome::Skipped,
                Ok(_) => Outcome::InsertedOnce,
                // Another writer inserted the key between check and insert
                Err(StoreError::Duplicate) => Outcome::Duplicate,
                Err(e) => Outcome::PersistenceError(e.to_string()),
            };
        }

        match store.insert(message).await {
            Ok(()) => Outcome::Inserted,
            Err(StoreError::Duplicate) => Outcome::Duplicate,
            Err(e) => Outcome::PersistenceError(e.to_string()),
        }
    }

    /// Enrich and dispatch one message, then log its outcome.
    pub async fn process(&self, mut message: AcarsMessage) -> Outcome {
        self.channels.enrich(&mut message);
        let outcome = self.dispatch(&message).await;

        match &outcome {
            Outcome::PersistenceError(e) => error!(
                label = %message.label,
                flight = %message.flight_id,
                registration = %message.registration,
                error = %e,
                "[{}] failed to store message",
                outcome.tag()
            ),
            _ => info!(
                outcome = %outcome,
                label = %message.label,
                flight = %message.flight_id,
                registration = %message.registration,
                channel = message.channel,
                "[{}]",
                outcome.tag()
            ),
        }
        debug!("{message}");
        outcome
    }
}

#[async_trait]
impl MessageHandler for Router {
    async fn handle(&self, message: AcarsMessage) {
        self.process(message).await;
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use acars_core::routing::OnceKey;
    use acars_core::types::AcarsMessage;

    use crate::db::{MessageStore, StoreError, StoreStats};

    /// In-memory store that records every call.
    #[derive(Default)]
    pub struct RecordingStore {
        pub inserts: Mutex<Vec<AcarsMessage>>,
        pub once_keys: Mutex<Vec<OnceKey>>,
        pub calls: Mutex<u32>,
        /// Returned by the next `insert` instead of storing.
        pub next_insert_error: Mutex<Option<StoreError>>,
        /// Returned by the next `insert_if_absent` instead of storing.
        pub next_once_error: Mutex<Option<StoreError>>,
    }

    impl RecordingStore {
        pub fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }

        pub fn inserted(&self) -> Vec<AcarsMessage> {
            self.inserts.lock().unwrap().clone()
        }

        fn count_call(&self) {
            *self.calls.lock().unwrap() += 1;
        }
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn setup_schema(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert(&self, message: &AcarsMessage) -> Result<(), StoreError> {
            self.count_call();
            if let Some(e) = self.next_insert_error.lock().unwrap().take() {
                return Err(e);
            }
            self.inserts.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn insert_if_absent(
            &self,
            key: &OnceKey,
            message: &AcarsMessage,
        ) -> Result<u64, StoreError> {
            self.count_call();
            if let Some(e) = self.next_once_error.lock().unwrap().take() {
                return Err(e);
            }
            let mut keys = self.once_keys.lock().unwrap();
            if keys.contains(key) {
                return Ok(0);
            }
            keys.push(key.clone());
            self.inserts.lock().unwrap().push(message.clone());
            Ok(1)
        }

        async fn stats(&self) -> Result<StoreStats, StoreError> {
            Ok(StoreStats {
                messages: self.inserts.lock().unwrap().len() as i64,
                by_label: Vec::new(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
