//! Receivers and the registry the dispatcher routes requests through.
//!
//! A [`RequestReceiver`] handles every request addressed to its name. The
//! dispatcher only needs [`ReceiverLookup`], so embedders may supply their
//! own lookup; [`ReceiverRegistry`] is the in-process implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::protocol::{Request, Response};

/// Handles requests addressed to one receiver name.
pub trait RequestReceiver: Send + Sync {
    /// Processes `request` and produces the reply sent to the client.
    fn receive(&self, request: &Request) -> Response;
}

/// Resolves receiver names to handlers.
pub trait ReceiverLookup: Send + Sync {
    /// Returns the receiver registered under `name`, if any.
    fn receiver(&self, name: &str) -> Option<Arc<dyn RequestReceiver>>;
}

/// Errors raised while registering receivers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Receiver names must contain a non-whitespace character.
    #[error("receiver name must not be blank")]
    BlankName,
    /// Another receiver already owns the name.
    #[error("receiver '{name}' is already registered")]
    Duplicate {
        /// The contested name.
        name: String,
    },
}

/// Thread-safe registry of receivers keyed by name.
///
/// Registration may happen while the dispatcher is serving requests.
#[derive(Default)]
pub struct ReceiverRegistry {
    receivers: RwLock<HashMap<String, Arc<dyn RequestReceiver>>>,
}

impl ReceiverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `receiver` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BlankName`] for blank names and
    /// [`RegistryError::Duplicate`] when `name` is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        receiver: Arc<dyn RequestReceiver>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::BlankName);
        }
        let mut receivers = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if receivers.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        receivers.insert(name, receiver);
        Ok(())
    }

    /// Removes the receiver registered under `name`, returning it.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn RequestReceiver>> {
        self.receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Returns the number of registered receivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no receivers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReceiverLookup for ReceiverRegistry {
    fn receiver(&self, name: &str) -> Option<Arc<dyn RequestReceiver>> {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl std::fmt::Debug for ReceiverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let receivers = self
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = receivers.keys().collect();
        names.sort();
        f.debug_struct("ReceiverRegistry")
            .field("receivers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests;
