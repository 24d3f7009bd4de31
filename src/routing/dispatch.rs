//! Entry-point dispatch.
//!
//! # Responsibilities
//! - Hold the handler registered for each entry-point name
//! - Hand a prepared request to the handler of its detected entry point
//!
//! # Design Decisions
//! - Handlers are trait objects so the service can register its own set
//! - Unregistered names are an explicit error, never a silent fallback

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DispatchError, RequestError};
use crate::http::request::WebRequest;

/// A top-level request handler selected by entry point.
///
/// Handlers write their output through [`WebRequest::response_mut`].
pub trait EntryPointHandler: Send + Sync {
    fn handle(&self, request: &mut WebRequest) -> Result<(), RequestError>;
}

/// Name → handler table.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn EntryPointHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn EntryPointHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Register one handler under several names.
    pub fn register_all<'a, I>(&mut self, names: I, handler: Arc<dyn EntryPointHandler>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.register(name, handler.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run the handler for the request's detected entry point.
    pub fn dispatch(&self, request: &mut WebRequest) -> Result<(), DispatchError> {
        let name = request.entry_point().to_string();
        let handler = self
            .handlers
            .get(&name)
            .ok_or_else(|| DispatchError::UnknownEntryPoint(name.clone()))?;

        tracing::debug!(entry_point = %name, request_id = %request.request_id(), "Dispatching request");
        metrics::counter!("ingress_requests_total", "entry_point" => name).increment(1);
        handler.handle(request)?;
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("Dispatcher").field("entry_points", &names).finish()
    }
}
