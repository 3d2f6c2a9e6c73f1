use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::errors::SessionError;
use crate::formats::{
    AndroidHandler, ArbHandler, FormatHandler, JsonHandler, PoHandler, SrtHandler, StringsHandler, YamlHandler,
};

/// Summary of a registered format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub name: &'static str,
    pub extensions: Vec<&'static str>,
    pub supports_context: bool,
}

/// Process-scoped set of format handlers.
///
/// Built once at startup and passed to sessions explicitly.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    handlers: Vec<Arc<dyn FormatHandler>>,
}

impl FormatRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SrtHandler::new()));
        registry.register(Arc::new(JsonHandler::new()));
        registry.register(Arc::new(PoHandler::new()));
        registry.register(Arc::new(AndroidHandler::new()));
        registry.register(Arc::new(StringsHandler::new()));
        registry.register(Arc::new(YamlHandler::new()));
        registry.register(Arc::new(ArbHandler::new()));
        registry
    }

    /// Add a handler, replacing any handler with the same name
    pub fn register(&mut self, handler: Arc<dyn FormatHandler>) {
        self.handlers.retain(|h| h.name() != handler.name());
        self.handlers.push(handler);
    }

    /// Handler by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<Arc<dyn FormatHandler>, SessionError> {
        self.handlers
            .iter()
            .find(|h| h.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SessionError::UnknownFormat(format!("{} (available: {})", name, self.names().join(", "))))
    }

    /// Handler by file extension (with or without the dot)
    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn FormatHandler>> {
        let extension = extension.trim_start_matches('.');
        self.handlers
            .iter()
            .find(|h| h.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension)))
            .cloned()
    }

    /// Pick a handler for a file.
    ///
    /// The extension decides when it is known; otherwise each handler is
    /// asked to recognise the content.
    pub fn detect(&self, path: &Path, content: &str) -> Result<Arc<dyn FormatHandler>, SessionError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if let Some(handler) = self.for_extension(&extension) {
            debug!("Detected format '{}' from extension .{}", handler.name(), extension);
            return Ok(handler);
        }

        if let Some(handler) = self.handlers.iter().find(|h| h.sniff(content)) {
            debug!("Detected format '{}' from content", handler.name());
            return Ok(handler.clone());
        }

        Err(SessionError::UnknownFormat(format!(
            "cannot detect format of {:?} (supported extensions: {})",
            path,
            self.handlers
                .iter()
                .flat_map(|h| h.extensions().iter().copied())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Registered handler names
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Describe every registered format
    pub fn list(&self) -> Vec<FormatInfo> {
        self.handlers
            .iter()
            .map(|h| FormatInfo {
                name: h.name(),
                extensions: h.extensions().to_vec(),
                supports_context: h.supports_context(),
            })
            .collect()
    }
}
