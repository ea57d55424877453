use crate::config::Config;
use crate::mime::ContentTypeResolver;

/// shared, read-only application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub content_types: ContentTypeResolver,
}

impl AppState {
    /// create a new app state with the default content type table
    pub fn new(config: Config) -> Self {
        Self {
            config,
            content_types: ContentTypeResolver::default(),
        }
    }
}
