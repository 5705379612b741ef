//! Meeting-link generation
//!
//! The coordinator only needs one thing from the outside world: a link two
//! matched users can both open. [`LinkGenerator`] is that seam.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

mod error;
mod http;
mod mock;

pub use error::LinkError;
pub use http::HttpLinkGenerator;
pub use mock::MockLinkGenerator;

use crate::config::LinksConfig;
use crate::domain::UserId;

/// Produces a meeting link for a freshly matched pair
///
/// Called exactly once per committed match, after the partner has left the
/// waiting queue. Implementations may block on the network.
#[async_trait]
pub trait LinkGenerator: Send + Sync {
    async fn generate(&self, user_a: &UserId, user_b: &UserId) -> Result<String, LinkError>;
}

/// Create a link generator based on the provider specified in config
pub fn create_generator(config: &LinksConfig) -> Result<Arc<dyn LinkGenerator>, LinkError> {
    debug!(provider = %config.provider, "create_generator: called");
    match config.provider.as_str() {
        "mock" => {
            debug!("create_generator: creating mock generator");
            Ok(Arc::new(MockLinkGenerator::new(&config.base_url)))
        }
        "http" => {
            debug!("create_generator: creating HTTP generator");
            Ok(Arc::new(HttpLinkGenerator::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_generator: unknown provider");
            Err(LinkError::UnknownProvider(other.to_string()))
        }
    }
}
