//! Offline link generator
//!
//! Produces links of the form `{base}/mock-xxxxxxx` without calling out to any
//! conferencing service. Good enough for local runs and demos.

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use super::{LinkError, LinkGenerator};
use crate::domain::UserId;

const SUFFIX_LEN: usize = 7;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random-suffix meeting links
#[derive(Debug, Clone)]
pub struct MockLinkGenerator {
    base_url: String,
}

impl MockLinkGenerator {
    pub fn new(base_url: &str) -> Self {
        debug!(%base_url, "MockLinkGenerator::new: called");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

#[async_trait]
impl LinkGenerator for MockLinkGenerator {
    async fn generate(&self, user_a: &UserId, user_b: &UserId) -> Result<String, LinkError> {
        let link = format!("{}/mock-{}", self.base_url, random_suffix());
        debug!(%user_a, %user_b, %link, "MockLinkGenerator::generate: generated");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_link_shape() {
        let generator = MockLinkGenerator::new("https://meet.google.com/");
        let a = UserId::parse("Alice").unwrap();
        let b = UserId::parse("Bob").unwrap();

        let link = generator.generate(&a, &b).await.unwrap();
        let suffix = link.strip_prefix("https://meet.google.com/mock-").unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_mock_links_differ() {
        let generator = MockLinkGenerator::new("https://meet.google.com");
        let a = UserId::parse("Alice").unwrap();
        let b = UserId::parse("Bob").unwrap();

        let first = generator.generate(&a, &b).await.unwrap();
        let second = generator.generate(&a, &b).await.unwrap();
        // 36^7 possibilities; a collision here means the suffix is not random
        assert_ne!(first, second);
    }
}
