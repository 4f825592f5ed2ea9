//! Per-collection last-fetched watermarks.

use crate::db::PrefsStore;
use crate::error::Result;

const BRANCH_PREFIX: &str = "synchronizer";
const LAST_FETCHED: &str = "lastFetched";

/// Watermark view over a preference store, namespaced by collection.
///
/// `0` means the collection has never been fetched.
#[derive(Debug)]
pub struct Watermarks<'a, P> {
    prefs: &'a P,
}

impl<'a, P: PrefsStore> Watermarks<'a, P> {
    pub const fn new(prefs: &'a P) -> Self {
        Self { prefs }
    }

    /// Preference key holding the watermark of `collection`
    pub fn key(collection: &str) -> String {
        format!("{BRANCH_PREFIX}.{collection}.{LAST_FETCHED}")
    }

    pub async fn get(&self, collection: &str) -> Result<u64> {
        Ok(self
            .prefs
            .get_u64(&Self::key(collection))
            .await?
            .unwrap_or(0))
    }

    pub async fn set(&self, collection: &str, value: u64) -> Result<()> {
        self.prefs.set_u64(&Self::key(collection), value).await
    }

    /// Forget the watermark so the next pass refetches and wipes.
    pub async fn clear(&self, collection: &str) -> Result<()> {
        self.prefs.remove(&Self::key(collection)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryPrefs;

    #[test]
    fn keys_are_namespaced_by_collection() {
        assert_eq!(
            Watermarks::<MemoryPrefs>::key("clients"),
            "synchronizer.clients.lastFetched"
        );
        assert_ne!(
            Watermarks::<MemoryPrefs>::key("clients"),
            Watermarks::<MemoryPrefs>::key("tabs")
        );
    }

    #[tokio::test]
    async fn missing_watermark_defaults_to_zero() {
        let prefs = MemoryPrefs::new();
        let watermarks = Watermarks::new(&prefs);
        assert_eq!(watermarks.get("clients").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn collections_do_not_share_watermarks() {
        let prefs = MemoryPrefs::new();
        let watermarks = Watermarks::new(&prefs);

        watermarks.set("clients", 1_000).await.unwrap();
        assert_eq!(watermarks.get("clients").await.unwrap(), 1_000);
        assert_eq!(watermarks.get("tabs").await.unwrap(), 0);

        watermarks.clear("clients").await.unwrap();
        assert_eq!(watermarks.get("clients").await.unwrap(), 0);
    }
}
