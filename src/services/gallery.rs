use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::AppResult;
use crate::models::ItemListing;
use crate::session::{CancelToken, OperationPolicy};
use crate::storage::{item_images_prefix, StorageBackend};

/// Resolves an item id to the ordered URLs of its photos.
pub struct ImageGalleryResolver {
    storage: Arc<dyn StorageBackend>,
    policy: OperationPolicy,
}

impl ImageGalleryResolver {
    pub fn new(storage: Arc<dyn StorageBackend>, policy: OperationPolicy) -> Self {
        Self { storage, policy }
    }

    /// Photo URLs ordered by object key. Folder placeholders and nested
    /// objects are left out.
    pub async fn resolve_images(&self, item_id: &str, cancel: &CancelToken) -> AppResult<Vec<String>> {
        let prefix = item_images_prefix(item_id);
        self.policy
            .run_cancellable("resolve item images", cancel, async {
                let mut blobs = self.storage.list(&prefix).await?;
                blobs.retain(|blob| blob.is_file_under(&prefix));
                blobs.sort();
                try_join_all(blobs.iter().map(|blob| self.storage.resolve_url(blob))).await
            })
            .await
    }
}

/// Circular cursor over a resolved gallery. Navigation is disabled on an
/// empty gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryNavigator {
    urls: Vec<String>,
    index: usize,
}

impl GalleryNavigator {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn can_navigate(&self) -> bool {
        !self.urls.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&str> {
        self.urls.get(self.index).map(String::as_str)
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn next(&mut self) -> Option<usize> {
        if !self.can_navigate() {
            return None;
        }
        self.index = (self.index + 1) % self.urls.len();
        Some(self.index)
    }

    pub fn prev(&mut self) -> Option<usize> {
        if !self.can_navigate() {
            return None;
        }
        let len = self.urls.len();
        self.index = (self.index + len - 1) % len;
        Some(self.index)
    }
}

/// An item opened for preview together with its photo gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPreview {
    pub item: ItemListing,
    pub gallery: GalleryNavigator,
}

impl ItemPreview {
    pub fn new(item: ItemListing, urls: Vec<String>) -> Self {
        Self {
            item,
            gallery: GalleryNavigator::new(urls),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::AppError;
    use crate::storage::MemoryBlobStore;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img/{}", i)).collect()
    }

    #[test]
    fn test_next_wraps_after_len_steps() {
        for n in 1..=5 {
            let mut gallery = GalleryNavigator::new(urls(n));
            for _ in 0..n {
                gallery.next();
            }
            assert_eq!(gallery.index(), 0, "gallery of {}", n);
        }
    }

    #[test]
    fn test_three_photo_scenario() {
        let mut gallery = GalleryNavigator::new(urls(3));
        assert_eq!(gallery.next(), Some(1));
        assert_eq!(gallery.next(), Some(2));
        assert_eq!(gallery.next(), Some(0));
        assert_eq!(gallery.prev(), Some(2));
        assert_eq!(gallery.current(), Some("https://img/2"));
    }

    #[test]
    fn test_empty_gallery_is_disabled() {
        let mut gallery = GalleryNavigator::new(Vec::new());
        assert!(!gallery.can_navigate());
        assert_eq!(gallery.next(), None);
        assert_eq!(gallery.prev(), None);
        assert_eq!(gallery.index(), 0);
        assert_eq!(gallery.current(), None);
    }

    #[tokio::test]
    async fn test_resolver_orders_by_key_and_scopes_to_item() {
        let blobs = Arc::new(MemoryBlobStore::new("photos"));
        blobs.put("itemImages/i1/2.jpg").await;
        blobs.put("itemImages/i1/1.jpg").await;
        blobs.put("itemImages/i10/1.jpg").await;
        let resolver = ImageGalleryResolver::new(blobs, OperationPolicy::default());

        let found = resolver
            .resolve_images("i1", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(
            found,
            vec![
                "memory://photos/itemImages/i1/1.jpg".to_string(),
                "memory://photos/itemImages/i1/2.jpg".to_string(),
            ]
        );
        assert!(resolver
            .resolve_images("i2", &CancelToken::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_resolver_skips_placeholders_and_nested_keys() {
        let blobs = Arc::new(MemoryBlobStore::new("photos"));
        blobs.put("itemImages/i1/").await;
        blobs.put("itemImages/i1/thumbs/a.jpg").await;
        blobs.put("itemImages/i1/a.jpg").await;
        let resolver = ImageGalleryResolver::new(blobs, OperationPolicy::default());

        let found = resolver
            .resolve_images("i1", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(found, vec!["memory://photos/itemImages/i1/a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_resolver_surfaces_storage_failure() {
        let blobs = Arc::new(MemoryBlobStore::new("photos"));
        blobs.set_unavailable(true);
        let resolver =
            ImageGalleryResolver::new(blobs, OperationPolicy::new(Duration::from_secs(1)));
        let err = resolver
            .resolve_images("i1", &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
