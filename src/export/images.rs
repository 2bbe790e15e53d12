//! Image resolution - turns `(image_id, image_url)` references into pixels.
//!
//! The timeline only stores opaque references; where the bytes live is up to
//! the host. `ImageResolver` is the seam:
//! - `MemoryImageResolver` - pre-decoded images keyed by id
//! - `FileImageResolver` - `data:` URLs, `file://` URLs and paths under an
//!   asset root, decoded once and kept in an LRU cache

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbaImage;
use log::{debug, trace};
use lru::LruCache;

use super::ExportError;

/// Resolves image references to straight-alpha RGBA pixels.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, image_id: &str, image_url: &str) -> Result<Arc<RgbaImage>, ExportError>;
}

/// In-memory images keyed by `image_id`. URLs are ignored.
#[derive(Clone, Debug, Default)]
pub struct MemoryImageResolver {
    images: HashMap<String, Arc<RgbaImage>>,
}

impl MemoryImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image_id: impl Into<String>, image: RgbaImage) {
        self.images.insert(image_id.into(), Arc::new(image));
    }

    pub fn with_image(mut self, image_id: impl Into<String>, image: RgbaImage) -> Self {
        self.insert(image_id, image);
        self
    }
}

impl ImageResolver for MemoryImageResolver {
    fn resolve(&self, image_id: &str, _image_url: &str) -> Result<Arc<RgbaImage>, ExportError> {
        self.images
            .get(image_id)
            .cloned()
            .ok_or_else(|| ExportError::ImageUnavailable {
                image_id: image_id.to_string(),
                reason: "not registered".into(),
            })
    }
}

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Loads images from URLs and files, caching decoded results.
pub struct FileImageResolver {
    root: PathBuf,
    cache: Mutex<LruCache<String, Arc<RgbaImage>>>,
}

impl FileImageResolver {
    /// Relative paths resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn load(&self, image_id: &str, image_url: &str) -> Result<RgbaImage, ExportError> {
        let bytes = if let Some(data) = image_url.strip_prefix("data:") {
            decode_data_url(image_id, data)?
        } else {
            let path = self.local_path(image_id, image_url)?;
            trace!("Reading image {} from {}", image_id, path.display());
            std::fs::read(&path).map_err(|e| ExportError::ImageUnavailable {
                image_id: image_id.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?
        };

        let decoded = image::load_from_memory(&bytes).map_err(|e| ExportError::ImageDecode {
            image_id: image_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(decoded.to_rgba8())
    }

    fn local_path(&self, image_id: &str, image_url: &str) -> Result<PathBuf, ExportError> {
        // Empty url: fall back to the id as a file name under the root
        let raw = if image_url.is_empty() {
            image_id
        } else if let Some(rest) = image_url.strip_prefix("file://") {
            rest
        } else if image_url.contains("://") {
            return Err(ExportError::ImageUnavailable {
                image_id: image_id.to_string(),
                reason: format!("unsupported URL scheme: {}", image_url),
            });
        } else {
            image_url
        };

        let path = Path::new(raw);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }
}

impl ImageResolver for FileImageResolver {
    fn resolve(&self, image_id: &str, image_url: &str) -> Result<Arc<RgbaImage>, ExportError> {
        let key = if image_url.is_empty() { image_id } else { image_url };

        if let Ok(mut cache) = self.cache.lock()
            && let Some(hit) = cache.get(key)
        {
            return Ok(Arc::clone(hit));
        }

        // Decode outside the lock; a racing duplicate decode is harmless
        let image = Arc::new(self.load(image_id, image_url)?);
        debug!(
            "Decoded image {} ({}x{})",
            image_id,
            image.width(),
            image.height()
        );

        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.put(key.to_string(), Arc::clone(&image));
        Ok(image)
    }
}

/// Payload of a `data:` URL (prefix already stripped). Only base64 is accepted.
fn decode_data_url(image_id: &str, data: &str) -> Result<Vec<u8>, ExportError> {
    let unavailable = |reason: String| ExportError::ImageUnavailable {
        image_id: image_id.to_string(),
        reason,
    };

    let (meta, payload) = data
        .split_once(',')
        .ok_or_else(|| unavailable("malformed data URL".into()))?;
    if !meta.ends_with(";base64") {
        return Err(unavailable(format!("unsupported data URL encoding: {}", meta)));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ExportError::ImageDecode {
            image_id: image_id.to_string(),
            reason: format!("base64: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba};

    use super::*;

    fn png_bytes(w: u32, h: u32, color: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, color);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("loom_images_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_memory_resolver() {
        let resolver = MemoryImageResolver::new().with_image("a", RgbaImage::new(3, 2));
        assert_eq!(resolver.resolve("a", "").unwrap().dimensions(), (3, 2));
        assert!(matches!(
            resolver.resolve("b", ""),
            Err(ExportError::ImageUnavailable { .. })
        ));
    }

    #[test]
    fn test_data_url() {
        let png = png_bytes(2, 3, Rgba([1, 2, 3, 255]));
        let url = format!("data:image/png;base64,{}", STANDARD.encode(png));
        let resolver = FileImageResolver::new(".");
        let img = resolver.resolve("x", &url).unwrap();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(1, 1), &Rgba([1, 2, 3, 255]));
        assert_eq!(resolver.cached(), 1);

        // Second hit comes from the cache
        let again = resolver.resolve("x", &url).unwrap();
        assert!(Arc::ptr_eq(&img, &again));
    }

    #[test]
    fn test_bad_data_urls() {
        let resolver = FileImageResolver::new(".");
        assert!(matches!(
            resolver.resolve("x", "data:image/png,rawbytes"),
            Err(ExportError::ImageUnavailable { .. })
        ));
        assert!(matches!(
            resolver.resolve("x", "data:image/png;base64,!!!"),
            Err(ExportError::ImageDecode { .. })
        ));
        let not_image = format!("data:image/png;base64,{}", STANDARD.encode(b"hello"));
        assert!(matches!(
            resolver.resolve("x", &not_image),
            Err(ExportError::ImageDecode { .. })
        ));
    }

    #[test]
    fn test_relative_and_file_urls() {
        let root = temp_root("files");
        std::fs::write(root.join("hero.png"), png_bytes(4, 4, Rgba([9, 9, 9, 255]))).unwrap();
        let resolver = FileImageResolver::new(&root);

        assert_eq!(resolver.resolve("h", "hero.png").unwrap().dimensions(), (4, 4));
        let abs = format!("file://{}", root.join("hero.png").display());
        assert_eq!(resolver.resolve("h2", &abs).unwrap().dimensions(), (4, 4));
        assert!(matches!(
            resolver.resolve("m", "missing.png"),
            Err(ExportError::ImageUnavailable { .. })
        ));
        assert!(matches!(
            resolver.resolve("w", "https://example.com/a.png"),
            Err(ExportError::ImageUnavailable { .. })
        ));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_cache_evicts() {
        let resolver = FileImageResolver::with_capacity(".", 1);
        let black = Rgba([0, 0, 0, 255]);
        let a = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(1, 1, black)));
        let b = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(2, 1, black)));
        resolver.resolve("a", &a).unwrap();
        resolver.resolve("b", &b).unwrap();
        assert_eq!(resolver.cached(), 1);
    }
}
