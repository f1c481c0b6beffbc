//! Pattern stores for seeding runs and keeping their winners.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::fitness::MarkupSignals;

/// Length of the vectors produced by [`structural_embedding`].
pub const EMBEDDING_DIM: usize = 8;

/// A pattern as kept by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPattern {
    /// Content id of `markup`, see [`pattern_id`].
    pub id: u64,
    pub markup: String,
    /// Category used to scope similarity searches.
    pub pattern_type: String,
    /// Structural embedding of `markup`.
    pub embedding: Vec<f32>,
    /// Total fitness when stored.
    pub fitness: f32,
    /// Generation the pattern came from.
    pub generation: usize,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parameters of a similarity search.
#[derive(Debug, Clone)]
pub struct SimilarityQuery {
    pub embedding: Vec<f32>,
    pub pattern_type: String,
    /// Minimum cosine similarity.
    pub threshold: f32,
    pub limit: usize,
}

/// A search hit.
#[derive(Debug, Clone)]
pub struct SimilarPattern {
    pub pattern: StoredPattern,
    pub similarity: f32,
}

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// External knowledge store queried at seeding and written at completion.
pub trait PatternStore: Send + Sync {
    /// Patterns of `query.pattern_type` with similarity at least
    /// `query.threshold`, most similar first, at most `query.limit`.
    fn find_similar(&self, query: &SimilarityQuery) -> Result<Vec<SimilarPattern>, StoreError>;

    fn store(&self, pattern: &StoredPattern) -> Result<(), StoreError>;
}

/// Stable id for a pattern: the first eight bytes of the SHA-256 of its
/// markup. Equal markup from any run maps to the same id.
pub fn pattern_id(markup: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(markup.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// L2-normalized vector of log-scaled structural counts.
///
/// Unparseable markup maps to the zero vector, which is similar to nothing.
pub fn structural_embedding(markup: &str) -> Vec<f32> {
    let Some(s) = MarkupSignals::from_markup(markup) else {
        return vec![0.0; EMBEDDING_DIM];
    };
    let mut v: Vec<f32> = [
        s.elements,
        s.max_depth,
        s.interactive,
        s.control,
        s.game,
        s.animated,
        s.containers,
        s.style_properties,
    ]
    .iter()
    .map(|&count| (count as f32).ln_1p())
    .collect();

    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Cosine similarity; `0` when either side has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }
}

/// Descriptive tags derived from a pattern's structure and fitness.
pub fn auto_tags(markup: &str, fitness: f32) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(s) = MarkupSignals::from_markup(markup) {
        if s.interactive > 0 {
            tags.push("interactive".to_string());
        }
        if s.control > 0 {
            tags.push("controllable".to_string());
        }
        if s.game > 0 {
            tags.push("game".to_string());
        }
        if s.animated > 0 {
            tags.push("animated".to_string());
        }
    }
    if fitness > 0.5 {
        tags.push("high-fitness".to_string());
    }
    tags
}

fn rank<'a>(
    patterns: impl IntoIterator<Item = &'a StoredPattern>,
    query: &SimilarityQuery,
) -> Vec<SimilarPattern> {
    let mut hits: Vec<SimilarPattern> = patterns
        .into_iter()
        .filter(|p| p.pattern_type == query.pattern_type)
        .map(|p| SimilarPattern {
            similarity: cosine_similarity(&query.embedding, &p.embedding),
            pattern: p.clone(),
        })
        .filter(|hit| hit.similarity >= query.threshold)
        .collect();
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(query.limit);
    hits
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store backed by a vector behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    patterns: Mutex<Vec<StoredPattern>>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: Vec<StoredPattern>) -> Self {
        Self {
            patterns: Mutex::new(patterns),
        }
    }

    /// Snapshot of everything stored so far.
    pub fn patterns(&self) -> Result<Vec<StoredPattern>, StoreError> {
        Ok(self.patterns.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }
}

impl PatternStore for InMemoryPatternStore {
    fn find_similar(&self, query: &SimilarityQuery) -> Result<Vec<SimilarPattern>, StoreError> {
        let patterns = self.patterns.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rank(patterns.iter(), query))
    }

    fn store(&self, pattern: &StoredPattern) -> Result<(), StoreError> {
        let mut patterns = self.patterns.lock().map_err(|_| StoreError::Poisoned)?;
        match patterns.iter_mut().find(|p| p.id == pattern.id) {
            Some(existing) => *existing = pattern.clone(),
            None => patterns.push(pattern.clone()),
        }
        Ok(())
    }
}

// ============================================================================
// JSON directory store
// ============================================================================

/// Store that keeps one pretty-printed JSON file per pattern.
#[derive(Debug, Clone)]
pub struct JsonDirPatternStore {
    dir: PathBuf,
}

impl JsonDirPatternStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, pattern: &StoredPattern) -> PathBuf {
        self.dir.join(format!("pattern_{:016x}.json", pattern.id))
    }

    /// Every readable pattern file in the directory. Unreadable files are
    /// skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<StoredPattern>, StoreError> {
        let mut patterns = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match load_pattern(&path) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => log::warn!("skipping pattern file {}: {e}", path.display()),
            }
        }
        Ok(patterns)
    }
}

fn load_pattern(path: &Path) -> Result<StoredPattern, StoreError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl PatternStore for JsonDirPatternStore {
    fn find_similar(&self, query: &SimilarityQuery) -> Result<Vec<SimilarPattern>, StoreError> {
        let patterns = self.load_all()?;
        Ok(rank(patterns.iter(), query))
    }

    fn store(&self, pattern: &StoredPattern) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(pattern)?;
        let path = self.path_for(pattern);
        fs::write(&path, json)?;
        log::debug!("stored pattern {} at {}", pattern.id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pattern(id: u64, markup: &str, fitness: f32) -> StoredPattern {
        StoredPattern {
            id,
            markup: markup.to_string(),
            pattern_type: "interactive-fragment".to_string(),
            embedding: structural_embedding(markup),
            fitness,
            generation: 0,
            tags: Vec::new(),
        }
    }

    fn query(markup: &str, threshold: f32) -> SimilarityQuery {
        SimilarityQuery {
            embedding: structural_embedding(markup),
            pattern_type: "interactive-fragment".to_string(),
            threshold,
            limit: 5,
        }
    }

    #[test]
    fn test_embedding_is_normalized() {
        let v = structural_embedding(r#"<div class="container"><p>hi</p></div>"#);
        assert_eq!(v.len(), EMBEDDING_DIM);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(structural_embedding("<div class=\"x>").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_in_memory_ranking_and_filters() {
        let seed = "<div><p>hi</p></div>";
        let store = InMemoryPatternStore::with_patterns(vec![
            pattern(1, "<div><p>hi</p></div>", 0.2),
            pattern(2, r#"<button onclick="f()" style="animation: x 1s">go</button>"#, 0.4),
            StoredPattern {
                pattern_type: "other".to_string(),
                ..pattern(3, seed, 0.9)
            },
        ]);

        let hits = store.find_similar(&query(seed, 0.0)).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].pattern.id, 1);
        assert!(hits[0].similarity >= hits[1].similarity);

        let hits = store.find_similar(&query(seed, 0.999)).unwrap();
        assert_eq!(hits.len(), 1);

        let mut limited = query(seed, 0.0);
        limited.limit = 1;
        assert_eq!(store.find_similar(&limited).unwrap().len(), 1);
    }

    #[test]
    fn test_in_memory_store_replaces_by_id() {
        let store = InMemoryPatternStore::new();
        store.store(&pattern(1, "<p>a</p>", 0.1)).unwrap();
        store.store(&pattern(1, "<p>b</p>", 0.2)).unwrap();
        let patterns = store.patterns().unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].markup, "<p>b</p>");
    }

    #[test]
    fn test_json_dir_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = JsonDirPatternStore::open(dir.path().join("patterns")).unwrap();
        let markup = "<div><p>hi</p></div>";
        store.store(&pattern(pattern_id(markup), markup, 0.5)).unwrap();
        fs::write(store.dir().join("junk.json"), "not json").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, pattern_id(markup));

        let hits = store.find_similar(&query("<div><p>hi</p></div>", 0.9)).unwrap();
        assert_eq!(hits.len(), 1);
        let file = format!("pattern_{:016x}.json", pattern_id(markup));
        assert!(store.dir().join(file).exists());
    }

    #[test]
    fn test_json_dir_store_keeps_distinct_markup_apart() {
        let dir = tempdir().unwrap();
        let store = JsonDirPatternStore::open(dir.path()).unwrap();
        for markup in ["<p>a</p>", "<p>b</p>"] {
            let mut p = pattern(pattern_id(markup), markup, 0.5);
            p.generation = 3;
            store.store(&p).unwrap();
        }
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_pattern_id_follows_content() {
        assert_eq!(pattern_id("<p>a</p>"), pattern_id("<p>a</p>"));
        assert_ne!(pattern_id("<p>a</p>"), pattern_id("<p>b</p>"));
    }

    #[test]
    fn test_auto_tags() {
        let tags = auto_tags(
            r#"<div data-evolve-role="player" onkeydown="m()" style="animation: x 1s"></div>"#,
            0.8,
        );
        assert_eq!(
            tags,
            vec!["interactive", "controllable", "game", "animated", "high-fitness"]
        );
        assert!(auto_tags("<p>x</p>", 0.1).is_empty());
    }
}
