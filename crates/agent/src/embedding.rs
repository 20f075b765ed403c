use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding dimensions must be at least 16, got {0}")]
    InvalidDimensions(usize),
}

/// Maps text to a fixed-length vector; equal inputs give equal vectors.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Local feature-hashing embedder.
///
/// Lower-cased word unigrams and boundary-marked character trigrams are hashed
/// with blake3 into signed buckets, then the vector is L2-normalised. Trigrams
/// let inflected Polish forms ("projektu", "projekt") land near each other.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self, EmbeddingError> {
        if dimensions < 16 {
            return Err(EmbeddingError::InvalidDimensions(dimensions));
        }
        Ok(Self { dimensions })
    }

    fn add_feature(&self, vector: &mut [f32], kind: &[u8], feature: &str, weight: f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind);
        hasher.update(feature.as_bytes());
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty())
        {
            self.add_feature(&mut vector, b"w:", word, WORD_WEIGHT);

            let marked: Vec<char> = format!("<{word}>").chars().collect();
            for window in marked.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, b"t:", &trigram, TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }

        Ok(vector)
    }
}

/// Cosine similarity; zero when either vector is all zeros.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::{cosine_similarity, Embedder, EmbeddingError, HashingEmbedder};

    #[test]
    fn rejects_tiny_dimensions() {
        assert_eq!(HashingEmbedder::new(4).err(), Some(EmbeddingError::InvalidDimensions(4)));
    }

    #[test]
    fn embedding_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(256).expect("embedder");
        let first = embedder.embed("Dostawa opóźniona").expect("embed");
        let second = embedder.embed("Dostawa opóźniona").expect("embed");

        assert_eq!(first, second);
        assert_eq!(first.len(), 256);
        let norm: f32 = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(64).expect("embedder");
        let vector = embedder.embed("  ,. ").expect("embed");

        assert!(vector.iter().all(|value| *value == 0.0));
        assert_eq!(cosine_similarity(&vector, &vector), 0.0);
    }

    #[test]
    fn related_text_scores_above_unrelated_text() {
        let embedder = HashingEmbedder::new(1024).expect("embedder");
        let document = embedder
            .embed(r#"{"Klient":"Acme","Kraj":"PL","Produkt":"Widget","StatusProjektu":"W Trakcie","Feedback":"Dostawa opóźniona"}"#)
            .expect("embed");
        let related = embedder.embed("Jaki jest status projektu Acme?").expect("embed");
        let unrelated = embedder.embed("zzz qqq").expect("embed");

        let related_score = cosine_similarity(&document, &related);
        let unrelated_score = cosine_similarity(&document, &unrelated);

        assert!(related_score > 0.1, "related score was {related_score}");
        assert!(related_score > unrelated_score);
    }
}
