//! TF-IDF vector space over record sides

use crate::index::{CentroidClassifier, IndexError, RawHit, Seed, SimilarityIndex};
use crate::records::SideId;
use ahash::AHashMap;
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Sparse vector as (term id, weight) pairs sorted by term id
pub(crate) type SparseVector = Vec<(u32, f32)>;

/// L2-normalised TF-IDF vectors keyed by side id, with the label
/// classifiers trained on top of them.
///
/// Distance between two sides is the euclidean distance of their unit
/// vectors, in `[0, sqrt(2)]`.
pub struct TfidfIndex {
    analyzer: TextAnalyzer,
    vocabulary: AHashMap<String, u32>,
    terms: Vec<String>,
    idf: Vec<f32>,
    vectors: AHashMap<SideId, SparseVector>,
    classifiers: AHashMap<String, CentroidClassifier>,
    max_matched_terms: usize,
}

impl TfidfIndex {
    /// Build the space from side texts; sides without any token are skipped
    ///
    /// # Errors
    /// [`IndexError::EmptyCorpus`] if no document has a token
    pub fn build(
        documents: &[(SideId, String)],
        max_matched_terms: usize,
    ) -> Result<Self, IndexError> {
        let mut analyzer = default_analyzer();
        let mut vocabulary: AHashMap<String, u32> = AHashMap::new();
        let mut terms: Vec<String> = Vec::new();
        let mut document_frequency: Vec<u32> = Vec::new();
        let mut counted: Vec<(SideId, AHashMap<u32, f32>)> = Vec::new();

        for (side, text) in documents {
            let tokens = tokenize(&mut analyzer, text);
            if tokens.is_empty() {
                continue;
            }

            let mut counts: AHashMap<u32, f32> = AHashMap::new();
            for token in tokens {
                let id = match vocabulary.get(&token) {
                    Some(id) => *id,
                    None => {
                        let id = terms.len() as u32;
                        vocabulary.insert(token.clone(), id);
                        terms.push(token);
                        document_frequency.push(0);
                        id
                    }
                };
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
            for id in counts.keys() {
                document_frequency[*id as usize] += 1;
            }
            counted.push((*side, counts));
        }

        if counted.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let n = counted.len() as f32;
        let idf: Vec<f32> = document_frequency
            .iter()
            .map(|df| ((1.0 + n) / (1.0 + *df as f32)).ln() + 1.0)
            .collect();

        let vectors = counted
            .into_iter()
            .map(|(side, counts)| (side, weigh(counts, &idf)))
            .collect();

        Ok(Self {
            analyzer,
            vocabulary,
            terms,
            idf,
            vectors,
            classifiers: AHashMap::new(),
            max_matched_terms,
        })
    }

    /// Train (or replace) the classifier `label` from `(side, label id)`
    /// samples; samples whose side is not indexed are ignored
    pub fn train_classifier(
        &mut self,
        label: &str,
        samples: &[(SideId, i64)],
    ) -> Result<(), IndexError> {
        let indexed = samples
            .iter()
            .filter_map(|(side, class)| self.vectors.get(side).map(|v| (v, *class)));
        let classifier = CentroidClassifier::fit(label, indexed)?;
        self.classifiers.insert(label.to_string(), classifier);
        Ok(())
    }

    pub fn classifier_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.classifiers.keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn vocabulary_len(&self) -> usize {
        self.terms.len()
    }

    /// Vector of ad hoc text in this space; unknown terms are dropped
    fn vectorize(&self, text: &str) -> SparseVector {
        let mut analyzer = self.analyzer.clone();
        let mut counts: AHashMap<u32, f32> = AHashMap::new();
        for token in tokenize(&mut analyzer, text) {
            if let Some(id) = self.vocabulary.get(&token) {
                *counts.entry(*id).or_insert(0.0) += 1.0;
            }
        }
        weigh(counts, &self.idf)
    }

    /// Shared terms ranked by their contribution to the dot product
    fn matched_terms(&self, a: &SparseVector, b: &SparseVector) -> Vec<String> {
        let mut shared: Vec<(u32, f32)> = Vec::new();
        merge_join(a, b, |term, wa, wb| shared.push((term, wa * wb)));
        shared.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));
        shared
            .into_iter()
            .take(self.max_matched_terms)
            .map(|(term, _)| self.terms[term as usize].clone())
            .collect()
    }
}

impl SimilarityIndex for TfidfIndex {
    fn nearest(
        &self,
        seed: &Seed<'_>,
        universe: &[SideId],
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<RawHit>, IndexError> {
        let owned;
        let seed_vector = match seed {
            Seed::Side(side) => self
                .vectors
                .get(side)
                .ok_or(IndexError::SeedNotIndexed(*side))?,
            Seed::Text(text) => {
                owned = self.vectorize(text);
                &owned
            }
        };
        if seed_vector.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(SideId, f32, &SparseVector)> = universe
            .iter()
            .filter_map(|side| self.vectors.get(side).map(|v| (*side, v)))
            .map(|(side, v)| (side, distance(seed_vector, v), v))
            .filter(|(_, d, _)| *d <= max_distance)
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(side, distance, v)| RawHit {
                side,
                distance,
                matched_terms: self.matched_terms(seed_vector, v),
            })
            .collect())
    }

    fn classify(&self, label: &str, side: SideId) -> Result<Vec<(i64, f32)>, IndexError> {
        let classifier = self
            .classifiers
            .get(label)
            .ok_or_else(|| IndexError::ClassifierNotFound(label.to_string()))?;
        let vector = self
            .vectors
            .get(&side)
            .ok_or(IndexError::SeedNotIndexed(side))?;
        Ok(classifier.rank(vector))
    }

    fn has_classifier(&self, label: &str) -> bool {
        self.classifiers.contains_key(label)
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

fn default_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build()
}

fn tokenize(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        let token = &stream.token().text;
        // single letters and digits carry no topic signal
        if token.chars().count() > 1 {
            tokens.push(token.clone());
        }
    }
    tokens
}

fn weigh(counts: AHashMap<u32, f32>, idf: &[f32]) -> SparseVector {
    let mut vector: SparseVector = counts
        .into_iter()
        .map(|(term, tf)| (term, tf * idf[term as usize]))
        .collect();
    vector.sort_by_key(|(term, _)| *term);
    normalize(&mut vector);
    vector
}

pub(crate) fn normalize(vector: &mut SparseVector) {
    let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in vector.iter_mut() {
            *w /= norm;
        }
    }
}

fn merge_join(a: &SparseVector, b: &SparseVector, mut f: impl FnMut(u32, f32, f32)) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                f(a[i].0, a[i].1, b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
}

pub(crate) fn dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let mut sum = 0.0;
    merge_join(a, b, |_, wa, wb| sum += wa * wb);
    sum
}

fn distance(a: &SparseVector, b: &SparseVector) -> f32 {
    (2.0 - 2.0 * dot(a, b)).max(0.0).sqrt()
}
