//! Deterministic synthetic corpus for smoke tests and benchmarks.

use crate::store::NewDocument;
use sha1::{Digest, Sha1};

pub const TOPICS: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];
const VOCAB_SIZE: usize = 2000;

/// Seeded random stream: repeatedly hashes its state with SHA-1 and hands out
/// the digest four bytes at a time.
pub struct SeededRng {
    state: Vec<u8>,
    pool: Vec<u8>,
}

impl SeededRng {
    pub fn new(seed: &str) -> Self {
        Self { state: seed.as_bytes().to_vec(), pool: Vec::new() }
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.pool.len() < 4 {
            self.state = Sha1::digest(&self.state).to_vec();
            self.pool.extend_from_slice(&self.state);
        }
        let out = u32::from_le_bytes([self.pool[0], self.pool[1], self.pool[2], self.pool[3]]);
        self.pool.drain(..4);
        out
    }

    /// Uniform in `0..n`.
    pub fn below(&mut self, n: usize) -> usize {
        ((self.next_u32() as u64 * n as u64) >> 32) as usize
    }

    /// Uniform in `min..=max`.
    pub fn between(&mut self, min: usize, max: usize) -> usize {
        min + self.below(max - min + 1)
    }
}

pub struct SyntheticCorpus {
    rng: SeededRng,
    vocab: Vec<String>,
}

impl SyntheticCorpus {
    pub fn new(seed: &str) -> Self {
        let vocab = (0..VOCAB_SIZE).map(|i| format!("w{i}")).collect();
        Self { rng: SeededRng::new(seed), vocab }
    }

    fn word(&mut self) -> String {
        let i = self.rng.below(self.vocab.len());
        self.vocab[i].clone()
    }

    /// One document. Its topic shows up once in the title and three times in
    /// the body (possibly overlapping).
    pub fn next_document(&mut self) -> NewDocument {
        let topic = TOPICS[self.rng.below(TOPICS.len())];
        let title_len = self.rng.between(4, 10);
        let body_len = self.rng.between(60, 180);

        let mut title: Vec<String> = (0..title_len).map(|_| self.word()).collect();
        let at = self.rng.below(title.len());
        title[at] = topic.to_string();

        let mut body: Vec<String> = (0..body_len).map(|_| self.word()).collect();
        for _ in 0..3 {
            let at = self.rng.below(body.len());
            body[at] = topic.to_string();
        }

        NewDocument::new(title.join(" "), body.join(" "))
    }

    pub fn take(mut self, n: usize) -> Vec<NewDocument> {
        (0..n).map(|_| self.next_document()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_corpus() {
        let a = SyntheticCorpus::new("smoke").take(5);
        let b = SyntheticCorpus::new("smoke").take(5);
        assert_eq!(
            a.iter().map(|d| &d.content).collect::<Vec<_>>(),
            b.iter().map(|d| &d.content).collect::<Vec<_>>()
        );
        let c = SyntheticCorpus::new("other").take(5);
        assert_ne!(a[0].content, c[0].content);
    }

    #[test]
    fn every_body_has_a_topic() {
        for doc in SyntheticCorpus::new("topics").take(20) {
            let words: Vec<&str> = doc.content.split(' ').collect();
            assert!((60..=180).contains(&words.len()));
            assert!(TOPICS.iter().any(|t| words.contains(t)));
        }
    }

    #[test]
    fn between_stays_in_range() {
        let mut rng = SeededRng::new("r");
        for _ in 0..1000 {
            let v = rng.between(4, 10);
            assert!((4..=10).contains(&v));
        }
    }
}
