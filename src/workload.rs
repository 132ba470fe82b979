use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{path::Path, sync::Arc};

use crate::error::{Error, Result};

/// One query term. Cheap to clone, never mutated after load.
pub type Term = Arc<str>;

/// The finite set of terms a run draws from. Never empty.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    terms: Vec<Term>,
}

impl Vocabulary {
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Term>,
    {
        let terms: Vec<Term> = terms.into_iter().map(Into::into).collect();
        if terms.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        Ok(Self { terms })
    }

    /// Newline-delimited terms. Blank lines are skipped and a trailing `\r` is
    /// dropped.
    pub fn parse(contents: &str) -> Result<Self> {
        Self::new(
            contents
                .lines()
                .map(|line| line.strip_suffix('\r').unwrap_or(line))
                .filter(|line| !line.trim().is_empty()),
        )
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let vocabulary = Self::parse(&contents)?;
        tracing::info!(
            "Loaded {} terms from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

/// Hands out terms uniformly at random, with replacement.
///
/// Clones share one generator behind a mutex, so with a fixed seed the sequence
/// of terms handed out is reproducible in call order. Under concurrency the
/// call order itself follows task scheduling.
#[derive(Debug, Clone)]
pub struct WorkloadSource {
    vocabulary: Arc<Vocabulary>,
    rng: Arc<Mutex<StdRng>>,
}

impl WorkloadSource {
    pub fn new(vocabulary: Vocabulary, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            vocabulary: Arc::new(vocabulary),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn next_term(&self) -> Term {
        let terms = self.vocabulary.terms();
        let idx = self.rng.lock().gen_range(0..terms.len());
        Arc::clone(&terms[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, io::Write};

    #[test]
    fn parse_skips_blank_lines() {
        let vocab = Vocabulary::parse("cat\n\ndog house\r\n   \nbook\n").unwrap();
        let terms: Vec<&str> = vocab.terms().iter().map(|t| &**t).collect();
        assert_eq!(terms, ["cat", "dog house", "book"]);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            Vocabulary::parse("\n\n  \n"),
            Err(Error::EmptyVocabulary)
        ));
        assert!(matches!(
            Vocabulary::new(Vec::<String>::new()),
            Err(Error::EmptyVocabulary)
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "phone").unwrap();
        writeln!(file, "travel music").unwrap();

        let vocab = Vocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("search_terms.txt");

        match Vocabulary::load(&missing) {
            Err(Error::Io { path, source }) => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn next_term_stays_in_vocabulary() {
        let source = WorkloadSource::new(Vocabulary::new(["a", "b", "c"]).unwrap(), None);
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let term = source.next_term();
            assert!(["a", "b", "c"].contains(&&*term));
            seen.insert(term);
        }
        // uniform draws over three terms hit all of them
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn seeded_sources_agree() {
        let vocab = Vocabulary::new((0..50).map(|i| format!("term-{i}"))).unwrap();
        let a = WorkloadSource::new(vocab.clone(), Some(5));
        let b = WorkloadSource::new(vocab, Some(5));

        let left: Vec<Term> = (0..100).map(|_| a.next_term()).collect();
        let right: Vec<Term> = (0..100).map(|_| b.next_term()).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn clones_share_one_generator() {
        let vocab = Vocabulary::new((0..50).map(|i| format!("term-{i}"))).unwrap();
        let reference = WorkloadSource::new(vocab.clone(), Some(8));
        let expected: Vec<Term> = (0..10).map(|_| reference.next_term()).collect();

        let source = WorkloadSource::new(vocab, Some(8));
        let twin = source.clone();
        let interleaved: Vec<Term> = (0..10)
            .map(|i| if i % 2 == 0 { source.next_term() } else { twin.next_term() })
            .collect();
        assert_eq!(interleaved, expected);
    }
}
