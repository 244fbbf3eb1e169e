//! Rename Mapper — from the `ProjectIndex`, produce a single
//! deterministic map: original name -> obfuscated token.

use std::collections::{HashMap, HashSet};

use crate::error::TransformError;
use crate::indexer::ProjectIndex;
use crate::model::{is_dunder, is_python_keyword, is_python_builtin, Provenance};

#[derive(Debug, Default)]
pub struct RenameMap {
    pub mapping: HashMap<String, String>,
    pub provenance: HashMap<String, Provenance>,
}

impl RenameMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.mapping.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mapping.contains_key(name)
    }
}

/// Deterministic token generator: `aa, ab, ..., az, ba, ..., zz`, then
/// `aaa, aab, ...` once the two-letter space (676 tokens) is
/// exhausted, so the alphabet never runs out regardless of how many
/// distinct identifiers a project declares.
struct TokenGenerator {
    width: usize,
    counter: u64,
}

impl TokenGenerator {
    fn new() -> Self {
        Self { width: 2, counter: 0 }
    }

    fn capacity(width: usize) -> u64 {
        26u64.pow(width as u32)
    }

    fn next_token(&mut self) -> String {
        if self.counter >= Self::capacity(self.width) {
            self.width += 1;
            self.counter = 0;
        }
        let token = to_base26(self.counter, self.width);
        self.counter += 1;
        token
    }
}

fn to_base26(mut n: u64, width: usize) -> String {
    let mut letters = vec![b'a'; width];
    for slot in letters.iter_mut().rev() {
        *slot = b'a' + (n % 26) as u8;
        n /= 26;
    }
    String::from_utf8(letters).expect("ascii letters only")
}

pub struct RenameMapper;

impl RenameMapper {
    /// Public contract: `build_map(index) -> RenameMap`.
    pub fn build_map(index: &ProjectIndex) -> Result<RenameMap, TransformError> {
        let mut domain: Vec<&String> = index
            .rename_candidates
            .union(&index.likely_local_attribute_names)
            .filter(|n| !is_dunder(n) && !is_python_keyword(n) && !index.external_names.contains(*n))
            .collect();
        domain.sort();
        domain.dedup();

        let mut mapping = HashMap::new();
        let mut provenance = HashMap::new();
        let mut used_tokens: HashSet<String> = index.all_identifiers.clone();
        let mut generator = TokenGenerator::new();

        let mut attempted = 0usize;
        for name in domain {
            let token = loop {
                attempted += 1;
                if attempted > 1_000_000 {
                    return Err(TransformError::TokenExhaustion { attempted });
                }
                let candidate = generator.next_token();
                if !used_tokens.contains(&candidate)
                    && !is_python_keyword(&candidate)
                    && !is_python_builtin(&candidate)
                {
                    break candidate;
                }
            };
            used_tokens.insert(token.clone());

            let is_declared = index.declarations.values().any(|d| &d.name == name);
            provenance.insert(
                name.clone(),
                if is_declared {
                    Provenance::ResolvedLocal
                } else {
                    Provenance::LikelyLocal
                },
            );
            mapping.insert(name.clone(), token);
        }

        Ok(RenameMap {
            mapping,
            provenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_generator_is_deterministic_and_injective() {
        let mut gen_a = TokenGenerator::new();
        let mut gen_b = TokenGenerator::new();
        let seq_a: Vec<String> = (0..700).map(|_| gen_a.next_token()).collect();
        let seq_b: Vec<String> = (0..700).map(|_| gen_b.next_token()).collect();
        assert_eq!(seq_a, seq_b);
        let unique: HashSet<&String> = seq_a.iter().collect();
        assert_eq!(unique.len(), seq_a.len());
    }

    #[test]
    fn extends_past_two_letters() {
        let mut gen = TokenGenerator::new();
        let all: Vec<String> = (0..680).map(|_| gen.next_token()).collect();
        assert!(all[676].len() == 3);
    }
}
