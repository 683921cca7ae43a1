use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{CODE_ALPHABET, CODE_LENGTH};
use crate::error::{LotteryError, LotteryResult};

/// One row of the admin code list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CodeStatus {
    pub code: String,
    pub consumed: bool,
}

/// Generate a random uppercase alphanumeric code of [`CODE_LENGTH`] characters.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Issued and consumed codes. Every consumed code is also issued.
#[derive(Debug, Default, Clone)]
pub struct CodeStore {
    issued: Vec<String>,
    issued_index: HashSet<String>,
    consumed: Vec<String>,
    consumed_index: HashSet<String>,
}

impl CodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from persisted records, dropping duplicates and
    /// consumed entries that were never issued.
    pub fn from_records(issued: Vec<String>, consumed: Vec<String>) -> Self {
        let mut store = Self::new();
        for code in issued {
            if store.issued_index.insert(code.clone()) {
                store.issued.push(code);
            }
        }
        store.replace_consumed(consumed);
        store
    }

    /// Replaces the consumed set with a freshly loaded record.
    pub fn replace_consumed(&mut self, consumed: Vec<String>) {
        self.consumed.clear();
        self.consumed_index.clear();
        for code in consumed {
            if !self.issued_index.contains(&code) {
                log::warn!("Dropping consumed code {} that is not issued", code);
                continue;
            }
            if self.consumed_index.insert(code.clone()) {
                self.consumed.push(code);
            }
        }
    }

    pub fn is_issued(&self, code: &str) -> bool {
        self.issued_index.contains(code)
    }

    pub fn is_consumed(&self, code: &str) -> bool {
        self.consumed_index.contains(code)
    }

    pub fn issue(&mut self, code: &str) -> LotteryResult<()> {
        if self.is_issued(code) {
            return Err(LotteryError::AlreadyExists(code.to_string()));
        }
        self.issued.push(code.to_string());
        self.issued_index.insert(code.to_string());
        Ok(())
    }

    /// Keeps asking `generator` for codes until one is free, giving up after
    /// `max_attempts` collisions.
    pub fn issue_random<G>(&mut self, generator: &mut G, max_attempts: u32) -> LotteryResult<String>
    where
        G: FnMut() -> String,
    {
        for _ in 0..max_attempts {
            let code = generator();
            if !self.is_issued(&code) {
                self.issue(&code)?;
                return Ok(code);
            }
        }
        Err(LotteryError::CapacityExhausted { attempts: max_attempts })
    }

    /// Issues `count` random codes. Either all are issued or none are.
    pub fn bulk_issue_random<G>(
        &mut self,
        count: u32,
        generator: &mut G,
        max_attempts: u32,
    ) -> LotteryResult<Vec<String>>
    where
        G: FnMut() -> String,
    {
        let mut batch = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.issue_random(generator, max_attempts) {
                Ok(code) => batch.push(code),
                Err(e) => {
                    for code in &batch {
                        self.remove_issued(code);
                    }
                    return Err(e);
                }
            }
        }
        Ok(batch)
    }

    /// Marks a code as redeemed. Fails if the code is unknown or was already
    /// redeemed, so only one caller can ever consume a given code.
    pub fn consume(&mut self, code: &str) -> LotteryResult<()> {
        if !self.is_issued(code) {
            return Err(LotteryError::NotFound);
        }
        if !self.consumed_index.insert(code.to_string()) {
            return Err(LotteryError::AlreadyConsumed);
        }
        self.consumed.push(code.to_string());
        Ok(())
    }

    /// Undo for a consume whose persistence failed.
    pub(crate) fn unconsume(&mut self, code: &str) {
        if self.consumed_index.remove(code) {
            self.consumed.retain(|c| c != code);
        }
    }

    pub(crate) fn remove_issued(&mut self, code: &str) {
        if self.issued_index.remove(code) {
            self.issued.retain(|c| c != code);
        }
    }

    /// Removes a code from both sets. Unknown codes are ignored.
    pub fn delete(&mut self, code: &str) {
        self.remove_issued(code);
        self.unconsume(code);
    }

    pub fn list(&self) -> Vec<CodeStatus> {
        self.issued
            .iter()
            .map(|code| CodeStatus {
                code: code.clone(),
                consumed: self.is_consumed(code),
            })
            .collect()
    }

    pub fn issued(&self) -> &[String] {
        &self.issued
    }

    pub fn consumed(&self) -> &[String] {
        &self.consumed
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_code_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_issue_then_list_and_consume() {
        let mut store = CodeStore::new();
        store.issue("ABC123").unwrap();
        assert_eq!(
            store.list(),
            vec![CodeStatus { code: "ABC123".into(), consumed: false }]
        );

        store.consume("ABC123").unwrap();
        assert_eq!(
            store.list(),
            vec![CodeStatus { code: "ABC123".into(), consumed: true }]
        );
    }

    #[test]
    fn test_issue_duplicate() {
        let mut store = CodeStore::new();
        store.issue("DUP").unwrap();
        assert_eq!(store.issue("DUP"), Err(LotteryError::AlreadyExists("DUP".into())));
    }

    #[test]
    fn test_consume_twice_fails() {
        let mut store = CodeStore::new();
        store.issue("ONCE").unwrap();
        assert!(store.consume("ONCE").is_ok());
        assert_eq!(store.consume("ONCE"), Err(LotteryError::AlreadyConsumed));
        assert_eq!(store.consume("NEVER"), Err(LotteryError::NotFound));
    }

    #[test]
    fn test_delete_purges_both_sets() {
        let mut store = CodeStore::new();
        store.issue("GONE").unwrap();
        store.consume("GONE").unwrap();
        store.delete("GONE");
        store.delete("GONE");
        assert!(!store.is_issued("GONE"));
        assert!(!store.is_consumed("GONE"));
        assert!(store.list().is_empty());

        // A re-issued code starts unconsumed.
        store.issue("GONE").unwrap();
        assert!(!store.is_consumed("GONE"));
    }

    #[test]
    fn test_issue_random_skips_collisions() {
        let mut store = CodeStore::new();
        store.issue("AAAAAAAA").unwrap();
        let mut candidates = vec!["BBBBBBBB", "AAAAAAAA"];
        let mut generator = || candidates.pop().unwrap().to_string();
        assert_eq!(store.issue_random(&mut generator, 5).unwrap(), "BBBBBBBB");
    }

    #[test]
    fn test_issue_random_is_bounded() {
        let mut store = CodeStore::new();
        store.issue("SAME").unwrap();
        let mut calls = 0;
        let mut generator = || {
            calls += 1;
            "SAME".to_string()
        };
        let err = store.issue_random(&mut generator, 10).unwrap_err();
        assert_eq!(err, LotteryError::CapacityExhausted { attempts: 10 });
        assert_eq!(calls, 10);
    }

    #[test]
    fn test_bulk_issue_rolls_back_on_exhaustion() {
        let mut store = CodeStore::new();
        let mut candidates = vec!["X", "X", "X", "B", "A"];
        let mut generator = || candidates.pop().unwrap_or("X").to_string();
        let err = store.bulk_issue_random(4, &mut generator, 3).unwrap_err();
        assert!(matches!(err, LotteryError::CapacityExhausted { .. }));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_from_records_drops_orphans() {
        let store = CodeStore::from_records(
            vec!["A".into(), "B".into(), "A".into()],
            vec!["B".into(), "Z".into()],
        );
        assert_eq!(store.issued(), &["A".to_string(), "B".to_string()]);
        assert_eq!(store.consumed(), &["B".to_string()]);
    }
}
