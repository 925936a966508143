//! Reference allocation
//!
//! A [`RefAllocator`] hands out one [`Ref`] per object for the duration of a
//! single packaging run. Ref strings come from an injected [`IdGenerator`];
//! collision avoidance across runs is the generator's job, uniqueness inside a
//! run is enforced here.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use uuid::Uuid;

use crate::error::{PackageError, PackageResult};
use crate::types::{ObjectId, Ref};

/// Attempts made to draw an unused Ref before giving up
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 16;

/// Produces short identifier strings
pub trait IdGenerator: Send + Sync {
    /// A new identifier of (at least) `length` characters
    fn generate(&self, length: usize) -> String;
}

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Draws before a too-short length is widened by one character
const DRAWS_PER_LENGTH: u32 = 1024;

/// Random base-62 identifiers that never repeat within the generator's lifetime.
///
/// Entropy comes from v4 UUIDs. Use [`ShortIdGenerator::global`] for
/// process-wide uniqueness.
#[derive(Debug, Default)]
pub struct ShortIdGenerator {
    issued: Mutex<HashSet<String>>,
}

impl ShortIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator shared by the whole process
    pub fn global() -> &'static ShortIdGenerator {
        static GLOBAL: OnceLock<ShortIdGenerator> = OnceLock::new();
        GLOBAL.get_or_init(ShortIdGenerator::new)
    }

    /// Number of identifiers issued so far
    pub fn issued_count(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn random_string(length: usize) -> String {
        let mut out = String::with_capacity(length);
        while out.len() < length {
            for byte in Uuid::new_v4().as_bytes() {
                if out.len() == length {
                    break;
                }
                out.push(ALPHABET[usize::from(*byte) % ALPHABET.len()] as char);
            }
        }
        out
    }
}

impl IdGenerator for ShortIdGenerator {
    fn generate(&self, length: usize) -> String {
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut length = length.max(1);
        let mut draws = 0;
        loop {
            let candidate = Self::random_string(length);
            if issued.insert(candidate.clone()) {
                return candidate;
            }
            draws += 1;
            if draws % DRAWS_PER_LENGTH == 0 {
                length += 1;
            }
        }
    }
}

/// Deterministic identifiers: `prefix` followed by a zero-padded counter
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("r")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self, length: usize) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let width = length.saturating_sub(self.prefix.len());
        format!("{}{:0width$}", self.prefix, n, width = width)
    }
}

/// Assigns Refs to objects for one packaging run
pub struct RefAllocator<'a> {
    ids: &'a dyn IdGenerator,
    length: usize,
    issued: HashSet<Ref>,
    refs: BTreeMap<ObjectId, Ref>,
}

impl<'a> RefAllocator<'a> {
    pub fn new(ids: &'a dyn IdGenerator, length: usize) -> Self {
        Self {
            ids,
            length,
            issued: HashSet::new(),
            refs: BTreeMap::new(),
        }
    }

    /// Ref for `object`, allocating one on first request
    pub fn allocate(&mut self, object: ObjectId) -> PackageResult<Ref> {
        if let Some(existing) = self.refs.get(&object) {
            return Ok(existing.clone());
        }

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let candidate = Ref::new(self.ids.generate(self.length));
            if candidate.as_str().is_empty() || !self.issued.insert(candidate.clone()) {
                continue;
            }
            self.refs.insert(object, candidate.clone());
            return Ok(candidate);
        }

        Err(PackageError::RefSpaceExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    pub fn get(&self, object: ObjectId) -> Option<&Ref> {
        self.refs.get(&object)
    }

    pub fn refs(&self) -> &BTreeMap<ObjectId, Ref> {
        &self.refs
    }

    pub fn into_refs(self) -> BTreeMap<ObjectId, Ref> {
        self.refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::{mock, Sequence};

    mock! {
        pub Ids {}

        impl IdGenerator for Ids {
            fn generate(&self, length: usize) -> String;
        }
    }

    #[test]
    fn test_short_ids_have_requested_length_and_alphabet() {
        let generator = ShortIdGenerator::new();
        for length in [4, 8, 16, 40] {
            let id = generator.generate(length);
            assert_eq!(id.len(), length);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
        }
        assert_eq!(generator.issued_count(), 4);
    }

    #[test]
    fn test_short_ids_never_repeat() {
        let generator = ShortIdGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            assert!(seen.insert(generator.generate(2)));
        }
    }

    #[test]
    fn test_short_ids_widen_when_length_is_exhausted() {
        let generator = ShortIdGenerator::new();
        // 62 one-character ids exist; the 63rd must be longer.
        let ids: Vec<String> = (0..63).map(|_| generator.generate(1)).collect();
        assert!(ids.iter().any(|id| id.len() > 1));
    }

    #[test]
    fn test_sequential_ids() {
        let generator = SequentialIdGenerator::new("r");
        assert_eq!(generator.generate(4), "r001");
        assert_eq!(generator.generate(4), "r002");
        assert_eq!(generator.generate(0), "r3");
    }

    #[test]
    fn test_allocate_is_stable_per_object() {
        let generator = SequentialIdGenerator::default();
        let mut allocator = RefAllocator::new(&generator, 6);
        let first = allocator.allocate(ObjectId(1)).unwrap();
        let again = allocator.allocate(ObjectId(1)).unwrap();
        let other = allocator.allocate(ObjectId(2)).unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(allocator.refs().len(), 2);
        assert_eq!(allocator.get(ObjectId(2)), Some(&other));
    }

    #[test]
    fn test_allocate_regenerates_on_collision() {
        let mut ids = MockIds::new();
        let mut seq = Sequence::new();
        ids.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .return_const("dup".to_string());
        ids.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .return_const("dup".to_string());
        ids.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .return_const("fresh".to_string());

        let mut allocator = RefAllocator::new(&ids, 8);
        assert_eq!(allocator.allocate(ObjectId(1)).unwrap().as_str(), "dup");
        assert_eq!(allocator.allocate(ObjectId(2)).unwrap().as_str(), "fresh");
    }

    #[test]
    fn test_allocate_gives_up_after_repeated_collisions() {
        let mut ids = MockIds::new();
        ids.expect_generate().return_const("same".to_string());

        let mut allocator = RefAllocator::new(&ids, 8);
        allocator.allocate(ObjectId(1)).unwrap();
        let err = allocator.allocate(ObjectId(2)).unwrap_err();
        assert!(matches!(
            err,
            PackageError::RefSpaceExhausted {
                attempts: MAX_ALLOCATION_ATTEMPTS
            }
        ));
        assert_eq!(allocator.into_refs().len(), 1);
    }
}
