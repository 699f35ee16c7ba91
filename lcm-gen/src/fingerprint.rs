//! The deterministic 64-bit structure hash.
//!
//! Peer implementations in other host languages compute the same chain,
//! so every operation here is fixed-width: the inner mix runs on `i64`
//! with an arithmetic right shift and wrapping arithmetic, while the
//! final one-bit rotation runs on `u64` with a logical shift. Swapping
//! either for the other changes fingerprints for some inputs.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{DimMode, Struct};
use crate::error::Error;

/// Seed of the hash chain.
const SEED: i64 = 0x12345678;

/// Mix one value into the chain: `v = ((v << 8) ^ (v >> 55)) + c`.
fn mix(v: i64, c: i64) -> i64 {
    (v.wrapping_shl(8) ^ (v >> 55)).wrapping_add(c)
}

/// Mix a string: its length in code units first, then each UTF-16 code
/// unit in order. All identifiers are ASCII in practice.
fn mix_string(v: i64, s: &str) -> i64 {
    let mut v = mix(v, s.encode_utf16().count() as i64);
    for unit in s.encode_utf16() {
        v = mix(v, i64::from(unit));
    }
    v
}

/// Base hash of a struct, covering its own members only. User-defined
/// member types contribute through [`Resolver::hash`], not here.
pub fn base_hash(st: &Struct) -> i64 {
    let mut v = SEED;
    for member in &st.members {
        v = mix_string(v, &member.name);
        if member.ty.primitive {
            v = mix_string(v, &member.ty.short);
        }
        v = mix(v, member.dims.len() as i64);
        for dim in &member.dims {
            v = mix(
                v,
                match dim.mode {
                    DimMode::Const => 0,
                    DimMode::Var => 1,
                },
            );
            v = mix_string(v, &dim.size);
        }
    }
    v
}

/// Derive the emitted fingerprint from a fully mixed hash: a one-bit
/// rotation left in unsigned arithmetic.
pub fn rotate(hash: i64) -> u64 {
    (hash as u64).rotate_left(1)
}

/// Resolves user-defined type references against every struct parsed in
/// one generator invocation and memoizes their fully mixed hashes.
pub struct Resolver<'a> {
    by_name: HashMap<String, &'a Struct>,
    hashes: HashMap<String, i64>,
}

impl<'a> Resolver<'a> {
    /// Index `structs` by fully qualified name.
    pub fn new(structs: impl IntoIterator<Item = &'a Struct>) -> Self {
        Self {
            by_name: structs
                .into_iter()
                .map(|st| (st.full_name(), st))
                .collect(),
            hashes: HashMap::new(),
        }
    }

    /// Look up a struct by fully qualified name.
    pub fn lookup(&self, full_name: &str) -> Option<&'a Struct> {
        self.by_name.get(full_name).copied()
    }

    /// Fully mixed hash of a struct: its base hash plus, modulo 2⁶⁴, the
    /// hash of every distinct user-defined type it transitively
    /// contains.
    pub fn hash(&mut self, st: &'a Struct) -> Result<i64, Error> {
        let full_name = st.full_name();
        if let Some(hash) = self.hashes.get(&full_name) {
            return Ok(*hash);
        }

        let mut contained = BTreeMap::new();
        self.collect_contained(st, &mut contained)?;
        if contained.contains_key(&full_name) {
            return Err(Error::CircularType(full_name));
        }

        let mut hash = base_hash(st);
        for nested in contained.into_values() {
            hash = hash.wrapping_add(self.hash(nested)?);
        }
        self.hashes.insert(full_name, hash);
        Ok(hash)
    }

    /// Emitted fingerprint of a struct.
    pub fn fingerprint(&mut self, st: &'a Struct) -> Result<u64, Error> {
        Ok(rotate(self.hash(st)?))
    }

    /// Collect the distinct user-defined types transitively reachable
    /// from `st`, keyed by fully qualified name.
    fn collect_contained(
        &self,
        st: &'a Struct,
        out: &mut BTreeMap<String, &'a Struct>,
    ) -> Result<(), Error> {
        for member in &st.members {
            if member.ty.primitive || out.contains_key(&member.ty.full) {
                continue;
            }
            let nested = self
                .lookup(&member.ty.full)
                .ok_or_else(|| Error::UnresolvedType(member.ty.full.clone()))?;
            out.insert(member.ty.full.clone(), nested);
            self.collect_contained(nested, out)?;
        }
        Ok(())
    }
}
