//! Variable manager: four nested variable tables (global, stanza,
//! application, substance) with shadowing lookup.

use crate::error::{SimResult, VariableError};
use crate::number::EngineNumber;
use crate::scope::ContextLevel;
use crate::sorted_vec_map::SortedVecMap;

/// Names reserved for synthesized values. Neither `defineVariable` nor
/// `setVariable` may touch them; reads are synthesized by the engine rather
/// than stored here.
pub const PROTECTED_NAMES: [&str; 2] = ["yearsElapsed", "yearAbsolute"];

pub fn is_protected(name: &str) -> bool {
    PROTECTED_NAMES.contains(&name)
}

/// Four nested tables of `name -> EngineNumber`, one per [`ContextLevel`].
///
/// Lookup walks inward-to-outward (substance, then application, then
/// stanza, then global) and returns the first hit. `set` writes to the
/// innermost level that already holds the name, falling back to global if
/// the name isn't defined anywhere — define-before-set is the common case,
/// but a set of an undefined name still has to land somewhere (loop
/// induction variables, for instance).
#[derive(Debug, Clone, Default)]
pub struct VariableManager {
    global: SortedVecMap<String, EngineNumber>,
    stanza: SortedVecMap<String, EngineNumber>,
    application: SortedVecMap<String, EngineNumber>,
    substance: SortedVecMap<String, EngineNumber>,
}

impl VariableManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, level: ContextLevel) -> &SortedVecMap<String, EngineNumber> {
        match level {
            ContextLevel::Global => &self.global,
            ContextLevel::Stanza => &self.stanza,
            ContextLevel::Application => &self.application,
            ContextLevel::Substance => &self.substance,
        }
    }

    fn table_mut(&mut self, level: ContextLevel) -> &mut SortedVecMap<String, EngineNumber> {
        match level {
            ContextLevel::Global => &mut self.global,
            ContextLevel::Stanza => &mut self.stanza,
            ContextLevel::Application => &mut self.application,
            ContextLevel::Substance => &mut self.substance,
        }
    }

    /// Resets the tables at and below `level` (used when entering a child
    /// scope: variable tables at and below that level are cleared so they
    /// don't leak values from a sibling scope).
    pub fn reset_at_and_below(&mut self, level: ContextLevel) {
        if level <= ContextLevel::Substance {
            self.substance.clear();
        }
        if level <= ContextLevel::Application {
            self.application.clear();
        }
        if level <= ContextLevel::Stanza {
            self.stanza.clear();
        }
        if level <= ContextLevel::Global {
            self.global.clear();
        }
    }

    /// Defines `name` at `level`. Fails if already defined at that exact
    /// level (shadowing a name defined at an *outer* level is allowed).
    pub fn define(&mut self, level: ContextLevel, name: &str, value: EngineNumber) -> SimResult<()> {
        if is_protected(name) {
            return Err(VariableError::ProtectedName(name.to_string()).into());
        }
        let table = self.table_mut(level);
        if table.contains_key(&name.to_string()) {
            return Err(VariableError::AlreadyDefined(name.to_string()).into());
        }
        table.insert(name.to_string(), value);
        Ok(())
    }

    /// Walks inward-to-outward from `level`, returning the first defined
    /// value.
    pub fn get(&self, level: ContextLevel, name: &str) -> SimResult<&EngineNumber> {
        for candidate in Self::levels_from(level) {
            if let Some(v) = self.table(candidate).get(&name.to_string()) {
                return Ok(v);
            }
        }
        Err(VariableError::Undefined(name.to_string()).into())
    }

    /// Writes to the innermost level (at or above `level`, inward-to-outward)
    /// that already holds `name`; if undefined anywhere, defines it at
    /// `level`.
    pub fn set(&mut self, level: ContextLevel, name: &str, value: EngineNumber) -> SimResult<()> {
        if is_protected(name) {
            return Err(VariableError::ProtectedName(name.to_string()).into());
        }
        for candidate in Self::levels_from(level) {
            if self.table(candidate).contains_key(&name.to_string()) {
                self.table_mut(candidate).insert(name.to_string(), value);
                return Ok(());
            }
        }
        self.table_mut(level).insert(name.to_string(), value);
        Ok(())
    }

    /// Inward-to-outward level order starting at `level`.
    fn levels_from(level: ContextLevel) -> impl Iterator<Item = ContextLevel> {
        const ORDER: [ContextLevel; 4] = [
            ContextLevel::Substance,
            ContextLevel::Application,
            ContextLevel::Stanza,
            ContextLevel::Global,
        ];
        let start = ORDER.iter().position(|&l| l == level).unwrap_or(0);
        ORDER[start..].iter().copied()
    }
}
