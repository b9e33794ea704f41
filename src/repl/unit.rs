//! Compilation units and the append-only unit log
//!
//! A compilation unit is the lifecycle container for one accepted
//! submission: the source text, the checked fragment held by the front
//! end's shared context, and (until linked) the compiled module. The unit
//! log owns the ordered unit list, the bootstrap cursor, and the
//! submission counter used to mint injective fragment names.

use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::service::{FragmentId, ObjectModule};

/// Unique identifier for a compilation unit within one engine lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Name under which a fragment is registered in the front end's namespace
///
/// Names are minted by [`UnitLog::allocate`] and are injective across the
/// whole process: the submission ordinal and a digest of the per-session
/// seed both feed the name, so even two sessions created within the same
/// clock tick cannot collide in a shared linker namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentName(String);

impl FragmentName {
    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FragmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fragment name for a submission ordinal
///
/// Blake3 over the session seed and the ordinal, truncated; the ordinal is
/// also kept in clear for readable diagnostics.
pub fn compute_fragment_name(seed: &Uuid, ordinal: u64) -> FragmentName {
    let mut hasher = Hasher::new();
    hasher.update(seed.as_bytes());
    hasher.update(&ordinal.to_le_bytes());
    let hash = hasher.finalize();
    FragmentName(format!("repl_unit_{}_{}", ordinal, &hash.to_hex()[..12]))
}

/// What kind of submission produced a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Runtime-support unit injected before any user input, exempt from undo
    Bootstrap,
    /// An interactive snippet (possibly rewritten by the capture transform)
    Snippet,
    /// Auxiliary source registered without immediate execution
    SourceFile {
        /// Filename carried to the front end for diagnostics
        filename: String,
    },
}

/// One incrementally-compiled fragment corresponding to a single submission
#[derive(Debug)]
pub struct CompilationUnit {
    id: UnitId,
    kind: UnitKind,
    name: FragmentName,
    source: String,
    fragment: FragmentId,
    module: Option<ObjectModule>,
    accepted_at: DateTime<Utc>,
}

impl CompilationUnit {
    /// Create a unit for an accepted submission
    pub fn new(
        id: UnitId,
        kind: UnitKind,
        name: FragmentName,
        source: impl Into<String>,
        fragment: FragmentId,
        module: Option<ObjectModule>,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            source: source.into(),
            fragment,
            module,
            accepted_at: Utc::now(),
        }
    }

    /// Unit identifier
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Submission kind
    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    /// Fragment name in the front end's namespace
    pub fn name(&self) -> &FragmentName {
        &self.name
    }

    /// Source text as submitted (after any capture rewrite)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Handle of the checked fragment in the front end's shared context
    pub fn fragment(&self) -> FragmentId {
        self.fragment
    }

    /// When the front end accepted this unit
    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    /// Whether a compiled module is still held (not yet linked)
    pub fn has_module(&self) -> bool {
        self.module.is_some()
    }

    /// Move the compiled module out for linking
    ///
    /// The module is exclusively owned: once transferred into the execution
    /// session it can never be taken again, so the same allocation cannot be
    /// freed twice.
    pub fn take_module(&mut self) -> Option<ObjectModule> {
        self.module.take()
    }
}

/// Append-only log of accepted units plus session naming state
///
/// Units are append-only except via tail removal, which never crosses the
/// bootstrap cursor. Every accepted unit is import-visible to all strictly
/// later units.
pub struct UnitLog {
    units: Vec<CompilationUnit>,
    bootstrap_len: usize,
    next_ordinal: u64,
    seed: Uuid,
}

impl UnitLog {
    /// Create an empty log with a fresh naming seed
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            bootstrap_len: 0,
            next_ordinal: 0,
            seed: Uuid::new_v4(),
        }
    }

    /// Mint the id and fragment name for the next submission
    ///
    /// The ordinal is consumed even if the submission later fails, keeping
    /// the namespace injective without tracking rejected attempts.
    pub fn allocate(&mut self) -> (UnitId, FragmentName) {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        (UnitId(ordinal), compute_fragment_name(&self.seed, ordinal))
    }

    /// Append an accepted unit
    pub fn push(&mut self, unit: CompilationUnit) {
        self.units.push(unit);
    }

    /// Snapshot the current unit count as the user-code boundary
    ///
    /// Units at or below this boundary are bootstrap units, immune to undo.
    pub fn mark_user_code_start(&mut self) {
        self.bootstrap_len = self.units.len();
    }

    /// Number of leading bootstrap units
    pub fn bootstrap_len(&self) -> usize {
        self.bootstrap_len
    }

    /// Number of units eligible for undo
    pub fn user_len(&self) -> usize {
        self.units.len() - self.bootstrap_len
    }

    /// Total number of accepted units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the log holds no units
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Fragment handles of every accepted unit, in submission order
    ///
    /// This is the import list handed to the front end for the next
    /// submission.
    pub fn fragment_ids(&self) -> Vec<FragmentId> {
        self.units.iter().map(|u| u.fragment).collect()
    }

    /// Borrow the most recently accepted unit
    pub fn last(&self) -> Option<&CompilationUnit> {
        self.units.last()
    }

    /// Mutably borrow a unit by id
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut CompilationUnit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    /// Remove and return the newest unit, refusing to cross the bootstrap cursor
    pub fn pop_tail(&mut self) -> Option<CompilationUnit> {
        if self.units.len() <= self.bootstrap_len {
            return None;
        }
        self.units.pop()
    }

    /// Iterate over accepted units in submission order
    pub fn iter(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.iter()
    }
}

impl Default for UnitLog {
    fn default() -> Self {
        Self::new()
    }
}
