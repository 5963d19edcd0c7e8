//! Pair classification rules
//!
//! The engine turns what it saw during a scan into an [`Observation`] per
//! pair. [`classify`] maps that observation to a [`Decision`]; no I/O
//! happens here. [`plan_applies`] orders the resulting pending pairs.
//!
//! ## Rule order
//!
//! 1. A pair tracking one side only is still being created on the other.
//! 2. Both sides gone: the row is dropped.
//! 3. One side gone: wait out the debounce window, then delete the other
//!    side, unless the other side was modified (it is recreated instead).
//! 4. Conflicted pairs stay conflicted until both sides agree again.
//! 5. Moves before content: a move and an edit are applied over two cycles.
//! 6. Content changed on both sides: conflicted, or converged when equal.
//! 7. Content changed on one side: `*_modified`.

use docsync_core::domain::{PairId, PairState, SyncPair};

// ============================================================================
// Observations
// ============================================================================

/// Which side of a pair a decision refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// What a scan revealed about one side of a pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideObservation {
    /// The pair records this side (path or ref)
    pub tracked: bool,
    /// The entity was found in the scan
    pub present: bool,
    /// Content digest differs from the snapshot (never for folders)
    pub content_changed: bool,
    /// Path, parent or name differs from the snapshot
    pub moved: bool,
}

impl SideObservation {
    pub fn untracked() -> Self {
        Self::default()
    }

    pub fn missing() -> Self {
        Self {
            tracked: true,
            ..Self::default()
        }
    }

    pub fn present(content_changed: bool, moved: bool) -> Self {
        Self {
            tracked: true,
            present: true,
            content_changed,
            moved,
        }
    }
}

/// Both sides of a pair, plus the comparisons that need extra I/O
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    pub local: SideObservation,
    pub remote: SideObservation,
    /// Current local and remote contents are equal, when it was checked
    pub same_content: Option<bool>,
    /// Both sides moved to corresponding locations
    pub same_location: bool,
}

// ============================================================================
// Decisions
// ============================================================================

/// Outcome of classifying one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Put the pair in this state (possibly the state it already has)
    Keep(PairState),
    /// Both sides hold the same content: refresh both snapshots
    Converged,
    /// Both sides moved to the same place: refresh names and parents only
    Relocated,
    /// The side is missing but the debounce window is still open
    AwaitDebounce(Side),
    /// Nothing left to track
    DropRow,
    /// The other side was deleted while this side changed: recreate from it
    RecreateFrom(Side),
}

/// Returns true when [`classify`] needs [`Observation::same_content`]
pub fn needs_content_check(pair: &SyncPair, obs: &Observation) -> bool {
    let both_present = obs.local.present && obs.remote.present;
    both_present
        && !pair.folderish
        && ((obs.local.content_changed && obs.remote.content_changed)
            || pair.pair_state == PairState::Conflicted)
}

/// Classifies one non-root pair
pub fn classify(pair: &SyncPair, obs: &Observation, debounce_cycles: u32) -> Decision {
    let local = obs.local;
    let remote = obs.remote;

    match (local.tracked, remote.tracked) {
        (false, false) => return Decision::DropRow,
        (true, false) => {
            return if local.present {
                Decision::Keep(PairState::LocallyCreated)
            } else {
                Decision::DropRow
            };
        }
        (false, true) => {
            return if remote.present {
                Decision::Keep(PairState::RemotelyCreated)
            } else {
                Decision::DropRow
            };
        }
        (true, true) => {}
    }

    if !local.present && !remote.present {
        return Decision::DropRow;
    }

    let conflicted = pair.pair_state == PairState::Conflicted;
    let debounce = debounce_cycles.max(1);

    if !local.present {
        if pair.local_missing_cycles + 1 < debounce {
            return Decision::AwaitDebounce(Side::Local);
        }
        return if remote.content_changed || conflicted {
            Decision::RecreateFrom(Side::Remote)
        } else {
            Decision::Keep(PairState::LocallyDeleted)
        };
    }

    if !remote.present {
        if pair.remote_missing_cycles + 1 < debounce {
            return Decision::AwaitDebounce(Side::Remote);
        }
        return if local.content_changed || conflicted {
            Decision::RecreateFrom(Side::Local)
        } else {
            Decision::Keep(PairState::RemotelyDeleted)
        };
    }

    if conflicted {
        let settled = !local.moved
            && !remote.moved
            && (pair.folderish || obs.same_content == Some(true));
        return if settled {
            Decision::Converged
        } else {
            Decision::Keep(PairState::Conflicted)
        };
    }

    if local.moved && remote.moved {
        return if obs.same_location {
            Decision::Relocated
        } else {
            Decision::Keep(PairState::Conflicted)
        };
    }
    if local.moved {
        return Decision::Keep(PairState::LocallyMoved);
    }
    if remote.moved {
        return Decision::Keep(PairState::RemotelyMoved);
    }

    match (local.content_changed, remote.content_changed) {
        (true, true) if obs.same_content == Some(true) => Decision::Converged,
        (true, true) => Decision::Keep(PairState::Conflicted),
        (true, false) => Decision::Keep(PairState::LocallyModified),
        (false, true) => Decision::Keep(PairState::RemotelyModified),
        (false, false) => Decision::Keep(PairState::Synchronized),
    }
}

// ============================================================================
// Apply planning
// ============================================================================

/// Apply phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApplyPhase {
    /// Deletions, deepest first
    Delete,
    /// Creations and moves, shallowest first
    Structure,
    /// Content updates
    Update,
}

impl ApplyPhase {
    /// Phase a pending state belongs to, `None` for non-pending states
    pub fn of(state: PairState) -> Option<Self> {
        if state.is_deletion() {
            Some(ApplyPhase::Delete)
        } else if state.is_structural() {
            Some(ApplyPhase::Structure)
        } else if state.is_modification() {
            Some(ApplyPhase::Update)
        } else {
            None
        }
    }
}

/// One pending pair scheduled for an apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedApply {
    pub pair_id: PairId,
    pub state: PairState,
    /// Tree depth of the entity on whichever side it exists
    pub depth: usize,
}

/// Drops non-pending entries and sorts the rest into apply order
///
/// Deletes run bottom-up so folders are emptied first. Creates and moves run
/// top-down so parents exist before their children. Pair ids break ties.
pub fn plan_applies(mut items: Vec<PlannedApply>) -> Vec<PlannedApply> {
    items.retain(|item| ApplyPhase::of(item.state).is_some());
    items.sort_by(|a, b| {
        let phase_a = ApplyPhase::of(a.state);
        let phase_b = ApplyPhase::of(b.state);
        phase_a
            .cmp(&phase_b)
            .then_with(|| match phase_a {
                Some(ApplyPhase::Delete) => b.depth.cmp(&a.depth),
                _ => a.depth.cmp(&b.depth),
            })
            .then_with(|| a.pair_id.as_i64().cmp(&b.pair_id.as_i64()))
    });
    items
}
