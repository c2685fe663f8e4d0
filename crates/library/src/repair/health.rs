use revive_torrent::state::StateFile;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Presence and validity of one copy of a state document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantHealth {
    pub present: bool,
    pub valid: bool,
}

impl VariantHealth {
    pub const MISSING: Self = Self { present: false, valid: false };
    pub const VALID: Self = Self { present: true, valid: true };
    pub const INVALID: Self = Self { present: true, valid: false };

    fn label(&self) -> &'static str {
        match (self.present, self.valid) {
            (false, _) => "missing",
            (true, true) => "valid",
            (true, false) => "invalid",
        }
    }
}

/// The state of every copy of one download's state document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFileHealth {
    /// Upper-case hex info-hash the files are named after.
    pub id: String,
    variants: [VariantHealth; 4],
}

/// What to do about a download's state files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Primary and backup are both valid.
    Healthy,
    /// Write this copy into both the primary and the backup slot.
    Restore(StateFile),
    /// No copy is valid.
    Unrecoverable,
}

impl StateFileHealth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variants: [VariantHealth::MISSING; 4],
        }
    }

    pub fn with(mut self, kind: StateFile, health: VariantHealth) -> Self {
        self.set(kind, health);
        self
    }

    pub fn set(&mut self, kind: StateFile, health: VariantHealth) {
        self.variants[Self::slot(kind)] = health;
    }

    pub fn get(&self, kind: StateFile) -> VariantHealth {
        self.variants[Self::slot(kind)]
    }

    fn slot(kind: StateFile) -> usize {
        match kind {
            StateFile::Primary => 0,
            StateFile::Backup => 1,
            StateFile::WriteAhead => 2,
            StateFile::Saving => 3,
        }
    }

    /// Apply the repair rules, first match wins:
    ///
    /// 1. primary and backup valid: healthy;
    /// 2. primary valid: restore from primary;
    /// 3. backup valid: restore from backup;
    /// 4. write-ahead temporary valid: promote it;
    /// 5. saving temporary valid: promote it;
    /// 6. otherwise unrecoverable.
    pub fn decide(&self) -> Decision {
        if self.get(StateFile::Primary).valid && self.get(StateFile::Backup).valid {
            return Decision::Healthy;
        }
        StateFile::ALL
            .into_iter()
            .find(|kind| self.get(*kind).valid)
            .map_or(Decision::Unrecoverable, Decision::Restore)
    }
}

impl Display for StateFileHealth {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let flags: Vec<String> =
            StateFile::ALL.iter().map(|kind| format!("{}={}", kind.suffix(), self.get(*kind).label())).collect();
        write!(f, "{} [{}]", self.id, flags.join(" "))
    }
}
