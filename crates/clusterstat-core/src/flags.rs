//! Capability flags. A field descriptor is active when every flag it
//! requires is present in the run's flag set.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Columns shown for every server.
    pub const ALWAYS: Flags = Flags(1 << 0);
    /// Prefix each line with the dialed host.
    pub const HOSTS: Flags = Flags(1 << 1);
    /// Replica-set member columns (`set`, `repl`).
    pub const REPL: Flags = Flags(1 << 2);
    /// Lock acquisition columns.
    pub const LOCKS: Flags = Flags(1 << 3);
    /// Extra columns that are hidden by default.
    pub const ALL: Flags = Flags(1 << 4);
    /// MMAPv1 storage engine.
    pub const MMAP: Flags = Flags(1 << 5);
    /// WiredTiger storage engine.
    pub const WT: Flags = Flags(1 << 6);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.union(rhs)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 7] = [
            (Flags::ALWAYS, "ALWAYS"),
            (Flags::HOSTS, "HOSTS"),
            (Flags::REPL, "REPL"),
            (Flags::LOCKS, "LOCKS"),
            (Flags::ALL, "ALL"),
            (Flags::MMAP, "MMAP"),
            (Flags::WT, "WT"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "Flags(NONE)")
        } else {
            write!(f, "Flags({})", set.join(" | "))
        }
    }
}
