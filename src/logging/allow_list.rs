/// Which logger prefixes may emit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowList {
    /// No restriction (the empty list).
    #[default]
    All,
    /// Emit only when the logger prefix contains one of these substrings.
    Only(Vec<String>),
    /// Emit nothing.
    Nothing,
}

impl AllowList {
    /// Build from a list; an empty list allows everything.
    pub fn from_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = AllowList::All;
        for p in prefixes {
            list.add(p);
        }
        list
    }

    pub fn permits(&self, prefix: &str) -> bool {
        match self {
            AllowList::All => true,
            AllowList::Only(allowed) => allowed.iter().any(|a| prefix.contains(a.as_str())),
            AllowList::Nothing => false,
        }
    }

    pub fn add(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        match self {
            AllowList::Only(allowed) => {
                if !allowed.contains(&prefix) {
                    allowed.push(prefix);
                }
            }
            AllowList::All | AllowList::Nothing => *self = AllowList::Only(vec![prefix]),
        }
    }

    /// Remove one entry. Removing the last entry leaves the list empty, which allows everything.
    pub fn remove(&mut self, prefix: &str) -> bool {
        if let AllowList::Only(allowed) = self {
            let before = allowed.len();
            allowed.retain(|a| a != prefix);
            let removed = allowed.len() != before;
            if allowed.is_empty() {
                *self = AllowList::All;
            }
            return removed;
        }
        false
    }

    pub fn entries(&self) -> &[String] {
        match self {
            AllowList::Only(allowed) => allowed,
            _ => &[],
        }
    }
}
