///! Stale-response guard for views that load data asynchronously

/// Proof of which navigation a pending load belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket {
    generation: u64,
}

/// Data shown by one view.
///
/// Every navigation bumps the generation. A response carrying a ticket from
/// an older navigation is dropped, so a slow reply can never overwrite what
/// the user has since moved on to.
#[derive(Debug)]
pub struct ViewState<K, T> {
    generation: u64,
    key: Option<K>,
    value: Option<T>,
}

impl<K: PartialEq, T> Default for ViewState<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq, T> ViewState<K, T> {
    pub fn new() -> Self {
        Self {
            generation: 0,
            key: None,
            value: None,
        }
    }

    /// Switch to `key` and clear the displayed value
    pub fn navigate(&mut self, key: K) -> ViewTicket {
        self.generation += 1;
        self.key = Some(key);
        self.value = None;
        ViewTicket {
            generation: self.generation,
        }
    }

    /// Returns false if the ticket is outdated and the value was discarded
    pub fn apply(&mut self, ticket: ViewTicket, value: T) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale view response"
            );
            return false;
        }
        self.value = Some(value);
        true
    }

    /// Forget the current key; tickets issued so far become stale
    pub fn clear(&mut self) {
        self.generation += 1;
        self.key = None;
        self.value = None;
    }

    pub fn is_current(&self, ticket: ViewTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn showing(&self, key: &K) -> bool {
        self.key.as_ref() == Some(key)
    }
}
