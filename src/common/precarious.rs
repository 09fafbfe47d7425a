//! Time-stamped belief values

use super::types::Tick;

/// A value together with the tick it was last confirmed at.
///
/// There is no "fresh by default": every read names the oldest confirmation
/// the caller is willing to accept.
#[derive(Debug, Clone, PartialEq)]
pub struct Precarious<T> {
    value: Option<T>,
    confirmed_at: Tick,
}

impl<T> Default for Precarious<T> {
    fn default() -> Self {
        Precarious::unknown()
    }
}

impl<T> Precarious<T> {
    pub fn unknown() -> Self {
        Precarious {
            value: None,
            confirmed_at: 0,
        }
    }

    pub fn known(value: T, tick: Tick) -> Self {
        Precarious {
            value: Some(value),
            confirmed_at: tick,
        }
    }

    pub fn update(&mut self, value: T, tick: Tick) {
        self.value = Some(value);
        self.confirmed_at = tick;
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    /// Ticks elapsed since confirmation, if ever confirmed
    pub fn age(&self, now: Tick) -> Option<Tick> {
        self.value
            .as_ref()
            .map(|_| now.saturating_sub(self.confirmed_at))
    }

    /// Known and confirmed no more than `max_age` ticks before `now`
    pub fn is_known(&self, now: Tick, max_age: Tick) -> bool {
        self.age(now).is_some_and(|age| age <= max_age)
    }

    /// The value, only if it passes the caller's freshness tolerance
    pub fn get(&self, now: Tick, max_age: Tick) -> Option<&T> {
        if self.is_known(now, max_age) {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Last known value with the tick it was confirmed at, however old
    pub fn latest(&self) -> Option<(&T, Tick)> {
        self.value.as_ref().map(|value| (value, self.confirmed_at))
    }

    pub fn confirmed_at(&self) -> Option<Tick> {
        self.value.as_ref().map(|_| self.confirmed_at)
    }
}

impl<T: Copy> Precarious<T> {
    pub fn get_copied(&self, now: Tick, max_age: Tick) -> Option<T> {
        self.get(now, max_age).copied()
    }
}
