//! Round-robin candidate list of cluster nodes with burn-out tracking.
//!
//! Every host handed out by [`HostRotation::poll`] is "burned" for the
//! configured burn-out duration. While burned, it is skipped in favor of
//! the other candidates, so that a single failing node cannot be retried in
//! a hot loop. Once every candidate is burned, `poll` returns `None` until
//! the first burn-out window elapses.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::HostAddr;

/// Default time a host stays excluded after it was handed out, 5 seconds.
pub const DEFAULT_BURNOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct Candidate {
    host: HostAddr,
    burned_until: Option<Instant>,
}

impl Candidate {
    fn is_available(&self, now: Instant) -> bool {
        self.burned_until.is_none_or(|until| until <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    candidates: Vec<Candidate>,
    cursor: usize,
}

/// Set of candidate hosts shared between the component that learns about
/// the cluster topology (writer) and the stream orchestrator (reader).
#[derive(Debug)]
pub struct HostRotation {
    burnout: Duration,
    inner: Mutex<Inner>,
}

impl HostRotation {
    /// Create a new rotation list with the given burn-out duration and
    /// initial candidates.
    #[must_use]
    pub fn new<I>(burnout: Duration, hosts: I) -> Self
    where
        I: IntoIterator<Item = HostAddr>,
    {
        let rotation = Self {
            burnout,
            inner: Mutex::new(Inner::default()),
        };
        rotation.set(hosts);
        rotation
    }

    /// The time a host stays excluded after being polled
    #[must_use]
    pub const fn burnout(&self) -> Duration {
        self.burnout
    }

    /// Return the next host that is not burned, in round-robin order, and
    /// burn it. Returns `None` if there are no candidates or all of them are
    /// currently burned.
    pub fn poll(&self) -> Option<HostAddr> {
        self.poll_at(Instant::now())
    }

    pub(crate) fn poll_at(&self, now: Instant) -> Option<HostAddr> {
        let mut inner = self.lock();
        let len = inner.candidates.len();

        let index = (0..len)
            .map(|offset| (inner.cursor + offset) % len)
            .find(|&index| inner.candidates[index].is_available(now))?;

        inner.cursor = (index + 1) % len;
        let candidate = &mut inner.candidates[index];
        candidate.burned_until = Some(now + self.burnout);
        Some(candidate.host.clone())
    }

    /// Replace the candidate set.
    ///
    /// Hosts that are part of both the old and the new set keep their burn
    /// state, new hosts start out available, and hosts that are no longer
    /// listed are forgotten. Duplicates only keep their first position.
    pub fn set<I>(&self, hosts: I)
    where
        I: IntoIterator<Item = HostAddr>,
    {
        let mut inner = self.lock();

        let mut candidates: Vec<Candidate> = Vec::new();
        for host in hosts {
            if candidates.iter().any(|c| c.host == host) {
                continue;
            }
            let burned_until = inner
                .candidates
                .iter()
                .find(|c| c.host == host)
                .and_then(|c| c.burned_until);
            candidates.push(Candidate { host, burned_until });
        }

        inner.cursor = if candidates.is_empty() {
            0
        } else {
            inner.cursor % candidates.len()
        };
        inner.candidates = candidates;
    }

    /// Snapshot of the current candidates, in rotation order
    #[must_use]
    pub fn hosts(&self) -> Vec<HostAddr> {
        self.lock().candidates.iter().map(|c| c.host.clone()).collect()
    }

    /// Number of candidates, burned or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().candidates.len()
    }

    /// Whether there are no candidates at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().candidates.is_empty()
    }

    // A panic while holding the lock cannot leave the list half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> HostAddr {
        s.parse().unwrap()
    }

    fn rotation(hosts: &[&str]) -> HostRotation {
        HostRotation::new(Duration::from_millis(5000), hosts.iter().map(|h| addr(h)))
    }

    #[test]
    fn test_empty_list_polls_none() {
        let list = rotation(&[]);
        assert!(list.is_empty());
        assert_eq!(list.poll_at(Instant::now()), None);
    }

    #[test]
    fn test_round_robin_then_exhausted() {
        let list = rotation(&["a:8091", "b:8091", "c:8091"]);
        let now = Instant::now();

        assert_eq!(list.poll_at(now), Some(addr("a:8091")));
        assert_eq!(list.poll_at(now), Some(addr("b:8091")));
        assert_eq!(list.poll_at(now), Some(addr("c:8091")));
        assert_eq!(list.poll_at(now), None);
    }

    #[test]
    fn test_burned_host_is_skipped_while_alternatives_exist() {
        let list = rotation(&["a:8091", "b:8091"]);
        let start = Instant::now();

        assert_eq!(list.poll_at(start), Some(addr("a:8091")));
        // `a` is back in rotation, but `b` is still burned
        let later = start + Duration::from_millis(5000);
        assert_eq!(list.poll_at(later), Some(addr("b:8091")));
        assert_eq!(list.poll_at(later), Some(addr("a:8091")));
        assert_eq!(list.poll_at(later), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burnout_window_elapses() {
        let list = rotation(&["a:8091", "b:8091"]);

        assert_eq!(list.poll(), Some(addr("a:8091")));
        assert_eq!(list.poll(), Some(addr("b:8091")));
        assert_eq!(list.poll(), None);

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(list.poll(), None);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(list.poll(), Some(addr("a:8091")));
    }

    #[test]
    fn test_single_host_is_retried_after_burnout() {
        let list = rotation(&["a:8091"]);
        let start = Instant::now();

        assert_eq!(list.poll_at(start), Some(addr("a:8091")));
        assert_eq!(list.poll_at(start + Duration::from_millis(10)), None);
        assert_eq!(
            list.poll_at(start + Duration::from_millis(5000)),
            Some(addr("a:8091"))
        );
    }

    #[test]
    fn test_set_preserves_burn_state_of_retained_hosts() {
        let list = rotation(&["a:8091", "b:8091"]);
        let now = Instant::now();

        assert_eq!(list.poll_at(now), Some(addr("a:8091")));
        list.set([addr("a:8091"), addr("c:8091")]);

        // `a` is still burned, `c` is new and therefore available
        assert_eq!(list.hosts(), vec![addr("a:8091"), addr("c:8091")]);
        assert_eq!(list.poll_at(now), Some(addr("c:8091")));
        assert_eq!(list.poll_at(now), None);
    }

    #[test]
    fn test_set_discards_state_of_removed_hosts() {
        let list = rotation(&["a:8091", "b:8091"]);
        let now = Instant::now();

        assert_eq!(list.poll_at(now), Some(addr("a:8091")));
        list.set([addr("b:8091")]);
        list.set([addr("a:8091"), addr("b:8091")]);

        // `a` was dropped in between, so its burn state is gone
        assert_eq!(list.poll_at(now), Some(addr("a:8091")));
        assert_eq!(list.poll_at(now), Some(addr("b:8091")));
    }

    #[test]
    fn test_set_removes_duplicates() {
        let list = rotation(&[]);
        list.set([addr("a:8091"), addr("b:8091"), addr("A:8091")]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.hosts(), vec![addr("a:8091"), addr("b:8091")]);
    }

    #[test]
    fn test_set_to_empty_and_back() {
        let list = rotation(&["a:8091", "b:8091"]);
        let now = Instant::now();
        assert_eq!(list.poll_at(now), Some(addr("a:8091")));

        list.set(Vec::<HostAddr>::new());
        assert_eq!(list.poll_at(now), None);

        list.set([addr("x:8091")]);
        assert_eq!(list.poll_at(now), Some(addr("x:8091")));
    }

    #[test]
    fn test_cursor_wraps_when_list_shrinks() {
        let list = rotation(&["a:8091", "b:8091", "c:8091"]);
        let now = Instant::now();
        assert_eq!(list.poll_at(now), Some(addr("a:8091")));
        assert_eq!(list.poll_at(now), Some(addr("b:8091")));

        list.set([addr("d:8091"), addr("e:8091")]);
        // cursor was 2, wraps to 0
        assert_eq!(list.poll_at(now), Some(addr("d:8091")));
        assert_eq!(list.poll_at(now), Some(addr("e:8091")));
    }
}
