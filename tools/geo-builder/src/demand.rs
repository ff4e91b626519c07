//! Global set of mesh names still waiting to be decoded
//!
//! Level tasks insert names while archive tasks claim them. A name is handed
//! out at most once: after a claim, inserting it again has no effect, so the
//! archive task that claims a mesh first is the only one to decode it.

use hashbrown::HashSet;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct DemandState {
    pending: HashSet<String>,
    claimed: HashSet<String>,
    /// Pending names that may legitimately not exist
    optional: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct DemandSet {
    state: Mutex<DemandState>,
}

/// Names never claimed, split by whether their absence is expected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remaining {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl DemandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demand a name
    ///
    /// A name demanded as required anywhere stays required.
    pub fn insert(&self, name: &str, optional: bool) {
        let mut state = self.state.lock();
        if state.claimed.contains(name) {
            return;
        }
        let fresh = state.pending.insert(name.to_string());
        if optional {
            if fresh {
                state.optional.insert(name.to_string());
            }
        } else {
            state.optional.remove(name);
        }
    }

    /// Take a name
    ///
    /// `Some` for exactly one caller per demanded name, holding whether the
    /// name was only demanded as optional.
    pub fn claim(&self, name: &str) -> Option<bool> {
        let mut state = self.state.lock();
        let name = state.pending.take(name)?;
        let optional = state.optional.remove(&name);
        state.claimed.insert(name);
        Some(optional)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().pending.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn into_remaining(self) -> Remaining {
        let state = self.state.into_inner();
        let (mut optional, mut required): (Vec<_>, Vec<_>) = state
            .pending
            .into_iter()
            .partition(|name| state.optional.contains(name));
        required.sort_unstable();
        optional.sort_unstable();
        Remaining { required, optional }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_claim_once() {
        let demand = DemandSet::new();
        demand.insert("a.cgf", false);
        demand.insert("a.cgf", false);
        assert_eq!(demand.len(), 1);

        assert_eq!(demand.claim("a.cgf"), Some(false));
        assert_eq!(demand.claim("a.cgf"), None);
        assert_eq!(demand.claim("b.cgf"), None);

        demand.insert("a.cgf", false);
        assert!(demand.is_empty(), "claimed names are not demanded again");
    }

    #[test]
    fn test_required_wins_over_optional() {
        let demand = DemandSet::new();
        demand.insert("town_02.cgf", true);
        demand.insert("town_02.cgf", false);
        demand.insert("town_03.cgf", false);
        demand.insert("town_03.cgf", true);
        demand.insert("town_04.cgf", true);

        let remaining = demand.into_remaining();
        assert_eq!(remaining.required, ["town_02.cgf", "town_03.cgf"]);
        assert_eq!(remaining.optional, ["town_04.cgf"]);
    }

    #[test]
    fn test_claim_reports_optional() {
        let demand = DemandSet::new();
        demand.insert("town_04.cgf", true);
        demand.insert("town_03.cgf", true);
        demand.insert("town_03.cgf", false);

        assert_eq!(demand.claim("town_04.cgf"), Some(true));
        assert_eq!(demand.claim("town_03.cgf"), Some(false));
    }

    #[test]
    fn test_concurrent_claims() {
        let demand = DemandSet::new();
        let names: Vec<String> = (0..200).map(|i| format!("mesh_{i}.cgf")).collect();
        names.par_iter().for_each(|n| demand.insert(n, false));
        assert_eq!(demand.len(), 200);

        let wins = AtomicUsize::new(0);
        (0..8).into_par_iter().for_each(|_| {
            for name in &names {
                if demand.claim(name).is_some() {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        assert_eq!(wins.load(Ordering::Relaxed), 200);
        assert!(demand.is_empty());
        assert_eq!(demand.into_remaining(), Remaining::default());
    }
}
