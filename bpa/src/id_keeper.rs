/*!
The sequence-id keeper.

A bundle ID is the source node plus a two-part creation timestamp whose
second part is a counter, letting a node create several bundles within
the same millisecond. The keeper tracks the next free sequence number
per `(source, creation time)` and stamps it onto locally-originated
bundles.
*/

use brant_bpv7::{bundle::Bundle, dtn_time::DtnTime, eid::EndpointId};
use std::{collections::HashMap, sync::Mutex};

const STATE_MAX_AGE_MS: u64 = 60 * 60 * 1_000;

#[derive(Default)]
pub struct IdKeeper {
    state: Mutex<HashMap<(EndpointId, DtnTime), u64>>,
}

impl IdKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next free sequence number for this bundle's source and
    /// creation time into its primary block.
    pub fn update(&self, bundle: &mut Bundle) {
        let key = (
            bundle.primary.source.clone(),
            bundle.primary.timestamp.time,
        );

        let mut state = self.state.lock().expect("id keeper lock poisoned");
        let sequence = state
            .entry(key)
            .and_modify(|s| *s += 1)
            .or_insert(0);
        bundle.primary.timestamp.sequence_number = *sequence;
    }

    /// Drop entries older than an hour, keeping the epoch entry used by
    /// clockless sources.
    pub fn clean(&self) {
        let threshold = DtnTime::now().saturating_sub_millis(STATE_MAX_AGE_MS);
        self.state
            .lock()
            .expect("id keeper lock poisoned")
            .retain(|(_, time), _| time.millisecs() == 0 || *time >= threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brant_bpv7::{builder::Builder, creation_timestamp::CreationTimestamp};

    fn bundle_at(time: DtnTime) -> Bundle {
        Builder::new(
            "dtn://src/app".parse().unwrap(),
            "dtn://dst/app".parse().unwrap(),
        )
        .lifetime(60_000)
        .build(CreationTimestamp {
            time,
            sequence_number: 0,
        })
    }

    #[test]
    fn sequence_numbers_increment_per_timestamp() {
        let keeper = IdKeeper::new();
        let time = DtnTime::now();

        for expected in 0..3 {
            let mut bundle = bundle_at(time);
            keeper.update(&mut bundle);
            assert_eq!(bundle.primary.timestamp.sequence_number, expected);
        }

        // A different millisecond restarts the counter
        let mut bundle = bundle_at(time.saturating_add_millis(1));
        keeper.update(&mut bundle);
        assert_eq!(bundle.primary.timestamp.sequence_number, 0);
    }

    #[test]
    fn clean_keeps_recent_and_epoch_entries() {
        let keeper = IdKeeper::new();

        let mut old = bundle_at(DtnTime::new(1));
        let mut epoch = bundle_at(DtnTime::new(0));
        let mut fresh = bundle_at(DtnTime::now());
        keeper.update(&mut old);
        keeper.update(&mut epoch);
        keeper.update(&mut fresh);

        keeper.clean();

        let state = keeper.state.lock().unwrap();
        assert_eq!(state.len(), 2);
        assert!(state.keys().any(|(_, t)| t.millisecs() == 0));
        assert!(state.keys().any(|(_, t)| *t == fresh.primary.timestamp.time));
    }
}
