use brant_bpv7::{bundle_id::BundleId, dtn_time::DtnTime, eid::EndpointId};

/// A retention constraint as defined in the subsections of RFC 9171 §5.
/// A bundle carrying any constraint is protected from deletion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Constraint {
    /// Dispatch of the bundle is pending.
    DispatchPending,
    /// Forwarding of the bundle is pending.
    ForwardPending,
    /// Reassembly of a fragmented bundle is pending.
    ReassemblyPending,
}

impl Constraint {
    /// Stable bit for indexed membership scans in storage backends.
    pub fn bit(&self) -> u64 {
        match self {
            Constraint::DispatchPending => 1 << 0,
            Constraint::ForwardPending => 1 << 1,
            Constraint::ReassemblyPending => 1 << 2,
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Constraint::DispatchPending => "dispatch pending",
            Constraint::ForwardPending => "forwarding pending",
            Constraint::ReassemblyPending => "reassembly pending",
        })
    }
}

/// The in-store metadata record of a bundle.
///
/// The serialized bundle itself lives in the bundle storage under
/// [`body_name`](Self::body_name); everything the pipeline needs for its
/// decisions is here, so scans never touch bundle bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    pub id: BundleId,
    pub source: EndpointId,
    pub destination: EndpointId,
    pub report_to: EndpointId,

    /// Node IDs of peers known to already hold this bundle, seeded with
    /// our own node ID on insertion.
    pub already_sent_to: Vec<EndpointId>,

    pub constraints: Vec<Constraint>,

    /// Absolute DTN time after which the bundle may be deleted.
    pub expires: DtnTime,

    /// Name of the serialized bundle in the bundle storage.
    pub body_name: String,
}

impl BundleDescriptor {
    /// The metadata store's primary key.
    pub fn key(&self) -> String {
        self.id.to_key()
    }

    /// Whether the bundle is protected from deletion.
    pub fn retain(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// Whether the bundle is awaiting dispatch.
    pub fn dispatch(&self) -> bool {
        self.has_constraint(Constraint::DispatchPending)
    }

    pub fn has_constraint(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        if !self.has_constraint(constraint) {
            self.constraints.push(constraint);
        }
    }

    pub fn remove_constraint(&mut self, constraint: Constraint) {
        self.constraints.retain(|c| *c != constraint);
    }

    pub fn reset_constraints(&mut self, constraints: Vec<Constraint>) {
        self.constraints = constraints;
    }

    /// Record that `peer` holds this bundle. Returns `true` if it was
    /// not already known. The null endpoint identifies no node and is
    /// never recorded.
    pub fn merge_already_sent(&mut self, peer: EndpointId) -> bool {
        if peer.is_null() || self.already_sent_to.contains(&peer) {
            false
        } else {
            self.already_sent_to.push(peer);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> BundleDescriptor {
        BundleDescriptor {
            id: BundleId::default(),
            source: EndpointId::Null,
            destination: EndpointId::Null,
            report_to: EndpointId::Null,
            already_sent_to: Vec::new(),
            constraints: Vec::new(),
            expires: DtnTime::new(0),
            body_name: String::new(),
        }
    }

    #[test]
    fn retain_and_dispatch_follow_constraints() {
        let mut d = descriptor();
        assert!(!d.retain());
        assert!(!d.dispatch());

        d.add_constraint(Constraint::DispatchPending);
        assert!(d.retain());
        assert!(d.dispatch());

        d.add_constraint(Constraint::ForwardPending);
        d.remove_constraint(Constraint::DispatchPending);
        assert!(d.retain());
        assert!(!d.dispatch());

        d.remove_constraint(Constraint::ForwardPending);
        assert!(!d.retain());
    }

    #[test]
    fn constraints_do_not_duplicate() {
        let mut d = descriptor();
        d.add_constraint(Constraint::DispatchPending);
        d.add_constraint(Constraint::DispatchPending);
        assert_eq!(d.constraints.len(), 1);
        d.remove_constraint(Constraint::DispatchPending);
        assert!(d.constraints.is_empty());
    }

    #[test]
    fn already_sent_ignores_null_and_duplicates() {
        let mut d = descriptor();
        let peer: EndpointId = "dtn://b/".parse().unwrap();
        assert!(d.merge_already_sent(peer.clone()));
        assert!(!d.merge_already_sent(peer));
        assert!(!d.merge_already_sent(EndpointId::Null));
        assert_eq!(d.already_sent_to.len(), 1);
    }
}
