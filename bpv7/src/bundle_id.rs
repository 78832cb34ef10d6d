use crate::{creation_timestamp::CreationTimestamp, eid::EndpointId};

/// Fragment placement within the original application data unit.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct FragmentInfo {
    pub offset: u64,
    pub total_len: u64,
}

/// The identity of a bundle: source, creation timestamp, and - for
/// fragments - the fragment extent. Two bundles with equal IDs are the
/// same bundle (RFC 9171 §4.2.2).
#[derive(Default, Debug, Clone, Hash, PartialEq, Eq)]
pub struct BundleId {
    pub source: EndpointId,
    pub timestamp: CreationTimestamp,
    pub fragment: Option<FragmentInfo>,
}

impl BundleId {
    /// The canonical string form, used as the store's primary key.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.source,
            self.timestamp.time.millisecs(),
            self.timestamp.sequence_number
        )?;
        if let Some(fragment) = &self.fragment {
            write!(f, "-{}-{}", fragment.offset, fragment.total_len)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtn_time::DtnTime;

    #[test]
    fn key_forms() {
        let id = BundleId {
            source: "dtn://a/x".parse().unwrap(),
            timestamp: CreationTimestamp {
                time: DtnTime::new(1000),
                sequence_number: 3,
            },
            fragment: None,
        };
        assert_eq!(id.to_key(), "dtn://a/x-1000-3");

        let id = BundleId {
            fragment: Some(FragmentInfo {
                offset: 100,
                total_len: 1024,
            }),
            ..id
        };
        assert_eq!(id.to_key(), "dtn://a/x-1000-3-100-1024");
    }
}
