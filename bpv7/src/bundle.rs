use crate::{
    block::{BlockData, CanonicalBlock},
    block_flags::BlockFlags,
    block_type::BlockType,
    bundle_id::BundleId,
    cbor,
    crc::CrcType,
    dtn_time::DtnTime,
    eid::EndpointId,
    primary_block::PrimaryBlock,
    Error,
};

/// A bundle: one primary block followed by canonical blocks, the last of
/// which is the payload block (RFC 9171 §4.2.1).
///
/// The block list is kept sorted with extension blocks in block-number
/// order and the payload block last, matching the emission order.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub primary: PrimaryBlock,
    pub blocks: Vec<CanonicalBlock>,
}

impl Bundle {
    pub fn new(primary: PrimaryBlock, blocks: Vec<CanonicalBlock>) -> Result<Self, Error> {
        let mut bundle = Self { primary, blocks };
        bundle.sort_blocks();
        bundle.check_valid()?;
        Ok(bundle)
    }

    pub fn id(&self) -> BundleId {
        self.primary.bundle_id()
    }

    pub fn is_fragment(&self) -> bool {
        self.primary.flags.is_fragment
    }

    /// The payload bytes, if a payload block is present.
    pub fn payload(&self) -> Option<&[u8]> {
        self.blocks.iter().find_map(|b| match &b.data {
            BlockData::Payload(data) => Some(data.as_slice()),
            _ => None,
        })
    }

    /// The immediate predecessor node, from a Previous Node block.
    pub fn previous_node(&self) -> Option<&EndpointId> {
        self.blocks.iter().find_map(|b| match &b.data {
            BlockData::PreviousNode(eid) => Some(eid),
            _ => None,
        })
    }

    /// The value of a Bundle Age block, in milliseconds.
    pub fn age(&self) -> Option<u64> {
        self.blocks.iter().find_map(|b| match &b.data {
            BlockData::BundleAge(age) => Some(*age),
            _ => None,
        })
    }

    pub fn extension_block_by_type(&self, block_type: BlockType) -> Option<&CanonicalBlock> {
        self.blocks.iter().find(|b| b.block_type() == block_type)
    }

    pub fn has_extension_block(&self, block_type: BlockType) -> bool {
        self.extension_block_by_type(block_type).is_some()
    }

    /// Add an extension block, assigning the lowest free block number
    /// above the payload block's. Returns the assigned number.
    pub fn add_extension_block(
        &mut self,
        flags: BlockFlags,
        crc_type: CrcType,
        data: BlockData,
    ) -> u64 {
        let mut number = 2;
        while self.blocks.iter().any(|b| b.number == number) {
            number += 1;
        }
        self.blocks.push(CanonicalBlock {
            number,
            flags,
            crc_type,
            data,
        });
        self.sort_blocks();
        number
    }

    /// Remove the block with the given number, if present.
    pub fn remove_extension_block(&mut self, number: u64) {
        self.blocks.retain(|b| b.number != number);
    }

    pub(crate) fn sort_blocks(&mut self) {
        self.blocks
            .sort_by_key(|b| if b.is_payload() { (1, 0) } else { (0, b.number) });
    }

    /// Whether the bundle's lifetime has passed.
    ///
    /// For bundles from sources without a clock the age comes from the
    /// Bundle Age block; a missing age block counts as exceeded.
    pub fn is_lifetime_exceeded(&self) -> bool {
        if self.primary.timestamp.is_epoch() {
            match self.age() {
                None => true,
                Some(age) => age > self.primary.lifetime,
            }
        } else {
            DtnTime::now() > self.primary.expires()
        }
    }

    /// Validate the bundle, aggregating every failure found.
    pub fn check_valid(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        match self.blocks.iter().filter(|b| b.is_payload()).count() {
            0 => errors.push(Error::MissingPayload),
            1 => {
                if !self.blocks.last().map(|b| b.is_payload()).unwrap_or(false) {
                    errors.push(Error::PayloadNotFinal);
                }
            }
            _ => errors.push(Error::DuplicatePayload),
        }

        let mut numbers = std::collections::HashSet::new();
        for block in &self.blocks {
            if !numbers.insert(block.number) {
                errors.push(Error::DuplicateBlockNumber(block.number));
            }
        }

        if self.primary.flags.is_admin_record || self.primary.source.is_null() {
            let report_requested = self
                .blocks
                .iter()
                .any(|b| b.is_payload() && b.flags.report_on_failure);
            if report_requested {
                errors.push(Error::ReportOnAdminRecord);
            }
        }

        if self.primary.timestamp.is_epoch() && !self.has_extension_block(BlockType::BundleAge) {
            errors.push(Error::MissingBundleAge);
        }

        if self.is_lifetime_exceeded() {
            errors.push(Error::LifetimeExceeded);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid(errors))
        }
    }

    /// Serialize as an indefinite-length CBOR array of blocks.
    pub fn to_cbor(&self) -> Vec<u8> {
        cbor::encode::emit_array(None, |a| {
            self.primary.emit(a);
            for block in &self.blocks {
                block.emit(a);
            }
        })
    }

    /// Decode and validate a bundle.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let (bundle, len) = cbor::decode::parse_array(data, |a| {
            if a.is_definite() {
                return Err(Error::NotIndefiniteArray);
            }

            let primary: PrimaryBlock = a.parse()?;
            let mut blocks = Vec::new();
            while let Some(block) = a.try_parse::<CanonicalBlock>()? {
                blocks.push(block);
            }
            Ok(Bundle { primary, blocks })
        })?;

        if len != data.len() {
            return Err(Error::AdditionalData);
        }

        bundle.check_valid()?;
        Ok(bundle)
    }
}
