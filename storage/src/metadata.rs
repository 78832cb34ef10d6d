//! SQLite-backed descriptor metadata, keyed by the bundle-ID string.

use crate::migrate;
use brant_bpa::{
    async_trait, storage,
    store::{BundleDescriptor, Constraint},
};
use brant_bpv7::{
    bundle_id::{BundleId, FragmentInfo},
    creation_timestamp::CreationTimestamp,
    dtn_time::DtnTime,
    eid::EndpointId,
};
use brant_cbor as cbor;
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tracing::info;

pub struct Storage {
    connection: Arc<Mutex<rusqlite::Connection>>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("No such bundle")]
    NotFound,

    #[error("Unknown retention constraint code {0}")]
    UnknownConstraint(u64),
}

fn constraint_code(constraint: Constraint) -> u64 {
    match constraint {
        Constraint::DispatchPending => 0,
        Constraint::ForwardPending => 1,
        Constraint::ReassemblyPending => 2,
    }
}

fn constraint_from_code(code: u64) -> Result<Constraint, Error> {
    match code {
        0 => Ok(Constraint::DispatchPending),
        1 => Ok(Constraint::ForwardPending),
        2 => Ok(Constraint::ReassemblyPending),
        code => Err(Error::UnknownConstraint(code)),
    }
}

fn encode_eid(eid: &EndpointId) -> Vec<u8> {
    cbor::encode::emit(eid)
}

fn decode_eid(row: &rusqlite::Row, idx: usize) -> storage::Result<EndpointId> {
    match row.get_ref(idx)? {
        rusqlite::types::ValueRef::Blob(b) => Ok(cbor::decode::parse(b)?),
        _ => Err("EID column has an unexpected SQLite type".into()),
    }
}

fn decode_blob<'a>(row: &'a rusqlite::Row, idx: usize) -> storage::Result<&'a [u8]> {
    match row.get_ref(idx)? {
        rusqlite::types::ValueRef::Blob(b) => Ok(b),
        _ => Err("column has an unexpected SQLite type".into()),
    }
}

fn encode_eid_list(eids: &[EndpointId]) -> Vec<u8> {
    cbor::encode::emit_array(Some(eids.len()), |a| {
        for eid in eids {
            a.emit(eid);
        }
    })
}

fn decode_eid_list(data: &[u8]) -> storage::Result<Vec<EndpointId>> {
    cbor::decode::parse_array(data, |a| {
        let mut eids = Vec::new();
        while let Some(eid) = a.try_parse::<EndpointId>()? {
            eids.push(eid);
        }
        Ok::<_, brant_bpv7::eid::EidError>(eids)
    })
    .map(|(eids, _)| eids)
    .map_err(Into::into)
}

fn encode_constraints(constraints: &[Constraint]) -> Vec<u8> {
    cbor::encode::emit_array(Some(constraints.len()), |a| {
        for constraint in constraints {
            a.emit(&constraint_code(*constraint));
        }
    })
}

fn decode_constraints(data: &[u8]) -> storage::Result<Vec<Constraint>> {
    let (codes, _) = cbor::decode::parse_array(data, |a| {
        let mut codes = Vec::new();
        while let Some(code) = a.try_parse::<u64>()? {
            codes.push(code);
        }
        Ok::<_, cbor::decode::Error>(codes)
    })?;
    codes
        .into_iter()
        .map(|c| constraint_from_code(c).map_err(Into::into))
        .collect()
}

fn constraint_mask(constraints: &[Constraint]) -> i64 {
    constraints.iter().fold(0i64, |m, c| m | c.bit() as i64)
}

#[inline]
fn as_u64(v: i64) -> u64 {
    v as u64
}

#[inline]
fn as_i64(v: u64) -> i64 {
    v as i64
}

/* Every full-row query must select the columns in this order:
      0: source
      1: destination
      2: report_to
      3: creation_time
      4: creation_seq_num
      5: fragment_offset
      6: fragment_total_len
      7: already_sent_to
      8: retention_constraints
      9: expires
     10: body_name
*/
const DESCRIPTOR_COLUMNS: &str = r#"
    source,
    destination,
    report_to,
    creation_time,
    creation_seq_num,
    fragment_offset,
    fragment_total_len,
    already_sent_to,
    retention_constraints,
    expires,
    body_name"#;

fn row_to_descriptor(row: &rusqlite::Row) -> storage::Result<BundleDescriptor> {
    let source = decode_eid(row, 0)?;

    let fragment = {
        let offset: i64 = row.get(5)?;
        let total_len: i64 = row.get(6)?;
        if offset < 0 || total_len < 0 {
            None
        } else {
            Some(FragmentInfo {
                offset: as_u64(offset),
                total_len: as_u64(total_len),
            })
        }
    };

    Ok(BundleDescriptor {
        id: BundleId {
            source: source.clone(),
            timestamp: CreationTimestamp {
                time: DtnTime::new(as_u64(row.get(3)?)),
                sequence_number: as_u64(row.get(4)?),
            },
            fragment,
        },
        source,
        destination: decode_eid(row, 1)?,
        report_to: decode_eid(row, 2)?,
        already_sent_to: decode_eid_list(decode_blob(row, 7)?)?,
        constraints: decode_constraints(decode_blob(row, 8)?)?,
        expires: DtnTime::new(as_u64(row.get(9)?)),
        body_name: row.get(10)?,
    })
}

impl Storage {
    /// Open or create the metadata database.
    pub fn open(file_path: &Path) -> storage::Result<Self> {
        info!("using metadata database {}", file_path.display());

        let connection = rusqlite::Connection::open_with_flags(
            file_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        migrate::migrate(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn query_descriptors(
        &self,
        where_clause: &str,
        params: impl rusqlite::Params,
    ) -> storage::Result<Vec<BundleDescriptor>> {
        let connection = self.connection.lock().expect("connection lock poisoned");
        let mut statement = connection.prepare_cached(&format!(
            "SELECT {DESCRIPTOR_COLUMNS} FROM bundles WHERE {where_clause};"
        ))?;
        let mut rows = statement.query(params)?;
        let mut descriptors = Vec::new();
        while let Some(row) = rows.next()? {
            descriptors.push(row_to_descriptor(row)?);
        }
        Ok(descriptors)
    }
}

#[async_trait]
impl storage::MetadataStorage for Storage {
    async fn load(&self, key: &str) -> storage::Result<Option<BundleDescriptor>> {
        self.query_descriptors("id = ?1 LIMIT 1", [key])
            .map(|mut v| v.pop())
    }

    async fn insert(&self, descriptor: &BundleDescriptor) -> storage::Result<bool> {
        let connection = self.connection.lock().expect("connection lock poisoned");
        let inserted = connection
            .prepare_cached(
                r#"INSERT OR IGNORE INTO bundles (
                    id,
                    source,
                    destination,
                    report_to,
                    creation_time,
                    creation_seq_num,
                    fragment_offset,
                    fragment_total_len,
                    already_sent_to,
                    retention_constraints,
                    constraint_mask,
                    retain,
                    dispatch,
                    expires,
                    body_name
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15);"#,
            )?
            .execute(rusqlite::params!(
                descriptor.key(),
                encode_eid(&descriptor.source),
                encode_eid(&descriptor.destination),
                encode_eid(&descriptor.report_to),
                as_i64(descriptor.id.timestamp.time.millisecs()),
                as_i64(descriptor.id.timestamp.sequence_number),
                descriptor.id.fragment.map_or(-1, |f| as_i64(f.offset)),
                descriptor.id.fragment.map_or(-1, |f| as_i64(f.total_len)),
                encode_eid_list(&descriptor.already_sent_to),
                encode_constraints(&descriptor.constraints),
                constraint_mask(&descriptor.constraints),
                descriptor.retain() as i64,
                descriptor.dispatch() as i64,
                as_i64(descriptor.expires.millisecs()),
                descriptor.body_name,
            ))?;
        Ok(inserted != 0)
    }

    async fn replace(&self, descriptor: &BundleDescriptor) -> storage::Result<()> {
        let connection = self.connection.lock().expect("connection lock poisoned");
        let updated = connection
            .prepare_cached(
                r#"UPDATE bundles SET
                    already_sent_to = ?2,
                    retention_constraints = ?3,
                    constraint_mask = ?4,
                    retain = ?5,
                    dispatch = ?6,
                    expires = ?7
                WHERE id = ?1;"#,
            )?
            .execute(rusqlite::params!(
                descriptor.key(),
                encode_eid_list(&descriptor.already_sent_to),
                encode_constraints(&descriptor.constraints),
                constraint_mask(&descriptor.constraints),
                descriptor.retain() as i64,
                descriptor.dispatch() as i64,
                as_i64(descriptor.expires.millisecs()),
            ))?;
        if updated == 0 {
            Err(Error::NotFound.into())
        } else {
            Ok(())
        }
    }

    async fn remove(&self, key: &str) -> storage::Result<()> {
        self.connection
            .lock()
            .expect("connection lock poisoned")
            .prepare_cached("DELETE FROM bundles WHERE id = ?1;")?
            .execute([key])?;
        Ok(())
    }

    async fn get_with_constraint(
        &self,
        constraint: Constraint,
    ) -> storage::Result<Vec<BundleDescriptor>> {
        self.query_descriptors(
            "(constraint_mask & ?1) != 0",
            [constraint.bit() as i64],
        )
    }

    async fn get_dispatchable(&self) -> storage::Result<Vec<BundleDescriptor>> {
        self.query_descriptors("dispatch != 0", ())
    }

    async fn get_expired(&self, now: DtnTime) -> storage::Result<Vec<BundleDescriptor>> {
        self.query_descriptors(
            "retain = 0 AND expires < ?1",
            [as_i64(now.millisecs())],
        )
    }

    async fn close(&self) {}
}
