//! Root-to-all distribution of a payload.
//!
//! Payloads travel as a list of fields, each under its own tag, so a
//! composite record such as `(a, b, n)` becomes three independent transfers.

use log::{debug, trace};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CollectiveError, Result};
use crate::group::Rank;
use crate::stage::{absolute_rank, receives_at, relative_rank, sends_at, stage_count};
use crate::transport::{decode, encode, tags, Transport};

/// A fixed-arity payload broadcast field by field.
pub trait Record: Sized {
    /// Number of fields, and so the number of tagged transfers per hop.
    const FIELDS: usize;

    fn encode_fields(&self) -> Result<Vec<Vec<u8>>>;

    fn decode_fields(fields: Vec<Vec<u8>>) -> Result<Self>;
}

fn check_arity(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CollectiveError::PayloadMismatch { expected, actual })
    }
}

macro_rules! tuple_record {
    ($count:expr; $($name:ident),+) => {
        impl<$($name),+> Record for ($($name,)+)
        where
            $($name: Serialize + DeserializeOwned),+
        {
            const FIELDS: usize = $count;

            #[allow(non_snake_case)]
            fn encode_fields(&self) -> Result<Vec<Vec<u8>>> {
                let ($($name,)+) = self;
                Ok(vec![$(encode($name)?),+])
            }

            #[allow(non_snake_case)]
            fn decode_fields(fields: Vec<Vec<u8>>) -> Result<Self> {
                check_arity(Self::FIELDS, fields.len())?;
                let mut fields = fields.into_iter();
                $(
                    let $name = decode(&fields.next().unwrap_or_default())?;
                )+
                Ok(($($name,)+))
            }
        }
    };
}

tuple_record!(1; A);
tuple_record!(2; A, B);
tuple_record!(3; A, B, C);
tuple_record!(4; A, B, C, D);

/// Which schedule a broadcast follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastAlgorithm {
    /// Hypercube doubling: `ceil(log2(P))` rounds.
    #[default]
    Tree,
    /// Root sends to every other rank in turn: `P - 1` rounds.
    Linear,
}

fn send_fields<T: Transport>(transport: &T, fields: &[Vec<u8>], dest: Rank) -> Result<()> {
    for (index, field) in fields.iter().enumerate() {
        transport.send_bytes(dest, tags::broadcast_field(index), field.clone())?;
    }
    Ok(())
}

fn recv_fields<T: Transport>(transport: &T, count: usize, source: Rank) -> Result<Vec<Vec<u8>>> {
    (0..count)
        .map(|index| transport.recv_bytes(source, tags::broadcast_field(index)))
        .collect()
}

/// Tree broadcast of `count` encoded fields. `fields` is only read on `root`.
pub(crate) fn tree_broadcast_fields<T: Transport>(
    transport: &T,
    fields: Option<Vec<Vec<u8>>>,
    count: usize,
    root: Rank,
) -> Result<Vec<Vec<u8>>> {
    let group = transport.group();
    group.check(root)?;
    let size = group.size();
    let me = relative_rank(group.rank(), root, size);

    let mut held = if me == 0 {
        let fields = fields.ok_or_else(|| {
            CollectiveError::CommunicationError("Root must provide the broadcast payload".into())
        })?;
        check_arity(count, fields.len())?;
        Some(fields)
    } else {
        None
    };

    for stage in 0..stage_count(size) {
        if let Some(parent) = receives_at(stage, me) {
            let source = absolute_rank(parent, root, size);
            trace!("Rank {} receives from rank {} in stage {}", group.rank(), source, stage);
            held = Some(recv_fields(transport, count, source)?);
        } else if let Some(child) = sends_at(stage, me, size) {
            let dest = absolute_rank(child, root, size);
            trace!("Rank {} sends to rank {} in stage {}", group.rank(), dest, stage);
            let fields = held.as_deref().ok_or_else(|| {
                CollectiveError::CommunicationError(format!(
                    "rank {} asked to forward in stage {} before receiving",
                    group.rank(),
                    stage
                ))
            })?;
            send_fields(transport, fields, dest)?;
        }
    }

    held.ok_or_else(|| {
        CollectiveError::CommunicationError(format!(
            "rank {} finished the broadcast without a payload",
            group.rank()
        ))
    })
}

/// Root sends every field to each other rank in ascending order.
pub(crate) fn linear_broadcast_fields<T: Transport>(
    transport: &T,
    fields: Option<Vec<Vec<u8>>>,
    count: usize,
    root: Rank,
) -> Result<Vec<Vec<u8>>> {
    let group = transport.group();
    group.check(root)?;

    if group.is_root(root) {
        let fields = fields.ok_or_else(|| {
            CollectiveError::CommunicationError("Root must provide the broadcast payload".into())
        })?;
        check_arity(count, fields.len())?;
        for rank in group.peers() {
            send_fields(transport, &fields, rank)?;
        }
        Ok(fields)
    } else {
        recv_fields(transport, count, root)
    }
}

pub(crate) fn broadcast_fields<T: Transport>(
    transport: &T,
    algorithm: BroadcastAlgorithm,
    fields: Option<Vec<Vec<u8>>>,
    count: usize,
    root: Rank,
) -> Result<Vec<Vec<u8>>> {
    debug!("Rank {} entering broadcast", transport.group().rank());
    let result = match algorithm {
        BroadcastAlgorithm::Tree => tree_broadcast_fields(transport, fields, count, root),
        BroadcastAlgorithm::Linear => linear_broadcast_fields(transport, fields, count, root),
    };
    debug!("Rank {} completed broadcast", transport.group().rank());
    result
}

/// Broadcast a [`Record`] from `root`; `record` is only read on `root`.
pub fn broadcast_record<T: Transport, R: Record>(
    transport: &T,
    algorithm: BroadcastAlgorithm,
    record: Option<&R>,
    root: Rank,
) -> Result<R> {
    let fields = if transport.group().is_root(root) {
        record.map(R::encode_fields).transpose()?
    } else {
        None
    };
    let fields = broadcast_fields(transport, algorithm, fields, R::FIELDS, root)?;
    R::decode_fields(fields)
}

/// Broadcast any serializable value from `root` as a single field.
pub fn broadcast_value<T: Transport, V: Serialize + DeserializeOwned>(
    transport: &T,
    algorithm: BroadcastAlgorithm,
    value: Option<&V>,
    root: Rank,
) -> Result<V> {
    let fields = if transport.group().is_root(root) {
        value.map(|v| encode(v).map(|bytes| vec![bytes])).transpose()?
    } else {
        None
    };
    let mut fields = broadcast_fields(transport, algorithm, fields, 1, root)?;
    check_arity(1, fields.len())?;
    decode(&fields.swap_remove(0))
}
