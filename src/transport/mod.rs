//! Blocking point-to-point messaging between the ranks of a group.
//!
//! A [`Transport`] moves opaque byte payloads addressed by `(peer, tag)`.
//! Sends are synchronous: they return once the peer has taken the message.
//! Messages on the same `(source, dest, tag)` arrive in the order they were
//! sent; messages under different tags never interfere with each other.

pub mod local;
pub mod shm;

use log::debug;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CollectiveError, Result};
use crate::group::{Rank, RankGroup};

/// Message discriminator. Negative tags are reserved for collectives.
pub type Tag = i32;

/// Tags used internally by the collective operations.
pub mod tags {
    use super::Tag;

    pub const BARRIER_ARRIVE: Tag = -1;
    pub const BARRIER_RELEASE: Tag = -2;
    pub const REDUCE: Tag = -3;
    pub const GATHER: Tag = -4;
    pub const SCATTER: Tag = -5;
    /// First field of a broadcast record; field `i` travels under `BROADCAST - i`.
    pub const BROADCAST: Tag = -1000;

    pub fn broadcast_field(index: usize) -> Tag {
        BROADCAST - index as Tag
    }
}

pub trait Transport {
    /// The group this endpoint belongs to.
    fn group(&self) -> RankGroup;

    /// Deliver `payload` to `dest`, blocking until it has been taken.
    fn send_bytes(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<()>;

    /// Block until a message from `source` under `tag` arrives.
    fn recv_bytes(&self, source: Rank, tag: Tag) -> Result<Vec<u8>>;

    /// Serialize `data` and send it to `dest`.
    fn send<T: Serialize>(&self, data: &T, dest: Rank, tag: Tag) -> Result<()>
    where
        Self: Sized,
    {
        self.group().check(dest)?;
        debug!(
            "Rank {} sending to rank {} with tag {}",
            self.group().rank(),
            dest,
            tag
        );
        self.send_bytes(dest, tag, encode(data)?)
    }

    /// Receive a message from `source` and deserialize it.
    fn recv<T: DeserializeOwned>(&self, source: Rank, tag: Tag) -> Result<T>
    where
        Self: Sized,
    {
        self.group().check(source)?;
        debug!(
            "Rank {} receiving from rank {} with tag {}",
            self.group().rank(),
            source,
            tag
        );
        decode(&self.recv_bytes(source, tag)?)
    }
}

pub(crate) fn encode<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    bincode::serialize(data).map_err(|e| CollectiveError::SerializationError(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| CollectiveError::SerializationError(e.to_string()))
}
