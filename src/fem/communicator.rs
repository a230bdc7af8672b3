use crate::StrError;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Defines a packet of accumulated data: (row, column, value)
///
/// Vectors use column zero.
pub type Packet = (usize, usize, f64);

/// Defines the collective operations among the ranks (processes) of a partitioned mesh
///
/// Every rank must call the collective functions in the same order.
pub trait Communicator {
    /// Returns the rank of this process
    fn rank(&self) -> usize;

    /// Returns the number of ranks
    fn size(&self) -> usize;

    /// Sends `outgoing[dest]` to each rank and returns the packets received from all ranks
    ///
    /// The received packets are ordered by source rank (including this rank).
    ///
    /// # Panics
    ///
    /// The implementations may panic if `outgoing.len() != size()`
    fn exchange(&self, outgoing: Vec<Vec<Packet>>) -> Result<Vec<Packet>, StrError>;

    /// Computes the sum of values over all ranks (element-wise)
    fn sum(&self, values: &[f64]) -> Result<Vec<f64>, StrError> {
        let mut results = vec![0.0; values.len()];
        for (i, _, v) in self.exchange(broadcast(values, self.size()))? {
            results[i] += v;
        }
        Ok(results)
    }

    /// Computes the maximum of values over all ranks (element-wise)
    fn max(&self, values: &[f64]) -> Result<Vec<f64>, StrError> {
        let mut results = vec![f64::NEG_INFINITY; values.len()];
        for (i, _, v) in self.exchange(broadcast(values, self.size()))? {
            results[i] = f64::max(results[i], v);
        }
        Ok(results)
    }

    /// Returns true if every rank reports success
    ///
    /// Call this before the next collective operation so that a failure on one rank
    /// does not leave the other ranks waiting.
    fn all_ok(&self, ok: bool) -> Result<bool, StrError> {
        let failed = self.max(&[if ok { 0.0 } else { 1.0 }])?;
        Ok(failed[0] == 0.0)
    }
}

/// Packs the same values for every rank
fn broadcast(values: &[f64], size: usize) -> Vec<Vec<Packet>> {
    let packets: Vec<_> = values.iter().enumerate().map(|(i, v)| (i, 0, *v)).collect();
    vec![packets; size]
}

/// Implements the communicator of a single process
pub struct SerialComm {}

impl SerialComm {
    /// Allocates a new instance
    pub fn new() -> Self {
        SerialComm {}
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange(&self, mut outgoing: Vec<Vec<Packet>>) -> Result<Vec<Packet>, StrError> {
        assert_eq!(outgoing.len(), 1);
        Ok(outgoing.pop().unwrap_or_default())
    }
}

/// Implements a communicator among threads (one rank per thread)
///
/// Each rank owns one receiving channel. Messages from different sources may
/// interleave in the channel, thus they are stashed in per-source queues until
/// requested; since every rank sends exactly one message to each rank per
/// collective call, the queues keep consecutive collectives apart.
pub struct ThreadComm {
    rank: usize,
    senders: Vec<Sender<(usize, Vec<Packet>)>>,
    receiver: Receiver<(usize, Vec<Packet>)>,
    pending: Mutex<Vec<VecDeque<Vec<Packet>>>>,
}

impl ThreadComm {
    /// Allocates a group of connected communicators; move one into each thread
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| ThreadComm {
                rank,
                senders: senders.clone(),
                receiver,
                pending: Mutex::new(vec![VecDeque::new(); size]),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn exchange(&self, outgoing: Vec<Vec<Packet>>) -> Result<Vec<Packet>, StrError> {
        let size = self.size();
        assert_eq!(outgoing.len(), size);
        for (dest, packets) in outgoing.into_iter().enumerate() {
            self.senders[dest]
                .send((self.rank, packets))
                .map_err(|_| "cannot send packets")?;
        }
        let mut pending = self.pending.lock().map_err(|_| "cannot lock the pending queues")?;
        let mut incoming = Vec::new();
        for source in 0..size {
            loop {
                if let Some(packets) = pending[source].pop_front() {
                    incoming.extend(packets);
                    break;
                }
                let (from, packets) = self.receiver.recv().map_err(|_| "cannot receive packets")?;
                pending[from].push_back(packets);
            }
        }
        Ok(incoming)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
