//! Collective communication for the distributed kernel.
//!
//! [`Communicator`] is the seam between the fill algorithm and whatever
//! runtime carries the values: it exposes the three collectives the
//! wavefront needs (variable-count gather, broadcast, barrier) over a fixed
//! group of ranks. Group formation and teardown belong to the caller.
//!
//! [`ChannelComm`] is the in-repo implementation: one endpoint per rank,
//! values moving over channels, no memory shared between ranks. It is what
//! the driver and the tests use to run P cooperating "processes" inside one
//! OS process. A multi-node deployment would put an MPI binding behind the
//! same trait without touching the kernel.

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;

/// Rank that assembles gathered diagonals and roots the broadcasts.
pub const ROOT: usize = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    /// A peer can no longer be reached; the whole fill is abandoned.
    #[error("peer unreachable during {op}: the group has shut down")]
    Disconnected { op: &'static str },

    /// A message of the wrong kind arrived, meaning the group's collective
    /// call sequences have diverged.
    #[error("protocol violation during {op}: unexpected {got} message")]
    Protocol { op: &'static str, got: &'static str },

    /// A collective payload had the wrong length.
    #[error("{op} payload has {got} values, expected {expected}")]
    Shape {
        op: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Collective operations over a fixed group of ranks `0..size`.
///
/// Matching calls: every rank must invoke the same sequence of collectives
/// with compatible arguments. A rank blocks inside a collective until its
/// peers arrive at the matching call; there are no other suspension points.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Concatenate every rank's `local` values at `root`, in rank order.
    /// On return `out` holds the concatenation at `root` and is empty on
    /// every other rank. Zero-length contributions are valid; ranks with
    /// nothing to contribute still participate.
    fn gather_varcount(
        &self,
        local: &[f64],
        root: usize,
        out: &mut Vec<f64>,
    ) -> Result<(), CommError>;

    /// Replicate `buf` from `root` to every rank; receivers are resized to
    /// the payload length.
    fn broadcast(&self, root: usize, buf: &mut Vec<f64>) -> Result<(), CommError>;

    /// Block until every rank has arrived.
    fn barrier(&self) -> Result<(), CommError>;
}

enum Message {
    /// One rank's contribution to a gather.
    Share { from: usize, payload: Vec<f64> },
    /// The broadcast payload.
    Replica { payload: Vec<f64> },
    /// Barrier arrival, collected by rank 0.
    Arrival,
    /// Barrier release, sent by rank 0.
    Release,
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Share { .. } => "share",
            Message::Replica { .. } => "replica",
            Message::Arrival => "arrival",
            Message::Release => "release",
        }
    }
}

/// In-process group endpoint: ranks are threads, values move over channels.
///
/// Each endpoint owns its inbox and a sender per peer. Endpoints hold no
/// sender to themselves, so when every peer has dropped its endpoint a
/// blocked `recv` reports [`CommError::Disconnected`] instead of hanging
/// (detection of a single stalled-but-alive peer is the runtime's concern,
/// not this layer's).
pub struct ChannelComm {
    rank: usize,
    peers: Vec<Option<Sender<Message>>>,
    inbox: Receiver<Message>,
}

impl ChannelComm {
    /// Form a group of `size` endpoints with ranks `0..size`. Hand each
    /// endpoint to its own thread; the collectives do the rest.
    pub fn group(size: usize) -> Vec<ChannelComm> {
        assert!(size > 0, "a group needs at least one rank");
        let mut senders = Vec::with_capacity(size);
        let mut inboxes = Vec::with_capacity(size);
        for _ in 0..size {
            let (sender, inbox) = unbounded();
            senders.push(sender);
            inboxes.push(inbox);
        }
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelComm {
                rank,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(to, sender)| (to != rank).then(|| sender.clone()))
                    .collect(),
                inbox,
            })
            .collect()
    }

    fn send(&self, to: usize, message: Message, op: &'static str) -> Result<(), CommError> {
        let sender = self.peers[to]
            .as_ref()
            .expect("collectives never send to self");
        sender.send(message).map_err(|_| CommError::Disconnected { op })
    }

    fn recv(&self, op: &'static str) -> Result<Message, CommError> {
        self.inbox.recv().map_err(|_| CommError::Disconnected { op })
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn gather_varcount(
        &self,
        local: &[f64],
        root: usize,
        out: &mut Vec<f64>,
    ) -> Result<(), CommError> {
        const OP: &str = "gather";
        out.clear();
        if self.rank != root {
            return self.send(
                root,
                Message::Share {
                    from: self.rank,
                    payload: local.to_vec(),
                },
                OP,
            );
        }
        // Contributions may arrive in any order; slot them by rank.
        let mut shares: Vec<Option<Vec<f64>>> = vec![None; self.size()];
        shares[root] = Some(local.to_vec());
        let mut missing = self.size() - 1;
        while missing > 0 {
            match self.recv(OP)? {
                Message::Share { from, payload } => {
                    if shares[from].replace(payload).is_some() {
                        return Err(CommError::Protocol {
                            op: OP,
                            got: "duplicate share",
                        });
                    }
                    missing -= 1;
                }
                other => {
                    return Err(CommError::Protocol {
                        op: OP,
                        got: other.kind(),
                    });
                }
            }
        }
        for share in shares.into_iter().flatten() {
            out.extend(share);
        }
        Ok(())
    }

    fn broadcast(&self, root: usize, buf: &mut Vec<f64>) -> Result<(), CommError> {
        const OP: &str = "broadcast";
        if self.rank == root {
            for to in 0..self.size() {
                if to != root {
                    self.send(
                        to,
                        Message::Replica {
                            payload: buf.clone(),
                        },
                        OP,
                    )?;
                }
            }
            return Ok(());
        }
        match self.recv(OP)? {
            Message::Replica { payload } => {
                buf.clear();
                buf.extend(payload);
                Ok(())
            }
            other => Err(CommError::Protocol {
                op: OP,
                got: other.kind(),
            }),
        }
    }

    fn barrier(&self) -> Result<(), CommError> {
        const OP: &str = "barrier";
        if self.rank == ROOT {
            let mut waiting = self.size() - 1;
            while waiting > 0 {
                match self.recv(OP)? {
                    Message::Arrival => waiting -= 1,
                    other => {
                        return Err(CommError::Protocol {
                            op: OP,
                            got: other.kind(),
                        });
                    }
                }
            }
            for to in 0..self.size() {
                if to != ROOT {
                    self.send(to, Message::Release, OP)?;
                }
            }
            return Ok(());
        }
        self.send(ROOT, Message::Arrival, OP)?;
        match self.recv(OP)? {
            Message::Release => Ok(()),
            other => Err(CommError::Protocol {
                op: OP,
                got: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn solo_group_gathers_and_broadcasts_locally() {
        let mut group = ChannelComm::group(1);
        let comm = group.pop().unwrap();
        let mut out = Vec::new();
        comm.gather_varcount(&[1.0, 2.0], ROOT, &mut out).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
        comm.broadcast(ROOT, &mut out).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
        comm.barrier().unwrap();
    }

    #[test]
    fn gather_concatenates_in_rank_order() {
        let group = ChannelComm::group(3);
        let results: Vec<Vec<f64>> = thread::scope(|scope| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    scope.spawn(move || {
                        // Rank 1 contributes two values, the others one each.
                        let local: Vec<f64> = match comm.rank() {
                            1 => vec![10.0, 11.0],
                            rank => vec![rank as f64],
                        };
                        let mut out = Vec::new();
                        comm.gather_varcount(&local, ROOT, &mut out).unwrap();
                        out
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], vec![0.0, 10.0, 11.0, 2.0]);
        assert!(results[1].is_empty());
        assert!(results[2].is_empty());
    }

    #[test]
    fn gather_accepts_zero_length_contributions() {
        let group = ChannelComm::group(3);
        let root_view: Vec<f64> = thread::scope(|scope| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let local: Vec<f64> = if comm.rank() == 2 {
                            Vec::new()
                        } else {
                            vec![comm.rank() as f64]
                        };
                        let mut out = Vec::new();
                        comm.gather_varcount(&local, ROOT, &mut out).unwrap();
                        out
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).next().unwrap()
        });
        assert_eq!(root_view, vec![0.0, 1.0]);
    }

    #[test]
    fn broadcast_replicates_to_every_rank() {
        let group = ChannelComm::group(4);
        let results: Vec<Vec<f64>> = thread::scope(|scope| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let mut buf = if comm.rank() == ROOT {
                            vec![3.5, 4.5]
                        } else {
                            vec![0.0; 7] // stale receiver state must be replaced
                        };
                        comm.broadcast(ROOT, &mut buf).unwrap();
                        buf
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for replica in results {
            assert_eq!(replica, vec![3.5, 4.5]);
        }
    }

    #[test]
    fn barrier_releases_every_rank() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let arrived = AtomicUsize::new(0);
        let group = ChannelComm::group(3);
        thread::scope(|scope| {
            for comm in group {
                let arrived = &arrived;
                scope.spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    comm.barrier().unwrap();
                    // Nobody passes the barrier before everyone arrived.
                    assert_eq!(arrived.load(Ordering::SeqCst), 3);
                });
            }
        });
    }

    #[test]
    fn disconnect_is_an_error() {
        let mut group = ChannelComm::group(2);
        let peer = group.pop().unwrap();
        let root = group.pop().unwrap();
        drop(peer);
        let mut out = Vec::new();
        let err = root.gather_varcount(&[1.0], ROOT, &mut out).unwrap_err();
        assert_eq!(err, CommError::Disconnected { op: "gather" });
    }
}
