//! Receive-side sequencing for datagram transports: detecting duplicates, gaps and recoveries
//!  in a per-peer stream of sequence numbers, and keeping track of what is missing so it can be
//!  requested again (NAK'ed).
//!
//! ## Design goals
//!
//! * Work with bounded sequence numbers that wrap around
//!   * the sequence space is a 16 bit 'lollipop': a linear stem of negative values that is
//!     traversed once after startup, followed by a loop of non-negative values that wraps
//!     around forever
//!   * ordering in the loop is circular, which is only well-defined if fewer than half the loop
//!     is in flight at any time. This is the caller's responsibility, it is not checked
//! * Memory proportional to the number of *gaps*, not the number of received packets
//! * No I/O, no timers and no locking in the core data structures
//!   * time is passed in explicitly, which keeps timeout behavior deterministic and testable
//!   * a registry for all peers and an async NAK watchdog are provided on top of them
//! * Two delivery disciplines:
//!   * *best effort*: gaps are reported and forgotten
//!   * *reliable*: gaps are NAK'ed until they are filled, or until the sender announces that it
//!     can not repair them, or until a NAK timeout gives up on them
//!
//! ## Sequence numbers
//!
//! ```ascii
//!  MIN -> ... -> -1 -> 0 -> 1 -> ... -> MAX
//!                      ^                 |
//!                      +-----------------+
//! ```
//!
//! Two values in the loop compare by their numeric difference if they are at most 2^14 apart,
//!  otherwise the numerically smaller one is assumed to have wrapped and is considered greater.
//!  Stem values compare numerically, and every stem value is less than every loop value.
//!
//! ## Classification
//!
//! Each session has a `last_received` marker and a gap tracker (low-water mark plus individually
//!  received values beyond the first gap). For an arriving value `seq`:
//! * the first arrival establishes the baseline and is in order
//! * values that were seen before are duplicates
//! * the successor of the highest known value is in order
//! * values beyond that are a gap: everything between is missing
//! * unseen values below the highest known value fill a gap (they are *recovered*)
//!
//! Whether a gap is given up on right away is a matter of the session's advance policy. By
//!  default best-effort sessions move forward to the newest arrival, while reliable sessions hold
//!  `last_received` at the last contiguously received value.
//!
//! ## NAKs
//!
//! Missing ranges of reliable sessions are coalesced into disjoint, non-adjacent half-open
//!  ranges. They are collected in NAK rounds at a randomized interval (between one and two times
//!  the configured base interval) to avoid all receivers NAK'ing the same data at the same time.
//!  Ranges that other receivers requested in the current round are not requested again.
//!
//! Every NAK round is recorded together with the receiver's high-water mark at that time. If a
//!  round was not answered within the NAK timeout, everything up to its high-water mark is
//!  given up on.

pub mod config;
pub mod delivery_session;
pub mod error;
pub mod gap_tracker;
pub mod header;
pub mod nack_coalescer;
pub mod nak_request_log;
pub mod nak_watchdog;
pub mod peer_id;
pub mod session_registry;
pub mod wrap_seq;
