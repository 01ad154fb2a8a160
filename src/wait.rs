//! Readiness strategies for bounded waits
//!
//! A timed wait first asks its strategy whether a token is readable, then
//! performs the one-byte read. [`PollWait`] bounds the wait with `poll(2)`.
//! [`BlockingWait`] is the fallback for platforms where `poll(2)` on a FIFO
//! is unreliable: it always reports readiness, so the following read
//! blocks without bound and the timeout is NOT honored.

use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::BorrowedFd;
use rustix::io::Errno;
use std::io;
use std::time::{Duration, Instant};

/// Outcome of waiting for a readable token
#[derive(Debug)]
pub enum Readiness {
    /// A token can be read without blocking
    Readable,
    /// Nothing readable before the deadline; carries the observed event mask
    TimedOut { revents: i32 },
    /// The polling primitive itself failed
    Failed(io::Error),
}

/// Strategy used by [`JackFifo::timed_wait`](crate::JackFifo::timed_wait)
pub trait TimedWait {
    /// Whether `timeout` is actually enforced
    const BOUNDED: bool;

    fn ready(fd: BorrowedFd<'_>, timeout: Duration) -> Readiness;
}

/// `poll(2)`-based bounded wait
pub struct PollWait;

impl TimedWait for PollWait {
    const BOUNDED: bool = true;

    fn ready(fd: BorrowedFd<'_>, timeout: Duration) -> Readiness {
        // `None` when the deadline is beyond what `Instant` can represent
        let deadline = Instant::now().checked_add(timeout);
        let events = PollFlags::IN | PollFlags::ERR | PollFlags::HUP | PollFlags::NVAL;

        loop {
            let timeout_ms = match deadline {
                Some(deadline) => poll_timeout_ms(deadline.saturating_duration_since(Instant::now())),
                None => INFINITE,
            };
            let mut fds = [PollFd::new(&fd, events)];

            match poll(&mut fds, timeout_ms) {
                Ok(_) => {
                    let revents = fds[0].revents();
                    return if revents.contains(PollFlags::IN) {
                        Readiness::Readable
                    } else {
                        Readiness::TimedOut {
                            revents: i32::from(revents.bits()),
                        }
                    };
                }
                // Signal delivery: retry with what is left of the deadline
                Err(Errno::INTR) => continue,
                Err(e) => return Readiness::Failed(e.into()),
            }
        }
    }
}

/// Unbounded fallback, see the module docs
pub struct BlockingWait;

impl TimedWait for BlockingWait {
    const BOUNDED: bool = false;

    fn ready(_fd: BorrowedFd<'_>, _timeout: Duration) -> Readiness {
        Readiness::Readable
    }
}

/// Strategy selected for the build target
#[cfg(not(target_vendor = "apple"))]
pub type PlatformWait = PollWait;
#[cfg(target_vendor = "apple")]
pub type PlatformWait = BlockingWait;

/// `poll(2)` timeout meaning "no deadline"
const INFINITE: i32 = -1;

/// Milliseconds for `poll(2)`, rounded up so the wait never ends early
fn poll_timeout_ms(timeout: Duration) -> i32 {
    let ms = timeout.as_micros().div_ceil(1000);
    i32::try_from(ms).unwrap_or(i32::MAX)
}
