//! jack-fifo - Cross-process wake tokens over named FIFOs
//!
//! A real-time audio server and its clients rendezvous on a named FIFO
//! whose path is derived from the client and server names. Signaling
//! writes one byte, waiting reads one, so a sleeping party is woken
//! without polling shared memory.
//!
//! # Roles
//!
//! - **Server**: allocates the FIFO, destroys it when the session ends
//! - **Client**: connects read-write, output-only or input-only
//!
//! # Example
//!
//! ```no_run
//! use jack_fifo::{FifoConfig, JackFifo};
//! use std::time::Duration;
//!
//! let mut server = JackFifo::server(FifoConfig::default());
//! server.allocate("capture", "default", 0)?;
//!
//! let mut client = JackFifo::client(FifoConfig::default());
//! client.connect_output("capture", "default")?;
//! client.signal()?;
//!
//! server.timed_wait(Duration::from_millis(50))?;
//! server.destroy()?;
//! # Ok::<(), jack_fifo::FifoError>(())
//! ```

pub mod error;
pub mod name;
pub mod wait;
pub mod fifo;
pub mod bindings;

pub use error::{ErrorKind, FifoError, Result};
pub use fifo::{AccessMode, JackFifo, Role};
pub use name::FifoConfig;
pub use wait::{BlockingWait, PlatformWait, PollWait, TimedWait};
