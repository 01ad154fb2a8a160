//! Named-FIFO signal channel
//!
//! One process (the server) creates the FIFO, later removes it, and in
//! between any number of client processes open their own end of it. Each
//! signal is a single byte written to the FIFO; each wait consumes one.

use crate::error::{FifoError, Result};
use crate::name::FifoConfig;
use crate::wait::{PlatformWait, Readiness, TimedWait};
use rustix::fd::{AsFd, OwnedFd};
use rustix::fs::{AtFlags, FileType, Mode, OFlags};
use rustix::io::Errno;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Size of one wake token on the wire
const TOKEN_SIZE: usize = 1;

/// Permissions of a freshly created FIFO (before umask)
#[cfg_attr(target_vendor = "apple", allow(dead_code))]
const FIFO_MODE: u32 = 0o666;

/// Which side of the channel an instance plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Creates and destroys the named FIFO
    Server,
    /// Only opens and closes its own handle
    Client,
}

/// How the local handle was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    /// Never blocks the signaling side, even with no reader yet
    WriteOnlyNonBlocking,
    ReadOnly,
}

impl AccessMode {
    fn flags(self) -> OFlags {
        let access = match self {
            AccessMode::ReadWrite => OFlags::RDWR,
            AccessMode::WriteOnlyNonBlocking => OFlags::WRONLY | OFlags::NONBLOCK,
            AccessMode::ReadOnly => OFlags::RDONLY,
        };
        access | OFlags::CLOEXEC
    }
}

/// Cross-process wake channel backed by a named FIFO
///
/// Not internally synchronized: callers sharing one instance between
/// threads must serialize access themselves.
#[derive(Debug)]
pub struct JackFifo {
    config: FifoConfig,
    role: Role,
    name: Option<PathBuf>,
    fd: Option<OwnedFd>,
    access: Option<AccessMode>,
    flush: bool,
}

impl JackFifo {
    /// Instance allowed to allocate and destroy the named FIFO
    pub fn server(config: FifoConfig) -> Self {
        Self::new(config, Role::Server)
    }

    /// Instance allowed to connect to an existing FIFO
    pub fn client(config: FifoConfig) -> Self {
        Self::new(config, Role::Client)
    }

    fn new(config: FifoConfig, role: Role) -> Self {
        Self {
            config,
            role,
            name: None,
            fd: None,
            access: None,
            flush: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Path of the FIFO, once it has been opened
    pub fn name(&self) -> Option<&Path> {
        self.name.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// Access mode of the open handle, `None` when closed
    pub fn access_mode(&self) -> Option<AccessMode> {
        self.access
    }

    /// Suppress outgoing signals while `flush` is set
    pub fn set_flush(&mut self, flush: bool) {
        self.flush = flush;
    }

    pub fn is_flushing(&self) -> bool {
        self.flush
    }

    /// Create (or reuse) the named FIFO and open it read-write
    ///
    /// `value` is accepted for interface parity with buffered channel kinds;
    /// a FIFO needs no sizing.
    pub fn allocate(&mut self, name: &str, server_name: &str, value: i32) -> Result<()> {
        self.require_role(Role::Server, "allocate")?;
        let path = self.resolve_name(name, server_name)?;
        log::debug!("JackFifo::allocate name = {} value = {}", path.display(), value);

        if self.fd.is_some() {
            log::debug!("JackFifo::allocate already open name = {}", path.display());
            return Ok(());
        }

        match rustix::fs::stat(&path) {
            Ok(stat) => {
                if FileType::from_raw_mode(stat.st_mode as _) != FileType::Fifo {
                    return Err(self.report(FifoError::NamespaceConflict { name: path }));
                }
            }
            Err(Errno::NOENT) => {
                if let Err(source) = make_fifo(&path) {
                    return Err(self.report(FifoError::CreationFailed { name: path, source }));
                }
            }
            Err(e) => {
                return Err(self.report(FifoError::CreationFailed {
                    name: path,
                    source: e.into(),
                }));
            }
        }

        self.open(path, AccessMode::ReadWrite)
    }

    /// Open the existing FIFO read-write
    pub fn connect(&mut self, name: &str, server_name: &str) -> Result<()> {
        self.connect_aux(name, server_name, AccessMode::ReadWrite)
    }

    /// Open the existing FIFO write-only and non-blocking, for signaling only
    pub fn connect_output(&mut self, name: &str, server_name: &str) -> Result<()> {
        self.connect_aux(name, server_name, AccessMode::WriteOnlyNonBlocking)
    }

    /// Open the existing FIFO read-only, for waiting only
    pub fn connect_input(&mut self, name: &str, server_name: &str) -> Result<()> {
        self.connect_aux(name, server_name, AccessMode::ReadOnly)
    }

    fn connect_aux(&mut self, name: &str, server_name: &str, access: AccessMode) -> Result<()> {
        self.require_role(Role::Client, "connect")?;
        let path = self.resolve_name(name, server_name)?;
        log::debug!("JackFifo::connect name = {} access = {:?}", path.display(), access);

        if self.fd.is_some() {
            log::debug!("Already connected name = {}", path.display());
            return Ok(());
        }

        self.open(path, access)
    }

    fn open(&mut self, path: PathBuf, access: AccessMode) -> Result<()> {
        match rustix::fs::open(&path, access.flags(), Mode::empty()) {
            Ok(fd) => {
                self.fd = Some(fd);
                self.access = Some(access);
                self.name = Some(path);
                Ok(())
            }
            Err(e) => Err(self.report(FifoError::OpenFailed {
                name: path,
                source: e.into(),
            })),
        }
    }

    /// Close the local handle; a no-op when already closed
    ///
    /// Always succeeds: the handle is released on drop, which does not
    /// surface close(2) errors.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(fd) = self.fd.take() {
            log::debug!("JackFifo::disconnect {}", self.display_name());
            self.access = None;
            drop(fd);
        }
        Ok(())
    }

    /// Remove the named FIFO, then close the local handle
    ///
    /// Removal is the authoritative step: a channel whose path is already
    /// gone still gets its handle closed.
    pub fn destroy(&mut self) -> Result<()> {
        self.require_role(Role::Server, "destroy")?;
        let fd = match self.fd.take() {
            Some(fd) => fd,
            None => return Err(self.disconnected("destroy")),
        };
        self.access = None;

        let path = self.name.clone().unwrap_or_default();
        log::debug!("JackFifo::destroy name = {}", path.display());

        let removed = rustix::fs::unlinkat(rustix::fs::CWD, &path, AtFlags::empty());
        drop(fd);

        removed.map_err(|e| {
            self.report(FifoError::Io {
                name: path,
                op: "unlink",
                source: e.into(),
            })
        })
    }

    /// Write one wake token
    pub fn signal(&self) -> Result<()> {
        self.write_token("signal")
    }

    /// Same as [`signal`](Self::signal): a FIFO token wakes one waiter
    pub fn signal_all(&self) -> Result<()> {
        self.write_token("signal_all")
    }

    fn write_token(&self, op: &'static str) -> Result<()> {
        let fd = self.fd.as_ref().ok_or_else(|| self.disconnected(op))?;

        if self.flush {
            return Ok(());
        }

        let token = [0u8; TOKEN_SIZE];
        match rustix::io::write(fd, &token) {
            Ok(TOKEN_SIZE) => Ok(()),
            Ok(got) => Err(self.report(FifoError::ShortTransfer {
                name: self.path_buf(),
                op,
                expected: TOKEN_SIZE,
                got,
            })),
            Err(e) => Err(self.report(FifoError::Io {
                name: self.path_buf(),
                op,
                source: e.into(),
            })),
        }
    }

    /// Block until one token has been read
    ///
    /// Unbounded; not for use inside a real-time deadline window.
    pub fn wait(&self) -> Result<()> {
        let fd = self.fd.as_ref().ok_or_else(|| self.disconnected("wait"))?;

        let mut token = [0u8; TOKEN_SIZE];
        match rustix::io::read(fd, &mut token) {
            Ok(TOKEN_SIZE) => Ok(()),
            Ok(got) => Err(self.report(FifoError::ShortTransfer {
                name: self.path_buf(),
                op: "wait",
                expected: TOKEN_SIZE,
                got,
            })),
            Err(e) => Err(self.report(FifoError::Io {
                name: self.path_buf(),
                op: "wait",
                source: e.into(),
            })),
        }
    }

    /// Wait at most `timeout` for one token
    ///
    /// On targets where [`PlatformWait`] is not bounded this degrades to
    /// [`wait`](Self::wait).
    pub fn timed_wait(&self, timeout: Duration) -> Result<()> {
        self.timed_wait_with::<PlatformWait>(timeout)
    }

    /// [`timed_wait`](Self::timed_wait) with an explicit readiness strategy
    pub fn timed_wait_with<W: TimedWait>(&self, timeout: Duration) -> Result<()> {
        let fd = self
            .fd
            .as_ref()
            .ok_or_else(|| self.disconnected("timed_wait"))?;

        match W::ready(fd.as_fd(), timeout) {
            Readiness::Readable => self.wait(),
            Readiness::TimedOut { revents } => Err(self.report(FifoError::Timeout {
                name: self.path_buf(),
                timeout,
                revents,
            })),
            Readiness::Failed(source) => Err(self.report(FifoError::PollError {
                name: self.path_buf(),
                source,
            })),
        }
    }

    /// Build the FIFO path, rejecting a change of an already bound identity
    ///
    /// The identity is bound by the first successful open, so a failed
    /// connect or allocate leaves the channel free to target another name.
    fn resolve_name(&self, name: &str, server_name: &str) -> Result<PathBuf> {
        let path = self.config.build_name(name, server_name)?;
        match &self.name {
            Some(current) if *current != path => Err(self.report(FifoError::IdentityMismatch {
                current: current.clone(),
                requested: path,
            })),
            _ => Ok(path),
        }
    }

    fn require_role(&self, role: Role, op: &'static str) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(self.report(FifoError::WrongRole {
                op,
                role: self.role,
            }))
        }
    }

    fn disconnected(&self, op: &'static str) -> FifoError {
        self.report(FifoError::AlreadyDisconnected {
            name: self.path_buf(),
            op,
        })
    }

    fn report(&self, err: FifoError) -> FifoError {
        log::error!("{}", err);
        err
    }

    fn path_buf(&self) -> PathBuf {
        self.name.clone().unwrap_or_default()
    }

    fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

#[cfg(not(target_vendor = "apple"))]
fn make_fifo(path: &Path) -> std::io::Result<()> {
    rustix::fs::mknodat(
        rustix::fs::CWD,
        path,
        FileType::Fifo,
        Mode::from_raw_mode(FIFO_MODE as _),
        0,
    )
    .map_err(Into::into)
}

#[cfg(target_vendor = "apple")]
fn make_fifo(_path: &Path) -> std::io::Result<()> {
    Err(std::io::ErrorKind::Unsupported.into())
}

// FIFO creation is unavailable on Apple targets
#[cfg(all(test, not(target_vendor = "apple")))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::wait::BlockingWait;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    fn pair(dir: &TempDir) -> (JackFifo, JackFifo) {
        let config = FifoConfig::with_root(dir.path());
        (JackFifo::server(config.clone()), JackFifo::client(config))
    }

    #[test]
    fn test_allocate_creates_fifo() {
        let dir = TempDir::new().unwrap();
        let (mut server, _) = pair(&dir);

        server.allocate("capture", "default", 0).unwrap();
        assert!(server.is_open());
        assert_eq!(server.access_mode(), Some(AccessMode::ReadWrite));

        let path = dir.path().join("jack_fifo.default_capture");
        assert_eq!(server.name(), Some(path.as_path()));
        let stat = rustix::fs::stat(&path).unwrap();
        assert_eq!(FileType::from_raw_mode(stat.st_mode as _), FileType::Fifo);

        server.destroy().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_allocate_reuses_existing_fifo() {
        let dir = TempDir::new().unwrap();
        let (mut first, _) = pair(&dir);
        first.allocate("capture", "default", 0).unwrap();
        // Left behind by a crashed server
        first.disconnect().unwrap();

        let (mut second, _) = pair(&dir);
        second.allocate("capture", "default", 0).unwrap();
        second.signal().unwrap();
        second.wait().unwrap();
        second.destroy().unwrap();
    }

    #[test]
    fn test_allocate_rejects_regular_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jack_fifo.default_capture");
        std::fs::write(&path, b"not a fifo").unwrap();

        let (mut server, _) = pair(&dir);
        let err = server.allocate("capture", "default", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceConflict);
        assert!(!server.is_open());
        assert_eq!(std::fs::read(&path).unwrap(), b"not a fifo");
    }

    #[test]
    fn test_allocate_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let mut server = JackFifo::server(FifoConfig::with_root(dir.path().join("missing")));
        let err = server.allocate("capture", "default", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CreationFailed);
    }

    #[test]
    fn test_signal_then_wait_delivers_one_token() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        client.connect("capture", "default").unwrap();

        client.signal().unwrap();
        server.wait().unwrap();

        // Exactly one token was in flight
        let err = server.timed_wait(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        client.disconnect().unwrap();
        server.destroy().unwrap();
    }

    #[test]
    fn test_signal_all_matches_signal() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        client.connect_output("capture", "default").unwrap();

        client.signal_all().unwrap();
        client.signal().unwrap();
        server.timed_wait(Duration::from_millis(50)).unwrap();
        server.timed_wait(Duration::from_millis(50)).unwrap();
        assert!(server.timed_wait(Duration::from_millis(5)).is_err());

        server.destroy().unwrap();
    }

    #[test]
    fn test_flush_suppresses_signal() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        client.connect_output("capture", "default").unwrap();

        client.set_flush(true);
        assert!(client.is_flushing());
        client.signal().unwrap();
        client.signal_all().unwrap();

        let err = server.timed_wait(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        client.set_flush(false);
        client.signal().unwrap();
        server.timed_wait(Duration::from_millis(50)).unwrap();

        server.destroy().unwrap();
    }

    #[test]
    fn test_flush_on_closed_channel_still_fails() {
        let dir = TempDir::new().unwrap();
        let (_, mut client) = pair(&dir);
        client.set_flush(true);
        let err = client.signal().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyDisconnected);
    }

    #[test]
    fn test_timed_wait_times_out_within_bounds() {
        let dir = TempDir::new().unwrap();
        let (mut server, _) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();

        let timeout = Duration::from_millis(30);
        let start = Instant::now();
        match server.timed_wait_with::<crate::wait::PollWait>(timeout) {
            Err(FifoError::Timeout {
                timeout: reported, ..
            }) => assert_eq!(reported, timeout),
            other => panic!("expected timeout, got {:?}", other),
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(1));

        server.destroy().unwrap();
    }

    #[test]
    fn test_timed_wait_with_blocking_strategy_reads_token() {
        let dir = TempDir::new().unwrap();
        let (mut server, _) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();

        server.signal().unwrap();
        server.timed_wait_with::<BlockingWait>(Duration::ZERO).unwrap();

        server.destroy().unwrap();
    }

    #[test]
    fn test_operations_on_closed_channel() {
        let dir = TempDir::new().unwrap();
        let (mut server, client) = pair(&dir);

        for result in [
            client.signal(),
            client.signal_all(),
            client.wait(),
            client.timed_wait(Duration::from_millis(1)),
        ] {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::AlreadyDisconnected);
        }

        // Never allocated
        let err = server.destroy().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyDisconnected);
    }

    #[test]
    fn test_destroy_twice_reports_disconnected() {
        let dir = TempDir::new().unwrap();
        let (mut server, _) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        server.destroy().unwrap();

        let err = server.destroy().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyDisconnected);
        assert!(!server.is_open());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        client.connect_input("capture", "default").unwrap();
        assert_eq!(client.access_mode(), Some(AccessMode::ReadOnly));

        client.disconnect().unwrap();
        client.disconnect().unwrap();
        assert!(!client.is_open());
        assert_eq!(client.access_mode(), None);

        // Reconnect to the same identity after a disconnect
        client.connect("capture", "default").unwrap();
        client.disconnect().unwrap();
        server.destroy().unwrap();
    }

    #[test]
    fn test_connect_twice_keeps_handle() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();

        client.connect_output("capture", "default").unwrap();
        client.connect("capture", "default").unwrap();
        assert_eq!(client.access_mode(), Some(AccessMode::WriteOnlyNonBlocking));

        server.destroy().unwrap();
    }

    #[test]
    fn test_connect_missing_fifo_fails() {
        let dir = TempDir::new().unwrap();
        let (_, mut client) = pair(&dir);
        let err = client.connect("capture", "default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OpenFailed);
        assert!(!client.is_open());
    }

    #[test]
    fn test_identity_is_fixed() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        client.connect("capture", "default").unwrap();

        let err = client.connect("playback", "default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdentityMismatch);
        assert!(client.is_open());

        server.destroy().unwrap();
    }

    #[test]
    fn test_failed_connect_does_not_bind_identity() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);

        // Server not up yet, and a misspelled name
        let err = client.connect("captur", "default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OpenFailed);
        assert_eq!(client.name(), None);

        server.allocate("capture", "default", 0).unwrap();
        client.connect("capture", "default").unwrap();
        assert_eq!(
            client.name(),
            Some(dir.path().join("jack_fifo.default_capture").as_path())
        );

        server.destroy().unwrap();
    }

    #[test]
    fn test_failed_allocate_does_not_bind_identity() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("jack_fifo.default_capture"), b"").unwrap();

        let (mut server, _) = pair(&dir);
        let err = server.allocate("capture", "default", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceConflict);

        server.allocate("playback", "default", 0).unwrap();
        server.destroy().unwrap();
    }

    #[test]
    fn test_signal_on_full_fifo_reports_io_error() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();
        client.connect_output("capture", "default").unwrap();

        // Nobody drains the FIFO, so the non-blocking writer eventually hits EAGAIN
        let mut sent = 0usize;
        let err = loop {
            match client.signal() {
                Ok(()) => sent += 1,
                Err(e) => break e,
            }
            assert!(sent < 16 * 1024 * 1024, "FIFO never filled up");
        };

        assert_eq!(err.kind(), ErrorKind::Io);
        match &err {
            FifoError::Io { op, source, .. } => {
                assert_eq!(*op, "signal");
                assert_eq!(source.kind(), std::io::ErrorKind::WouldBlock);
            }
            other => panic!("expected Io, got {:?}", other),
        }
        assert!(sent > 0);
        assert!(client.is_open());

        // Draining one token makes room again
        server.wait().unwrap();
        client.signal().unwrap();

        server.destroy().unwrap();
    }

    #[test]
    fn test_timed_wait_unbounded_timeout_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let (mut server, _) = pair(&dir);
        server.allocate("capture", "default", 0).unwrap();

        server.signal().unwrap();
        server.timed_wait(Duration::MAX).unwrap();

        server.destroy().unwrap();
    }

    #[test]
    fn test_roles_are_enforced() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);

        let err = client.allocate("capture", "default", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongRole);
        let err = server.connect("capture", "default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongRole);

        server.allocate("capture", "default", 0).unwrap();
        client.connect("capture", "default").unwrap();
        let err = client.destroy().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongRole);
        assert!(dir.path().join("jack_fifo.default_capture").exists());

        server.destroy().unwrap();
    }

    #[test]
    fn test_server_client_round_trip() {
        let dir = TempDir::new().unwrap();
        let (mut server, mut client) = pair(&dir);

        server.allocate("capture", "default", 0).unwrap();
        client.connect_output("capture", "default").unwrap();

        client.signal().unwrap();
        let start = Instant::now();
        server.timed_wait(Duration::from_micros(50_000)).unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));

        // Second wait blocks until a delayed signal arrives
        let delay = Duration::from_millis(30);
        let signaler = thread::spawn(move || {
            thread::sleep(delay);
            client.signal().unwrap();
            client
        });
        let start = Instant::now();
        server.wait().unwrap();
        assert!(start.elapsed() >= delay);
        let mut client = signaler.join().unwrap();
        client.disconnect().unwrap();

        server.destroy().unwrap();
        assert!(!dir.path().join("jack_fifo.default_capture").exists());

        let (_, mut fresh) = pair(&dir);
        let err = fresh.connect("capture", "default").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OpenFailed);
    }
}
