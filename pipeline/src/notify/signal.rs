//! A cross-thread readiness signal with a pollable file descriptor.
//!
//! Backed by an `eventfd` on Linux and Android and by a non-blocking pipe pair
//! on other unix targets. Either way the read end becomes readable once
//! `signal` is called and stops being readable after `clear`, so it can be
//! registered with `select`, `poll`, `epoll` or `kqueue` next to sockets.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

#[cfg(any(target_os = "linux", target_os = "android"))]
const TOKEN: [u8; 8] = 1u64.to_ne_bytes();
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const TOKEN: [u8; 1] = [b'x'];

/// A level-triggered readiness flag exposed through a file descriptor.
#[derive(Debug)]
pub struct ReadySignal {
  read: OwnedFd,
  // `None` when the same descriptor serves both ends (eventfd).
  write: Option<OwnedFd>,
}

impl ReadySignal {
  /// Creates a cleared signal.
  #[cfg(any(target_os = "linux", target_os = "android"))]
  pub fn new() -> io::Result<Self> {
    let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
    if fd < 0 {
      return Err(io::Error::last_os_error());
    }
    Ok(Self {
      read: unsafe { OwnedFd::from_raw_fd(fd) },
      write: None,
    })
  }

  /// Creates a cleared signal.
  #[cfg(not(any(target_os = "linux", target_os = "android")))]
  pub fn new() -> io::Result<Self> {
    let mut fds: [libc::c_int; 2] = [-1, -1];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
      return Err(io::Error::last_os_error());
    }
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_nonblocking_cloexec(read.as_raw_fd())?;
    set_nonblocking_cloexec(write.as_raw_fd())?;
    Ok(Self {
      read,
      write: Some(write),
    })
  }

  /// Makes the descriptor readable. Returns `false` if nothing was written
  /// because the signal is already saturated.
  pub fn signal(&self) -> io::Result<bool> {
    let fd = self.write.as_ref().unwrap_or(&self.read).as_raw_fd();
    loop {
      let rtn = unsafe { libc::write(fd, TOKEN.as_ptr().cast(), TOKEN.len()) };
      if rtn >= 0 {
        return Ok(rtn > 0);
      }
      let err = io::Error::last_os_error();
      match err.kind() {
        io::ErrorKind::Interrupted => continue,
        io::ErrorKind::WouldBlock => return Ok(false),
        _ => return Err(err),
      }
    }
  }

  /// Consumes any pending signal. Returns whether one was pending.
  pub fn clear(&self) -> io::Result<bool> {
    let fd = self.read.as_raw_fd();
    // eventfd reads need at least 8 bytes.
    let mut buf = [0u8; 64];
    let mut cleared = false;
    loop {
      let rtn = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
      if rtn > 0 {
        cleared = true;
        continue;
      }
      if rtn == 0 {
        return Ok(cleared);
      }
      let err = io::Error::last_os_error();
      match err.kind() {
        io::ErrorKind::Interrupted => continue,
        io::ErrorKind::WouldBlock => return Ok(cleared),
        _ => return Err(err),
      }
    }
  }

  /// Blocks until the signal is set or `timeout` elapses. `None` waits
  /// forever. Returns whether the signal is set.
  pub fn wait(&self, timeout: Option<Duration>) -> io::Result<bool> {
    // A timeout past the clock's range waits forever.
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    let mut pfd = libc::pollfd {
      fd: self.read.as_raw_fd(),
      events: libc::POLLIN,
      revents: 0,
    };
    loop {
      let ms = match deadline {
        Some(deadline) => poll_millis(deadline.saturating_duration_since(Instant::now())),
        None => -1,
      };
      let rtn = unsafe { libc::poll(&mut pfd, 1, ms) };
      if rtn >= 0 {
        return Ok(rtn > 0 && pfd.revents & libc::POLLIN != 0);
      }
      let err = io::Error::last_os_error();
      if err.kind() != io::ErrorKind::Interrupted {
        return Err(err);
      }
    }
  }

  /// Returns whether the signal is currently set, without blocking.
  pub fn is_signaled(&self) -> io::Result<bool> {
    self.wait(Some(Duration::ZERO))
  }
}

impl AsFd for ReadySignal {
  fn as_fd(&self) -> BorrowedFd<'_> {
    self.read.as_fd()
  }
}

impl AsRawFd for ReadySignal {
  fn as_raw_fd(&self) -> RawFd {
    self.read.as_raw_fd()
  }
}

// Rounds up so a sub-millisecond remainder still waits instead of spinning.
fn poll_millis(remaining: Duration) -> libc::c_int {
  let millis = remaining.as_nanos().div_ceil(1_000_000);
  millis.min(libc::c_int::MAX as u128) as libc::c_int
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn set_nonblocking_cloexec(fd: RawFd) -> io::Result<()> {
  unsafe {
    let flags = libc::fcntl(fd, libc::F_GETFL);
    if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
      return Err(io::Error::last_os_error());
    }
    let fd_flags = libc::fcntl(fd, libc::F_GETFD);
    if fd_flags < 0 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0 {
      return Err(io::Error::last_os_error());
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::thread;

  #[test]
  fn signal_then_clear() {
    let signal = ReadySignal::new().unwrap();
    assert!(!signal.is_signaled().unwrap());
    assert!(signal.signal().unwrap());
    assert!(signal.is_signaled().unwrap());
    assert!(signal.clear().unwrap());
    assert!(!signal.is_signaled().unwrap());
    assert!(!signal.clear().unwrap());
  }

  #[test]
  fn wait_times_out_when_clear() {
    let signal = ReadySignal::new().unwrap();
    let start = Instant::now();
    assert!(!signal.wait(Some(Duration::from_millis(30))).unwrap());
    assert!(start.elapsed() >= Duration::from_millis(25));
  }

  #[test]
  fn wait_wakes_on_signal_from_other_thread() {
    let signal = Arc::new(ReadySignal::new().unwrap());
    let remote = signal.clone();
    let handle = thread::spawn(move || {
      thread::sleep(Duration::from_millis(50));
      remote.signal().unwrap();
    });
    assert!(signal.wait(Some(Duration::from_secs(3))).unwrap());
    handle.join().unwrap();
  }

  #[test]
  fn wait_accepts_unbounded_timeout() {
    let signal = ReadySignal::new().unwrap();
    signal.signal().unwrap();
    assert!(signal.wait(Some(Duration::MAX)).unwrap());
  }

  #[test]
  fn poll_millis_rounds_up() {
    assert_eq!(poll_millis(Duration::ZERO), 0);
    assert_eq!(poll_millis(Duration::from_micros(10)), 1);
    assert_eq!(poll_millis(Duration::from_millis(7)), 7);
  }
}
