//! Serial port access via termios.
//!
//! The port is put in raw mode with `VMIN = 0` and `VTIME` set to the read
//! timeout, so every `read` returns after at most that long: with data, or
//! with `0` when the line stayed quiet. Unplugging a USB adapter also reads
//! as `0` on most kernels, so an empty read is followed by a check that the
//! device node still exists.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use esptop_core::{LineReader, LineSource, TransportError};

/// Rates accepted by `--baud`.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const SUPPORTED_BAUDS: &[u32] = &[
    9600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600,
];
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const SUPPORTED_BAUDS: &[u32] = &[9600, 19_200, 38_400, 57_600, 115_200, 230_400];

/// Round a timeout up to whole deciseconds, clamped to what `VTIME` can hold.
pub fn timeout_deciseconds(timeout: Duration) -> u8 {
    let ds = timeout.as_millis().div_ceil(100);
    ds.clamp(1, u8::MAX as u128) as u8
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// An open serial device configured for bounded reads.
#[derive(Debug)]
pub struct SerialPort {
    file: File,
    path: PathBuf,
}

impl SerialPort {
    #[cfg(unix)]
    pub fn open(path: &Path, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let speed = baud_constant(baud).ok_or(TransportError::UnsupportedBaud(baud))?;
        let open_err = |source: io::Error| TransportError::Open {
            path: path.to_path_buf(),
            source,
        };

        // O_NONBLOCK keeps open() from waiting on carrier detect.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(open_err)?;

        let fd = file.as_raw_fd();
        match configure(fd, speed, timeout_deciseconds(timeout)) {
            Ok(()) => set_blocking(fd).map_err(open_err)?,
            Err(e) if e.raw_os_error() == Some(libc::ENOTTY) => {
                // Pipes and pseudo files: leave non-blocking, reads report WouldBlock.
                log::warn!("{} is not a terminal; reading without line settings", path.display());
            }
            Err(e) => return Err(open_err(e)),
        }

        log::debug!("opened {} at {baud} baud", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    pub fn open(path: &Path, baud: u32, _timeout: Duration) -> Result<Self, TransportError> {
        let _ = baud;
        Err(TransportError::Open {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "serial ports are only supported on Unix",
            ),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        if n == 0 && !self.path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} disappeared", self.path.display()),
            ));
        }
        Ok(n)
    }
}

#[cfg(unix)]
fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        460_800 => libc::B460800,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        921_600 => libc::B921600,
        _ => return None,
    };
    Some(speed)
}

#[cfg(unix)]
fn configure(fd: libc::c_int, speed: libc::speed_t, vtime: u8) -> io::Result<()> {
    // SAFETY: termios is a plain C struct; an all-zero value is valid and is
    // overwritten by tcgetattr before use.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: fd is an open descriptor owned by the caller's File and `tio`
    // is a valid, exclusively borrowed termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `tio` is a valid termios obtained from tcgetattr.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = vtime as libc::cc_t;

    // SAFETY: same `tio` as above; speed comes from the libc B* constants.
    let rc = unsafe { libc::cfsetispeed(&mut tio, speed) | libc::cfsetospeed(&mut tio, speed) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: fd is open and `tio` is fully initialised.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // Drop whatever the device printed before we were listening (boot log).
    // SAFETY: fd is open; TCIFLUSH only discards queued input.
    if unsafe { libc::tcflush(fd, libc::TCIFLUSH) } != 0 {
        log::debug!("tcflush failed: {}", io::Error::last_os_error());
    }
    Ok(())
}

/// Clear `O_NONBLOCK` so reads wait for `VTIME`.
#[cfg(unix)]
fn set_blocking(fd: libc::c_int) -> io::Result<()> {
    // SAFETY: F_GETFL on an open descriptor has no memory effects.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: F_SETFL with flags derived from F_GETFL on the same fd.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// A serial port framed into lines, reopenable after the device drops.
pub struct SerialLink {
    path: PathBuf,
    baud: u32,
    timeout: Duration,
    reader: Option<LineReader<SerialPort>>,
}

impl SerialLink {
    pub fn open(path: &Path, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = SerialPort::open(path, baud, timeout)?;
        Ok(Self {
            path: path.to_path_buf(),
            baud,
            timeout,
            reader: Some(LineReader::new(port)),
        })
    }
}

impl LineSource for SerialLink {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        match reader.next_line() {
            Ok(line) => Ok(line),
            Err(e) => {
                // Close the descriptor now; reconnect opens a fresh one.
                self.reader = None;
                Err(TransportError::Read(e))
            }
        }
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.reader = None;
        let port = SerialPort::open(&self.path, self.baud, self.timeout)?;
        log::info!("reopened {}", port.path().display());
        self.reader = Some(LineReader::new(port));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deciseconds_round_up_and_clamp() {
        assert_eq!(timeout_deciseconds(Duration::from_millis(100)), 1);
        assert_eq!(timeout_deciseconds(Duration::from_millis(150)), 2);
        assert_eq!(timeout_deciseconds(Duration::ZERO), 1);
        assert_eq!(timeout_deciseconds(Duration::from_secs(60)), 255);
    }

    #[cfg(unix)]
    #[test]
    fn unsupported_baud_is_rejected_before_open() {
        let err = SerialPort::open(Path::new("/nonexistent/tty"), 12_345, Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaud(12_345)));
    }

    #[test]
    fn missing_device_reports_path() {
        let err = SerialLink::open(Path::new("/nonexistent/tty"), 115_200, Duration::from_millis(100))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/tty"));
    }

    #[cfg(unix)]
    #[test]
    fn supported_bauds_all_map() {
        for &b in SUPPORTED_BAUDS {
            assert!(baud_constant(b).is_some(), "{b}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn regular_file_reads_lines_then_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.log");
        std::fs::write(&path, b"{\"heap\":1}\n{\"heap\"").unwrap();

        let mut link = SerialLink::open(&path, 115_200, Duration::from_millis(100)).unwrap();
        assert_eq!(link.read_line().unwrap(), Some(b"{\"heap\":1}\n".to_vec()));
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn vanished_device_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttyFAKE");
        std::fs::write(&path, b"").unwrap();

        let mut link = SerialLink::open(&path, 115_200, Duration::from_millis(100)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(link.read_line(), Err(TransportError::Read(_))));
        assert!(matches!(link.read_line(), Err(TransportError::Closed)));
        assert!(link.reconnect().is_err());
    }
}
