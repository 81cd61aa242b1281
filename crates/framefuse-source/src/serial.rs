use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{Result, SourceError};
use crate::traits::{FrameSource, TransportKind};

/// Serial port frame source.
///
/// The port is opened non-blocking in raw mode. `read(n)` asks the driver how
/// many bytes are queued (`FIONREAD`) and only reads when a whole frame is
/// there, so a slow device never stalls the calling thread. Bytes of a frame
/// the driver handed over only partially are kept until the rest arrives.
pub struct SerialSource {
    config: SerialConfig,
    port: Option<OpenPort>,
    partial: BytesMut,
}

struct OpenPort {
    file: File,
    path: PathBuf,
}

impl SerialSource {
    /// Create an unconnected serial source.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            partial: BytesMut::new(),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Path of the currently open port, if any.
    ///
    /// Differs from `config().port` when the port was auto-selected.
    pub fn port_path(&self) -> Option<&Path> {
        self.port.as_ref().map(|p| p.path.as_path())
    }

    /// Bytes queued in the driver's input buffer.
    pub fn bytes_available(&self) -> Result<usize> {
        match &self.port {
            Some(port) => Ok(bytes_available(&port.file)?),
            None => Err(SourceError::NotConnected),
        }
    }

    fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.port {
            return Ok(path.clone());
        }
        let path = available_ports()
            .into_iter()
            .next()
            .ok_or(SourceError::NoLinkAvailable {
                kind: TransportKind::Serial,
            })?;
        debug!(?path, "auto-selected serial port");
        Ok(path)
    }
}

impl FrameSource for SerialSource {
    fn connect(&mut self) -> Result<()> {
        self.close()?;

        let path = self.resolve_path()?;
        let file = open_port(&path, self.config.baud_rate).map_err(|source| {
            SourceError::ConnectionFailed {
                path: path.clone(),
                source,
            }
        })?;

        info!(?path, baud = self.config.baud_rate, "connected to serial port");
        self.port = Some(OpenPort { file, path });
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Option<Bytes>> {
        let port = self.port.as_mut().ok_or(SourceError::NotConnected)?;
        let missing = n.saturating_sub(self.partial.len());
        if missing > 0 {
            if bytes_available(&port.file)? < missing {
                return Ok(None);
            }
            fill(&mut port.file, &mut self.partial, n)?;
        }

        if self.partial.len() < n {
            return Ok(None);
        }
        Ok(Some(self.partial.split_to(n).freeze()))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(port) = self.port.take() {
            debug!(path = ?port.path, "closing serial port");
        }
        self.partial.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }
}

impl std::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSource")
            .field("config", &self.config)
            .field("port", &self.port_path())
            .finish()
    }
}

fn open_port(path: &Path, baud_rate: u32) -> io::Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)?;
    configure_raw(&file, baud_rate)?;
    Ok(file)
}

fn configure_raw(file: &File, baud_rate: u32) -> io::Result<()> {
    let speed = speed_for(baud_rate).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported baud rate {baud_rate}"),
        )
    })?;
    let fd = file.as_raw_fd();

    // SAFETY: termios is plain old data; tcgetattr fills it before use.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: `fd` is an open descriptor owned by `file`, `tio` is writable.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: `tio` was initialized by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `tio` is a valid termios; `fd` is open for the whole block.
    unsafe {
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Read from `src` until `buf` holds `n` bytes or the driver runs dry.
///
/// Whatever was read stays in `buf`, so a short read never shifts framing.
fn fill(src: &mut impl Read, buf: &mut BytesMut, n: usize) -> io::Result<()> {
    let mut chunk = [0u8; 256];
    while buf.len() < n {
        let want = (n - buf.len()).min(chunk.len());
        match src.read(&mut chunk[..want]) {
            // Hang-up on a tty.
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(read) => buf.extend_from_slice(&chunk[..read]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn bytes_available(file: &File) -> io::Result<usize> {
    let mut count: libc::c_int = 0;
    // SAFETY: FIONREAD writes a single c_int through the provided pointer,
    // and `file` keeps the descriptor open for the duration of the call.
    let rc = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            libc::FIONREAD,
            &mut count as *mut libc::c_int,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(count.max(0) as usize)
}

#[cfg(target_os = "linux")]
fn speed_for(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        460_800 => libc::B460800,
        500_000 => libc::B500000,
        921_600 => libc::B921600,
        1_000_000 => libc::B1000000,
        2_000_000 => libc::B2000000,
        _ => return None,
    };
    Some(speed)
}

// BSD-derived termios takes the bit rate as-is.
#[cfg(not(target_os = "linux"))]
fn speed_for(baud_rate: u32) -> Option<libc::speed_t> {
    (baud_rate > 0).then_some(baud_rate as libc::speed_t)
}

/// Serial ports present on this machine, sorted by path.
///
/// On Linux this walks `/sys/class/tty` and keeps devices backed by a real
/// bus (USB, PCI, PNP); legacy platform UARTs that exist on every PC are
/// skipped. Elsewhere it lists `/dev/cu.*` call-out devices.
#[cfg(target_os = "linux")]
pub fn available_ports() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir("/sys/class/tty") else {
        return Vec::new();
    };

    let mut ports: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            std::fs::read_link(entry.path().join("device/subsystem"))
                .ok()
                .and_then(|link| link.file_name().map(|n| n != "platform"))
                .unwrap_or(false)
        })
        .map(|entry| Path::new("/dev").join(entry.file_name()))
        .filter(|path| path.exists())
        .collect();
    ports.sort();
    ports
}

#[cfg(not(target_os = "linux"))]
pub fn available_ports() -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut ports: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("cu."))
        .map(|entry| entry.path())
        .collect();
    ports.sort();
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_before_connect_is_an_error() {
        let mut source = SerialSource::new(SerialConfig::new("/dev/framefuse-none", 9600));
        assert!(matches!(source.read(2), Err(SourceError::NotConnected)));
        assert!(matches!(
            source.bytes_available(),
            Err(SourceError::NotConnected)
        ));
    }

    #[test]
    fn connect_missing_port_fails() {
        let mut source = SerialSource::new(SerialConfig::new("/dev/framefuse-none", 9600));
        let err = source.connect().unwrap_err();
        assert!(matches!(err, SourceError::ConnectionFailed { .. }));
        assert!(!source.is_connected());
    }

    #[test]
    fn close_without_connect_is_noop() {
        let mut source = SerialSource::new(SerialConfig::auto(9600));
        source.close().unwrap();
        source.close().unwrap();
        assert!(source.port_path().is_none());
    }

    /// Hands out scripted chunks, then reports an empty driver buffer.
    struct Trickle(Vec<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let chunk = self.0.remove(0);
            let n = chunk.len().min(out.len());
            out[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.0.insert(0, chunk[n..].to_vec());
            }
            Ok(n)
        }
    }

    #[test]
    fn short_read_keeps_partial_frame() {
        let mut buf = BytesMut::new();
        let mut src = Trickle(vec![vec![0x01], vec![0x02, 0x03]]);

        fill(&mut src, &mut buf, 4).unwrap();
        assert_eq!(buf.as_ref(), &[0x01, 0x02, 0x03]);

        src.0.push(vec![0x04, 0x05]);
        fill(&mut src, &mut buf, 4).unwrap();
        assert_eq!(buf.as_ref(), &[0x01, 0x02, 0x03, 0x04]);
        // Never reads past the frame.
        assert_eq!(src.0, vec![vec![0x05]]);
    }

    #[test]
    fn hang_up_mid_frame_is_an_error_but_keeps_bytes() {
        struct HungUp(bool);
        impl Read for HungUp {
            fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
                if std::mem::replace(&mut self.0, true) {
                    return Ok(0);
                }
                out[0] = 0xaa;
                Ok(1)
            }
        }

        let mut buf = BytesMut::new();
        let err = fill(&mut HungUp(false), &mut buf, 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(buf.as_ref(), &[0xaa]);
    }

    #[test]
    fn available_ports_are_sorted_device_paths() {
        let ports = available_ports();
        let mut sorted = ports.clone();
        sorted.sort();
        assert_eq!(ports, sorted);
        assert!(ports.iter().all(|p| p.starts_with("/dev")));
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use std::ffi::CStr;
        use std::io::Write;
        use std::os::fd::FromRawFd;
        use std::time::{Duration, Instant};

        use super::*;

        /// Open a pseudo-terminal pair, returning the master and the slave path.
        fn open_pty() -> (File, PathBuf) {
            // SAFETY: plain libc calls on a descriptor we own; ptsname_r writes
            // a NUL-terminated string into the provided buffer.
            unsafe {
                let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
                assert!(master >= 0, "posix_openpt failed");
                assert_eq!(libc::grantpt(master), 0);
                assert_eq!(libc::unlockpt(master), 0);
                let mut name = [0 as libc::c_char; 128];
                assert_eq!(libc::ptsname_r(master, name.as_mut_ptr(), name.len()), 0);
                let path = CStr::from_ptr(name.as_ptr())
                    .to_string_lossy()
                    .into_owned();
                (File::from_raw_fd(master), PathBuf::from(path))
            }
        }

        fn read_with_deadline(source: &mut SerialSource, n: usize) -> Option<Bytes> {
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if let Some(bytes) = source.read(n).unwrap() {
                    return Some(bytes);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            None
        }

        #[test]
        fn reads_whole_frames_from_pty() {
            let (mut master, slave) = open_pty();
            let mut source = SerialSource::new(SerialConfig::new(&slave, 115_200));
            source.connect().expect("pty slave should open");
            assert_eq!(source.port_path(), Some(slave.as_path()));

            master.write_all(&[0x01, 0x00, 0x02]).unwrap();
            master.flush().unwrap();

            let first = read_with_deadline(&mut source, 2).expect("frame should arrive");
            assert_eq!(first.as_ref(), &[0x01, 0x00]);

            // One byte left over: not enough for another frame.
            std::thread::sleep(Duration::from_millis(20));
            assert!(source.read(2).unwrap().is_none());

            master.write_all(&[0x00]).unwrap();
            let second = read_with_deadline(&mut source, 2).expect("frame should complete");
            assert_eq!(second.as_ref(), &[0x02, 0x00]);
        }

        #[test]
        fn reconnect_replaces_open_port() {
            let (_master, slave) = open_pty();
            let mut source = SerialSource::new(SerialConfig::new(&slave, 9600));
            source.connect().unwrap();
            source.connect().unwrap();
            assert!(source.is_connected());
            source.close().unwrap();
            assert!(!source.is_connected());
        }

        #[test]
        fn unsupported_baud_rate_fails_connect() {
            let (_master, slave) = open_pty();
            let mut source = SerialSource::new(SerialConfig::new(&slave, 12_345));
            let err = source.connect().unwrap_err();
            assert!(
                matches!(err, SourceError::ConnectionFailed { ref source, .. } if source.kind() == io::ErrorKind::InvalidInput)
            );
        }
    }
}
