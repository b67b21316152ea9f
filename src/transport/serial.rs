//! # Serial Port Transport
//!
//! Opens the panel's USB serial device as a raw tty.
//!
//! ## TTY Configuration
//!
//! - **Raw mode**: no input/output processing, no echo, non-canonical
//! - **Line**: 115200 baud, 8 data bits, no parity, 1 stop bit
//! - **Flow control**: none (XON/XOFF and RTS/CTS off; `0x11`/`0x13` occur in
//!   plane data)
//! - **Reads**: blocking (VMIN=1, VTIME=0)
//! - **RTS**: left to the caller ([`SerialLink::set_rts`])
//!
//! Read timeouts are kept per handle and implemented with `poll(2)`, so a
//! cloned handle polling with a timeout never changes how the original
//! blocks.
//!
//! ## Finding the Device
//!
//! ```bash
//! $ paperlink list
//! /dev/ttyACM0 (usb 1a86:55d3)
//! ```
//!
//! The user usually needs to be in the `dialout` group.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{BAUD_RATE, SerialLink};
use crate::error::PaperlinkError;

/// # Serial Port
///
/// ## Example
///
/// ```no_run
/// use paperlink::transport::{SerialLink, SerialPort};
///
/// let mut port = SerialPort::open("/dev/ttyACM0")?;
/// port.write_all(b"\r\n")?;
/// port.drain()?;
/// # Ok::<(), paperlink::PaperlinkError>(())
/// ```
pub struct SerialPort {
    file: File,
    path: PathBuf,
    read_timeout: Option<Duration>,
}

impl SerialPort {
    /// Open and configure a serial device.
    ///
    /// ## Errors
    ///
    /// Returns a transport error if:
    /// - The device doesn't exist
    /// - Permission denied (may need the dialout group)
    /// - TTY configuration fails
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self, PaperlinkError> {
        let path = device.as_ref();

        let file = open_device(path).map_err(|e| {
            PaperlinkError::Transport(format!("unable to open port {}: {}", path.display(), e))
        })?;

        configure_tty(&file).map_err(|e| {
            PaperlinkError::Transport(format!("unable to configure {}: {}", path.display(), e))
        })?;

        tracing::debug!(device = %path.display(), baud = BAUD_RATE, "port configured");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            read_timeout: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SerialLink for SerialPort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.file.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(timeout) = self.read_timeout {
            if !wait_readable(&self.file, timeout)? {
                return Ok(0);
            }
        }
        loop {
            match self.file.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        tty::drain(&self.file)
    }

    fn reset_input(&mut self) -> io::Result<()> {
        tty::flush(&self.file, tty::Queue::Input)
    }

    fn reset_output(&mut self) -> io::Result<()> {
        tty::flush(&self.file, tty::Queue::Output)
    }

    fn set_rts(&mut self, on: bool) -> io::Result<()> {
        tty::set_rts(&self.file, on)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        Ok(Box::new(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            read_timeout: None,
        }))
    }
}

#[cfg(unix)]
fn open_device(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    // O_NONBLOCK so the open does not wait for carrier; cleared right after.
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)?;

    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(file)
}

#[cfg(not(unix))]
fn open_device(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

/// Put the tty into raw 115200 8N1 mode with blocking reads.
///
/// ## What Gets Set
///
/// - `cfmakeraw`: clears IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL,
///   IXON, OPOST, ECHO, ECHONL, ICANON, ISIG, IEXTEN, CSIZE, PARENB; sets CS8
/// - IXOFF/IXANY cleared as well
/// - CSTOPB and CRTSCTS cleared, CREAD and CLOCAL set
/// - VMIN=1, VTIME=0
#[cfg(unix)]
fn configure_tty(file: &File) -> io::Result<()> {
    use std::mem::MaybeUninit;
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();

    let mut termios = MaybeUninit::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut termios = unsafe { termios.assume_init() };

    unsafe { libc::cfmakeraw(&mut termios) };
    termios.c_iflag &= !(libc::IXOFF | libc::IXANY);
    termios.c_cflag &= !libc::CSTOPB;
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
    {
        termios.c_cflag &= !libc::CRTSCTS;
    }
    termios.c_cflag |= libc::CREAD | libc::CLOCAL;
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;

    if unsafe { libc::cfsetispeed(&mut termios, libc::B115200) } != 0
        || unsafe { libc::cfsetospeed(&mut termios, libc::B115200) } != 0
    {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

#[cfg(not(unix))]
fn configure_tty(_file: &File) -> io::Result<()> {
    Ok(())
}

/// Wait until `file` has data or `timeout` elapses.
#[cfg(unix)]
fn wait_readable(file: &File, timeout: Duration) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut fds = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    match unsafe { libc::poll(&mut fds, 1, millis) } {
        n if n < 0 => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(err)
            }
        }
        0 => Ok(false),
        _ => Ok(true),
    }
}

#[cfg(not(unix))]
fn wait_readable(_file: &File, _timeout: Duration) -> io::Result<bool> {
    Ok(true)
}

#[cfg(unix)]
mod tty {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    pub enum Queue {
        Input,
        Output,
    }

    fn check(result: libc::c_int) -> io::Result<()> {
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn drain(file: &File) -> io::Result<()> {
        check(unsafe { libc::tcdrain(file.as_raw_fd()) })
    }

    pub fn flush(file: &File, queue: Queue) -> io::Result<()> {
        let which = match queue {
            Queue::Input => libc::TCIFLUSH,
            Queue::Output => libc::TCOFLUSH,
        };
        check(unsafe { libc::tcflush(file.as_raw_fd(), which) })
    }

    pub fn set_rts(file: &File, on: bool) -> io::Result<()> {
        let bits: libc::c_int = libc::TIOCM_RTS;
        let request = if on { libc::TIOCMBIS } else { libc::TIOCMBIC };
        check(unsafe { libc::ioctl(file.as_raw_fd(), request, &bits as *const libc::c_int) })
    }
}

#[cfg(not(unix))]
mod tty {
    use std::fs::File;
    use std::io::{self, Write};

    pub enum Queue {
        Input,
        Output,
    }

    pub fn drain(mut file: &File) -> io::Result<()> {
        file.flush()
    }

    pub fn flush(_file: &File, _queue: Queue) -> io::Result<()> {
        Ok(())
    }

    pub fn set_rts(_file: &File, _on: bool) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// PORT ENUMERATION
// ============================================================================

/// A serial device found on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device node, e.g. `/dev/ttyACM0`
    pub path: PathBuf,
    /// USB vendor and product id, when the port sits on a USB device
    pub usb: Option<(String, String)>,
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.usb {
            Some((vid, pid)) => write!(f, "{} (usb {}:{})", self.path.display(), vid, pid),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

const SYS_TTY: &str = "/sys/class/tty";

/// List serial devices backed by real hardware, sorted by path.
///
/// Reads `/sys/class/tty`; ports without a `device` link (virtual consoles,
/// ptys) are skipped.
pub fn list_ports() -> Result<Vec<PortInfo>, PaperlinkError> {
    list_ports_in(Path::new(SYS_TTY), Path::new("/dev"))
}

fn list_ports_in(sys_tty: &Path, dev: &Path) -> Result<Vec<PortInfo>, PaperlinkError> {
    let entries = fs::read_dir(sys_tty).map_err(|e| {
        PaperlinkError::Transport(format!(
            "unable to get serial ports list from {}: {}",
            sys_tty.display(),
            e
        ))
    })?;

    let mut ports = Vec::new();
    for entry in entries.flatten() {
        let device = entry.path().join("device");
        if !device.exists() {
            continue;
        }
        // Legacy 8250 UARTs are listed whether or not hardware is attached.
        if is_placeholder_uart(&device) {
            continue;
        }

        ports.push(PortInfo {
            path: dev.join(entry.file_name()),
            usb: usb_ids(&device),
        });
    }

    ports.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ports)
}

fn is_placeholder_uart(device: &Path) -> bool {
    fs::read_link(device.join("driver"))
        .ok()
        .and_then(|driver| driver.file_name().map(|n| n == "serial8250"))
        .unwrap_or(false)
}

/// Walk up from the tty's device node to the USB device carrying the ids.
fn usb_ids(device: &Path) -> Option<(String, String)> {
    let mut dir = fs::canonicalize(device).ok()?;
    for _ in 0..4 {
        let vid = fs::read_to_string(dir.join("idVendor"));
        let pid = fs::read_to_string(dir.join("idProduct"));
        if let (Ok(vid), Ok(pid)) = (vid, pid) {
            return Some((vid.trim().to_string(), pid.trim().to_string()));
        }
        dir = dir.parent()?.to_path_buf();
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("paperlink-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_open_missing_device() {
        let err = SerialPort::open("/dev/paperlink-does-not-exist").err().unwrap();
        assert!(matches!(err, PaperlinkError::Transport(_)));
        assert!(err.to_string().contains("unable to open port"));
    }

    #[test]
    fn test_port_info_display() {
        let usb = PortInfo {
            path: PathBuf::from("/dev/ttyACM0"),
            usb: Some(("1a86".into(), "55d3".into())),
        };
        assert_eq!(usb.to_string(), "/dev/ttyACM0 (usb 1a86:55d3)");

        let plain = PortInfo {
            path: PathBuf::from("/dev/ttyAMA0"),
            usb: None,
        };
        assert_eq!(plain.to_string(), "/dev/ttyAMA0");
    }

    #[cfg(unix)]
    #[test]
    fn test_list_ports_from_sysfs_tree() {
        use std::os::unix::fs::symlink;

        let root = scratch("sysfs");
        let sys_tty = root.join("class/tty");
        let usb_dev = root.join("devices/usb1/1-1");
        let iface = usb_dev.join("1-1:1.0");
        fs::create_dir_all(&iface).unwrap();
        fs::write(usb_dev.join("idVendor"), "1a86\n").unwrap();
        fs::write(usb_dev.join("idProduct"), "55d3\n").unwrap();

        // ttyACM0: USB-backed
        fs::create_dir_all(sys_tty.join("ttyACM0")).unwrap();
        symlink(&iface, sys_tty.join("ttyACM0/device")).unwrap();
        // tty1: virtual console, no device link
        fs::create_dir_all(sys_tty.join("tty1")).unwrap();

        let ports = list_ports_in(&sys_tty, Path::new("/dev")).unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert_eq!(
            ports,
            vec![PortInfo {
                path: PathBuf::from("/dev/ttyACM0"),
                usb: Some(("1a86".into(), "55d3".into())),
            }]
        );
    }

    #[test]
    fn test_list_ports_missing_sysfs() {
        let err = list_ports_in(Path::new("/nonexistent/class/tty"), Path::new("/dev")).unwrap_err();
        assert!(matches!(err, PaperlinkError::Transport(_)));
    }
}
