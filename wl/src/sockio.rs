use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::transport::{IdAllocator, Transport};
use crate::wire::{Message, RawMessage, HEADER_SIZE};

const RAWFD_SZ: usize = std::mem::size_of::<RawFd>();

/// Most descriptors the peer may attach to one `recvmsg`.
const MAX_FDS_IN: usize = 28;

const READ_CHUNK: usize = 4096;

/// [`Transport`] over a Unix stream socket.
///
/// Outgoing messages collect in a buffer until `flush`. File descriptors ride
/// along as `SCM_RIGHTS` ancillary data.
#[derive(Debug)]
pub struct UnixTransport {
    sock: UnixStream,
    ids: IdAllocator,
    txbuf: Vec<u8>,
    txfds: Vec<OwnedFd>,
    rxbuf: Vec<u8>,
    rxfds: VecDeque<OwnedFd>,
}

impl UnixTransport {
    pub fn new(sock: UnixStream) -> UnixTransport {
        UnixTransport::with_ids(sock, IdAllocator::new())
    }

    pub fn with_ids(sock: UnixStream, ids: IdAllocator) -> UnixTransport {
        UnixTransport {
            sock,
            ids,
            txbuf: Vec::with_capacity(1024),
            txfds: vec![],
            rxbuf: Vec::with_capacity(1024),
            rxfds: VecDeque::new(),
        }
    }

    // To find the Unix socket to connect to, most implementations just do what libwayland does:
    //
    // 1. If WAYLAND_SOCKET is set, interpret it as a file descriptor number on which the connection is already established, assuming that the parent process configured the connection for us.
    // 2. If WAYLAND_DISPLAY is set, concat with XDG_RUNTIME_DIR to form the path to the Unix socket. An absolute WAYLAND_DISPLAY is used as is.
    // 3. Assume the socket name is wayland-0 and concat with XDG_RUNTIME_DIR to form the path to the Unix socket.
    // 4. Give up.
    pub fn connect_to_env() -> io::Result<UnixTransport> {
        if let Ok(fd) = std::env::var("WAYLAND_SOCKET") {
            let fd: RawFd = fd
                .parse()
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "WAYLAND_SOCKET is not a file descriptor"))?;
            std::env::remove_var("WAYLAND_SOCKET");
            // SAFETY: the parent process handed this descriptor to us for exclusive use
            let sock = unsafe { UnixStream::from_raw_fd(fd) };
            debug!("using inherited socket fd {fd}");
            return Ok(UnixTransport::new(sock));
        }
        let path = socket_path(
            std::env::var_os("WAYLAND_DISPLAY").map(PathBuf::from),
            std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
        )?;
        debug!("connecting to {}", path.display());
        Ok(UnixTransport::new(UnixStream::connect(path)?))
    }

    pub fn socket(&self) -> &UnixStream {
        &self.sock
    }
}

fn socket_path(display: Option<PathBuf>, runtime_dir: Option<PathBuf>) -> io::Result<PathBuf> {
    let display = display.unwrap_or_else(|| PathBuf::from("wayland-0"));
    if display.is_absolute() {
        return Ok(display);
    }
    let Some(runtime_dir) = runtime_dir else {
        return Err(io::Error::new(io::ErrorKind::NotFound, "XDG_RUNTIME_DIR is not set"));
    };
    Ok(runtime_dir.join(display))
}

impl Transport for UnixTransport {
    fn send(&mut self, msg: Message) -> io::Result<()> {
        msg.write_to(&mut self.txbuf);
        self.txfds.extend(msg.fds);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sent = 0;
        while sent < self.txbuf.len() {
            // descriptors go out with the first chunk
            let fds = std::mem::take(&mut self.txfds);
            match sendmsg(&self.sock, &self.txbuf[sent..], &fds) {
                Ok(n) => sent += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => self.txfds = fds,
                Err(err) => {
                    self.txbuf.drain(..sent);
                    self.txfds = fds;
                    return Err(err);
                }
            }
        }
        self.txbuf.clear();
        Ok(())
    }

    fn read(&mut self) -> io::Result<usize> {
        let len = self.rxbuf.len();
        self.rxbuf.resize(len + READ_CHUNK, 0);
        let res = recvmsg(&self.sock, &mut self.rxbuf[len..], &mut self.rxfds);
        let n = *res.as_ref().unwrap_or(&0);
        self.rxbuf.truncate(len + n);
        res
    }

    fn recv(&mut self) -> io::Result<Option<RawMessage>> {
        let Some((_, _, size)) = RawMessage::parse_header(&self.rxbuf) else {
            return Ok(None);
        };
        if size < HEADER_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, format!("message size {size} below header size")));
        }
        let Some((msg, used)) = RawMessage::parse(&self.rxbuf) else {
            return Ok(None);
        };
        self.rxbuf.drain(..used);
        Ok(Some(msg))
    }

    fn take_fd(&mut self) -> Option<OwnedFd> {
        self.rxfds.pop_front()
    }

    fn new_handle(&mut self) -> Option<u32> {
        self.ids.alloc()
    }

    fn release_handle(&mut self, id: u32) {
        self.ids.release(id)
    }
}

/// Control buffer sized for `n` descriptors, aligned for `cmsghdr`.
fn cmsg_buffer(n: usize) -> (Vec<u64>, usize) {
    // SAFETY: pure arithmetic on the length
    let space = unsafe { libc::CMSG_SPACE((n * RAWFD_SZ) as u32) } as usize;
    (vec![0u64; space.div_ceil(8)], space)
}

fn sendmsg(sock: &UnixStream, buf: &[u8], fds: &[OwnedFd]) -> io::Result<usize> {
    let mut iov = libc::iovec { iov_base: buf.as_ptr().cast_mut().cast(), iov_len: buf.len() };

    // SAFETY: an all-zero msghdr is a valid empty header
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    let (mut control, space) = cmsg_buffer(fds.len());
    if !fds.is_empty() {
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = space as _;
        // SAFETY: msg_control points at `space` bytes, enough for one header
        // followed by every descriptor
        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN((fds.len() * RAWFD_SZ) as u32) as _;
            let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
            for (i, fd) in fds.iter().enumerate() {
                data.add(i).write_unaligned(fd.as_raw_fd());
            }
        }
    }

    // SAFETY: sendmsg only reads through the pointers in msg, all of which outlive the call
    let n = unsafe { libc::sendmsg(sock.as_raw_fd(), &msg, libc::MSG_NOSIGNAL) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

fn recvmsg(sock: &UnixStream, buf: &mut [u8], fds: &mut VecDeque<OwnedFd>) -> io::Result<usize> {
    let mut iov = libc::iovec { iov_base: buf.as_mut_ptr().cast(), iov_len: buf.len() };

    // SAFETY: an all-zero msghdr is a valid empty header
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    let (mut control, space) = cmsg_buffer(MAX_FDS_IN);
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = space as _;

    let n = loop {
        // SAFETY: recvmsg writes at most iov_len bytes and msg_controllen control bytes
        let n = unsafe { libc::recvmsg(sock.as_raw_fd(), &mut msg, libc::MSG_CMSG_CLOEXEC) };
        if n >= 0 {
            break n as usize;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    };

    // SAFETY: the kernel filled the control buffer; walking it with the CMSG
    // macros stays inside msg_controllen
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                let header = libc::CMSG_LEN(0) as usize;
                let count = ((*cmsg).cmsg_len as usize - header) / RAWFD_SZ;
                for i in 0..count {
                    fds.push_back(OwnedFd::from_raw_fd(data.add(i).read_unaligned()));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }
    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        warn!("ancillary data truncated, descriptors were lost");
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Seek, Write};

    #[test]
    fn socket_path_resolution() {
        let p = socket_path(Some("wayland-1".into()), Some("/run/user/1000".into())).unwrap();
        assert_eq!(p, PathBuf::from("/run/user/1000/wayland-1"));
        let p = socket_path(None, Some("/run/user/1000".into())).unwrap();
        assert_eq!(p, PathBuf::from("/run/user/1000/wayland-0"));
        let p = socket_path(Some("/tmp/wl.sock".into()), None).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/wl.sock"));
        assert!(socket_path(None, None).is_err());
    }

    #[test]
    fn messages_cross_the_socket() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = UnixTransport::new(a);
        let mut rx = UnixTransport::new(b);

        tx.send(Message { object: 3, opcode: 2, body: 7u32.to_ne_bytes().to_vec(), fds: vec![] }).unwrap();
        tx.send(Message { object: 4, opcode: 0, body: vec![], fds: vec![] }).unwrap();
        assert_eq!(rx.recv().unwrap(), None);
        tx.flush().unwrap();

        while rx.rxbuf.len() < 20 {
            assert!(rx.read().unwrap() > 0);
        }
        let first = rx.recv().unwrap().unwrap();
        assert_eq!((first.object, first.opcode, first.body), (3, 2, 7u32.to_ne_bytes().to_vec()));
        let second = rx.recv().unwrap().unwrap();
        assert_eq!((second.object, second.opcode, second.body.len()), (4, 0, 0));
        assert_eq!(rx.recv().unwrap(), None);
    }

    #[test]
    fn descriptors_cross_the_socket() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = UnixTransport::new(a);
        let mut rx = UnixTransport::new(b);

        let path = std::env::temp_dir().join(format!("wlproxy-fd-{}", std::process::id()));
        let mut file = File::options().read(true).write(true).create(true).truncate(true).open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        file.write_all(b"keymap").unwrap();
        file.rewind().unwrap();

        tx.send(Message { object: 5, opcode: 1, body: vec![], fds: vec![OwnedFd::from(file)] }).unwrap();
        tx.flush().unwrap();
        while rx.rxbuf.len() < 8 {
            assert!(rx.read().unwrap() > 0);
        }
        assert!(rx.recv().unwrap().is_some());
        let fd = rx.take_fd().unwrap();
        assert!(rx.take_fd().is_none());

        let mut contents = String::new();
        File::from(fd).read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "keymap");
    }
}
