use std::os::fd::AsFd;

/// Identity of the process on the other end of a Unix socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// Process ID of the peer
    pub pid: i32,
    /// User ID of the peer
    pub uid: u32,
}

/// Get the credentials of the process connected to `conn`
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn peer_credentials<F: AsFd>(conn: &F) -> nix::Result<PeerCredentials> {
    use nix::sys::socket::{getsockopt, sockopt};

    let creds = getsockopt(conn, sockopt::PeerCredentials)?;
    Ok(PeerCredentials {
        pid: creds.pid(),
        uid: creds.uid(),
    })
}

#[cfg(target_os = "macos")]
pub fn peer_credentials<F: AsFd>(conn: &F) -> nix::Result<PeerCredentials> {
    use std::os::fd::AsRawFd;

    use nix::errno::Errno;

    let fd = conn.as_fd().as_raw_fd();
    let mut uid: libc::uid_t = 0;
    let mut gid: libc::gid_t = 0;

    // SAFETY: `fd` is a valid socket and both out-pointers are stack locals.
    Errno::result(unsafe { libc::getpeereid(fd, &mut uid, &mut gid) })?;

    let mut pid: libc::pid_t = 0;
    let mut len = std::mem::size_of::<libc::pid_t>() as libc::socklen_t;

    // SAFETY: the buffer is a stack local of exactly `len` bytes.
    Errno::result(unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_LOCAL,
            libc::LOCAL_PEERPID,
            &mut pid as *mut _ as *mut libc::c_void,
            &mut len,
        )
    })?;

    Ok(PeerCredentials { pid, uid })
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
pub fn peer_credentials<F: AsFd>(_conn: &F) -> nix::Result<PeerCredentials> {
    Err(nix::errno::Errno::ENOSYS)
}
