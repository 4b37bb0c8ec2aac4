//! Identity of the machine this process runs on.
//!
//! Audit records and cron lock ownership both carry the host name and the
//! local IPv4 address. Both are resolved once per process.

use std::ffi::CStr;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

/// Placeholder for values that could not be determined.
pub const SENTINEL: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub name: String,
    pub ip: String,
}

impl HostInfo {
    /// Host identity of the current process, detected on first call.
    pub fn current() -> &'static HostInfo {
        static HOST: OnceLock<HostInfo> = OnceLock::new();
        HOST.get_or_init(HostInfo::detect)
    }

    fn detect() -> HostInfo {
        let name = host_name().unwrap_or_else(|| {
            tracing::warn!("Could not determine host name");
            SENTINEL.to_string()
        });
        let ip = local_ipv4().map(|ip| ip.to_string()).unwrap_or_else(|| {
            tracing::warn!("Could not determine local IPv4 address");
            SENTINEL.to_string()
        });
        HostInfo { name, ip }
    }
}

fn host_name() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is valid for `buf.len()` bytes and gethostname writes at
    // most that many, NUL-terminated when it fits.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let name = CStr::from_bytes_until_nul(&buf).ok()?.to_str().ok()?.trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Last non-loopback IPv4 address among the active interfaces.
fn local_ipv4() -> Option<Ipv4Addr> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs initialises `head` on success; the list is released
    // with freeifaddrs below and never touched afterwards.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return None;
    }

    let mut found = None;
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` walks the list returned by getifaddrs.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() || entry.ifa_flags & (libc::IFF_LOOPBACK as libc::c_uint) != 0 {
            continue;
        }
        // SAFETY: `ifa_addr` is non-null and points at a sockaddr.
        let family = unsafe { (*entry.ifa_addr).sa_family } as libc::c_int;
        if family != libc::AF_INET {
            continue;
        }
        // SAFETY: AF_INET entries carry a sockaddr_in.
        let addr = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
        let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
        if !ip.is_loopback() {
            found = Some(ip);
        }
    }

    // SAFETY: `head` came from a successful getifaddrs call.
    unsafe { libc::freeifaddrs(head) };
    found
}
