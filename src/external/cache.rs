//! Page-cache eviction advisories. Best-effort: a platform lacking the
//! advisory is not an error, but callers that need to *verify* eviction
//! (`pargen`, `xdelta`) treat an unknown residency state as "skip the check,
//! warn" rather than as a failure, per the cache-eviction interface.

use std::path::Path;

/// Ask the OS to drop cached pages for `path`. No-op, Ok, outside Unix.
pub fn advise_evict(path: &Path) -> std::io::Result<()> {
    imp::advise_evict(path)
}

/// Residency check result. `Unsupported` means the platform offers no way
/// to ask, distinct from `Resident(false)` which is a real measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    Resident(bool),
    Unsupported,
}

pub fn check_residency(path: &Path) -> std::io::Result<Residency> {
    imp::check_residency(path)
}

/// Poll `check_residency` until it reports non-resident or `bound` elapses.
/// Returns `Ok(())` immediately if the platform is `Unsupported` (skip with
/// a warning is the caller's job, not this helper's).
pub async fn wait_for_eviction(path: &Path, bound: std::time::Duration) -> std::io::Result<bool> {
    let start = std::time::Instant::now();
    loop {
        match check_residency(path)? {
            Residency::Unsupported => return Ok(true),
            Residency::Resident(false) => return Ok(true),
            Residency::Resident(true) => {
                if start.elapsed() >= bound {
                    return Ok(false);
                }
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::Residency;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    pub fn advise_evict(path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        use std::os::unix::io::AsRawFd;
        let ret = unsafe {
            libc::posix_fadvise(file.as_raw_fd(), 0, len as libc::off_t, libc::POSIX_FADV_DONTNEED)
        };
        if ret != 0 {
            return Err(std::io::Error::from_raw_os_error(ret));
        }
        Ok(())
    }

    pub fn check_residency(path: &Path) -> std::io::Result<Residency> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Ok(Residency::Resident(false));
        }
        let c_path = CString::new(path.as_os_str().as_bytes())?;
        unsafe {
            let fd = libc::open(c_path.as_ptr(), libc::O_RDONLY);
            if fd < 0 {
                return Err(std::io::Error::last_os_error());
            }
            let addr = libc::mmap(std::ptr::null_mut(), len, libc::PROT_NONE, libc::MAP_SHARED, fd, 0);
            libc::close(fd);
            if addr == libc::MAP_FAILED {
                return Err(std::io::Error::last_os_error());
            }
            let page_size = libc::sysconf(libc::_SC_PAGESIZE) as usize;
            let page_count = len.div_ceil(page_size);
            let mut vec = vec![0u8; page_count];
            let rc = libc::mincore(addr, len, vec.as_mut_ptr().cast());
            libc::munmap(addr, len);
            if rc != 0 {
                return Err(std::io::Error::last_os_error());
            }
            let resident = vec.iter().any(|b| b & 1 == 1);
            Ok(Residency::Resident(resident))
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::Residency;
    use std::path::Path;

    pub fn advise_evict(_path: &Path) -> std::io::Result<()> {
        Ok(())
    }

    pub fn check_residency(_path: &Path) -> std::io::Result<Residency> {
        Ok(Residency::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advise_evict_on_missing_file_errors() {
        let result = advise_evict(Path::new("/nonexistent/definitely/missing"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wait_for_eviction_on_empty_file_is_immediate() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();
        let ok = wait_for_eviction(&path, std::time::Duration::from_millis(50))
            .await
            .unwrap();
        assert!(ok);
    }
}
