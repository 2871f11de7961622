/**
 * Process-shared control block.
 *
 * Every car publishes one fixed-layout record in POSIX shared memory under
 * the name `/car<name>`. The record embeds a process-shared mutex and
 * condition variable; the mutex is the sole synchroniser for the record's
 * fields, and the condition variable is broadcast on every mutation so any
 * process waiting for a change can revalidate its predicate.
 *
 * `ControlBlock` is the typed handle over the mapping. `lock()` hands out a
 * `BlockGuard` whose setters mark the guard dirty; dropping a dirty guard
 * broadcasts the condition variable before releasing the mutex, so a
 * mutation cannot forget to wake the waiters. The creating handle owns the
 * name and unlinks it when dropped; attached handles leave it alone.
 *
 * The mutex must never be held across a sleep or blocking I/O; callers
 * keep guards short-lived and the only in-guard suspension point is the
 * timed condvar wait.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr::{self, NonNull};
use std::time::Duration;
use thiserror::Error;

/***************************************/
/*           Local modules             */
/***************************************/
use crate::floor::Floor;
use crate::shared::DoorStatus;

/***************************************/
/*             Constants               */
/***************************************/
const SHM_PREFIX: &str = "/car";
const FLOOR_LABEL_LEN: usize = 4;
const STATUS_LEN: usize = 8;
const NANOS_PER_SEC: libc::c_long = 1_000_000_000;

/***************************************/
/*               Errors                */
/***************************************/
#[derive(Debug, Error)]
pub enum ShmError {
    #[error("Invalid car name {0:?}.")]
    BadName(String),
    #[error("Unable to create shared memory for car {name}: {source}")]
    Create { name: String, source: io::Error },
    #[error("Unable to access car {0}.")]
    Attach(String),
    #[error("Unable to map shared memory for car {name}: {source}")]
    Map { name: String, source: io::Error },
}

/***************************************/
/*       Shared memory layout          */
/***************************************/

// Field-for-field the record every attached process expects. Floors are
// NUL-padded labels, status is the NUL-padded door phase text.
#[repr(C)]
struct CarSharedMem {
    mutex: libc::pthread_mutex_t,
    cond: libc::pthread_cond_t,
    current_floor: [u8; FLOOR_LABEL_LEN],
    destination_floor: [u8; FLOOR_LABEL_LEN],
    status: [u8; STATUS_LEN],
    open_button: u8,
    close_button: u8,
    door_obstruction: u8,
    overload: u8,
    emergency_stop: u8,
    individual_service_mode: u8,
    emergency_mode: u8,
}

/***************************************/
/*             Public API              */
/***************************************/
pub struct ControlBlock {
    shared: NonNull<CarSharedMem>,
    shm_name: CString,
    owner: bool,
}

// The mapping is shared by construction; the embedded mutex serialises all
// access to the fields.
unsafe impl Send for ControlBlock {}
unsafe impl Sync for ControlBlock {}

impl ControlBlock {
    /// Creates and initialises the `/car<name>` segment. The returned
    /// handle owns the name and unlinks it on drop.
    pub fn create(car_name: &str, lowest_floor: Floor) -> Result<ControlBlock, ShmError> {
        let shm_name = segment_name(car_name)?;

        let fd = unsafe {
            libc::shm_open(
                shm_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o666 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(ShmError::Create {
                name: car_name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        if unsafe { libc::ftruncate(fd, mem::size_of::<CarSharedMem>() as libc::off_t) } == -1 {
            let source = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(shm_name.as_ptr());
            }
            return Err(ShmError::Create {
                name: car_name.to_string(),
                source,
            });
        }

        let shared = match map_segment(fd) {
            Ok(shared) => shared,
            Err(source) => {
                unsafe { libc::shm_unlink(shm_name.as_ptr()) };
                return Err(ShmError::Map {
                    name: car_name.to_string(),
                    source,
                });
            }
        };

        unsafe { init_sync_primitives(shared.as_ptr()) };

        let block = ControlBlock {
            shared,
            shm_name,
            owner: true,
        };

        {
            let mut guard = block.lock();
            guard.set_current_floor(lowest_floor);
            guard.set_destination_floor(lowest_floor);
            guard.set_status(DoorStatus::Closed);
            guard.set_open_button(false);
            guard.set_close_button(false);
            guard.set_door_obstruction(false);
            guard.set_overload(false);
            guard.set_emergency_stop(false);
            guard.set_individual_service_mode(false);
            guard.set_emergency_mode(false);
        }

        Ok(block)
    }

    /// Attaches to an existing car's segment read-write.
    pub fn attach(car_name: &str) -> Result<ControlBlock, ShmError> {
        let shm_name = segment_name(car_name)?;

        let fd = unsafe { libc::shm_open(shm_name.as_ptr(), libc::O_RDWR, 0o666 as libc::mode_t) };
        if fd < 0 {
            return Err(ShmError::Attach(car_name.to_string()));
        }

        let shared = map_segment(fd).map_err(|source| ShmError::Map {
            name: car_name.to_string(),
            source,
        })?;

        Ok(ControlBlock {
            shared,
            shm_name,
            owner: false,
        })
    }

    /// Acquires the record mutex for the lifetime of the guard.
    pub fn lock(&self) -> BlockGuard<'_> {
        unsafe { libc::pthread_mutex_lock(ptr::addr_of_mut!((*self.shared.as_ptr()).mutex)) };
        BlockGuard {
            block: self,
            dirty: false,
        }
    }
}

impl Drop for ControlBlock {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(
                self.shared.as_ptr() as *mut libc::c_void,
                mem::size_of::<CarSharedMem>(),
            );
            if self.owner {
                libc::shm_unlink(self.shm_name.as_ptr());
            }
        }
    }
}

/// Scoped view of the locked record. Setters mark the guard dirty; drop
/// broadcasts the condition variable if anything changed, then unlocks.
pub struct BlockGuard<'a> {
    block: &'a ControlBlock,
    dirty: bool,
}

impl BlockGuard<'_> {
    fn shared(&self) -> *mut CarSharedMem {
        self.block.shared.as_ptr()
    }

    pub fn current_floor(&self) -> Option<Floor> {
        let label = unsafe { ptr::read(ptr::addr_of!((*self.shared()).current_floor)) };
        Floor::parse(label_text(&label)).ok()
    }

    pub fn set_current_floor(&mut self, floor: Floor) {
        let mut label = [0u8; FLOOR_LABEL_LEN];
        write_text(&mut label, &floor.to_string());
        unsafe { ptr::write(ptr::addr_of_mut!((*self.shared()).current_floor), label) };
        self.dirty = true;
    }

    pub fn destination_floor(&self) -> Option<Floor> {
        let label = unsafe { ptr::read(ptr::addr_of!((*self.shared()).destination_floor)) };
        Floor::parse(label_text(&label)).ok()
    }

    pub fn set_destination_floor(&mut self, floor: Floor) {
        let mut label = [0u8; FLOOR_LABEL_LEN];
        write_text(&mut label, &floor.to_string());
        unsafe { ptr::write(ptr::addr_of_mut!((*self.shared()).destination_floor), label) };
        self.dirty = true;
    }

    pub fn status(&self) -> Option<DoorStatus> {
        let text = unsafe { ptr::read(ptr::addr_of!((*self.shared()).status)) };
        DoorStatus::parse(label_text(&text))
    }

    pub fn set_status(&mut self, status: DoorStatus) {
        let mut text = [0u8; STATUS_LEN];
        write_text(&mut text, status.as_str());
        unsafe { ptr::write(ptr::addr_of_mut!((*self.shared()).status), text) };
        self.dirty = true;
    }

    pub fn open_button(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).open_button)) != 0 }
    }

    pub fn set_open_button(&mut self, pressed: bool) {
        unsafe { ptr::write(ptr::addr_of_mut!((*self.shared()).open_button), pressed as u8) };
        self.dirty = true;
    }

    pub fn close_button(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).close_button)) != 0 }
    }

    pub fn set_close_button(&mut self, pressed: bool) {
        unsafe { ptr::write(ptr::addr_of_mut!((*self.shared()).close_button), pressed as u8) };
        self.dirty = true;
    }

    pub fn door_obstruction(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).door_obstruction)) != 0 }
    }

    pub fn set_door_obstruction(&mut self, detected: bool) {
        unsafe {
            ptr::write(
                ptr::addr_of_mut!((*self.shared()).door_obstruction),
                detected as u8,
            )
        };
        self.dirty = true;
    }

    pub fn overload(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).overload)) != 0 }
    }

    pub fn set_overload(&mut self, detected: bool) {
        unsafe { ptr::write(ptr::addr_of_mut!((*self.shared()).overload), detected as u8) };
        self.dirty = true;
    }

    pub fn emergency_stop(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).emergency_stop)) != 0 }
    }

    pub fn set_emergency_stop(&mut self, pressed: bool) {
        unsafe {
            ptr::write(
                ptr::addr_of_mut!((*self.shared()).emergency_stop),
                pressed as u8,
            )
        };
        self.dirty = true;
    }

    pub fn individual_service_mode(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).individual_service_mode)) != 0 }
    }

    pub fn set_individual_service_mode(&mut self, active: bool) {
        unsafe {
            ptr::write(
                ptr::addr_of_mut!((*self.shared()).individual_service_mode),
                active as u8,
            )
        };
        self.dirty = true;
    }

    pub fn emergency_mode(&self) -> bool {
        unsafe { ptr::read(ptr::addr_of!((*self.shared()).emergency_mode)) != 0 }
    }

    pub fn set_emergency_mode(&mut self, active: bool) {
        unsafe {
            ptr::write(
                ptr::addr_of_mut!((*self.shared()).emergency_mode),
                active as u8,
            )
        };
        self.dirty = true;
    }

    /// Releases the mutex and waits for a broadcast, up to `timeout`.
    /// Returns false on timeout. Wakeups may be spurious; callers recheck
    /// their predicate either way.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let shared = self.shared();
        let mut deadline = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut deadline) };
        deadline.tv_sec += timeout.as_secs() as libc::time_t;
        deadline.tv_nsec += timeout.subsec_nanos() as libc::c_long;
        if deadline.tv_nsec >= NANOS_PER_SEC {
            deadline.tv_sec += 1;
            deadline.tv_nsec -= NANOS_PER_SEC;
        }

        let rc = unsafe {
            libc::pthread_cond_timedwait(
                ptr::addr_of_mut!((*shared).cond),
                ptr::addr_of_mut!((*shared).mutex),
                &deadline,
            )
        };
        rc == 0
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        let shared = self.shared();
        unsafe {
            if self.dirty {
                libc::pthread_cond_broadcast(ptr::addr_of_mut!((*shared).cond));
            }
            libc::pthread_mutex_unlock(ptr::addr_of_mut!((*shared).mutex));
        }
    }
}

/***************************************/
/*           Local functions           */
/***************************************/

// Car names end up both in shared memory names and as protocol tokens, so
// they must be printable and free of separators.
fn segment_name(car_name: &str) -> Result<CString, ShmError> {
    let token_safe = !car_name.is_empty()
        && car_name
            .chars()
            .all(|c| c.is_ascii_graphic() && c != '/');
    if !token_safe {
        return Err(ShmError::BadName(car_name.to_string()));
    }
    CString::new(format!("{}{}", SHM_PREFIX, car_name))
        .map_err(|_| ShmError::BadName(car_name.to_string()))
}

// Maps the segment and closes the descriptor; the mapping outlives the fd.
fn map_segment(fd: libc::c_int) -> Result<NonNull<CarSharedMem>, io::Error> {
    let mapped = unsafe {
        libc::mmap(
            ptr::null_mut(),
            mem::size_of::<CarSharedMem>(),
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    let result = if mapped == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(unsafe { NonNull::new_unchecked(mapped as *mut CarSharedMem) })
    };
    unsafe { libc::close(fd) };
    result
}

// Initialises the embedded mutex and condvar as process-shared, with the
// condvar clocked monotonically so timed waits ignore wall-clock jumps.
unsafe fn init_sync_primitives(shared: *mut CarSharedMem) {
    let mut mutex_attr = mem::MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
    libc::pthread_mutexattr_init(mutex_attr.as_mut_ptr());
    libc::pthread_mutexattr_setpshared(mutex_attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
    libc::pthread_mutex_init(ptr::addr_of_mut!((*shared).mutex), mutex_attr.as_ptr());
    libc::pthread_mutexattr_destroy(mutex_attr.as_mut_ptr());

    let mut cond_attr = mem::MaybeUninit::<libc::pthread_condattr_t>::uninit();
    libc::pthread_condattr_init(cond_attr.as_mut_ptr());
    libc::pthread_condattr_setpshared(cond_attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
    libc::pthread_condattr_setclock(cond_attr.as_mut_ptr(), libc::CLOCK_MONOTONIC);
    libc::pthread_cond_init(ptr::addr_of_mut!((*shared).cond), cond_attr.as_ptr());
    libc::pthread_condattr_destroy(cond_attr.as_mut_ptr());
}

fn label_text(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).unwrap_or("")
}

fn write_text(buf: &mut [u8], text: &str) {
    buf.fill(0);
    let len = text.len().min(buf.len() - 1);
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
}
