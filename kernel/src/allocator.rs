//! Kernel heap used by `alloc` (the process table's `Vec`/`VecDeque` fields,
//! message buffers, ...). Backed by a static byte array rather than mapped
//! physical frames — the same idiom the GDT module already uses for the
//! double-fault and per-task kernel stacks — since virtual memory is out of
//! scope here and there is no mapper to hand frames to.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::UnsafeCell;
use spin::Mutex;

const HEAP_SIZE: usize = 1024 * 1024;

struct BumpHeap {
    arena: UnsafeCell<[u8; HEAP_SIZE]>,
    next: Mutex<usize>,
}

unsafe impl Sync for BumpHeap {}

unsafe impl GlobalAlloc for BumpHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let base = self.arena.get() as *mut u8 as usize;
        let mut next = self.next.lock();

        let start = (base + *next + layout.align() - 1) & !(layout.align() - 1);
        let offset = start - base;
        if offset + layout.size() > HEAP_SIZE {
            return core::ptr::null_mut();
        }

        *next = offset + layout.size();
        start as *mut u8
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {
        // Bump allocator: individual frees are no-ops. Acceptable for a
        // kernel whose process table and message buffers churn at a scale
        // bounded by `MAX_PROC`, not by long-running allocation/free churn.
    }
}

#[global_allocator]
static HEAP: BumpHeap = BumpHeap {
    arena: UnsafeCell::new([0u8; HEAP_SIZE]),
    next: Mutex::new(0),
};

#[alloc_error_handler]
fn alloc_error_handler(layout: Layout) -> ! {
    panic!("allocation error: {:?}", layout)
}

pub fn init() {
    crate::log_info!("Kernel heap initialized ({} KiB, static-backed).", HEAP_SIZE / 1024);
}
