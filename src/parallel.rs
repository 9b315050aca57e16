/// Bounded work distribution across a per-call pool of OS threads.
///
/// Workers claim indices on demand from a shared atomic cursor; the first
/// failure wins the single message slot and stops further dispatch. Units
/// already in flight run to completion (cooperative cancellation only).
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// Run `func` over every index in `[0, count)` on a bounded worker pool.
///
/// Returns `Ok` iff every invoked unit succeeded. On failure, returns the
/// message of whichever failing worker first acquired the slot; remaining
/// indices may be skipped, but no index is ever processed twice. A `count`
/// of zero returns immediately without spawning workers.
pub fn parallel_for<E, F>(count: usize, func: F) -> Result<(), E>
where
    E: Send,
    F: Fn(usize) -> Result<(), E> + Sync,
{
    if count == 0 {
        return Ok(());
    }

    let workers = thread::available_parallelism()
        .map(|threads| threads.get())
        .unwrap_or(1)
        .min(count);

    // Dispatch state is scoped to this call; the mutex on the message slot
    // provides the ordering that matters, so the atomics stay relaxed.
    let next_index = AtomicUsize::new(0);
    let has_error = AtomicBool::new(false);
    let error_slot: Mutex<Option<E>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    if has_error.load(Ordering::Relaxed) {
                        break;
                    }
                    let index = next_index.fetch_add(1, Ordering::Relaxed);
                    if index >= count {
                        break;
                    }
                    if let Err(error) = func(index) {
                        has_error.store(true, Ordering::Relaxed);
                        if let Ok(mut slot) = error_slot.lock() {
                            if slot.is_none() {
                                *slot = Some(error);
                            }
                        }
                        break;
                    }
                }
            });
        }
    });

    let error = error_slot
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Run `func` over every element of `values` on a bounded worker pool.
///
/// Thin specialization of [`parallel_for`] passing element references; each
/// unit only touches its own element.
pub fn parallel_foreach<T, E, F>(values: &mut [T], func: F) -> Result<(), E>
where
    T: Send,
    E: Send,
    F: Fn(&mut T) -> Result<(), E> + Sync,
{
    let count = values.len();
    let base = SlicePtr(values.as_mut_ptr());
    parallel_for(count, |index| {
        // Capture the whole SlicePtr wrapper (not just the raw-pointer field)
        // so the closure stays Sync under precise closure captures.
        let base = &base;
        // parallel_for hands out each index exactly once, so no two workers
        // ever alias the same element.
        let value = unsafe { &mut *base.0.add(index) };
        func(value)
    })
}

struct SlicePtr<T>(*mut T);

unsafe impl<T: Send> Send for SlicePtr<T> {}
unsafe impl<T: Send> Sync for SlicePtr<T> {}
