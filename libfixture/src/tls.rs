//! The thread-local state that each worker reads and mutates.
//!
//! Both values are declared with const initialisers, so they live in the executable's TLS
//! template (`.tdata`). The loader gives every new thread a fresh copy of that template, which is
//! what makes the values independent per thread.

use std::cell::Cell;
use std::fmt::Display;

/// The value every thread's counter starts at, no matter what other threads have done to theirs.
pub const COUNTER_INITIAL: u32 = 0x12345678;

/// The text held in every thread's label buffer.
pub const LABEL_TEXT: &str = "TLS string";

/// Size of the label buffer, including NUL padding.
pub const LABEL_CAPACITY: usize = 16;

const _: () = assert!(LABEL_TEXT.len() < LABEL_CAPACITY);

const LABEL_INITIAL: [u8; LABEL_CAPACITY] = {
    let mut buffer = [0u8; LABEL_CAPACITY];
    let text = LABEL_TEXT.as_bytes();
    let mut i = 0;
    while i < text.len() {
        buffer[i] = text[i];
        i += 1;
    }
    buffer
};

thread_local! {
    static COUNTER: Cell<u32> = const { Cell::new(COUNTER_INITIAL) };
    static LABEL: [u8; LABEL_CAPACITY] = const { LABEL_INITIAL };
}

/// A copy of the calling thread's label buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Label {
    bytes: [u8; LABEL_CAPACITY],
}

/// The calling thread's view of its thread-local state at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub counter: u32,
    pub label: Label,
}

/// Returns the calling thread's counter.
#[must_use]
pub fn counter() -> u32 {
    COUNTER.get()
}

/// Increments the calling thread's counter and returns the new value. Other threads' counters are
/// unaffected.
pub fn increment_counter() -> u32 {
    COUNTER.with(|counter| {
        let value = counter.get().wrapping_add(1);
        counter.set(value);
        value
    })
}

/// Returns a copy of the calling thread's label buffer.
#[must_use]
pub fn label() -> Label {
    LABEL.with(|bytes| Label { bytes: *bytes })
}

#[must_use]
pub fn snapshot() -> Snapshot {
    Snapshot {
        counter: counter(),
        label: label(),
    }
}

impl Label {
    /// The full buffer, including trailing NUL padding.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; LABEL_CAPACITY] {
        &self.bytes
    }

    /// The text up to the first NUL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let len = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LABEL_CAPACITY);
        std::str::from_utf8(&self.bytes[..len]).unwrap_or_default()
    }

    /// Whether this buffer is byte-identical to the initial image.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.bytes == LABEL_INITIAL
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_thread_sees_initial_values() {
        let snapshot = thread::spawn(snapshot).join().unwrap();
        assert_eq!(snapshot.counter, COUNTER_INITIAL);
        assert_eq!(snapshot.label.as_str(), LABEL_TEXT);
        assert!(snapshot.label.is_pristine());
    }

    #[test]
    fn increments_stay_on_the_owning_thread() {
        thread::spawn(|| {
            assert_eq!(increment_counter(), COUNTER_INITIAL + 1);
            assert_eq!(increment_counter(), COUNTER_INITIAL + 2);

            // A thread spawned after ours has mutated its copy still starts from the template.
            let child = thread::spawn(|| {
                let before = counter();
                increment_counter();
                (before, counter())
            })
            .join()
            .unwrap();
            assert_eq!(child, (COUNTER_INITIAL, COUNTER_INITIAL + 1));

            assert_eq!(counter(), COUNTER_INITIAL + 2);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn label_buffer_is_nul_padded() {
        let label = thread::spawn(label).join().unwrap();
        let bytes = label.as_bytes();
        assert_eq!(&bytes[..LABEL_TEXT.len()], LABEL_TEXT.as_bytes());
        assert!(bytes[LABEL_TEXT.len()..].iter().all(|&b| b == 0));
        assert_eq!(label.to_string(), LABEL_TEXT);
    }
}
