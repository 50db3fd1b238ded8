//! Type aliases for commonly used complex types.
//!
//! The panel core runs on a single cooperative loop, so shared state is
//! `Rc<RefCell<T>>` rather than a lock. The alias names carry the intent.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lathekit_core::types::*;
//!
//! let log: Shared<Vec<String>> = shared(Vec::new());
//! log.borrow_mut().push("G0X1.000".to_string());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

/// A reference-counted, interior-mutable wrapper for single-threaded sharing.
///
/// Used for handles that tests and the host keep onto state owned by the
/// control loop (for example the simulated controller's command log).
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a value in a `Shared` handle
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}
