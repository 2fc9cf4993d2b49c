//! Runtime invariant checks with contract-test support.
//!
//! Geometry and state-machine code asserts its invariants through
//! [`assert_invariant!`]. Every checked message is recorded per thread, so a
//! contract test can prove that a code path actually exercised the checks it
//! depends on.
//!
//! ```rust,ignore
//! use autocapture::invariant_ppt::*;
//!
//! assert_invariant!(
//!     top + scaled_height + bottom == input_size,
//!     "Letterbox rows must fill the input square"
//! );
//!
//! #[test]
//! fn contract_letterbox() {
//!     contract_test("letterbox", &["Letterbox rows must fill the input square"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and log it for contract testing.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Check that specific invariants were verified on this thread.
///
/// # Panics
/// Panics if any required invariant was not checked.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Clear the invariant log for the current thread.
pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}

/// Messages checked by the pipeline, shared with contract tests.
pub mod messages {
    pub const LETTERBOX_ROWS: &str = "Letterbox rows must fill the input square";
    pub const LETTERBOX_COLUMNS: &str = "Letterbox columns must fill the input square";
    pub const TENSOR_LEN: &str = "Tensor length must equal its shape product";
    pub const COUNTER_BELOW_THRESHOLD: &str =
        "Stability counter stays below the capture threshold between frames";
    pub const CROP_INSIDE_FRAME: &str = "Crop region must lie inside the frame";
}
