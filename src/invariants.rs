//! Runtime invariant checking with contract-test support.
//!
//! Production code asserts invariants through [`assert_invariant!`]; every
//! checked invariant is also logged to a thread-local set so tests can
//! verify that a given code path actually exercised its contracts.
//!
//! ```rust,ignore
//! use dashmux::assert_invariant;
//!
//! assert_invariant!(
//!     clear + cipher == sample_len,
//!     "subsample bytes must cover the sample exactly"
//! );
//!
//! // In a test:
//! contract_test("subsample accounting", &[
//!     "subsample bytes must cover the sample exactly",
//! ]);
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record that it was checked.
///
/// Panics when the condition is false; invariant violations are
/// programming errors, not recoverable conditions.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariants::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariants::__assert_invariant_impl($condition, $message, Some($context))
    };
}

/// Internal implementation - do not call directly.
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

/// Verify that the listed invariants were checked at some point during the
/// current test.
///
/// Panics with the missing invariants when any of them never ran.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .filter(|inv| !log.contains(**inv))
        .copied()
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Clear the invariant log (call between test runs if needed).
pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}
