//! TigerStyle constants for Troupe
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Delivery Limits
// =============================================================================

/// Default number of tries for a reliable send (first attempt included)
pub const DELIVERY_TRIES_COUNT_DEFAULT: usize = 3;

/// Maximum number of tries a caller may request for a single send
pub const DELIVERY_TRIES_COUNT_MAX: usize = 100;

// =============================================================================
// Scheduler Limits
// =============================================================================

/// Minimum number of dispatch loops in a fixed pool
pub const DISPATCHER_POOL_SIZE_MIN: usize = 1;

/// Maximum number of dispatch loops in a fixed pool
pub const DISPATCHER_POOL_SIZE_MAX: usize = 1024;

/// Default number of dispatch loops when none is configured
pub const DISPATCHER_POOL_SIZE_DEFAULT: usize = 4;

// =============================================================================
// Actor Limits
// =============================================================================

/// Maximum length of an actor name in bytes
pub const ACTOR_NAME_LENGTH_BYTES_MAX: usize = 256;

// Compile-time assertions for constant validity
const _: () = {
    assert!(DELIVERY_TRIES_COUNT_DEFAULT >= 1);
    assert!(DELIVERY_TRIES_COUNT_DEFAULT <= DELIVERY_TRIES_COUNT_MAX);
    assert!(DISPATCHER_POOL_SIZE_MIN >= 1);
    assert!(DISPATCHER_POOL_SIZE_DEFAULT >= DISPATCHER_POOL_SIZE_MIN);
    assert!(DISPATCHER_POOL_SIZE_DEFAULT <= DISPATCHER_POOL_SIZE_MAX);
    assert!(ACTOR_NAME_LENGTH_BYTES_MAX >= 64);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget_default_within_bounds() {
        assert!(DELIVERY_TRIES_COUNT_DEFAULT >= 1);
        assert!(DELIVERY_TRIES_COUNT_DEFAULT <= DELIVERY_TRIES_COUNT_MAX);
    }

    #[test]
    fn test_limits_have_units_in_names() {
        // All count limits end in _COUNT_, all byte limits in _BYTES_
        let _: usize = DELIVERY_TRIES_COUNT_MAX;
        let _: usize = ACTOR_NAME_LENGTH_BYTES_MAX;
    }
}
