//! Simulation-driven integration test.
//!
//! Runs a fixed operation sequence through `termstream-harness`'s
//! `SimDriver`, which applies each step to both a reference model and a
//! real [`StreamingDataService`], failing loudly on the first disagreement
//! or invariant violation. This is the integration-level counterpart to the
//! unit tests inside `termstream-core` itself: it exercises session
//! creation, client attach/detach, output sequencing, and the session limit
//! together, the way a real client population would.

use termstream_harness::{InvariantRegistry, Operation, SimDriver, SmallPayload};

#[test]
fn session_lifecycle_matches_the_reference_model() {
    let mut driver = SimDriver::new(7, 4).with_invariants(InvariantRegistry::standard());

    driver.apply(&Operation::CreateSession { session_id: 1 });
    driver.apply(&Operation::RegisterClient { session_id: 1, client_id: 1 });
    driver.apply(&Operation::RegisterClient { session_id: 1, client_id: 2 });

    for seed in 0..20u8 {
        driver.apply(&Operation::ProcessOutput { session_id: 1, data: SmallPayload::new(seed, seed % 48) });
    }

    driver.apply(&Operation::ProcessInput { session_id: 1, client_id: 1, data: SmallPayload::new(9, 10) });
    driver.apply(&Operation::WindowUpdate { session_id: 1, client_id: 1, increment: 4096 });
    driver.apply(&Operation::Disconnect { session_id: 1, client_id: 2 });
    driver.apply(&Operation::AdvanceTime { millis: 1500 });
    driver.apply(&Operation::UnregisterClient { session_id: 1, client_id: 1 });
    driver.apply(&Operation::DestroySession { session_id: 1 });
}

#[test]
fn session_limit_is_enforced_across_create_destroy_churn() {
    let mut driver = SimDriver::new(8, 2).with_invariants(InvariantRegistry::standard());

    driver.apply(&Operation::CreateSession { session_id: 1 });
    driver.apply(&Operation::CreateSession { session_id: 2 });
    // Over the limit: rejected by both the model and the real service.
    driver.apply(&Operation::CreateSession { session_id: 3 });

    driver.apply(&Operation::DestroySession { session_id: 1 });
    // A slot freed up: this now succeeds identically on both sides.
    driver.apply(&Operation::CreateSession { session_id: 3 });
}
