//! Lifecycle integration tests
//!
//! Drive `ServerLifecycle` against the in-memory admin service: auth flows,
//! tool synchronization, optimistic updates and races.
