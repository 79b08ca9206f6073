
pub use manual_clock::ManualClock;
pub use stub_store::StubStore;
