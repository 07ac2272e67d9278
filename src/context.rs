// Per-connection facts shared by the pipeline stages
use std::time::Instant;

pub struct Context {
    pub peer: String,
    pub started_at: Instant,
}

impl Context {
    pub fn new(peer: impl Into<String>) -> Self {
        Context { peer: peer.into(), started_at: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}
