pub mod dedup;
pub mod poller;

pub use dedup::{NotableKinds, SeenEvents};
pub use poller::{Poller, PollerConfig};
