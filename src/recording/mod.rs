//! Recording of protocol sessions into HAR documents

mod recorder;
mod session;

pub use recorder::{EventRecorder, LogKind};
pub use session::HarRecorder;
