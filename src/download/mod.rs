pub mod pool;
pub mod transport;

pub use pool::{DownloadJob, DownloadOutcome, DownloaderPool};
pub use transport::{FakeTransport, ReqwestTransport, Transport};
