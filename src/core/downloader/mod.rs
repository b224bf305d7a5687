mod checksum;
mod client;
mod transport;

pub use checksum::{digest_file, file_satisfies, Checksum, StreamHasher};
pub use client::{BatchReport, Downloader, FetchOutcome, DEFAULT_CONCURRENCY};
pub use transport::{HttpTransport, TransferBody, Transport, MAX_PREALLOCATION};

#[cfg(test)]
pub(crate) use transport::testing;
