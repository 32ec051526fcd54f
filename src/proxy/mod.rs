//! Proxy execution of generated tools
//!
//! Credentials never pass through this module's request types; they are
//! attached by the [`AuthenticatedHttp`] implementation at send time.

mod blocklist;
mod executor;
mod transport;

pub use blocklist::Blocklist;
pub use executor::{
    PartitionedArguments, ProxyExecutor, encode_path_segment, interpolate_path,
    partition_arguments,
};
pub use transport::{
    AuthenticatedHttp, CredentialSource, EnvCredentialSource, HttpTransport, PreparedRequest,
    StaticCredentialSource, TransportError, auth_headers,
};
