pub mod links;
pub mod middleware;
pub mod transport;

pub use links::{extract_links, same_host};
pub use middleware::DefaultHeaders;
pub use transport::ReqwestTransport;
