//! HTTP layer.
//!
//! - [`RequestConfig`](config::RequestConfig): layered request options
//! - [`encode`]: body encoding by explicit or inferred content type
//! - [`HttpNetworkTransaction`](transaction::HttpNetworkTransaction): one HTTP/1.1 exchange
//! - [`Response`](response::Response) and [`ResponseBody`](responsebody::ResponseBody): decoded results

pub mod config;
pub mod encode;
pub mod multipart;
pub mod orderedheaders;
pub mod requestbody;
pub mod response;
pub mod responsebody;
pub mod streamfactory;
pub mod transaction;

// Re-exports for convenience
pub use config::{Credentials, QueryParams, RedirectPolicy, RequestConfig, ResponseType};
pub use multipart::{Form, Part};
pub use orderedheaders::OrderedHeaderMap;
pub use requestbody::{Field, Fields, RequestBody};
pub use response::Response;
pub use responsebody::ResponseBody;
