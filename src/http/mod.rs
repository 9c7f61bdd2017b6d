pub mod config;
pub mod consumer;
pub mod multipart;
pub mod options;
pub mod orderedheaders;
pub mod requestbody;
pub mod response;
pub mod responsebody;

// Re-exports for convenience
pub use config::{require_ok, MalformedStatusPolicy, ResponseConfig, StatusValidator};
pub use consumer::consume;
pub use multipart::{FileValue, Form, MultipartStream, Part, PartValue, Scalar};
pub use options::{normalize, RequestOptions, Target};
pub use orderedheaders::OrderedHeaderMap;
pub use requestbody::{encode, Body, ByteStream, EncodedBody, Strategy};
pub use response::{Buffered, IncomingResponse, Response};
pub use responsebody::{Decoding, ResponseStream};
