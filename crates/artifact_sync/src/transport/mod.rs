//! Collaborators the commit pipeline talks to the server through

pub mod endpoints;
pub mod http;
pub mod serializer;

pub use endpoints::{EndpointResolver, ProjectEndpointResolver};
pub use http::{BinaryPart, HttpTransport, Transport, TransportResponse};
pub use serializer::{JsonSerializer, PayloadHandle, PayloadSerializer, TempFileSerializer};
