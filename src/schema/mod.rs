//! The shape/schema model: typed descriptions of operation inputs, outputs,
//! and errors.
//!
//! A service is described declaratively: a [`ServiceSchema`] holds the wire
//! [`Protocol`], the [`SigningAlgorithm`], and a table of [`Operation`]s
//! whose inputs and outputs are [`Shape`]s. The runtime is entirely driven
//! by this data; there is no per-service code.
//!
//! # Shape graphs
//!
//! Shapes form a graph that may be cyclic, but only through named
//! references: a structure may contain itself via [`ShapeRef::Named`]
//! resolved lazily against the [`SchemaRegistry`], never by value. Schemas
//! are built once at load time, immutable thereafter, and shared read-only
//! across all requests (wrap them in `Arc`).
//!
//! # Example
//!
//! ```rust
//! use nimbus_client::schema::{Member, Shape, ShapeRef, StructureShape};
//!
//! let input = Shape::Structure(
//!     StructureShape::new()
//!         .member("Name", Member::new(ShapeRef::inline(Shape::String)))
//!         .require("Name"),
//! );
//! ```

pub mod coerce;
pub mod validate;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;

/// Wire protocol families supported by the runtime.
///
/// Declared per service; selects the codec used to build requests and parse
/// responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// Structured JSON document body, operation named by a target header.
    Json,
    /// Flattened key=value form body, XML responses.
    Query,
    /// REST with JSON payloads.
    RestJson,
    /// REST with XML payloads.
    RestXml,
}

/// Authentication schemes supported by the signer strategy set.
///
/// Declared per service; some (service, region) pairs are overridden to a
/// legacy scheme by the endpoint resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// Query-signature scheme: keyed hash over method/host/path/params.
    V2,
    /// Header HMAC over a canonical header concatenation.
    V3,
    /// Variant of `V3` signing only the date header (HTTPS transport only).
    V3Https,
    /// Legacy object-storage path-style scheme.
    S3,
    /// Scoped-date chained-key scheme (the primary modern scheme).
    V4,
}

/// HTTP methods used by operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET.
    Get,
    /// HTTP HEAD.
    Head,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP PATCH.
    Patch,
    /// HTTP DELETE.
    Delete,
}

impl HttpMethod {
    /// Returns the canonical (uppercase) method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire placement of a structure member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Location {
    /// Serialized into the protocol body (the default).
    #[default]
    Body,
    /// Emitted as a single named header.
    Header,
    /// A map member expanded to one header per key under a declared prefix.
    Headers,
    /// Substituted into a `{name}` placeholder in the URI template.
    UriSegment,
    /// Emitted as a query-string parameter.
    QueryString,
    /// Populated from the response status code (output only).
    StatusCode,
}

/// Declared textual timestamp representations.
///
/// When a shape does not declare a format, the codec picks the protocol
/// default (Unix seconds for JSON bodies, ISO-8601 for query/XML bodies,
/// RFC-1123 for headers).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Seconds since the Unix epoch, possibly fractional.
    UnixSeconds,
    /// ISO-8601 / RFC-3339 (`2013-01-08T22:45:49Z`).
    Iso8601,
    /// RFC-1123 date (`Tue, 08 Jan 2013 22:45:49 GMT`).
    Rfc1123,
}

/// A reference to a shape: either inline or by registry name.
///
/// Named references are what allow recursive structures; they resolve
/// lazily so a shape can reference itself.
#[derive(Clone, Debug)]
pub enum ShapeRef {
    /// The shape is owned directly.
    Inline(Arc<Shape>),
    /// The shape lives in the [`SchemaRegistry`] under this name.
    Named(String),
}

impl ShapeRef {
    /// Wraps a shape value as an inline reference.
    #[must_use]
    pub fn inline(shape: Shape) -> Self {
        Self::Inline(Arc::new(shape))
    }

    /// References a shape registered under `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Resolves the reference against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownShape`] if a named reference is not
    /// registered.
    pub fn resolve(&self, registry: &SchemaRegistry) -> Result<Arc<Shape>, SchemaError> {
        match self {
            Self::Inline(shape) => Ok(Arc::clone(shape)),
            Self::Named(name) => registry.resolve(name),
        }
    }
}

/// A typed node in the schema graph.
#[derive(Clone, Debug)]
pub enum Shape {
    /// A named-member aggregate; closed (undeclared keys are rejected).
    Structure(StructureShape),
    /// An ordered collection of one member shape.
    List(ListShape),
    /// String-keyed map of one value shape.
    Map(MapShape),
    /// UTF-8 text.
    String,
    /// Whole number; parsed with locale-independent decimal parsing.
    Integer,
    /// Floating-point number.
    Float,
    /// Literal true/false only.
    Boolean,
    /// Point in time; see [`TimestampFormat`].
    Timestamp(Option<TimestampFormat>),
    /// Opaque bytes; base64 in textual protocols, raw in payloads.
    Binary,
}

impl Shape {
    /// Human-readable kind name used in validation messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Structure(_) => "structure",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Binary => "binary",
        }
    }
}

/// A structure member: a shape reference plus wire-location metadata.
#[derive(Clone, Debug)]
pub struct Member {
    /// The member's shape.
    pub shape: ShapeRef,
    /// Where the member travels on the wire.
    pub location: Location,
    /// Wire name override (header name, query key, XML element name).
    pub location_name: Option<String>,
}

impl Member {
    /// Creates a body-located member with no rename.
    #[must_use]
    pub const fn new(shape: ShapeRef) -> Self {
        Self {
            shape,
            location: Location::Body,
            location_name: None,
        }
    }

    /// Sets the wire location.
    #[must_use]
    pub const fn located(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Sets the wire name override.
    #[must_use]
    pub fn named(mut self, location_name: impl Into<String>) -> Self {
        self.location_name = Some(location_name.into());
        self
    }

    /// Returns the wire name for this member, falling back to `default`.
    #[must_use]
    pub fn wire_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.location_name.as_deref().unwrap_or(default)
    }
}

/// A structure shape: ordered named members plus a required set.
///
/// Member order is the declared order and is preserved for protocols that
/// need deterministic field order in wire output.
#[derive(Clone, Debug, Default)]
pub struct StructureShape {
    /// Members in declared order.
    pub members: Vec<(String, Member)>,
    /// Names of members that must be present and non-null.
    pub required: Vec<String>,
    /// Name of the member that is the literal HTTP payload, if any.
    pub payload: Option<String>,
}

impl StructureShape {
    /// Creates an empty structure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member, preserving declaration order.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.push((name.into(), member));
        self
    }

    /// Marks a member as required.
    #[must_use]
    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Marks a member as the literal HTTP payload.
    #[must_use]
    pub fn payload(mut self, name: impl Into<String>) -> Self {
        self.payload = Some(name.into());
        self
    }

    /// Looks up a member by declared name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|(member_name, _)| member_name == name)
            .map(|(_, member)| member)
    }

    /// Returns true if the member is in the required set.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|required| required == name)
    }
}

/// A list shape.
#[derive(Clone, Debug)]
pub struct ListShape {
    /// The element shape.
    pub member: Box<Member>,
    /// Flattened lists skip the intermediate `member` wrapper in
    /// query/XML serialization.
    pub flattened: bool,
}

impl ListShape {
    /// Creates a non-flattened list of the given element member.
    #[must_use]
    pub fn new(member: Member) -> Self {
        Self {
            member: Box::new(member),
            flattened: false,
        }
    }

    /// Marks the list as flattened.
    #[must_use]
    pub fn flattened(mut self) -> Self {
        self.flattened = true;
        self
    }
}

/// A map shape with string keys.
#[derive(Clone, Debug)]
pub struct MapShape {
    /// The value shape.
    pub value: Box<Member>,
    /// Wire name of the key element (defaults to `key`).
    pub key_name: Option<String>,
    /// Wire name of the value element (defaults to `value`).
    pub value_name: Option<String>,
    /// Flattened maps skip the intermediate `entry` wrapper.
    pub flattened: bool,
}

impl MapShape {
    /// Creates a non-flattened map of the given value member.
    #[must_use]
    pub fn new(value: Member) -> Self {
        Self {
            value: Box::new(value),
            key_name: None,
            value_name: None,
            flattened: false,
        }
    }

    /// Marks the map as flattened.
    #[must_use]
    pub fn flattened(mut self) -> Self {
        self.flattened = true;
        self
    }
}

/// Registry of named shapes for one service.
///
/// Built once at schema-load time; lookups are read-only thereafter.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    shapes: HashMap<String, Arc<Shape>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shape under a name, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, shape: Shape) {
        self.shapes.insert(name.into(), Arc::new(shape));
    }

    /// Resolves a named shape.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownShape`] if the name is not registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<Shape>, SchemaError> {
        self.shapes
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownShape {
                name: name.to_string(),
            })
    }
}

/// Pagination descriptor for an operation.
///
/// All paths are expressions evaluated against decoded response data; see
/// [`crate::client::pagination`].
#[derive(Clone, Debug, Default)]
pub struct Paginator {
    /// Input parameter name(s) that receive the next-page token(s).
    pub input_tokens: Vec<String>,
    /// Path expression(s) extracting the output token(s) from a response.
    pub output_tokens: Vec<String>,
    /// Optional path expression for a "more results" boolean.
    pub more_results: Option<String>,
    /// Optional input parameter bounding the page size.
    pub limit_key: Option<String>,
    /// Optional path expression selecting the items of a page.
    pub result_key: Option<String>,
}

/// One callable API action.
#[derive(Clone, Debug)]
pub struct Operation {
    /// Operation name (e.g. `ListQueues`).
    pub name: String,
    /// HTTP method of the wire request.
    pub http_method: HttpMethod,
    /// URI template with `{name}` / greedy `{name+}` placeholders.
    pub request_uri: String,
    /// Input shape, if the operation takes parameters.
    pub input: Option<ShapeRef>,
    /// Output shape, if the operation returns data.
    pub output: Option<ShapeRef>,
    /// Declared error shape names.
    pub errors: Vec<String>,
    /// Name of the element wrapping the result document (query protocol).
    pub result_wrapper: Option<String>,
    /// Root element name for XML request documents (REST/XML protocol).
    pub input_wrapper: Option<String>,
    /// Pagination descriptor, if the operation is pageable.
    pub paginator: Option<Paginator>,
}

impl Operation {
    /// Creates an operation with the given name, method, and URI template.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        http_method: HttpMethod,
        request_uri: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            http_method,
            request_uri: request_uri.into(),
            input: None,
            output: None,
            errors: Vec::new(),
            result_wrapper: None,
            input_wrapper: None,
            paginator: None,
        }
    }

    /// Sets the input shape.
    #[must_use]
    pub fn input(mut self, shape: ShapeRef) -> Self {
        self.input = Some(shape);
        self
    }

    /// Sets the output shape.
    #[must_use]
    pub fn output(mut self, shape: ShapeRef) -> Self {
        self.output = Some(shape);
        self
    }

    /// Sets the result-wrapper element name.
    #[must_use]
    pub fn result_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.result_wrapper = Some(wrapper.into());
        self
    }

    /// Sets the root element name for XML request documents.
    #[must_use]
    pub fn input_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.input_wrapper = Some(wrapper.into());
        self
    }

    /// Sets the pagination descriptor.
    #[must_use]
    pub fn paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = Some(paginator);
        self
    }
}

/// The complete declarative description of one service.
///
/// Built once from static definitions, immutable thereafter, and shared
/// read-only across all requests via `Arc<ServiceSchema>`.
#[derive(Clone, Debug)]
pub struct ServiceSchema {
    /// Service identifier used in signing scopes (e.g. `sqs`).
    pub service_id: String,
    /// Hostname prefix used by the endpoint resolver.
    pub endpoint_prefix: String,
    /// API version date string sent with query-protocol requests.
    pub api_version: String,
    /// The wire protocol family.
    pub protocol: Protocol,
    /// The declared signing algorithm.
    pub signing: SigningAlgorithm,
    /// Override of the signing-scope service name, when it differs from
    /// `service_id`.
    pub signing_name: Option<String>,
    /// Target header prefix for the JSON protocol.
    pub target_prefix: Option<String>,
    /// JSON protocol version (`1.0` / `1.1`).
    pub json_version: Option<String>,
    /// XML namespace emitted on request documents, if any.
    pub xml_namespace: Option<String>,
    /// Service-specific retry budget default.
    pub max_retries: Option<u32>,
    /// Operations by name.
    pub operations: HashMap<String, Operation>,
    /// Named shapes backing the operations.
    pub registry: SchemaRegistry,
}

impl ServiceSchema {
    /// Creates a schema with the given identity and protocol; operations
    /// and shapes are added afterwards.
    #[must_use]
    pub fn new(
        service_id: impl Into<String>,
        api_version: impl Into<String>,
        protocol: Protocol,
        signing: SigningAlgorithm,
    ) -> Self {
        let service_id = service_id.into();
        Self {
            endpoint_prefix: service_id.clone(),
            service_id,
            api_version: api_version.into(),
            protocol,
            signing,
            signing_name: None,
            target_prefix: None,
            json_version: None,
            xml_namespace: None,
            max_retries: None,
            operations: HashMap::new(),
            registry: SchemaRegistry::new(),
        }
    }

    /// Adds an operation.
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.insert(operation.name.clone(), operation);
    }

    /// Looks up an operation by name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownOperation`] if the name is not
    /// declared.
    pub fn operation(&self, name: &str) -> Result<&Operation, SchemaError> {
        self.operations
            .get(name)
            .ok_or_else(|| SchemaError::UnknownOperation {
                name: name.to_string(),
            })
    }

    /// Returns the name used in signing scopes.
    #[must_use]
    pub fn signing_name(&self) -> &str {
        self.signing_name.as_deref().unwrap_or(&self.service_id)
    }
}

// Verify schema types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ServiceSchema>();
    assert_send_sync::<Shape>();
};
