//! The Endpoint record and its binary encoding.
//!
//! A payload is a FlatBuffers table with one slot per field:
//!
//! ```text
//! table Endpoint {
//!   id: string;              // slot 0, vtable offset 4
//!   organization_id: string; // slot 1, vtable offset 6
//!   url: string;             // slot 2, vtable offset 8
//!   schema: string;          // slot 3, vtable offset 10
//!   error: string;           // slot 4, vtable offset 12
//!   action: byte = 0;        // slot 5, vtable offset 14
//! }
//! ```
//!
//! Payloads are verified before any field is read. Inside a verified
//! payload an absent field reads as its zero value.

use crate::error::ProtocolError;
use flatbuffers::{
    FlatBufferBuilder, Follow, ForwardsUOffset, InvalidFlatbuffer, Table, VOffsetT, Verifiable,
    Verifier, WIPOffset,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error message carried by a Read response when no record matches.
pub const NOT_FOUND: &str = "not found";

/// Initial buffer size of a builder created by [`EndpointBuilder::new`].
const DEFAULT_BUILDER_CAPACITY: usize = 1024;

/// Requested operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum Action {
    /// List every record. Also the zero value of the field.
    #[default]
    Index = 0,
    /// Fetch one record by id.
    Read = 1,
    /// Create a record.
    New = 2,
}

impl Action {
    /// Returns the wire code.
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Parses a wire code. Codes outside the enumeration return `None`.
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Action::Index),
            1 => Some(Action::Read),
            2 => Some(Action::New),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Index => write!(f, "INDEX"),
            Action::Read => write!(f, "READ"),
            Action::New => write!(f, "NEW"),
        }
    }
}

/// An endpoint record, used both as request and as response.
///
/// A non-empty `error` marks a failed response; every field but `id` must
/// then be ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub organization_id: String,
    pub url: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default, skip_serializing)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Endpoint {
    /// Creates a record with the given identity and target.
    pub fn new(
        id: impl Into<String>,
        organization_id: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            organization_id: organization_id.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Builds an Index request.
    pub fn index_request() -> Self {
        Self::default()
    }

    /// Builds a Read request for `id`.
    pub fn read_request(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: Action::Read,
            ..Default::default()
        }
    }

    /// Builds a New request. The id is left empty for the server to assign.
    pub fn new_request(organization_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            url: url.into(),
            action: Action::New,
            ..Default::default()
        }
    }

    /// Builds the not-found marker for `id`.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: NOT_FOUND.to_string(),
            ..Default::default()
        }
    }

    /// Returns whether this record reports a failure.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Returns whether this record is the not-found marker.
    pub fn is_not_found(&self) -> bool {
        self.error == NOT_FOUND
    }
}

/// Reusable encoder for Endpoint records.
///
/// The builder keeps its buffer between encodes so a pooled builder stops
/// allocating once it has grown to the largest record it has seen.
pub struct EndpointBuilder {
    fbb: FlatBufferBuilder<'static>,
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUILDER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fbb: FlatBufferBuilder::with_capacity(capacity),
        }
    }

    /// Clears any previous output.
    pub fn reset(&mut self) {
        self.fbb.reset();
    }

    /// Encodes `endpoint` and returns the finished payload.
    ///
    /// The four string fields are always written; `error` only when set.
    /// The payload borrows the builder and is invalidated by the next encode.
    pub fn encode(&mut self, endpoint: &Endpoint) -> &[u8] {
        self.reset();
        let fbb = &mut self.fbb;

        let id = fbb.create_string(&endpoint.id);
        let organization_id = fbb.create_string(&endpoint.organization_id);
        let url = fbb.create_string(&endpoint.url);
        let schema = fbb.create_string(&endpoint.schema);
        let error = (!endpoint.error.is_empty()).then(|| fbb.create_string(&endpoint.error));

        let start = fbb.start_table();
        fbb.push_slot_always::<WIPOffset<_>>(EndpointView::VT_ID, id);
        fbb.push_slot_always::<WIPOffset<_>>(EndpointView::VT_ORGANIZATION_ID, organization_id);
        fbb.push_slot_always::<WIPOffset<_>>(EndpointView::VT_URL, url);
        fbb.push_slot_always::<WIPOffset<_>>(EndpointView::VT_SCHEMA, schema);
        if let Some(error) = error {
            fbb.push_slot_always::<WIPOffset<_>>(EndpointView::VT_ERROR, error);
        }
        fbb.push_slot::<i8>(EndpointView::VT_ACTION, endpoint.action.code(), 0);
        let root = fbb.end_table(start);
        fbb.finish(root, None);

        fbb.finished_data()
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EndpointBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBuilder").finish_non_exhaustive()
    }
}

/// Root table of a verified payload.
#[derive(Clone, Copy)]
struct EndpointTable<'a> {
    tab: Table<'a>,
}

impl<'a> Follow<'a> for EndpointTable<'a> {
    type Inner = EndpointTable<'a>;

    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            tab: Table::new(buf, loc),
        }
    }
}

impl Verifiable for EndpointTable<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<&str>>("id", EndpointView::VT_ID, false)?
            .visit_field::<ForwardsUOffset<&str>>(
                "organization_id",
                EndpointView::VT_ORGANIZATION_ID,
                false,
            )?
            .visit_field::<ForwardsUOffset<&str>>("url", EndpointView::VT_URL, false)?
            .visit_field::<ForwardsUOffset<&str>>("schema", EndpointView::VT_SCHEMA, false)?
            .visit_field::<ForwardsUOffset<&str>>("error", EndpointView::VT_ERROR, false)?
            .visit_field::<i8>("action", EndpointView::VT_ACTION, false)?
            .finish();
        Ok(())
    }
}

/// Read-only view over an encoded Endpoint record.
///
/// Accessors borrow from the underlying buffer; nothing is copied until
/// [`EndpointView::to_endpoint`] is called. The default view has every
/// field at its zero value.
#[derive(Clone, Copy, Default)]
pub struct EndpointView<'a> {
    table: Option<EndpointTable<'a>>,
}

impl<'a> EndpointView<'a> {
    pub const VT_ID: VOffsetT = 4;
    pub const VT_ORGANIZATION_ID: VOffsetT = 6;
    pub const VT_URL: VOffsetT = 8;
    pub const VT_SCHEMA: VOffsetT = 10;
    pub const VT_ERROR: VOffsetT = 12;
    pub const VT_ACTION: VOffsetT = 14;

    /// Verifies `buf` and returns a view over it.
    pub fn new(buf: &'a [u8]) -> Result<Self, ProtocolError> {
        let table = flatbuffers::root::<EndpointTable>(buf)?;
        Ok(Self { table: Some(table) })
    }

    pub fn id(&self) -> &'a str {
        self.str_field(Self::VT_ID)
    }

    pub fn organization_id(&self) -> &'a str {
        self.str_field(Self::VT_ORGANIZATION_ID)
    }

    pub fn url(&self) -> &'a str {
        self.str_field(Self::VT_URL)
    }

    pub fn schema(&self) -> &'a str {
        self.str_field(Self::VT_SCHEMA)
    }

    pub fn error(&self) -> &'a str {
        self.str_field(Self::VT_ERROR)
    }

    /// Returns the raw action code, `0` when absent.
    pub fn action_code(&self) -> i8 {
        self.table
            // SAFETY: the table was verified in `new`, including this slot.
            .and_then(|t| unsafe { t.tab.get::<i8>(Self::VT_ACTION, Some(0)) })
            .unwrap_or(0)
    }

    /// Returns the action, or `None` for a code outside the enumeration.
    pub fn action(&self) -> Option<Action> {
        Action::from_code(self.action_code())
    }

    /// Copies the view into an owned record.
    ///
    /// Unknown action codes become the zero action.
    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint {
            id: self.id().to_string(),
            organization_id: self.organization_id().to_string(),
            url: self.url().to_string(),
            schema: self.schema().to_string(),
            action: self.action().unwrap_or_default(),
            error: self.error().to_string(),
        }
    }

    fn str_field(&self, slot: VOffsetT) -> &'a str {
        self.table
            // SAFETY: the table was verified in `new`, including this slot.
            .and_then(|t| unsafe { t.tab.get::<ForwardsUOffset<&str>>(slot, None) })
            .unwrap_or_default()
    }
}

impl fmt::Debug for EndpointView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointView")
            .field("id", &self.id())
            .field("organization_id", &self.organization_id())
            .field("url", &self.url())
            .field("schema", &self.schema())
            .field("error", &self.error())
            .field("action", &self.action_code())
            .finish()
    }
}
