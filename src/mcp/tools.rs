//! Tool registry for MCP tools.
//!
//! Each tool has a name, a description, a JSON schema for its input and a
//! [`ToolKind`] naming the operation it runs. Schemas are compiled once when
//! the registry is built; every call is validated against its schema before
//! anything is dispatched, so malformed input never reaches the network.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::envelope::{
    CapabilityResult, CategoryInfo, CitationResult, RecordResult, ResultEnvelope, SearchResult,
    ToolError,
};
use crate::client::Client;
use crate::error::{ArchiveError, Result};
use crate::models::{
    resolve_identifier, Category, CategoryCapabilities, SearchQuery, SortBy, MAX_PAGE_SIZE,
};

/// The operation behind a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Search,
    Count,
    GetRecord,
    GetFullText,
    CiteRecord,
    ResolveIdentifier,
    ListCapabilities,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::Search,
        ToolKind::Count,
        ToolKind::GetRecord,
        ToolKind::GetFullText,
        ToolKind::CiteRecord,
        ToolKind::ResolveIdentifier,
        ToolKind::ListCapabilities,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Search => "search",
            ToolKind::Count => "count",
            ToolKind::GetRecord => "get_record",
            ToolKind::GetFullText => "get_full_text",
            ToolKind::CiteRecord => "cite_record",
            ToolKind::ResolveIdentifier => "resolve_identifier",
            ToolKind::ListCapabilities => "list_capabilities",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::Search => {
                "Search Trove categories. Returns one page of records per category and a cursor \
                 for each category that has more; pass a cursor back (with a single category) \
                 to continue."
            }
            ToolKind::Count => "Count matching records per category without fetching them",
            ToolKind::GetRecord => "Fetch a single record by category and identifier",
            ToolKind::GetFullText => {
                "Fetch a newspaper article together with its OCR full text"
            }
            ToolKind::CiteRecord => {
                "Fetch the citation fields (title, date, persistent URL) for a record"
            }
            ToolKind::ResolveIdentifier => {
                "Resolve a Trove URL, nla.gov.au persistent identifier or category:id pair"
            }
            ToolKind::ListCapabilities => {
                "Describe the server: tools, categories and what each category supports"
            }
        }
    }

    /// JSON schema for the tool's arguments
    pub fn input_schema(&self) -> Value {
        match self {
            ToolKind::Search => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms (Trove query syntax)"
                    },
                    "categories": categories_schema(CategoryCapabilities::SEARCH),
                    "page_size": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_PAGE_SIZE,
                        "description": "Records per category (default 20)"
                    },
                    "sort": {
                        "type": "string",
                        "enum": ["relevance", "date_asc", "date_desc"]
                    },
                    "filters": filters_schema(),
                    "cursor": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Cursor from a previous result (single category only)"
                    },
                    "bulk_harvest": {
                        "type": "boolean",
                        "description": "Stable ordering for harvesting complete result sets"
                    }
                },
                "required": ["categories"],
                "additionalProperties": false
            }),
            ToolKind::Count => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms (Trove query syntax)"
                    },
                    "categories": categories_schema(CategoryCapabilities::SEARCH),
                    "filters": filters_schema()
                },
                "required": ["categories"],
                "additionalProperties": false
            }),
            ToolKind::GetRecord | ToolKind::CiteRecord => {
                record_schema(CategoryCapabilities::RECORD)
            }
            ToolKind::GetFullText => record_schema(CategoryCapabilities::FULL_TEXT),
            ToolKind::ResolveIdentifier => json!({
                "type": "object",
                "properties": {
                    "identifier": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Trove URL, persistent identifier or category:id"
                    }
                },
                "required": ["identifier"],
                "additionalProperties": false
            }),
            ToolKind::ListCapabilities => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

fn category_codes(capability: CategoryCapabilities) -> Vec<&'static str> {
    Category::ALL
        .iter()
        .filter(|c| c.supports(capability))
        .map(|c| c.code())
        .collect()
}

fn categories_schema(capability: CategoryCapabilities) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string", "enum": category_codes(capability) },
        "minItems": 1,
        "uniqueItems": true,
        "description": "Categories to search"
    })
}

fn filters_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": { "type": "string", "minLength": 1 },
        "description": "Facet limits, e.g. {\"decade\": \"185\", \"state\": \"Victoria\"}"
    })
}

fn record_schema(capability: CategoryCapabilities) -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": { "type": "string", "enum": category_codes(capability) },
            "id": { "type": "string", "minLength": 1, "maxLength": 64 }
        },
        "required": ["category", "id"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: Option<String>,
    categories: Vec<Category>,
    page_size: Option<u32>,
    sort: Option<SortBy>,
    #[serde(default)]
    filters: BTreeMap<String, String>,
    cursor: Option<String>,
    #[serde(default)]
    bulk_harvest: bool,
}

impl SearchArgs {
    fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new().categories(self.categories.iter().copied());
        if let Some(text) = &self.query {
            query = query.text(text);
        }
        if let Some(size) = self.page_size {
            query = query.page_size(size);
        }
        if let Some(sort) = self.sort {
            query = query.sort(sort);
        }
        for (name, value) in &self.filters {
            query = query.filter(name, value);
        }
        query.bulk_harvest(self.bulk_harvest)
    }
}

#[derive(Debug, Deserialize)]
struct RecordArgs {
    category: Category,
    id: String,
}

#[derive(Debug, Deserialize)]
struct IdentifierArgs {
    identifier: String,
}

/// Name, description and schema of a tool, for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A registered tool with its compiled schema
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub kind: ToolKind,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

impl Tool {
    fn new(kind: ToolKind) -> Result<Self> {
        let input_schema = kind.input_schema();
        let validator = jsonschema::validator_for(&input_schema).map_err(|e| {
            ArchiveError::Configuration(format!("schema for {} does not compile: {}", kind.name(), e))
        })?;
        Ok(Self {
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            input_schema,
            kind,
            validator,
        })
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Check `args` against the schema, reporting the first violation
    pub fn validate(&self, args: &Value) -> Result<()> {
        match self.validator.iter_errors(args).next() {
            None => Ok(()),
            Some(e) => {
                let field = e.instance_path.to_string();
                let schema_path = e.schema_path.to_string();
                let constraint = schema_path.rsplit('/').next().unwrap_or_default().to_string();
                Err(ArchiveError::SchemaValidation {
                    field: if field.is_empty() { "/".to_string() } else { field },
                    constraint,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Registry for all MCP tools
#[derive(Debug)]
pub struct ToolRegistry {
    client: Client,
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    /// Build the registry and compile every tool schema
    pub fn new(client: Client) -> Result<Self> {
        let tools = ToolKind::ALL
            .iter()
            .map(|kind| Tool::new(*kind).map(|tool| (tool.name.clone(), tool)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        tracing::debug!("Registered {} tools", tools.len());
        Ok(Self { client, tools })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Name, description and schema of every tool, without executing anything
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(Tool::descriptor).collect()
    }

    /// Validate `args` and run the named tool
    pub async fn execute(&self, name: &str, args: Value) -> std::result::Result<ResultEnvelope, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::new(name, ArchiveError::UnknownTool(name.to_string())))?;

        let args = if args.is_null() { json!({}) } else { args };
        tool.validate(&args)
            .map_err(|e| ToolError::new(name, e))?;

        tracing::debug!(tool = name, "Executing tool");
        self.dispatch(tool.kind, args)
            .await
            .map_err(|e| ToolError::new(name, e))
    }

    async fn dispatch(&self, kind: ToolKind, args: Value) -> Result<ResultEnvelope> {
        match kind {
            ToolKind::Search => {
                let parsed: SearchArgs = parse_args(&args)?;
                let query = parsed.to_query();
                let page = match parsed.cursor.as_deref() {
                    Some(cursor) => query.page_at(&self.client, cursor).await?,
                    None => query.first_page(&self.client).await?,
                };
                Ok(ResultEnvelope::Search(SearchResult::from_page(args, page)))
            }
            ToolKind::Count => {
                let parsed: SearchArgs = parse_args(&args)?;
                let counts = parsed.to_query().count_by_category(&self.client).await?;
                Ok(ResultEnvelope::Search(SearchResult::from_counts(args, counts)))
            }
            ToolKind::GetRecord => {
                let parsed: RecordArgs = parse_args(&args)?;
                let record = self.client.get_record(parsed.category, &parsed.id).await?;
                Ok(ResultEnvelope::Record(RecordResult::new(record, None)))
            }
            ToolKind::GetFullText => {
                let parsed: RecordArgs = parse_args(&args)?;
                let (record, text) = self
                    .client
                    .get_record_with_text(parsed.category, &parsed.id)
                    .await?;
                Ok(ResultEnvelope::Record(RecordResult::new(record, text)))
            }
            ToolKind::CiteRecord => {
                let parsed: RecordArgs = parse_args(&args)?;
                let record = self.client.get_record(parsed.category, &parsed.id).await?;
                Ok(ResultEnvelope::Citation(CitationResult::from_record(&record)))
            }
            ToolKind::ResolveIdentifier => {
                let parsed: IdentifierArgs = parse_args(&args)?;
                Ok(ResultEnvelope::IdentifierResolution(resolve_identifier(
                    &parsed.identifier,
                )?))
            }
            ToolKind::ListCapabilities => Ok(ResultEnvelope::ServerCapability(self.capabilities())),
        }
    }

    fn capabilities(&self) -> CapabilityResult {
        let config = self.client.config();
        CapabilityResult {
            server: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tools: self.names(),
            categories: Category::ALL
                .iter()
                .map(|c| CategoryInfo {
                    code: c.code().to_string(),
                    name: c.name().to_string(),
                    capabilities: c
                        .capabilities()
                        .names()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
            rate_limit: config.rate_limit(),
            burst_limit: config.burst_limit(),
            max_concurrency: config.max_concurrency(),
            cache_backend: config.cache_backend().to_string(),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T> {
    serde_json::from_value(args.clone()).map_err(|e| ArchiveError::InvalidArgument(e.to_string()))
}
