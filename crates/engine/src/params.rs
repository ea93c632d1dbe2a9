//! Request parameter validation
//!
//! This module provides:
//! - `FindParams` / `HitsParams`: validated request shapes
//! - strict JSON typing: booleans are rejected where integers are
//!   expected, non-integer numerics are rejected, and every violation is
//!   `invalid_parameter`
//!
//! Validation errors are produced locally and returned directly, never
//! mapped onto other codes.

use manualfind_core::{ensure, FindBudget, HitsKind, Result, ToolError};
use manualfind_store::RESERVED_ROOT_ID;
use serde_json::Value;

// ============================================================================
// Strict JSON accessors
// ============================================================================

fn expect_string(value: &Value, field: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(ToolError::invalid_parameter(format!("{field} must be a string"))),
    }
}

fn expect_bool(value: &Value, field: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(ToolError::invalid_parameter(format!("{field} must be a boolean"))),
    }
}

fn expect_u64(value: &Value, field: &str) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ToolError::invalid_parameter(format!("{field} must be a non-negative integer"))),
        _ => Err(ToolError::invalid_parameter(format!("{field} must be an integer"))),
    }
}

// ============================================================================
// FindParams
// ============================================================================

/// Validated input of one `find` call
#[derive(Debug, Clone)]
pub struct FindParams {
    /// Non-empty query
    pub query: String,
    /// Manual to search (never the reserved root id)
    pub manual_id: String,
    /// One or two mandatory terms
    pub required_terms: Vec<String>,
    /// Widen matching scope (reserved; carried into the cache key)
    pub expand_scope: bool,
    /// Replay only the unscanned files of an earlier trace
    pub only_unscanned_from_trace_id: Option<String>,
    /// Materialize the diagnostic claim graph (bypasses the cache)
    pub include_claim_graph: bool,
    /// Opt out of the semantic cache
    pub use_cache: bool,
    /// Time and candidate limits
    pub budget: FindBudget,
    /// Inline top hits to attach to the compact response (1..=5)
    pub inline_hits_limit: Option<usize>,
}

impl FindParams {
    /// Construct params programmatically with defaults
    pub fn new(
        query: impl Into<String>,
        manual_id: impl Into<String>,
        required_terms: Vec<String>,
    ) -> Self {
        FindParams {
            query: query.into(),
            manual_id: manual_id.into(),
            required_terms,
            expand_scope: false,
            only_unscanned_from_trace_id: None,
            include_claim_graph: false,
            use_cache: true,
            budget: FindBudget::default(),
            inline_hits_limit: None,
        }
    }

    /// Parse and validate a JSON request object
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ToolError::invalid_parameter("params must be an object"))?;

        let query = expect_string(
            obj.get("query")
                .ok_or_else(|| ToolError::invalid_parameter("query is required"))?,
            "query",
        )?;
        let manual_id = expect_string(
            obj.get("manual_id")
                .ok_or_else(|| ToolError::invalid_parameter("manual_id is required"))?,
            "manual_id",
        )?;

        let required_raw = obj
            .get("required_terms")
            .ok_or_else(|| ToolError::invalid_parameter("required_terms is required"))?;
        let required_array = required_raw
            .as_array()
            .ok_or_else(|| ToolError::invalid_parameter("required_terms must be an array"))?;
        let mut required_terms = Vec::with_capacity(required_array.len());
        for item in required_array {
            required_terms.push(expect_string(item, "required_terms[]")?);
        }

        let mut params = FindParams::new(query, manual_id, required_terms);

        if let Some(v) = obj.get("expand_scope") {
            params.expand_scope = expect_bool(v, "expand_scope")?;
        }
        if let Some(v) = obj.get("include_claim_graph") {
            params.include_claim_graph = expect_bool(v, "include_claim_graph")?;
        }
        if let Some(v) = obj.get("use_cache") {
            params.use_cache = expect_bool(v, "use_cache")?;
        }
        if let Some(v) = obj.get("only_unscanned_from_trace_id") {
            if !v.is_null() {
                params.only_unscanned_from_trace_id =
                    Some(expect_string(v, "only_unscanned_from_trace_id")?);
            }
        }
        if let Some(v) = obj.get("budget") {
            let budget_obj = v
                .as_object()
                .ok_or_else(|| ToolError::invalid_parameter("budget must be an object"))?;
            if let Some(t) = budget_obj.get("time_ms") {
                params.budget.time_ms = expect_u64(t, "budget.time_ms")?;
            }
            if let Some(m) = budget_obj.get("max_candidates") {
                params.budget.max_candidates = expect_u64(m, "budget.max_candidates")? as usize;
            }
        }
        if let Some(v) = obj.get("inline_hits") {
            let inline_obj = v
                .as_object()
                .ok_or_else(|| ToolError::invalid_parameter("inline_hits must be an object"))?;
            if let Some(limit) = inline_obj.get("limit") {
                params.inline_hits_limit = Some(expect_u64(limit, "inline_hits.limit")? as usize);
            }
        }

        params.validate()?;
        Ok(params)
    }

    /// Check every field-level constraint
    pub fn validate(&self) -> Result<()> {
        ensure(
            !self.query.trim().is_empty(),
            ToolError::invalid_parameter("query is required"),
        )?;
        ensure(
            !self.manual_id.trim().is_empty(),
            ToolError::invalid_parameter("manual_id is required"),
        )?;
        ensure(
            self.manual_id != RESERVED_ROOT_ID,
            ToolError::invalid_parameter("manual_id must not be the reserved root id"),
        )?;
        ensure(
            !self.required_terms.is_empty() && self.required_terms.len() <= 2,
            ToolError::invalid_parameter("required_terms must hold 1 or 2 terms"),
        )?;
        for term in &self.required_terms {
            ensure(
                !term.trim().is_empty(),
                ToolError::invalid_parameter("required_terms entries must be non-empty"),
            )?;
        }
        ensure(
            self.budget.time_ms >= 1,
            ToolError::invalid_parameter("budget.time_ms must be >= 1"),
        )?;
        ensure(
            self.budget.max_candidates >= 1,
            ToolError::invalid_parameter("budget.max_candidates must be >= 1"),
        )?;
        if let Some(limit) = self.inline_hits_limit {
            ensure(
                (1..=5).contains(&limit),
                ToolError::invalid_parameter("inline_hits.limit must be within 1..=5"),
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// HitsParams
// ============================================================================

/// Validated input of one `hits` call
#[derive(Debug, Clone)]
pub struct HitsParams {
    /// Trace to page over
    pub trace_id: String,
    /// Collection to page
    pub kind: HitsKind,
    /// Offset into the collection
    pub offset: usize,
    /// Page size (>= 1)
    pub limit: usize,
}

impl HitsParams {
    /// Construct params programmatically
    pub fn new(trace_id: &str, kind: HitsKind) -> Self {
        HitsParams {
            trace_id: trace_id.to_string(),
            kind,
            offset: 0,
            limit: 50,
        }
    }

    /// Builder: set the page window
    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Parse and validate a JSON request object
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ToolError::invalid_parameter("params must be an object"))?;

        let trace_id = expect_string(
            obj.get("trace_id")
                .ok_or_else(|| ToolError::invalid_parameter("trace_id is required"))?,
            "trace_id",
        )?;
        ensure(
            !trace_id.trim().is_empty(),
            ToolError::invalid_parameter("trace_id is required"),
        )?;

        let kind = match obj.get("kind") {
            None | Some(Value::Null) => HitsKind::Candidates,
            Some(v) => {
                let name = expect_string(v, "kind")?;
                HitsKind::parse(&name)
                    .ok_or_else(|| ToolError::invalid_parameter("invalid kind"))?
            }
        };

        let mut params = HitsParams::new(&trace_id, kind);
        if let Some(v) = obj.get("offset") {
            params.offset = expect_u64(v, "offset")? as usize;
        }
        if let Some(v) = obj.get("limit") {
            let limit = expect_u64(v, "limit")? as usize;
            ensure(limit >= 1, ToolError::invalid_parameter("limit must be >= 1"))?;
            params.limit = limit;
        }
        Ok(params)
    }
}

// ============================================================================
// Tests
// ============================================================================
