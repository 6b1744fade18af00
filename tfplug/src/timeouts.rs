//! The conventional `timeouts` block
//!
//! Resources that wait on long-running backend operations let users override
//! how long each operation may take:
//!
//! ```hcl
//! timeouts {
//!   create = "30m"
//!   delete = "1h"
//! }
//! ```
//!
//! Values use Go's duration syntax (`"90s"`, `"1h30m"`, `"2.5m"`).

use crate::error::{Result, TfplugError};
use crate::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode};
use crate::types::{AttributePath, DynamicValue};
use std::time::Duration;

pub const TIMEOUTS_BLOCK: &str = "timeouts";

/// Which operations a resource exposes timeouts for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOperation {
    Create,
    Read,
    Update,
    Delete,
}

impl TimeoutOperation {
    fn attribute(self) -> &'static str {
        match self {
            TimeoutOperation::Create => "create",
            TimeoutOperation::Read => "read",
            TimeoutOperation::Update => "update",
            TimeoutOperation::Delete => "delete",
        }
    }
}

/// Builds the `timeouts` nested block for the given operations.
pub fn timeouts_block(operations: &[TimeoutOperation]) -> NestedBlock {
    operations
        .iter()
        .fold(
            NestedBlockBuilder::new(TIMEOUTS_BLOCK, NestingMode::Single),
            |builder, op| {
                builder.attribute(
                    AttributeBuilder::new(op.attribute(), AttributeType::String)
                        .description(&format!(
                            "Timeout for the {} operation, e.g. \"20m\".",
                            op.attribute()
                        ))
                        .optional()
                        .build(),
                )
            },
        )
        .build()
}

/// Resolved per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    /// Reads the `timeouts` block from config or state, using `defaults` for
    /// anything not set.
    pub fn from_value(value: &DynamicValue, defaults: Timeouts) -> Result<Self> {
        let mut resolved = defaults;
        for op in [
            TimeoutOperation::Create,
            TimeoutOperation::Read,
            TimeoutOperation::Update,
            TimeoutOperation::Delete,
        ] {
            let path = AttributePath::new(TIMEOUTS_BLOCK).attribute(op.attribute());
            let Ok(raw) = value.get_string(&path) else {
                continue;
            };
            let parsed = parse_duration(&raw)?;
            match op {
                TimeoutOperation::Create => resolved.create = parsed,
                TimeoutOperation::Read => resolved.read = parsed,
                TimeoutOperation::Update => resolved.update = parsed,
                TimeoutOperation::Delete => resolved.delete = parsed,
            }
        }
        Ok(resolved)
    }
}

/// Parses a Go-style duration string such as `"1h30m"` or `"2.5s"`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || TfplugError::InvalidDuration(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if num_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..num_len].parse().map_err(|_| invalid())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += number * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}
