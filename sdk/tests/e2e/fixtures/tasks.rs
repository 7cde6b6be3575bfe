//! Test task definitions

#![allow(dead_code)]

use async_trait::async_trait;
use cairn_sdk::error::Result;
use cairn_sdk::task::context::TaskContext;
use cairn_sdk::task::definition::TaskDefinition;
use serde::{Deserialize, Serialize};

/// Uppercases a string
pub struct UppercaseTask;

#[async_trait]
impl TaskDefinition for UppercaseTask {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "uppercase"
    }

    async fn execute(&self, input: String, _ctx: &dyn TaskContext) -> Result<String> {
        Ok(input.to_uppercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recorded {
    pub total: i64,
    pub attempt: u32,
}

/// Echoes the total it was asked to record
pub struct RecordTotalTask;

#[async_trait]
impl TaskDefinition for RecordTotalTask {
    type Input = i64;
    type Output = Recorded;

    fn kind(&self) -> &str {
        "record-total"
    }

    async fn execute(&self, total: i64, ctx: &dyn TaskContext) -> Result<Recorded> {
        Ok(Recorded {
            total,
            attempt: ctx.attempt(),
        })
    }
}

/// Always returns 6
pub struct SixTask;

#[async_trait]
impl TaskDefinition for SixTask {
    type Input = ();
    type Output = i64;

    fn kind(&self) -> &str {
        "six"
    }

    async fn execute(&self, _input: (), _ctx: &dyn TaskContext) -> Result<i64> {
        Ok(6)
    }
}
