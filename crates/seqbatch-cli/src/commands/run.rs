//! `seqbatch run` command implementation
//!
//! Plans batches, then submits whatever is queued.

use crate::error::Result;
use crate::{EndpointArgs, OutputArgs, PlanArgs, SubmitArgs};

pub async fn run(
    output: &OutputArgs,
    plan: &PlanArgs,
    endpoint: &EndpointArgs,
    submit: &SubmitArgs,
) -> Result<()> {
    super::plan::run(output, plan)?;
    println!();
    super::submit::run(output, endpoint, submit).await?;
    Ok(())
}
