// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Graph command - visualize artifact flow between stages

use miette::Result;

use super::{assemble_target, report, GraphFormat, Target};
use crate::pipeline::ArtifactGraph;

/// Run the graph command
pub async fn run(target: Target, format: GraphFormat, _verbose: bool) -> Result<()> {
    let assembler = assemble_target(&target)?;
    let definition = assembler.definition();

    let graph = ArtifactGraph::build(definition).map_err(report)?;

    let output = match format {
        GraphFormat::Text => graph.to_text(definition),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
