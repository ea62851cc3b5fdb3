// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Artifact flow graph
//!
//! Stages are nodes; an edge `a -> b` labelled with an artifact name means a
//! stage `b` action consumes something a stage `a` action produced. Every
//! edge must point forward in stage order.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::errors::{PipeforgeError, PipeforgeResult};
use crate::pipeline::{PipelineDefinition, StageId};

/// Stage-level view of how artifacts move through a pipeline
#[derive(Debug)]
pub struct ArtifactGraph {
    graph: DiGraph<String, String>,
    nodes: Vec<NodeIndex>,
}

impl ArtifactGraph {
    /// Build the graph, checking that every consumed artifact comes from an earlier stage
    pub fn build(definition: &PipelineDefinition) -> PipeforgeResult<Self> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = definition
            .stages()
            .iter()
            .map(|stage| graph.add_node(stage.name.clone()))
            .collect();

        for (stage_id, action) in definition.actions() {
            for input in &action.inputs {
                let artifact = definition
                    .artifact(input.artifact())
                    .ok_or_else(|| PipeforgeError::artifact_flow(input.artifact(), &action.name))?;

                if artifact.stage >= stage_id {
                    return Err(PipeforgeError::artifact_flow(input.artifact(), &action.name));
                }

                let (from, to) = (nodes[artifact.stage], nodes[stage_id]);
                let exists = graph
                    .edges_connecting(from, to)
                    .any(|e| e.weight() == &artifact.name);
                if !exists {
                    graph.add_edge(from, to, artifact.name.clone());
                }
            }
        }

        let built = Self { graph, nodes };
        built.topological_order_names()?;
        Ok(built)
    }

    /// Stage names in an order that respects artifact flow
    pub fn topological_order_names(&self) -> PipeforgeResult<Vec<String>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n].clone()).collect())
            .map_err(|cycle| PipeforgeError::InvalidPipeline {
                reason: format!("artifact flow forms a cycle through stage '{}'", self.graph[cycle.node_id()]),
                help: None,
            })
    }

    /// Stages whose artifacts `stage` consumes
    pub fn dependencies(&self, stage: StageId) -> Vec<String> {
        self.neighbors(stage, Direction::Incoming)
    }

    /// Stages consuming artifacts produced by `stage`
    pub fn dependents(&self, stage: StageId) -> Vec<String> {
        self.neighbors(stage, Direction::Outgoing)
    }

    fn neighbors(&self, stage: StageId, direction: Direction) -> Vec<String> {
        let Some(node) = self.nodes.get(stage) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Number of artifact hand-offs between stages
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Generate Mermaid diagram of the artifact flow
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph LR\n");

        for (idx, node) in self.nodes.iter().enumerate() {
            out.push_str(&format!("    s{}[{}]\n", idx, self.graph[*node]));
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    s{} -->|{}| s{}\n",
                edge.source().index(),
                edge.weight(),
                edge.target().index()
            ));
        }

        out
    }

    /// Generate DOT diagram of the artifact flow
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in &self.nodes {
            out.push_str(&format!("    \"{}\";\n", self.graph[*node]));
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                self.graph[edge.source()],
                self.graph[edge.target()],
                edge.weight()
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of stage order and artifact hand-offs
    pub fn to_text(&self, definition: &PipelineDefinition) -> String {
        let mut out = String::new();

        for (idx, stage) in definition.stages().iter().enumerate() {
            out.push_str(&format!("{}. {}", idx + 1, stage.name));

            let deps = self.dependencies(idx);
            if !deps.is_empty() {
                out.push_str(&format!(" [after: {}]", deps.join(", ")));
            }
            out.push('\n');

            for action in &stage.actions {
                let inputs: Vec<String> = action.inputs.iter().map(|i| i.to_string()).collect();
                out.push_str(&format!("   - {} ({})", action.name, action.kind()));
                if !inputs.is_empty() {
                    out.push_str(&format!(" <- {}", inputs.join(", ")));
                }
                if !action.outputs.is_empty() {
                    out.push_str(&format!(" -> {}", action.outputs.join(", ")));
                }
                out.push('\n');
            }
        }

        out
    }
}
