//! Reassembly of tool calls from streamed fragments.

use crate::llm::ToolInvocation;
use std::collections::BTreeMap;

/// Collects tool-call fragments from a streamed completion.
///
/// The first fragment of a call carries its id and function name; later
/// fragments with the same index append to the JSON arguments.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment.
    pub fn push(
        &mut self,
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        let call = self.calls.entry(index).or_default();

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            if call.name.is_empty() {
                call.name = name;
            }
        }
        if let Some(arguments) = arguments {
            call.arguments.push_str(&arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order.
    pub fn finish(self) -> Vec<ToolInvocation> {
        self.calls
            .into_iter()
            .map(|(index, call)| ToolInvocation {
                id: if call.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    call.id
                },
                name: call.name,
                arguments: if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments
                },
            })
            .collect()
    }
}
