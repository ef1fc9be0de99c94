//! Tool schema conversion port.
//!
//! Separates "which tools are available" (the tool executor port) from
//! "how to serialize them for the provider's API" — the LLM-safe name
//! encoding and JSON-Schema shaping live here, independent of any one
//! provider's wire format.

use mcp_domain::NamespacedTool;

use crate::ports::llm::ToolDeclaration;

/// Port for converting the unified tool catalog into provider-shaped
/// declarations.
pub trait ToolSchemaPort: Send + Sync {
    /// Convert the aggregated catalog, sorted by LLM-safe name, into the
    /// declarations a provider's `tools` parameter expects.
    fn to_declarations(&self, tools: &[NamespacedTool]) -> Vec<ToolDeclaration>;
}

/// Default conversion: sort by LLM-safe name, encode, and pass the
/// server's `inputSchema` straight through as the declared parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultToolSchema;

impl ToolSchemaPort for DefaultToolSchema {
    fn to_declarations(&self, tools: &[NamespacedTool]) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> = tools
            .iter()
            .map(|t| ToolDeclaration {
                name: t.llm_safe_name(),
                description: t.tool.description.clone(),
                parameters: t.tool.input_schema.clone(),
            })
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_domain::ToolDescriptor;
    use serde_json::json;

    #[test]
    fn declarations_are_sorted_by_encoded_name() {
        let tools = vec![
            NamespacedTool::new(
                "z",
                ToolDescriptor {
                    name: "a".into(),
                    description: "".into(),
                    input_schema: json!({}),
                },
            ),
            NamespacedTool::new(
                "a",
                ToolDescriptor {
                    name: "z".into(),
                    description: "".into(),
                    input_schema: json!({}),
                },
            ),
        ];
        let declarations = DefaultToolSchema.to_declarations(&tools);
        assert_eq!(declarations[0].name, "a_z");
        assert_eq!(declarations[1].name, "z_a");
    }
}
