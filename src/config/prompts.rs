//! Prompt templates for Docent.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    pub rag: RagPrompts,
    pub chat: ChatPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the tool-calling agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
    /// Wraps the user's message; must contain `{{input}}`.
    pub human: String,
    /// Description the model sees for the document tool.
    pub tool_description: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"如果是寒暄或禮貌性提問，不使用工具與記憶，只回應對應的禮貌性回答
除了寒暄或禮貌性提問請優先透過工具回答問題
請潤飾所有透過工具取得的內容為你的語氣
不管多少字都只用繁體中文回答"#
                .to_string(),

            human: r#"{{input}}
如果是透過工具取得的內容用你的語氣進行潤飾與擴增
如果是透過工具取得的內容回答不用任何帶解釋說明與格式
如果是寒暄或禮貌性提問，不使用工具與記憶，只回應對應的禮貌性回答
只用繁體中文回答"#
                .to_string(),

            tool_description: "詢問任何疑難雜症\n詢問各式各樣問題".to_string(),
        }
    }
}

/// Prompts for answering from retrieved document chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub user: String,
    /// Returned as-is when retrieval finds nothing.
    pub no_context: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert Q&A system that is trusted around the world.
Always answer the query using the provided context information, and not prior knowledge.
Some rules to follow:
1. Never directly reference the given context in your answer.
2. Avoid statements like 'Based on the context, ...' or 'The context information ...' or anything along those lines."#
                .to_string(),

            user: r#"Context information is below.
---------------------
{{context}}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {{question}}
Answer: "#
                .to_string(),

            no_context: "The documents do not contain information about this question.".to_string(),
        }
    }
}

/// Fixed texts shown in the chat UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    /// Reply to an empty message.
    pub greeting: String,
    /// Placeholder shown until the first token arrives.
    pub thinking: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            greeting: "哈囉，請問您想問些什麼呢?".to_string(),
            thinking: "(思考中...)".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }

            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are filled in one pass, so text brought in by a variable
    /// is never itself expanded. Unknown placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            match after.find("}}").and_then(|end| Some((end, vars.get(&after[..end])?))) {
                Some((end, value)) => {
                    result.push_str(value);
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str("{{");
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Wrap a user message in the agent's human template.
    pub fn render_human(&self, input: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("input".to_string(), input.to_string());
        self.render_with_custom(&self.agent.human, &vars)
    }
}
