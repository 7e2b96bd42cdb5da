//! Declarative custom skills.
//!
//! Wraps a [`CustomSkillDef`] from config and implements the [`Skill`]
//! trait. Custom skills are HTTP request templates with `{{key}}`
//! placeholder interpolation; no code is loaded or executed for them.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::config::CustomSkillDef;
use crate::error::{Result, RoostError};
use crate::utils::string::preview;

use super::{Skill, SkillContext};

/// Maximum characters of a response body returned to the model.
const MAX_RESPONSE_CHARS: usize = 10_000;

/// Interpolate `{{key}}` placeholders in a template.
fn interpolate(template: &str, args: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in args {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

/// A skill defined as an HTTP request template in config.
pub struct CustomSkill {
    def: CustomSkillDef,
    client: reqwest::Client,
}

impl CustomSkill {
    pub fn new(def: CustomSkillDef) -> Self {
        Self {
            def,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Skill for CustomSkill {
    fn id(&self) -> &str {
        &self.def.id
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn version(&self) -> &str {
        &self.def.version
    }

    fn parameters(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.def.parameters {
            properties.insert(
                param.name.clone(),
                json!({"type": "string", "description": param.description}),
            );
            if param.required {
                required.push(json!(param.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    async fn execute(&self, args: Value, _ctx: &SkillContext) -> Result<String> {
        let string_args: HashMap<String, String> = args
            .as_object()
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| {
                        let val = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), val)
                    })
                    .collect()
            })
            .unwrap_or_default();

        for param in &self.def.parameters {
            if param.required && !string_args.contains_key(&param.name) {
                return Err(RoostError::Skill(format!(
                    "{} requires a '{}' argument",
                    self.def.id, param.name
                )));
            }
        }

        let url = interpolate(&self.def.url, &string_args);
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RoostError::Skill(format!("unsupported URL scheme: {}", url)));
        }

        debug!(skill = %self.def.id, url = %url, "executing custom skill");

        let method = reqwest::Method::from_bytes(self.def.method.as_bytes())
            .map_err(|_| RoostError::Skill(format!("invalid method: {}", self.def.method)))?;

        let mut request = self.client.request(method, &url);
        for (name, value) in &self.def.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &self.def.body {
            request = request.body(interpolate(body, &string_args));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(format!(
            "HTTP {}\n{}",
            status,
            preview(&body, MAX_RESPONSE_CHARS)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomSkillParam;

    fn def() -> CustomSkillDef {
        CustomSkillDef {
            id: "weather".to_string(),
            description: "Fetch weather for a city".to_string(),
            version: "1.2.0".to_string(),
            method: "GET".to_string(),
            url: "https://example.com/weather/{{city}}".to_string(),
            body: None,
            headers: HashMap::new(),
            parameters: vec![CustomSkillParam {
                name: "city".to_string(),
                description: "City name".to_string(),
                required: true,
            }],
        }
    }

    #[test]
    fn test_interpolate() {
        let mut args = HashMap::new();
        args.insert("city".to_string(), "oslo".to_string());
        assert_eq!(
            interpolate("https://x/{{city}}/{{city}}", &args),
            "https://x/oslo/oslo"
        );
        // Unknown placeholders are left alone
        assert_eq!(interpolate("{{missing}}", &args), "{{missing}}");
    }

    #[test]
    fn test_schema_from_def() {
        let skill = CustomSkill::new(def());
        assert_eq!(skill.id(), "weather");
        assert_eq!(skill.version(), "1.2.0");
        let params = skill.parameters();
        assert!(params["properties"]["city"].is_object());
        assert_eq!(params["required"][0], "city");
    }

    #[tokio::test]
    async fn test_missing_required_arg() {
        let skill = CustomSkill::new(def());
        let ctx = SkillContext::new("a1", "cli");
        let err = skill.execute(json!({}), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("city"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_template() {
        let mut d = def();
        d.url = "ftp://example.com/{{city}}".to_string();
        let skill = CustomSkill::new(d);
        let ctx = SkillContext::new("a1", "cli");
        let err = skill
            .execute(json!({"city": "oslo"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
