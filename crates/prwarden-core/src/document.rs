//! YAML rule document shape.
//!
//! ```yaml
//! rules:
//!   - automerge:
//!       description: Merge approved pull requests
//!       triggers: [pr_updated]
//!       conditions:
//!         - "number_reviewers>=2"
//!         - description: Not a draft
//!           expression: "draft=false"
//!       actions:
//!         - add_label: "ready"
//!         - merge_pull_request:
//!             parameters:
//!               merge_method: squash
//! ```
//!
//! Each rule block is decoded on its own so one malformed block does not
//! reject its neighbours.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::CompileError;

/// Body of a single rule block.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBody {
    pub description: Option<String>,
    pub triggers: Option<Vec<String>>,
    #[serde(default)]
    pub conditions: Vec<ConditionEntry>,
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConditionEntry {
    Expression(String),
    Detailed {
        expression: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl ConditionEntry {
    pub fn expression(&self) -> &str {
        match self {
            ConditionEntry::Expression(e) => e,
            ConditionEntry::Detailed { expression, .. } => expression,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ConditionEntry::Expression(_) => None,
            ConditionEntry::Detailed { description, .. } => description.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionEntry {
    /// `- merge_pull_request`
    Bare(String),
    /// `- add_label: ...`
    Configured(BTreeMap<String, Option<ActionBody>>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionBody {
    /// `add_label: "ready"` stores `{value: "ready"}`
    Text(String),
    Detailed(ActionDetails),
    /// Parameters given inline: `merge_pull_request: {merge_method: squash}`
    Inline(BTreeMap<String, serde_json::Value>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDetails {
    pub description: Option<String>,
    pub parameters: Option<ParameterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParameterEntry {
    Text(String),
    Map(BTreeMap<String, serde_json::Value>),
}

/// An action reference normalised to (key, parameters, description).
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub key: String,
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub description: Option<String>,
}

fn value_map(text: String) -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([("value".to_string(), serde_json::Value::String(text))])
}

impl ActionEntry {
    pub fn into_spec(self) -> Result<ActionSpec, String> {
        match self {
            ActionEntry::Bare(key) => Ok(ActionSpec {
                key,
                parameters: BTreeMap::new(),
                description: None,
            }),
            ActionEntry::Configured(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "an action entry must name exactly one action, found {}",
                        map.len()
                    ));
                }
                let Some((key, body)) = map.into_iter().next() else {
                    return Err("empty action entry".to_string());
                };
                let (parameters, description) = match body {
                    None => (BTreeMap::new(), None),
                    Some(ActionBody::Text(text)) => (value_map(text), None),
                    Some(ActionBody::Inline(params)) => (params, None),
                    Some(ActionBody::Detailed(details)) => {
                        let params = match details.parameters {
                            None => BTreeMap::new(),
                            Some(ParameterEntry::Text(text)) => value_map(text),
                            Some(ParameterEntry::Map(map)) => map,
                        };
                        (params, details.description)
                    }
                };
                Ok(ActionSpec {
                    key,
                    parameters,
                    description,
                })
            }
        }
    }
}

/// A rule block as it appears in the document.
#[derive(Debug)]
pub struct RuleBlock {
    /// Zero-based position in the `rules` list
    pub index: usize,
    /// Rule title, when the block has one
    pub title: Option<String>,
    pub body: Result<RuleBody, String>,
}

/// Split a document into rule blocks. Fails only when the document itself
/// is not YAML or not shaped like `{rules: [...]}`; an empty document has no
/// rules.
pub fn parse_document(source: &str) -> Result<Vec<RuleBlock>, CompileError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(source)?;
    let items = match doc {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(mut map) => match map.remove("rules") {
            None | Some(serde_yaml::Value::Null) => return Ok(Vec::new()),
            Some(serde_yaml::Value::Sequence(items)) => items,
            Some(_) => return Err(CompileError::Shape),
        },
        _ => return Err(CompileError::Shape),
    };

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| decode_block(index, item))
        .collect())
}

fn decode_block(index: usize, item: serde_yaml::Value) -> RuleBlock {
    let serde_yaml::Value::Mapping(map) = item else {
        return RuleBlock {
            index,
            title: None,
            body: Err("a rule must be a mapping of its name to its body".to_string()),
        };
    };
    if map.len() != 1 {
        return RuleBlock {
            index,
            title: None,
            body: Err(format!(
                "a rule must have exactly one name, found {} keys",
                map.len()
            )),
        };
    }
    let Some((key, value)) = map.into_iter().next() else {
        return RuleBlock {
            index,
            title: None,
            body: Err("empty rule".to_string()),
        };
    };
    let title = match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        _ => {
            return RuleBlock {
                index,
                title: None,
                body: Err("a rule name must be a string".to_string()),
            }
        }
    };
    let body = match value {
        serde_yaml::Value::Null => Ok(RuleBody::default()),
        other => serde_yaml::from_value::<RuleBody>(other).map_err(|e| e.to_string()),
    };
    RuleBlock {
        index,
        title: Some(title),
        body,
    }
}

/// 1-based number of the first line containing `needle`.
pub fn find_line(source: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    source
        .lines()
        .position(|line| line.contains(needle))
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_documents_have_no_rules() {
        assert!(parse_document("").unwrap().is_empty());
        assert!(parse_document("rules:").unwrap().is_empty());
        assert!(parse_document("other: 1").unwrap().is_empty());
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(matches!(
            parse_document("- a\n- b"),
            Err(CompileError::Shape)
        ));
        assert!(matches!(
            parse_document("rules: 3"),
            Err(CompileError::Shape)
        ));
        assert!(matches!(
            parse_document("rules: [unclosed"),
            Err(CompileError::Yaml(_))
        ));
    }

    #[test]
    fn action_forms_normalise() {
        let doc = r#"
rules:
  - r:
      actions:
        - update_pull_request_base
        - add_label: ready
        - add_label:
            description: mark
            parameters: done
        - merge_pull_request:
            parameters:
              merge_method: squash
        - merge_pull_request:
            merge_method: rebase
"#;
        let blocks = parse_document(doc).unwrap();
        let body = blocks.into_iter().next().unwrap().body.unwrap();
        let specs: Vec<ActionSpec> = body
            .actions
            .into_iter()
            .map(|a| a.into_spec().unwrap())
            .collect();

        assert_eq!(specs[0].key, "update_pull_request_base");
        assert!(specs[0].parameters.is_empty());
        assert_eq!(specs[1].parameters["value"], "ready");
        assert_eq!(specs[2].parameters["value"], "done");
        assert_eq!(specs[2].description.as_deref(), Some("mark"));
        assert_eq!(specs[3].parameters["merge_method"], "squash");
        assert_eq!(specs[4].parameters["merge_method"], "rebase");
    }

    #[test]
    fn condition_forms() {
        let doc = r#"
rules:
  - r:
      conditions:
        - "draft=false"
        - description: reviewed
          expression: number_reviewers>1
"#;
        let body = parse_document(doc)
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
            .body
            .unwrap();
        assert_eq!(body.conditions[0].expression(), "draft=false");
        assert_eq!(body.conditions[1].expression(), "number_reviewers>1");
        assert_eq!(body.conditions[1].description(), Some("reviewed"));
    }

    #[test]
    fn malformed_block_is_isolated() {
        let doc = r#"
rules:
  - broken:
      conditions: 5
  - fine:
      conditions: ["draft"]
"#;
        let blocks = parse_document(doc).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].body.is_err());
        assert!(blocks[1].body.is_ok());
    }

    #[test]
    fn find_line_is_one_based() {
        assert_eq!(find_line("a\nb: x>1\n", "x>1"), Some(2));
        assert_eq!(find_line("a", "zzz"), None);
    }
}
