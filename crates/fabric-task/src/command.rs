// Command templates and execution results
//
// An atomic unit drives a command string with named `{placeholder}`
// parameters. Substitution happens at execution time, not composition
// time, so a task can be built before all referenced values resolve.

use std::collections::BTreeMap;
use std::fmt;

use fabric_error::{TaskError, TaskResult};
use fabric_model::Value;

/// Outcome of one executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnValue {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ReturnValue {
    pub fn new(return_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        ReturnValue {
            return_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn ok() -> Self {
        ReturnValue::new(0, "", "")
    }

    pub fn failed(code: i32) -> Self {
        ReturnValue::new(code, "", "")
    }

    pub fn success(&self) -> bool {
        self.return_code == 0
    }
}

impl fmt::Display for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) - OUT [{}] - ERR [{}]",
            self.return_code, self.stdout, self.stderr
        )
    }
}

/// Runtime parameter bindings for a template
pub type ParamMap = BTreeMap<String, Value>;

/// Command string with named placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    template: String,
}

impl CommandTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        CommandTemplate {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute `{name}` placeholders from the binding map, erroring
    /// on any placeholder with no binding. `{{`/`}}` escape a literal
    /// brace.
    pub fn render(&self, params: &ParamMap) -> TaskResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                    let value = params.get(&name).ok_or_else(|| {
                        TaskError::MissingParameter {
                            command: self.template.clone(),
                            parameter: name.clone(),
                        }
                    })?;
                    out.push_str(&value.render());
                }
                c => out.push(c),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_bindings() {
        let tmpl = CommandTemplate::new("ip link add {name} type {kind}");
        let mut params = ParamMap::new();
        params.insert("name".into(), Value::from("br0"));
        params.insert("kind".into(), Value::from("bridge"));
        assert_eq!(
            tmpl.render(&params).unwrap(),
            "ip link add br0 type bridge"
        );
    }

    #[test]
    fn test_render_missing_parameter() {
        let tmpl = CommandTemplate::new("touch {target}");
        let err = tmpl.render(&ParamMap::new()).unwrap_err();
        assert!(matches!(err, TaskError::MissingParameter { .. }));
    }

    #[test]
    fn test_render_escaped_braces() {
        let tmpl = CommandTemplate::new("awk '{{print $1}}' {file}");
        let mut params = ParamMap::new();
        params.insert("file".into(), Value::from("/tmp/x"));
        assert_eq!(
            tmpl.render(&params).unwrap(),
            "awk '{print $1}' /tmp/x"
        );
    }

    #[test]
    fn test_return_value_success() {
        assert!(ReturnValue::ok().success());
        assert!(!ReturnValue::failed(2).success());
    }
}
