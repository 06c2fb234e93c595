// src/action/template.rs

//! `${actions.<kind>.<name>.<field>}` references inside action config.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::action::kind::{ActionKind, ActionRef, is_valid_name};
use crate::errors::{ActionGraphError, Result};

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{actions\.([^}]*)\}").expect("template regex is valid"));

/// Field of another action a template reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateField {
    Version,
    Name,
    Kind,
    /// `outputs.<key>`: only known after the action has executed.
    Output(String),
}

impl TemplateField {
    /// Readable from the resolved action alone.
    pub fn is_static(&self) -> bool {
        !matches!(self, TemplateField::Output(_))
    }
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateField::Version => f.write_str("version"),
            TemplateField::Name => f.write_str("name"),
            TemplateField::Kind => f.write_str("kind"),
            TemplateField::Output(key) => write!(f, "outputs.{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateRef {
    pub action: ActionRef,
    pub field: TemplateField,
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{actions.{}.{}}}", self.action, self.field)
    }
}

fn parse_ref(inner: &str) -> Result<TemplateRef> {
    let invalid = |why: &str| {
        ActionGraphError::TemplateError(format!("invalid reference '${{actions.{inner}}}': {why}"))
    };

    let mut parts = inner.splitn(3, '.');
    let kind = parts.next().unwrap_or_default();
    let name = parts.next().ok_or_else(|| invalid("missing action name"))?;
    let field = parts.next().ok_or_else(|| invalid("missing field"))?;

    let kind: ActionKind = kind.parse().map_err(|_| invalid("unknown action kind"))?;
    if !is_valid_name(name) {
        return Err(invalid("bad action name"));
    }

    let field = match field {
        "version" => TemplateField::Version,
        "name" => TemplateField::Name,
        "kind" => TemplateField::Kind,
        other => match other.strip_prefix("outputs.") {
            Some(key) if !key.is_empty() => TemplateField::Output(key.to_string()),
            _ => return Err(invalid("expected version, name, kind or outputs.<key>")),
        },
    };

    Ok(TemplateRef {
        action: ActionRef::new(kind, name),
        field,
    })
}

/// Every action reference in `text`, in order of appearance.
pub fn scan(text: &str) -> Result<Vec<TemplateRef>> {
    TEMPLATE_RE
        .captures_iter(text)
        .map(|caps| parse_ref(&caps[1]))
        .collect()
}

/// Replace every reference in `text` with the value `lookup` returns for it.
pub fn render<F>(text: &str, mut lookup: F) -> Result<String>
where
    F: FnMut(&TemplateRef) -> Result<String>,
{
    let mut error = None;

    let rendered = TEMPLATE_RE.replace_all(text, |caps: &Captures| {
        if error.is_some() {
            return String::new();
        }
        match parse_ref(&caps[1]).and_then(|r| lookup(&r)) {
            Ok(value) => value,
            Err(err) => {
                error = Some(err);
                String::new()
            }
        }
    });

    match error {
        Some(err) => Err(err),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_static_and_output_references() {
        let refs = scan("deploy ${actions.build.api.version} to ${actions.run.db.outputs.url}")
            .unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].action.to_string(), "build.api");
        assert_eq!(refs[0].field, TemplateField::Version);
        assert!(refs[0].field.is_static());
        assert_eq!(refs[1].field, TemplateField::Output("url".into()));
        assert!(!refs[1].field.is_static());
    }

    #[test]
    fn plain_text_has_no_references() {
        assert!(scan("echo ${HOME} $PATH").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_references() {
        assert!(scan("${actions.build.api}").is_err());
        assert!(scan("${actions.compile.api.version}").is_err());
        assert!(scan("${actions.build.api.outputs.}").is_err());
        assert!(scan("${actions.build.api.colour}").is_err());
    }

    #[test]
    fn renders_with_lookup() {
        let out = render("tag=${actions.build.api.version}", |r| {
            Ok(format!("v-{}", r.action.name))
        })
        .unwrap();
        assert_eq!(out, "tag=v-api");
    }

    #[test]
    fn render_surfaces_lookup_errors() {
        let err = render("${actions.run.db.outputs.url}", |r| {
            Err(ActionGraphError::TemplateError(format!("no value for {r}")))
        })
        .unwrap_err();
        assert!(err.to_string().contains("actions.run.db.outputs.url"));
    }
}
