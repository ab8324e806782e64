//! Protocol compilation: splicing parameter and design text into a protocol
//! template so the result runs on the robot without external files.

use std::path::Path;

use crate::error::TemplateError;

pub const JSON_PLACEHOLDER: &str = "INPUT_JSON_FILE";
pub const CSV_PLACEHOLDER: &str = "INPUT_CSV_FILE";

/// Replace `{{INPUT_JSON_FILE}}` and `{{INPUT_CSV_FILE}}` in `template`.
///
/// Both placeholders must appear at least once; spaces inside the braces
/// (`{{ INPUT_CSV_FILE }}`) are accepted.
pub fn render(template: &str, json: &str, csv: &str) -> Result<String, TemplateError> {
    let rendered = replace_placeholder(template, JSON_PLACEHOLDER, json)?;
    replace_placeholder(&rendered, CSV_PLACEHOLDER, csv)
}

/// Prepend the design table and the parameters as string literals.
pub fn embed(template: &str, csv: &str, json: &str) -> String {
    format!("csv_data = \"\"\"{csv}\"\"\"\n\njson_parameters = \"\"\"{json}\"\"\"\n\n{template}")
}

/// Read `name` from the template directory.
pub fn load_template(dir: &Path, name: &str) -> Result<String, TemplateError> {
    let path = dir.join(name);
    let text = std::fs::read_to_string(&path).map_err(|source| TemplateError::Read {
        path: path.clone(),
        source,
    })?;
    log::debug!("loaded template {} ({} bytes)", path.display(), text.len());
    Ok(text)
}

fn replace_placeholder(text: &str, name: &'static str, value: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len() + value.len());
    let mut rest = text;
    let mut found = false;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        if after[..close].trim() == name {
            out.push_str(&rest[..open]);
            out.push_str(value);
            found = true;
        } else {
            out.push_str(&rest[..open + 2 + close + 2]);
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);

    if found {
        Ok(out)
    } else {
        Err(TemplateError::MissingPlaceholder(name))
    }
}
