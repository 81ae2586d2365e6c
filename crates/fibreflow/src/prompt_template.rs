use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

/// Templates compiled into the crate, keyed by file name
const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    ("capabilities.md", include_str!("prompts/capabilities.md")),
    ("knowledge_base.md", include_str!("prompts/knowledge_base.md")),
];

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render one of the prompts shipped in `src/prompts`
pub fn load_builtin_prompt<T: Serialize>(name: &str, context_data: &T) -> Result<String, TeraError> {
    let template = BUILTIN_PROMPTS
        .iter()
        .find(|(file, _)| *file == name)
        .map(|(_, template)| *template)
        .ok_or_else(|| TeraError::msg(format!("Unknown prompt template: {}", name)))?;
    load_prompt(template, context_data)
}
