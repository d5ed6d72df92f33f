use crate::bytecode::StringTemplate;
use crate::vm::{Frame, VMError, VMResult, Value};

/// Resolve every reference of `template` against `frame`
///
/// References are substituted in the order they were recorded, each one
/// replacing every occurrence of its search pattern in the text so far.
pub fn interpolate(template: &StringTemplate, frame: &Frame) -> VMResult<String> {
    let mut text = template.text().to_string();

    for reference in template.references() {
        let mut value = lookup(frame, &reference.name)?;
        for key in &reference.keys {
            let key = match key.strip_prefix('$') {
                Some(variable) => lookup(frame, variable)?.to_display_string(),
                None => key.clone(),
            };
            value = value.get(&key)?;
        }
        text = text.replace(&reference.search, &value.to_display_string());
    }

    Ok(text)
}

fn lookup(frame: &Frame, name: &str) -> VMResult<Value> {
    frame
        .get_var(name, None)
        .ok_or_else(|| VMError::UnboundVariable(name.to_string()))
}
