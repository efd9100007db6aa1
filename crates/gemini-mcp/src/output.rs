use serde::Serialize;

const RULE_WIDTH: usize = 50;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// `Label: value` lines and a rule, printed above a streamed answer.
pub fn print_header(fields: &[(&str, String)]) {
    for (label, value) in fields {
        println!("{label}: {value}");
    }
    println!("{}", "=".repeat(RULE_WIDTH));
}

/// Print an answer, or just finish the line if it was already streamed.
/// The answer text is never altered; a newline is added only when missing.
pub fn print_answer(text: &str, streamed: bool) {
    if !streamed {
        print!("{text}");
    }
    if !text.ends_with('\n') {
        println!();
    }
}
