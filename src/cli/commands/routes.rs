use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::dispatch::Registry;
use crate::handlers;

pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render(&handlers::registry(), output_format)?);
    Ok(())
}

fn render(registry: &Registry, output_format: OutputFormat) -> anyhow::Result<String> {
    match output_format {
        OutputFormat::Json => {
            let routes: Vec<Value> = registry
                .entries()
                .into_iter()
                .map(|(key, descriptor)| {
                    json!({
                        "resource": key.resource(),
                        "action": key.action(),
                        "handler": format!(
                            "{}.{}",
                            descriptor.resource_type(),
                            descriptor.action()
                        ),
                        "login_required": descriptor.requires_authentication(),
                    })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&json!({ "success": true, "routes": routes }))?)
        }
        OutputFormat::Text => {
            let mut out = format!("{:<28} {:<24} {}\n", "PATH", "HANDLER", "LOGIN");
            for (key, descriptor) in registry.entries() {
                let handler = format!("{}.{}", descriptor.resource_type(), descriptor.action());
                let login = if descriptor.requires_authentication() { "required" } else { "-" };
                out.push_str(&format!("{:<28} {:<24} {}\n", format!("/{}", key), handler, login));
            }
            Ok(out.trim_end().to_string())
        }
    }
}
