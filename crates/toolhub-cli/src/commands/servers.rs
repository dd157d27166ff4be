use toolhub_core::{InstanceService, ParameterKind, ServerDefinition};

pub fn run(service: &InstanceService, id: Option<&str>) -> anyhow::Result<()> {
    match id {
        Some(id) => {
            let definition = service
                .definitions()
                .get(id)
                .ok_or_else(|| anyhow::anyhow!("Unknown server: {id}"))?;
            print_server_detail(service, &definition)?;
        }
        None => {
            let servers = service.available_servers();
            println!("Available servers ({}):", servers.len());
            for definition in servers {
                println!("{} - {}: {}", definition.id, definition.name, definition.description);
            }
        }
    }
    Ok(())
}

fn print_server_detail(
    service: &InstanceService,
    definition: &ServerDefinition,
) -> anyhow::Result<()> {
    println!("id: {}", definition.id);
    println!("name: {}", definition.name);
    if !definition.description.is_empty() {
        println!("description: {}", definition.description);
    }
    println!("command: {} {}", definition.command, definition.args.join(" "));
    for (key, template) in &definition.env {
        println!("env: {key}={template}");
    }

    println!("parameters:");
    for name in service.server_parameters(&definition.id)? {
        match definition.parameters.get(&name) {
            Some(spec) => {
                let mut line = format!(
                    "  {name} [{}{}]",
                    kind_label(spec.kind),
                    if spec.required { ", required" } else { "" }
                );
                if let Some(default) = &spec.default {
                    line.push_str(&format!(" (default: {default})"));
                }
                if !spec.description.is_empty() {
                    line.push_str(&format!(" - {}", spec.description));
                }
                println!("{line}");
            }
            None => println!("  {name}"),
        }
    }
    Ok(())
}

fn kind_label(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Text => "text",
        ParameterKind::Path => "path",
        ParameterKind::Flag => "flag",
        ParameterKind::Secret => "secret",
    }
}
