use toolhub_core::{InstanceService, ToolProvider};
use toolhub_tools::Tool;

pub async fn run(
    service: &InstanceService,
    project: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let Some(provider) = service.tool_provider(project).await? else {
        println!("No tools available: no enabled instance could be started.");
        return Ok(());
    };

    let printed = match name {
        Some(name) => print_tool_detail(&provider, name),
        None => {
            print_tool_list(&provider);
            Ok(())
        }
    };
    provider.close().await;
    printed
}

fn print_tool_list(provider: &ToolProvider) {
    let names = provider.tool_names();
    println!(
        "Loaded tools ({}) from {} server(s):",
        names.len(),
        provider.transport_count()
    );
    for name in names {
        if let Some(tool) = provider.registry().get(&name) {
            println!("{} - {}", tool.label(), tool.description());
        }
    }
}

fn print_tool_detail(provider: &ToolProvider, name: &str) -> anyhow::Result<()> {
    let tool = provider
        .registry()
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown tool: {name}"))?;
    let schema = serde_json::to_string_pretty(&tool.parameters_schema())?;

    println!("name: {}", tool.name());
    println!("label: {}", tool.label());
    println!("description: {}", tool.description());
    println!("parameters:");
    println!("{schema}");

    Ok(())
}
