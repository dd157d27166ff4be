use serde_json::Value;
use toolhub_core::InstanceService;

pub async fn run(
    service: &InstanceService,
    project: &str,
    tool: &str,
    args: Option<&str>,
) -> anyhow::Result<()> {
    let args = parse_args(args)?;
    let provider = service
        .tool_provider(project)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No tools available for project '{project}'"))?;

    let result = provider.call_tool(tool, args).await;
    provider.close().await;
    let result = result?;

    println!("{}", result.output);
    if result.is_error {
        anyhow::bail!("Tool '{tool}' reported an error");
    }
    Ok(())
}

/// Arguments must be a JSON object; none means `{}`.
fn parse_args(raw: Option<&str>) -> anyhow::Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("Tool arguments are not valid JSON: {e}"))?;
    if !value.is_object() {
        anyhow::bail!("Tool arguments must be a JSON object");
    }
    Ok(value)
}
