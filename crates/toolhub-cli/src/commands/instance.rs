//! `toolhub instance` subcommands.

use crate::cli::{params_map, InstanceAction};
use toolhub_core::{Instance, InstanceService, ParameterKind};

pub async fn run(
    service: &InstanceService,
    project: &str,
    action: InstanceAction,
) -> anyhow::Result<()> {
    match action {
        InstanceAction::Add {
            server,
            name,
            params,
        } => {
            let values = params_map(params);
            let result = service.validate_instance(&server, &values);
            let name = match name {
                Some(name) => name,
                None => service
                    .definitions()
                    .get(&server)
                    .map(|definition| definition.name.clone())
                    .unwrap_or_else(|| server.clone()),
            };
            let instance = service
                .create_instance(project, &server, &name, values)
                .await?;
            println!("Created instance {}", instance.id);
            for error in &result.errors {
                eprintln!("warning: {error}");
            }
        }
        InstanceAction::List => {
            let instances = service.list_instances(project).await?;
            if instances.is_empty() {
                println!("No instances found.");
            }
            for instance in &instances {
                println!("{}", summary_line(instance));
            }
        }
        InstanceAction::Show { id } => {
            let instance = service.get_instance(project, &id).await?;
            print_instance(service, &instance);
        }
        InstanceAction::Update { id, params } => {
            let current = service.get_instance(project, &id).await?;
            let mut values = current.parameter_values;
            for (key, value) in params {
                if value.is_empty() {
                    values.remove(&key);
                } else {
                    values.insert(key, value);
                }
            }
            let result = service.validate_instance(&current.server_id, &values);
            let instance = service.update_instance(project, &id, values).await?;
            println!("Updated instance {}", instance.id);
            for error in &result.errors {
                eprintln!("warning: {error}");
            }
        }
        InstanceAction::Rename { id, name } => {
            let instance = service.rename_instance(project, &id, &name).await?;
            println!("{}", summary_line(&instance));
        }
        InstanceAction::Enable { id } => {
            let instance = service.set_instance_enabled(project, &id, true).await?;
            println!("{}", summary_line(&instance));
        }
        InstanceAction::Disable { id } => {
            let instance = service.set_instance_enabled(project, &id, false).await?;
            println!("{}", summary_line(&instance));
        }
        InstanceAction::Remove { id } => {
            if service.delete_instance(project, &id).await? {
                println!("Removed instance {id}");
            } else {
                anyhow::bail!("Instance not found: {id}");
            }
        }
        InstanceAction::Clear => {
            let removed = service.delete_all_instances(project).await?;
            println!("Removed {removed} instance(s)");
        }
        InstanceAction::Validate { server, params } => {
            let result = service.validate_instance(&server, &params_map(params));
            if result.is_valid {
                println!("valid");
            } else {
                for error in &result.errors {
                    println!("{error}");
                }
                anyhow::bail!("{} problem(s) found", result.errors.len());
            }
        }
        InstanceAction::Test { id } => {
            let report = service.test_connection(project, &id).await?;
            println!(
                "Connected to {} ({} tools)",
                report.server_id,
                report.tool_names.len()
            );
            for name in &report.tool_names {
                println!("  {name}");
            }
        }
        InstanceAction::Stats => {
            let stats = service.instance_stats(project).await?;
            println!(
                "total: {} | enabled: {} | disabled: {}",
                stats.total, stats.enabled, stats.disabled
            );
            for (server_id, count) in &stats.by_server {
                println!("  {server_id}: {count}");
            }
        }
    }
    Ok(())
}

fn summary_line(instance: &Instance) -> String {
    format!(
        "{} | {} | {} | {}",
        instance.id,
        instance.name,
        instance.server_id,
        if instance.enabled { "enabled" } else { "disabled" }
    )
}

fn print_instance(service: &InstanceService, instance: &Instance) {
    println!("{}", summary_line(instance));
    let definition = service.definitions().get(&instance.server_id);
    for (key, value) in &instance.parameter_values {
        let secret = definition
            .as_ref()
            .and_then(|definition| definition.parameters.get(key))
            .is_some_and(|spec| spec.kind == ParameterKind::Secret);
        println!("  {key} = {}", if secret { "********" } else { value.as_str() });
    }
    let result = service.validate_instance(&instance.server_id, &instance.parameter_values);
    for error in &result.errors {
        println!("  ! {error}");
    }
}
