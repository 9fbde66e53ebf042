//! Plain-text output for records.

use libstagehand::model::{Host, HostGroup, Playbook, TaskExecution, TaskStatus};
use libstagehand::poll::{LogView, StatusSummary};
use time::macros::format_description;
use time::OffsetDateTime;

pub fn timestamp(at: Option<OffsetDateTime>) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.and_then(|at| at.format(format).ok())
        .unwrap_or_else(|| "N/A".to_string())
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn status(status: &TaskStatus) -> String {
    format!("{} {}", status.symbol(), status.label())
}

pub fn group_row(group: &HostGroup) {
    println!(
        "* #{} {}: {}",
        group.id,
        group.name,
        or_dash(group.description.as_deref())
    );
}

pub fn group_detail(group: &HostGroup) {
    println!("*** host group #{}: {} ***", group.id, group.name);
    println!("* description: {}", or_dash(group.description.as_deref()));
    println!("* created by: {}", or_dash(group.created_by_username.as_deref()));
    println!("* created at: {}", timestamp(group.created_at));
    println!("* updated at: {}", timestamp(group.updated_at));
}

pub fn host_row(host: &Host) {
    let groups = match &host.group_details {
        Some(groups) if !groups.is_empty() => groups
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => "-".to_string(),
    };
    println!(
        "* #{} {}: {} ({})",
        host.id,
        host.name,
        host.address(),
        groups
    );
}

pub fn host_detail(host: &Host) {
    println!("*** host #{}: {} ***", host.id, host.name);
    println!("* ip address: {}", or_dash(host.ip_address.as_deref()));
    println!("* fqdn: {}", or_dash(host.fqdn.as_deref()));
    println!("* ansible user: {}", or_dash(host.ansible_user.as_deref()));
    println!(
        "* ansible port: {}",
        host.ansible_port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("* ssh key: {}", or_dash(host.ssh_key_name.as_deref()));
    match &host.group_details {
        Some(groups) if !groups.is_empty() => {
            println!("** groups:");
            for group in groups {
                println!("*** #{} {}", group.id, group.name);
            }
        }
        _ => println!("* groups: {:?}", host.groups),
    }
    if host.variables.is_empty() {
        println!("* variables: -");
    } else {
        let vars = serde_json::to_string_pretty(&host.variables)
            .unwrap_or_else(|_| "<unprintable>".to_string());
        println!("** variables:\n{vars}");
    }
    println!("* created by: {}", or_dash(host.created_by_username.as_deref()));
    println!("* updated at: {}", timestamp(host.updated_at));
}

pub fn playbook_row(playbook: &Playbook) {
    println!(
        "* #{} {}: {}",
        playbook.id,
        playbook.name,
        or_dash(playbook.description.as_deref())
    );
}

pub fn playbook_detail(playbook: &Playbook) {
    println!("*** playbook #{}: {} ***", playbook.id, playbook.name);
    println!("* description: {}", or_dash(playbook.description.as_deref()));
    println!("* created by: {}", or_dash(playbook.created_by_username.as_deref()));
    println!("* updated at: {}", timestamp(playbook.updated_at));
    println!("** content:\n{}", playbook.content);
}

pub fn task_row(task: &TaskExecution) {
    println!(
        "* #{} [{}] {} on '{}' by {} at {}",
        task.id,
        status(&task.status),
        task.playbook_label(),
        task.target_spec,
        or_dash(task.executed_by_username.as_deref()),
        timestamp(task.created_at)
    );
}

pub fn task_detail(task: &TaskExecution) {
    println!("*** task execution #{} ***", task.id);
    println!("* playbook: {}", task.playbook_label());
    println!("* target: {}", task.target_spec);
    println!("* status: {}", status(&task.status));
    println!("* executed by: {}", or_dash(task.executed_by_username.as_deref()));
    println!("* created at: {}", timestamp(task.created_at));
    println!("* started at: {}", timestamp(task.started_at));
    println!("* completed at: {}", timestamp(task.completed_at));
    println!("* worker job: {}", or_dash(task.celery_task_id.as_deref()));
    println!("* log directory: {}", or_dash(task.output_log_directory.as_deref()));
}

pub fn log(log: &LogView) {
    println!("** log:");
    if let Some(e) = log.error() {
        eprintln!("! {e}");
    }
    println!("{}", log.text());
}

pub fn summary(summary: &StatusSummary) {
    let counts = TaskStatus::KNOWN
        .iter()
        .map(|s| format!("{} {}", summary.count(s), s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    println!("** {} total: {}", summary.total, counts);
}
