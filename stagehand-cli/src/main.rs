#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{command, value_parser, Arg, ArgAction};
use color_eyre::eyre::{eyre, Result};
use libstagehand::api::HttpBackend;
use libstagehand::config::Config;
use libstagehand::session::{AuthStore, FileTokenStore};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::commands::Command;

mod commands;
mod render;

use libstagehand::log::*;

fn id_arg(help: &'static str) -> Arg {
    Arg::new("id")
        .help(help)
        .required(true)
        .value_parser(value_parser!(u64))
}

fn yes_arg() -> Arg {
    Arg::new("yes")
        .help("Don't ask for confirmation.")
        .short('y')
        .long("yes")
        .action(ArgAction::SetTrue)
}

fn host_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(Arg::new("name").help("Host name.").short('n').long("name"))
        .arg(Arg::new("ip").help("IP address.").long("ip"))
        .arg(Arg::new("fqdn").help("Fully qualified domain name.").long("fqdn"))
        .arg(Arg::new("user").help("SSH user for Ansible.").short('u').long("user"))
        .arg(
            Arg::new("port")
                .help("SSH port for Ansible.")
                .short('p')
                .long("port")
                .value_parser(value_parser!(u16)),
        )
        .arg(Arg::new("ssh-key").help("Name of the SSH key to use.").long("ssh-key"))
        .arg(
            Arg::new("group")
                .help("Host group id. Can be repeated.")
                .short('g')
                .long("group")
                .action(ArgAction::Append)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("vars")
                .help("Host variables as a JSON object.")
                .long("vars")
                .conflicts_with("vars-file"),
        )
        .arg(
            Arg::new("vars-file")
                .help("Path to a JSON file with host variables.")
                .long("vars-file"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre()?;

    // Command configuration
    let matches = command!()
        .name("stagehand")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Turn debugging information on. Overrides -q. Can specify up to -vvvv.")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Silence all output. Overridden by -v.")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Base URL of the automation API, e.g. http://localhost:8000/api/v1.")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the config file.")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            command!("auth")
                .about("Manage the session.")
                .subcommand(
                    command!("login")
                        .about("Log in and store the tokens.")
                        .arg(
                            Arg::new("username")
                                .help("Username. Prompted for if missing.")
                                .short('u')
                                .long("username"),
                        ),
                )
                .subcommand(command!("logout").about("Log out and forget the stored tokens."))
                .subcommand(command!("whoami").about("Show the logged in user."))
                .subcommand(
                    command!("register")
                        .about("Create a new account.")
                        .arg(Arg::new("username").short('u').long("username"))
                        .arg(Arg::new("email").short('e').long("email"))
                        .arg(Arg::new("first-name").long("first-name"))
                        .arg(Arg::new("last-name").long("last-name")),
                ),
        )
        .subcommand(
            command!("groups")
                .about("Manage host groups.")
                .subcommand(command!("list").about("List host groups."))
                .subcommand(
                    command!("show")
                        .about("Show a host group.")
                        .arg(id_arg("Host group id.")),
                )
                .subcommand(
                    command!("create")
                        .about("Create a host group.")
                        .arg(
                            Arg::new("name")
                                .help("Group name. Prompted for if missing.")
                                .short('n')
                                .long("name"),
                        )
                        .arg(
                            Arg::new("description")
                                .help("Group description.")
                                .short('d')
                                .long("description"),
                        ),
                )
                .subcommand(
                    command!("edit")
                        .about("Edit a host group. Unset fields keep their value.")
                        .arg(id_arg("Host group id."))
                        .arg(Arg::new("name").short('n').long("name"))
                        .arg(Arg::new("description").short('d').long("description")),
                )
                .subcommand(
                    command!("delete")
                        .about("Delete a host group.")
                        .arg(id_arg("Host group id."))
                        .arg(yes_arg()),
                ),
        )
        .subcommand(
            command!("hosts")
                .about("Manage hosts.")
                .subcommand(
                    command!("list").about("List hosts.").arg(
                        Arg::new("group")
                            .help("Only hosts in this group.")
                            .short('g')
                            .long("group")
                            .value_parser(value_parser!(u64)),
                    ),
                )
                .subcommand(command!("show").about("Show a host.").arg(id_arg("Host id.")))
                .subcommand(host_args(command!("create").about("Create a host.")))
                .subcommand(host_args(
                    command!("edit")
                        .about("Edit a host. Unset fields keep their value.")
                        .arg(id_arg("Host id.")),
                ))
                .subcommand(
                    command!("delete")
                        .about("Delete a host.")
                        .arg(id_arg("Host id."))
                        .arg(yes_arg()),
                ),
        )
        .subcommand(
            command!("playbooks")
                .about("Manage playbooks.")
                .subcommand(command!("list").about("List playbooks."))
                .subcommand(
                    command!("show")
                        .about("Show a playbook and its content.")
                        .arg(id_arg("Playbook id.")),
                )
                .subcommand(
                    command!("create")
                        .about("Create a playbook from a YAML file.")
                        .arg(Arg::new("name").short('n').long("name"))
                        .arg(Arg::new("description").short('d').long("description"))
                        .arg(
                            Arg::new("file")
                                .help("Path to the playbook YAML.")
                                .short('f')
                                .long("file")
                                .required(true),
                        ),
                )
                .subcommand(
                    command!("edit")
                        .about("Edit a playbook. Unset fields keep their value.")
                        .arg(id_arg("Playbook id."))
                        .arg(Arg::new("name").short('n').long("name"))
                        .arg(Arg::new("description").short('d').long("description"))
                        .arg(
                            Arg::new("file")
                                .help("Path to the new playbook YAML.")
                                .short('f')
                                .long("file"),
                        ),
                )
                .subcommand(
                    command!("delete")
                        .about("Delete a playbook.")
                        .arg(id_arg("Playbook id."))
                        .arg(yes_arg()),
                ),
        )
        .subcommand(
            command!("tasks")
                .about("Run playbooks and follow task executions.")
                .subcommand(
                    command!("list")
                        .about("List task executions.")
                        .arg(
                            Arg::new("playbook")
                                .help("Only executions of this playbook.")
                                .short('p')
                                .long("playbook")
                                .value_parser(value_parser!(u64)),
                        )
                        .arg(
                            Arg::new("status")
                                .help("Only executions with this status.")
                                .short('s')
                                .long("status")
                                .value_parser([
                                    "pending",
                                    "running",
                                    "succeeded",
                                    "failed",
                                    "canceled",
                                ]),
                        )
                        .arg(
                            Arg::new("watch")
                                .help("Keep refreshing every poll interval until interrupted.")
                                .short('w')
                                .long("watch")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    command!("show")
                        .about("Show a task execution and its log.")
                        .arg(id_arg("Task execution id."))
                        .arg(
                            Arg::new("watch")
                                .help("Follow the execution until it finishes.")
                                .short('w')
                                .long("watch")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    command!("run")
                        .about("Run a playbook.")
                        .arg(
                            Arg::new("playbook")
                                .help("Playbook id. Chosen interactively if missing.")
                                .short('p')
                                .long("playbook")
                                .value_parser(value_parser!(u64)),
                        )
                        .arg(
                            Arg::new("target")
                                .help(
                                    "Target specification: `all`, a group name, \
                                     or a comma separated host list.",
                                )
                                .short('t')
                                .long("target")
                                .default_value("all"),
                        )
                        .arg(
                            Arg::new("no-watch")
                                .help("Don't follow the execution after starting it.")
                                .long("no-watch")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    command!("log")
                        .about("Print a task execution's log.")
                        .arg(id_arg("Task execution id.")),
                ),
        )
        .subcommand_required(true)
        .get_matches();

    // Set up logging
    let logging_config = tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::new(
            time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ))
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact();

    let quiet = matches.get_flag("quiet");
    let verbose = matches.get_count("verbose") as usize;
    let logging_config = if quiet && verbose == 0 {
        logging_config.with_max_level(LevelFilter::ERROR)
    } else if verbose > 0 {
        let level = match verbose {
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        logging_config.with_max_level(level)
    } else {
        logging_config.with_max_level(LevelFilter::ERROR)
    };

    let subscriber = logging_config.finish();
    subscriber.init();

    // Load configuration and wire up the session
    let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
    let mut config = Config::load(config_path).await?;
    if let Some(url) = matches.get_one::<String>("api-url") {
        config = config.with_api_url(url);
    }
    debug!("using api at {}", config.api_url());
    let tokens = Arc::new(FileTokenStore::new(config.token_path()));
    let backend = Arc::new(HttpBackend::new(config.api_url().clone(), tokens.clone()));
    let auth = Arc::new(AuthStore::new(backend.clone(), tokens.clone()));

    // Settle the stored session in the background; protected commands wait
    // for it.
    let checker = auth.clone();
    let auth_check = tokio::spawn(async move { checker.check_auth_status().await });

    // Run the commands
    if let Some((subcommand, matches)) = matches.subcommand() {
        let ctx = commands::CliContext::new(config, backend, tokens, auth, matches);
        debug!(
            "matched subcommand {} with matches: {:?}",
            &subcommand,
            &matches.ids().map(|id| id.as_str()).collect::<Vec<_>>()
        );
        match subcommand {
            "auth" => commands::auth::AuthCommand::new().run(&ctx).await?,
            "groups" => commands::inventory::GroupsCommand::new().run(&ctx).await?,
            "hosts" => commands::inventory::HostsCommand::new().run(&ctx).await?,
            "playbooks" => commands::playbooks::PlaybooksCommand::new().run(&ctx).await?,
            "tasks" => commands::tasks::TasksCommand::new().run(&ctx).await?,
            _ => return Err(eyre!("Unrecognized subcommand: {}", subcommand)),
        }
    }
    auth_check.abort();
    Ok(())
}
