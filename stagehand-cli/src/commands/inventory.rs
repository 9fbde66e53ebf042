use async_trait::async_trait;
use clap::ArgMatches;
use color_eyre::eyre::{Result, WrapErr};
use libstagehand::api::Backend;
use libstagehand::crud::{CrudShell, DeleteOutcome, HostGroups, Hosts};
use libstagehand::log::*;
use libstagehand::model::{HostForm, HostGroupForm, Id};
use tokio::fs;

use super::{CliContext, CommandErrors, Interactive, PromptConfirm};
use crate::render;

fn id(matches: &ArgMatches) -> Id {
    matches.get_one::<Id>("id").copied().unwrap_or_default()
}

fn apply_group_args(form: &mut HostGroupForm, matches: &ArgMatches) {
    if let Some(name) = matches.get_one::<String>("name") {
        form.name = name.clone();
    }
    if let Some(description) = matches.get_one::<String>("description") {
        form.description = description.clone();
    }
}

pub struct GroupsCommand;

impl GroupsCommand {
    async fn subcommand_list(&self, context: &CliContext<'_>) -> Result<()> {
        let mut shell = CrudShell::<HostGroups>::new(context.backend.clone());
        let groups = shell.refresh().await?;
        if groups.is_empty() {
            println!("* no host groups");
        }
        for group in groups {
            render::group_row(group);
        }
        Ok(())
    }

    async fn subcommand_show(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let group = context.backend.host_group(id(matches)).await?;
        render::group_detail(&group);
        let members = context.backend.hosts(Some(group.id)).await?;
        println!("** {} hosts:", members.len());
        for host in &members {
            render::host_row(host);
        }
        Ok(())
    }

    async fn subcommand_create(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let mut shell = CrudShell::<HostGroups>::new(context.backend.clone());
        shell.toggle_create();
        let draft = shell.draft_mut();
        apply_group_args(draft, matches);
        if draft.name.is_empty() {
            draft.name = self.prompt_for_input("Group name")?;
        }
        let group = shell.submit_create().await?;
        println!("* created host group #{} {}", group.id, group.name);
        Ok(())
    }

    async fn subcommand_edit(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let mut shell = CrudShell::<HostGroups>::new(context.backend.clone());
        let mut edit = shell.load_for_edit(id(matches)).await?;
        apply_group_args(&mut edit.form, matches);
        let route = shell.submit_edit(&edit).await?;
        println!("* updated host group #{}, see {}", edit.id(), route);
        Ok(())
    }

    async fn subcommand_delete(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let mut shell = CrudShell::<HostGroups>::new(context.backend.clone());
        let id = id(matches);
        match shell.delete(id, &PromptConfirm::from_matches(matches)).await? {
            DeleteOutcome::Deleted => println!("* deleted host group #{id}"),
            DeleteOutcome::Declined => println!("* nothing deleted"),
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> super::Command<'a> for GroupsCommand {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self {}
    }

    async fn run(&self, context: &'a CliContext) -> Result<()> {
        context.auth.require_user().await?;
        match context.matches.subcommand() {
            Some(("list", _)) => self.subcommand_list(context).await?,
            Some(("show", matches)) => self.subcommand_show(context, matches).await?,
            Some(("create", matches)) => self.subcommand_create(context, matches).await?,
            Some(("edit", matches)) => self.subcommand_edit(context, matches).await?,
            Some(("delete", matches)) => self.subcommand_delete(context, matches).await?,
            Some((name, _)) => {
                return Err(CommandErrors::InvalidSubcommand(name.to_string()).into())
            }
            None => return Err(CommandErrors::NoSubcommandProvided.into()),
        }
        Ok(())
    }
}

impl<'a> Interactive<'a> for GroupsCommand {}

pub struct HostsCommand;

impl HostsCommand {
    /// Overlay whatever was passed on the command line onto `form`.
    async fn apply_host_args(&self, form: &mut HostForm, matches: &ArgMatches) -> Result<()> {
        if let Some(name) = matches.get_one::<String>("name") {
            form.name = name.clone();
        }
        if let Some(ip) = matches.get_one::<String>("ip") {
            form.ip_address = ip.clone();
        }
        if let Some(fqdn) = matches.get_one::<String>("fqdn") {
            form.fqdn = fqdn.clone();
        }
        if let Some(user) = matches.get_one::<String>("user") {
            form.ansible_user = user.clone();
        }
        if let Some(port) = matches.get_one::<u16>("port") {
            form.ansible_port = Some(*port);
        }
        if let Some(key) = matches.get_one::<String>("ssh-key") {
            form.ssh_key_name = key.clone();
        }
        if let Some(groups) = matches.get_many::<Id>("group") {
            form.groups = groups.copied().collect();
        }
        if let Some(vars) = matches.get_one::<String>("vars") {
            form.variables = vars.clone();
        } else if let Some(path) = matches.get_one::<String>("vars-file") {
            form.variables = fs::read_to_string(path)
                .await
                .wrap_err_with(|| format!("Failed reading variables file {path}"))?;
        }
        Ok(())
    }

    async fn subcommand_list(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let group = matches.get_one::<Id>("group").copied();
        let mut shell = CrudShell::<Hosts>::with_filter(context.backend.clone(), group);
        let hosts = shell.refresh().await?;
        if hosts.is_empty() {
            println!("* no hosts");
        }
        for host in hosts {
            render::host_row(host);
        }
        Ok(())
    }

    async fn subcommand_show(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let host = context.backend.host(id(matches)).await?;
        render::host_detail(&host);
        Ok(())
    }

    async fn subcommand_create(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let mut shell = CrudShell::<Hosts>::new(context.backend.clone());
        shell.toggle_create();
        let draft = shell.draft_mut();
        self.apply_host_args(draft, matches).await?;
        if draft.name.is_empty() {
            draft.name = self.prompt_for_input("Host name")?;
        }
        if draft.ip_address.is_empty() && draft.fqdn.is_empty() {
            draft.ip_address = self.prompt_for_optional_input("IP address")?;
            if draft.ip_address.is_empty() {
                draft.fqdn = self.prompt_for_optional_input("FQDN")?;
            }
        }
        let host = shell.submit_create().await?;
        println!("* created host #{} {} ({})", host.id, host.name, host.address());
        Ok(())
    }

    async fn subcommand_edit(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let mut shell = CrudShell::<Hosts>::new(context.backend.clone());
        let mut edit = shell.load_for_edit(id(matches)).await?;
        self.apply_host_args(&mut edit.form, matches).await?;
        debug!("submitting host form {:?}", edit.form);
        let route = shell.submit_edit(&edit).await?;
        println!("* updated host #{}, see {}", edit.id(), route);
        Ok(())
    }

    async fn subcommand_delete(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let mut shell = CrudShell::<Hosts>::new(context.backend.clone());
        let id = id(matches);
        match shell.delete(id, &PromptConfirm::from_matches(matches)).await? {
            DeleteOutcome::Deleted => println!("* deleted host #{id}"),
            DeleteOutcome::Declined => println!("* nothing deleted"),
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> super::Command<'a> for HostsCommand {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self {}
    }

    async fn run(&self, context: &'a CliContext) -> Result<()> {
        context.auth.require_user().await?;
        match context.matches.subcommand() {
            Some(("list", matches)) => self.subcommand_list(context, matches).await?,
            Some(("show", matches)) => self.subcommand_show(context, matches).await?,
            Some(("create", matches)) => self.subcommand_create(context, matches).await?,
            Some(("edit", matches)) => self.subcommand_edit(context, matches).await?,
            Some(("delete", matches)) => self.subcommand_delete(context, matches).await?,
            Some((name, _)) => {
                return Err(CommandErrors::InvalidSubcommand(name.to_string()).into())
            }
            None => return Err(CommandErrors::NoSubcommandProvided.into()),
        }
        Ok(())
    }
}

impl<'a> Interactive<'a> for HostsCommand {}
