use async_trait::async_trait;
use clap::ArgMatches;
use color_eyre::eyre::{Result, WrapErr};
use libstagehand::api::Backend;
use libstagehand::crud::{CrudShell, DeleteOutcome, Playbooks};
use libstagehand::model::{Id, PlaybookForm};
use tokio::fs;

use super::{CliContext, CommandErrors, Interactive, PromptConfirm};
use crate::render;

pub struct PlaybooksCommand;

impl PlaybooksCommand {
    fn id(&self, matches: &ArgMatches) -> Id {
        matches.get_one::<Id>("id").copied().unwrap_or_default()
    }

    async fn read_content(&self, path: &str) -> Result<String> {
        fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed reading playbook file {path}"))
    }

    fn apply_text_args(&self, form: &mut PlaybookForm, matches: &ArgMatches) {
        if let Some(name) = matches.get_one::<String>("name") {
            form.name = name.clone();
        }
        if let Some(description) = matches.get_one::<String>("description") {
            form.description = description.clone();
        }
    }

    async fn subcommand_list(&self, context: &CliContext<'_>) -> Result<()> {
        let mut shell = CrudShell::<Playbooks>::new(context.backend.clone());
        let playbooks = shell.refresh().await?;
        if playbooks.is_empty() {
            println!("* no playbooks");
        }
        for playbook in playbooks {
            render::playbook_row(playbook);
        }
        Ok(())
    }

    async fn subcommand_show(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let playbook = context.backend.playbook(self.id(matches)).await?;
        render::playbook_detail(&playbook);
        Ok(())
    }

    async fn subcommand_create(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let file = self.read_argument_with_validator(matches, "file", &mut |path| {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                Ok(())
            } else {
                Err(CommandErrors::InputValidationFailure(
                    "file".into(),
                    "expected a .yml or .yaml file".into(),
                ))
            }
        })?;
        let content = self.read_content(&file).await?;

        let mut shell = CrudShell::<Playbooks>::new(context.backend.clone());
        shell.toggle_create();
        let draft = shell.draft_mut();
        self.apply_text_args(draft, matches);
        draft.content = content;
        if draft.name.is_empty() {
            draft.name = self.prompt_for_input("Playbook name")?;
        }
        let playbook = shell.submit_create().await?;
        println!("* created playbook #{} {}", playbook.id, playbook.name);
        Ok(())
    }

    async fn subcommand_edit(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let mut shell = CrudShell::<Playbooks>::new(context.backend.clone());
        let mut edit = shell.load_for_edit(self.id(matches)).await?;
        self.apply_text_args(&mut edit.form, matches);
        if let Some(path) = matches.get_one::<String>("file") {
            edit.form.content = self.read_content(path).await?;
        }
        let route = shell.submit_edit(&edit).await?;
        println!("* updated playbook #{}, see {}", edit.id(), route);
        Ok(())
    }

    async fn subcommand_delete(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let mut shell = CrudShell::<Playbooks>::new(context.backend.clone());
        let id = self.id(matches);
        match shell.delete(id, &PromptConfirm::from_matches(matches)).await? {
            DeleteOutcome::Deleted => println!("* deleted playbook #{id}"),
            DeleteOutcome::Declined => println!("* nothing deleted"),
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> super::Command<'a> for PlaybooksCommand {
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

impl<'a> Interactive<'a> for PlaybooksCommand {}
