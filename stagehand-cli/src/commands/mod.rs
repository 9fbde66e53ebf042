use std::sync::Arc;

use async_trait::async_trait;
use clap::ArgMatches;
use color_eyre::eyre::{Result, WrapErr};
use dialoguer::{Confirm, FuzzySelect, Input, Password};
use libstagehand::api::HttpBackend;
use libstagehand::config::Config;
use libstagehand::session::{AuthStore, FileTokenStore};
use thiserror::Error;

pub mod auth;
pub mod inventory;
pub mod playbooks;
pub mod tasks;

#[derive(Error, Debug)]
pub enum CommandErrors {
    #[error("Prompt interaction failed.")]
    PromptInteractionFailed(
        #[from]
        #[source]
        dialoguer::Error,
    ),
    #[error("Required user input `{0}` is missing.")]
    RequiredUserInputMissing(String),
    #[error("Argument `{0}` failed validation: {1}")]
    InputValidationFailure(String, String),
    #[error("Nothing to choose from for `{0}`.")]
    NothingToSelect(String),
    #[error("Invalid subcommand `{0}`.")]
    InvalidSubcommand(String),
    #[error("No subcommand provided.")]
    NoSubcommandProvided,
}

pub struct CliContext<'a> {
    pub config: Config,
    pub backend: Arc<HttpBackend>,
    pub tokens: Arc<FileTokenStore>,
    pub auth: Arc<AuthStore>,
    pub matches: &'a ArgMatches,
}

impl<'a> CliContext<'a> {
    pub fn new(
        config: Config,
        backend: Arc<HttpBackend>,
        tokens: Arc<FileTokenStore>,
        auth: Arc<AuthStore>,
        matches: &'a ArgMatches,
    ) -> Self {
        Self {
            config,
            backend,
            tokens,
            auth,
            matches,
        }
    }
}

#[async_trait]
pub trait Command<'a> {
    fn new() -> Self
    where
        Self: Sized;

    async fn run(&self, context: &'a CliContext) -> Result<()>;
}

/// Asks the operator before anything destructive goes out, unless `--yes`
/// was passed.
pub struct PromptConfirm {
    assume_yes: bool,
}

impl PromptConfirm {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            assume_yes: matches.get_flag("yes"),
        }
    }
}

impl libstagehand::crud::Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

pub trait Interactive<'a> {
    fn prompt_for_input(&self, message: &'a str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(message)
            .interact_text()
            .map_err(CommandErrors::PromptInteractionFailed)
            .wrap_err("Prompting user input failed.")
    }

    fn prompt_for_optional_input(&self, message: &'a str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()
            .map_err(CommandErrors::PromptInteractionFailed)
            .wrap_err("Prompting user input failed.")
    }

    fn prompt_for_password(&self, message: &'a str) -> Result<String> {
        Password::new()
            .with_prompt(message)
            .interact()
            .map_err(CommandErrors::PromptInteractionFailed)
            .wrap_err("Prompting for a password failed.")
    }

    fn prompt_for_selection(&self, message: &'a str, items: &[String]) -> Result<usize> {
        if items.is_empty() {
            return Err(CommandErrors::NothingToSelect(message.to_string()).into());
        }
        FuzzySelect::new()
            .with_prompt(message)
            .items(items)
            .default(0)
            .interact()
            .map_err(CommandErrors::PromptInteractionFailed)
            .wrap_err("Prompting for a selection failed.")
    }

    /// Read an argument from the CLI args, prompting for it when missing.
    fn read_argument_or_prompt(
        &self,
        arg_matches: &'a ArgMatches,
        id: &'a str,
        message: &'a str,
    ) -> Result<String> {
        match arg_matches.get_one::<String>(id) {
            Some(arg) => Ok(arg.clone()),
            None => self.prompt_for_input(message),
        }
    }

    /// Read argument from the CLI args with a validation function.
    fn read_argument_with_validator<V>(
        &self,
        arg_matches: &'a ArgMatches,
        id: &'a str,
        validator: &mut V,
    ) -> Result<String>
    where
        V: FnMut(&String) -> Result<(), CommandErrors>,
    {
        if let Some(arg) = arg_matches.get_one::<String>(id) {
            validator(arg)?;
            Ok(arg.clone())
        } else {
            Err(CommandErrors::RequiredUserInputMissing(id.into()))?
        }
    }
}
