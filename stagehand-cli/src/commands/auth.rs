use async_trait::async_trait;
use clap::ArgMatches;
use color_eyre::eyre::Result;
use libstagehand::log::*;
use libstagehand::model::{Credentials, Registration};

use super::{CliContext, CommandErrors, Interactive};

pub struct AuthCommand;

impl AuthCommand {
    /// Let the startup session check finish so it can't race with what the
    /// subcommand does to the stored tokens.
    async fn settle(&self, context: &CliContext<'_>) -> Option<libstagehand::model::User> {
        context.auth.require_user().await.ok()
    }

    async fn subcommand_login(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        if let Some(user) = self.settle(context).await {
            println!("* currently logged in as {}, logging in again", user.username);
        }
        let username = self.read_argument_or_prompt(matches, "username", "Username")?;
        let password = self.prompt_for_password("Password")?;
        let user = context
            .auth
            .login(&Credentials { username, password })
            .await?;
        println!("* logged in as {} ({})", user.display_name(), user.role());
        debug!("tokens stored in {}", context.tokens.path().display());
        Ok(())
    }

    async fn subcommand_logout(&self, context: &CliContext<'_>) -> Result<()> {
        self.settle(context).await;
        context.auth.logout().await;
        println!("* logged out");
        Ok(())
    }

    async fn subcommand_whoami(&self, context: &CliContext<'_>) -> Result<()> {
        let user = context.auth.require_user().await?;
        println!("* {}", user.display_name());
        println!("** role: {}", user.role());
        if !user.email.is_empty() {
            println!("** email: {}", user.email);
        }
        println!("** api: {}", context.backend.base_url());
        Ok(())
    }

    async fn subcommand_register(
        &self,
        context: &CliContext<'_>,
        matches: &ArgMatches,
    ) -> Result<()> {
        let registration = Registration {
            username: self.read_argument_or_prompt(matches, "username", "Username")?,
            email: match matches.get_one::<String>("email") {
                Some(email) => email.clone(),
                None => self.prompt_for_optional_input("Email")?,
            },
            first_name: matches.get_one::<String>("first-name").cloned().unwrap_or_default(),
            last_name: matches.get_one::<String>("last-name").cloned().unwrap_or_default(),
            password: self.prompt_for_password("Password")?,
            password2: self.prompt_for_password("Confirm password")?,
        };
        let user = context.auth.register(&registration).await?;
        info!("registered user {}", user.id);
        println!("* registered {}. Log in with `stagehand auth login`.", user.username);
        Ok(())
    }
}

#[async_trait]
impl<'a> super::Command<'a> for AuthCommand {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self {}
    }

    async fn run(&self, context: &'a CliContext) -> Result<()> {
        match context.matches.subcommand() {
            Some(("login", matches)) => self.subcommand_login(context, matches).await?,
            Some(("logout", _)) => self.subcommand_logout(context).await?,
            Some(("whoami", _)) => self.subcommand_whoami(context).await?,
            Some(("register", matches)) => self.subcommand_register(context, matches).await?,
            Some((name, _)) => {
                return Err(CommandErrors::InvalidSubcommand(name.to_string()).into())
            }
            None => return Err(CommandErrors::NoSubcommandProvided.into()),
        }
        Ok(())
    }
}

impl<'a> Interactive<'a> for AuthCommand {}
