use async_trait::async_trait;
use clap::ArgMatches;
use color_eyre::eyre::{eyre, Result};
use libstagehand::api::Backend;
use libstagehand::crud::{trigger, TriggerForm};
use libstagehand::log::*;
use libstagehand::model::{Id, TaskExecution, TaskStatus};
use libstagehand::poll::{
    fetch_task_and_log, LogView, TaskListSnapshot, TaskListWatcher, TaskWatcher,
};
use time::OffsetDateTime;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use super::{CliContext, CommandErrors, Interactive};
use crate::render;

/// Turns a stream of task snapshots into incremental terminal output: the
/// header once, status changes, and only the new tail of the log.
#[derive(Debug, Default)]
struct FollowPrinter {
    status: Option<TaskStatus>,
    log: String,
    note: Option<String>,
}

impl FollowPrinter {
    /// Lines to print for `snapshot`, in order.
    fn lines(&mut self, task: Option<&TaskExecution>, log: &LogView) -> Vec<String> {
        let mut out = vec![];
        if let Some(task) = task {
            if self.status.as_ref() != Some(&task.status) {
                out.push(format!("* status: {}", render::status(&task.status)));
                self.status = Some(task.status.clone());
            }
        }
        match log {
            LogView::Empty => {}
            LogView::Loaded(text) => {
                self.note = None;
                match text.strip_prefix(self.log.as_str()) {
                    Some(tail) if !tail.is_empty() => out.push(tail.trim_end().to_string()),
                    Some(_) => {}
                    // The log was rewritten rather than appended to.
                    None => out.push(text.trim_end().to_string()),
                }
                self.log = text.clone();
            }
            other => {
                let note = match other.error() {
                    Some(e) => format!("! {}: {e}", other.text()),
                    None => format!("** {}", other.text()),
                };
                if self.note.as_ref() != Some(&note) {
                    out.push(note.clone());
                    self.note = Some(note);
                }
            }
        }
        out
    }
}

pub struct TasksCommand;

impl TasksCommand {
    fn id(&self, matches: &ArgMatches) -> Id {
        matches.get_one::<Id>("id").copied().unwrap_or_default()
    }

    fn print_list(&self, snapshot: &TaskListSnapshot, status: Option<&TaskStatus>) {
        let tasks = snapshot.filtered(status);
        if tasks.is_empty() {
            println!("* no task executions");
        }
        for task in tasks {
            render::task_row(task);
        }
        render::summary(&snapshot.summary());
    }

    /// Follow one task until it finishes, its fetch fails, or ctrl-c.
    async fn follow(&self, context: &CliContext<'_>, id: Id) -> Result<()> {
        let mut watcher = TaskWatcher::with_interval(
            context.backend.clone(),
            context.config.detail_poll_interval(),
        );
        let mut stream = WatchStream::new(watcher.subscribe());
        watcher.watch(id);

        let mut printer = FollowPrinter::default();
        let mut header = false;
        loop {
            tokio::select! {
                snapshot = stream.next() => {
                    let Some(snapshot) = snapshot else { break };
                    if *snapshot.task_id() != Some(id) {
                        continue;
                    }
                    if let Some(e) = snapshot.error() {
                        return Err(eyre!("Failed to fetch task #{id}: {e}"));
                    }
                    if let (false, Some(task)) = (header, snapshot.task()) {
                        render::task_detail(task);
                        header = true;
                    }
                    for line in printer.lines(snapshot.task().as_ref(), snapshot.log()) {
                        println!("{line}");
                    }
                    if !snapshot.polling() && !snapshot.loading() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    watcher.stop();
                    println!("* stopped following task #{id}");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn subcommand_list(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let playbook = matches.get_one::<Id>("playbook").copied();
        let status = matches
            .get_one::<String>("status")
            .map(|s| TaskStatus::from(s.clone()));
        let mut watcher = TaskListWatcher::with_interval(
            context.backend.clone(),
            playbook,
            context.config.list_poll_interval(),
        );

        if !matches.get_flag("watch") {
            let snapshot = watcher.refresh().await;
            if let Some(e) = snapshot.error() {
                return Err(eyre!("{e}"));
            }
            self.print_list(&snapshot, status.as_ref());
            return Ok(());
        }

        let mut stream = WatchStream::new(watcher.subscribe());
        watcher.start();
        loop {
            tokio::select! {
                snapshot = stream.next() => {
                    let Some(snapshot) = snapshot else { break };
                    if *snapshot.loading() {
                        continue;
                    }
                    if let Some(e) = snapshot.error() {
                        eprintln!("! {e} (retrying)");
                    } else if *snapshot.loaded() {
                        println!(
                            "*** task executions at {} ***",
                            render::timestamp(Some(OffsetDateTime::now_utc()))
                        );
                        self.print_list(&snapshot, status.as_ref());
                    }
                    if !snapshot.polling() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    watcher.stop();
                    break;
                }
            }
        }
        Ok(())
    }

    async fn subcommand_show(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let id = self.id(matches);
        if matches.get_flag("watch") {
            return self.follow(context, id).await;
        }
        let (task, log) = fetch_task_and_log(context.backend.as_ref(), id).await?;
        render::task_detail(&task);
        render::log(&log);
        Ok(())
    }

    async fn subcommand_run(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let mut form = TriggerForm::default();
        if let Some(target) = matches.get_one::<String>("target") {
            form.target_spec = target.clone();
        }
        form.playbook = match matches.get_one::<Id>("playbook") {
            Some(id) => Some(*id),
            None => {
                let playbooks = context.backend.playbooks().await?;
                let names = playbooks
                    .iter()
                    .map(|p| format!("#{} {}", p.id, p.name))
                    .collect::<Vec<_>>();
                let choice = self.prompt_for_selection("Playbook", &names)?;
                playbooks.get(choice).map(|p| p.id)
            }
        };

        let (task, route) = trigger(context.backend.as_ref(), &form).await?;
        println!(
            "* started task #{} [{}], see {}",
            task.id,
            render::status(&task.status),
            route
        );
        if matches.get_flag("no-watch") {
            return Ok(());
        }
        debug!("following task {}", task.id);
        self.follow(context, task.id).await
    }

    async fn subcommand_log(&self, context: &CliContext<'_>, matches: &ArgMatches) -> Result<()> {
        let (task, log) = fetch_task_and_log(context.backend.as_ref(), self.id(matches)).await?;
        println!("* task #{}: {}", task.id, render::status(&task.status));
        render::log(&log);
        Ok(())
    }
}

#[async_trait]
impl<'a> super::Command<'a> for TasksCommand {
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
            Some(("run", matches)) => self.subcommand_run(context, matches).await?,
            Some(("log", matches)) => self.subcommand_log(context, matches).await?,
            Some((name, _)) => {
                return Err(CommandErrors::InvalidSubcommand(name.to_string()).into())
            }
            None => return Err(CommandErrors::NoSubcommandProvided.into()),
        }
        Ok(())
    }
}

impl<'a> Interactive<'a> for TasksCommand {}
