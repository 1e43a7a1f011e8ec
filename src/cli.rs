use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use uuid::Uuid;

use savepixie::models::goals::{Goal, GoalEvent};
use savepixie::models::profiles::ProfileUpdate;
use savepixie::services::goals::{Banner, GoalDraft};
use savepixie::services::profiles::greeting;
use savepixie::services::session::SignUpProfile;
use savepixie::services::summary::Summary;
use savepixie::services::AppServices;
use savepixie::settings::Settings;
use savepixie::shell::server::start_shell_server;
use savepixie::utils::currency::{format_signed_usd, format_usd, Cents};
use savepixie::utils::dates::{format_date, format_deadline};

#[derive(Subcommand)]
pub enum Command {
    /// Sign in, sign up and manage the stored session.
    #[command(subcommand)]
    Auth(AuthCommand),
    /// List, create and fund savings goals.
    #[command(subcommand)]
    Goals(GoalsCommand),
    /// Greeting, totals and every goal at a glance.
    Dashboard,
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Cache-first proxy in front of the web app.
    #[command(subcommand)]
    Shell(ShellCommand),
}

#[derive(Args)]
pub struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long, env = "SAVEPIXIE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
pub enum AuthCommand {
    SignIn(Credentials),
    SignUp {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Email a password reset link.
    Reset {
        #[arg(long)]
        email: String,
    },
    SignOut,
    Status,
}

#[derive(Subcommand)]
pub enum GoalsCommand {
    List,
    New {
        #[arg(long)]
        name: String,
        /// Target in dollars, e.g. 1500 or 12.50.
        #[arg(long)]
        target: Cents,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        deadline: Option<NaiveDate>,
    },
    Deposit {
        goal_id: String,
        amount: Cents,
        #[arg(long)]
        note: Option<String>,
    },
    History {
        goal_id: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ShellCommand {
    Serve {
        /// Overrides `shell.listen` from the config file.
        #[arg(long)]
        listen: Option<String>,
    },
}

pub async fn run(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Auth(command) => auth(&connect(settings).await?, command).await,
        Command::Goals(command) => goals(&connect(settings).await?, command).await,
        Command::Dashboard => dashboard(&connect(settings).await?).await,
        Command::Profile(command) => profile(&connect(settings).await?, command).await,
        Command::Shell(ShellCommand::Serve { listen }) => {
            let mut config = settings.shell.clone();
            if let Some(listen) = listen {
                config.listen = listen;
            }
            start_shell_server(&config).await
        }
    }
}

/// Wires the backend clients and restores the stored session.
async fn connect(settings: &Settings) -> Result<AppServices> {
    let services = AppServices::new(settings)?;
    services.session.restore().await;
    Ok(services)
}

async fn auth(services: &AppServices, command: AuthCommand) -> Result<()> {
    let session = &services.session;

    match command {
        AuthCommand::SignIn(credentials) => {
            let user = session
                .sign_in_with_password(&credentials.email, &credentials.password)
                .await?;
            println!("Signed in as {}.", user.email.as_deref().unwrap_or(&user.id));
        }
        AuthCommand::SignUp {
            credentials,
            display_name,
            username,
        } => {
            let profile = SignUpProfile {
                display_name,
                username,
            };
            let outcome = session
                .sign_up_with_password(&credentials.email, &credentials.password, &profile)
                .await?;

            if outcome.session.is_some() {
                println!("Account created. You're signed in.");
            } else {
                println!("Check {} to confirm your account, then sign in.", credentials.email);
            }
        }
        AuthCommand::Reset { email } => {
            session.reset_password(&email).await?;
            println!("If {} has an account, a reset link is on its way.", email);
        }
        AuthCommand::SignOut => {
            session.sign_out().await?;
            println!("Signed out.");
        }
        AuthCommand::Status => match session.user() {
            Some(user) => println!("Signed in as {} ({}).", user.email.as_deref().unwrap_or("no email"), user.id),
            None => println!("Not signed in."),
        },
    }

    Ok(())
}

async fn goals(services: &AppServices, command: GoalsCommand) -> Result<()> {
    let user = services.session.require_user()?;
    let board = &services.goals;

    match command {
        GoalsCommand::List => {
            board.load(&user.id).await?;
            print_goals(&board.goals().await);
        }
        GoalsCommand::New {
            name,
            target,
            emoji,
            color,
            deadline,
        } => {
            let draft = GoalDraft {
                name,
                target_cents: target,
                emoji,
                color,
                deadline_date: deadline,
            };
            let created = board.create_goal(&user.id, draft).await;
            print_banner(board.banner().await);
            let goal = created?;
            println!("{}", goal_card(&goal));
        }
        GoalsCommand::Deposit {
            goal_id,
            amount,
            note,
        } => {
            let goal_id = parse_goal_id(&goal_id)?;
            board.load(&user.id).await?;

            let deposited = board.record_deposit(&user.id, &goal_id, amount, note).await;
            print_banner(board.banner().await);
            let goal = deposited?;
            println!("{}", goal_card(&goal));
        }
        GoalsCommand::History { goal_id } => {
            let goal_id = parse_goal_id(&goal_id)?;
            let events = board.history(&user.id, &goal_id).await?;
            print_history(&events);
        }
    }

    Ok(())
}

async fn dashboard(services: &AppServices) -> Result<()> {
    let user = services.session.require_user()?;
    let profile = services
        .profiles
        .fetch_profile(&user.id)
        .await
        .context("Could not load your profile")?;

    println!("Hi, {}!", greeting(profile.as_ref(), user.email.as_deref()));

    if let Err(e) = services.goals.load(&user.id).await {
        println!("Could not load your goals: {}", e);
        return Ok(());
    }

    print_summary(&services.goals.summary().await);
    println!();
    print_goals(&services.goals.goals().await);
    Ok(())
}

async fn profile(services: &AppServices, command: ProfileCommand) -> Result<()> {
    let user = services.session.require_user()?;

    match command {
        ProfileCommand::Show => {
            let profile = services
                .profiles
                .fetch_profile(&user.id)
                .await?
                .ok_or_else(|| anyhow!("No profile yet for {}.", user.id))?;

            println!("Display name: {}", profile.display_name.as_deref().unwrap_or("-"));
            println!("Username:     {}", profile.username.as_deref().unwrap_or("-"));
            println!("Avatar:       {}", profile.avatar_url.as_deref().unwrap_or("-"));
            println!("Member since: {}", format_date(profile.created_at.date_naive()));
        }
        ProfileCommand::Update {
            display_name,
            username,
            avatar_url,
        } => {
            if display_name.is_none() && username.is_none() && avatar_url.is_none() {
                bail!("Nothing to update. Pass --display-name, --username or --avatar-url.");
            }

            let current = services.profiles.fetch_profile(&user.id).await?;
            let update = ProfileUpdate {
                display_name: display_name.or_else(|| current.as_ref().and_then(|p| p.display_name.clone())),
                username: username.or_else(|| current.as_ref().and_then(|p| p.username.clone())),
                avatar_url: avatar_url.or_else(|| current.as_ref().and_then(|p| p.avatar_url.clone())),
            };
            let profile = services.profiles.update_profile(&user.id, &update).await?;
            println!("Profile saved for {}.", profile.display_name.as_deref().unwrap_or(&profile.id));
        }
    }

    Ok(())
}

fn parse_goal_id(input: &str) -> Result<String> {
    let id = Uuid::parse_str(input.trim()).with_context(|| format!("{} is not a goal id", input))?;
    Ok(id.to_string())
}

fn print_banner(banner: Option<Banner>) {
    match banner {
        Some(Banner::Success(message)) => println!("{}", message),
        Some(Banner::Error(message)) => eprintln!("{}", message),
        None => {}
    }
}

fn print_summary(summary: &Summary) {
    println!("Total saved:   {}", format_usd(summary.total_saved));
    println!("Total target:  {}", format_usd(summary.total_target));
    println!("Completion:    {}%", summary.completion);
    println!(
        "Next deadline: {}",
        summary.next_deadline.map(format_date).unwrap_or_else(|| "None yet".to_string())
    );
}

fn print_goals(goals: &[Goal]) {
    if goals.is_empty() {
        println!("No goals yet. Create one with `savepixie goals new`.");
        return;
    }

    for goal in goals {
        println!("{}", goal_card(goal));
    }
}

fn goal_card(goal: &Goal) -> String {
    format!(
        "{} {}  [{}]\n   {} of {} ({}%), {} to go\n   Deadline: {}  Color: {}",
        goal.emoji_or_default(),
        goal.name,
        goal.id,
        format_usd(goal.saved_cents),
        format_usd(goal.target_cents),
        goal.progress_percent(),
        format_usd(goal.remaining_cents()),
        format_deadline(goal.deadline_date),
        goal.color_or_default(),
    )
}

fn print_history(events: &[GoalEvent]) {
    if events.is_empty() {
        println!("No deposits yet.");
        return;
    }

    for event in events {
        println!(
            "{}  {:>12}  {}",
            format_date(event.created_at.date_naive()),
            format_signed_usd(event.delta_cents),
            event.note.as_deref().unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn shell_serve_takes_a_listen_override() {
        let cli = Cli::try_parse_from(["savepixie", "shell", "serve", "--listen", "127.0.0.1:9000"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Shell(ShellCommand::Serve { listen: Some(listen) }) if listen == "127.0.0.1:9000"
        ));
    }
}
