use clap::Subcommand;
use uuid::Uuid;

use crate::cli::config::open_state;
use crate::cli::utils::print_fields;
use crate::cli::OutputFormat;
use crate::database::models::TeamDetails;

#[derive(Subcommand)]
pub enum TeamCommands {
    #[command(about = "Show a team with its members, folders and permission map")]
    Show {
        #[arg(help = "Team ID")]
        id: Uuid,
    },
}

pub async fn handle(cmd: TeamCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TeamCommands::Show { id } => {
            let state = open_state().await?;
            let details = state.teams().inspect(id).await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&details)?);
                }
                OutputFormat::Text => print_team(&details),
            }
            Ok(())
        }
    }
}

fn print_team(details: &TeamDetails) {
    let team = &details.team;
    print_fields(&[
        ("ID", team.id.to_string()),
        ("Name", team.name.clone()),
        ("Creator", team.creator_id.to_string()),
        ("Created", team.created_at.format("%Y-%m-%d %H:%M").to_string()),
    ]);

    println!();
    println!("{:<38} {:<30} {}", "MEMBER", "EMAIL", "CAPABILITIES");
    println!("{}", "-".repeat(90));
    for member in &details.members {
        let capabilities = details
            .permissions
            .get(&member.id)
            .map(|caps| caps.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        println!("{:<38} {:<30} {}", member.id, member.email, capabilities);
    }

    if !details.folders.is_empty() {
        println!();
        println!("{:<38} {}", "FOLDER", "NAME");
        println!("{}", "-".repeat(60));
        for folder in &details.folders {
            println!("{:<38} {}", folder.id, folder.name);
        }
    }
}
