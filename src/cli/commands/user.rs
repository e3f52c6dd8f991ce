use clap::Subcommand;

use crate::cli::config::open_state;
use crate::cli::utils::{output_success, print_fields};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user account")]
    Create {
        #[arg(long, help = "Login e-mail address")]
        email: String,

        #[arg(long, help = "Display name")]
        username: String,

        #[arg(long, help = "Initial password")]
        password: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create { email, username, password } => {
            let state = open_state().await?;
            let user = state.users().create_user(&email, &username, &password).await?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    &format!("User '{}' created", user.email),
                    Some(serde_json::to_value(&user)?),
                ),
                OutputFormat::Text => {
                    output_success(&output_format, &format!("User '{}' created", user.email), None)?;
                    print_fields(&[
                        ("ID", user.id.to_string()),
                        ("Email", user.email.clone()),
                        ("Username", user.username.clone()),
                    ]);
                    Ok(())
                }
            }
        }
    }
}
