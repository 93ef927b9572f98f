use crate::frontend::render;
use persona_chat::core::app::App;
use persona_chat::models::character::CharacterId;
use persona_chat::router::routes::{Resolution, View};
use thiserror::Error;
use tracing::debug;

pub const HELP: &str = "\
Commands start with ':'. Anything else is sent to the selected character.
  :go <path>                    open a location (/, /login, /chat, /admin, ...)
  :login <email> <password>
  :signup <email> <password>
  :forgot <email>
  :reset <password> <confirm>   on a /reset-password?token=... location
  :logout
  :chars                        reload assigned characters
  :select <id>
  :history                      reload the current transcript
  :survey                       check whether the survey is open
  :role <user id> admin|member
  :help
  :quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Go(String),
    Login { email: String, password: String },
    Signup { email: String, password: String },
    Forgot { email: String },
    Reset { password: String, confirm: String },
    Logout,
    Characters,
    Select(CharacterId),
    History,
    Survey,
    Role { user_id: u32, is_admin: bool },
    Send(String),
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command ':{0}', try :help")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Send(line.to_string()));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            ("go", [path]) => Command::Go(path.to_string()),
            ("go", _) => return Err(CommandError::Usage(":go <path>")),
            ("login", [email, password]) => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("login", _) => return Err(CommandError::Usage(":login <email> <password>")),
            ("signup", [email, password]) => Command::Signup {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("signup", _) => return Err(CommandError::Usage(":signup <email> <password>")),
            ("forgot", [email]) => Command::Forgot {
                email: email.to_string(),
            },
            ("forgot", _) => return Err(CommandError::Usage(":forgot <email>")),
            ("reset", [password, confirm]) => Command::Reset {
                password: password.to_string(),
                confirm: confirm.to_string(),
            },
            ("reset", _) => return Err(CommandError::Usage(":reset <password> <confirm>")),
            ("logout", _) => Command::Logout,
            ("chars", _) => Command::Characters,
            ("select", [id]) => match id.parse() {
                Ok(id) => Command::Select(id),
                Err(_) => return Err(CommandError::Usage(":select <id>")),
            },
            ("select", _) => return Err(CommandError::Usage(":select <id>")),
            ("history", _) => Command::History,
            ("survey", _) => Command::Survey,
            ("role", [user_id, role]) => {
                let user_id = user_id
                    .parse()
                    .map_err(|_| CommandError::Usage(":role <user id> admin|member"))?;
                let is_admin = match *role {
                    "admin" => true,
                    "member" => false,
                    _ => return Err(CommandError::Usage(":role <user id> admin|member")),
                };
                Command::Role { user_id, is_admin }
            }
            ("role", _) => return Err(CommandError::Usage(":role <user id> admin|member")),
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

pub enum Outcome {
    Continue,
    Quit,
}

/// Run one command and print what changed
pub async fn run(app: &App, command: Command) -> Outcome {
    debug!(command = ?command, "Running command");

    let result = match command {
        Command::Quit => return Outcome::Quit,
        Command::Help => {
            println!("{}", HELP);
            return Outcome::Continue;
        }
        Command::Go(path) => {
            let resolution = app.navigate(&path).await;
            show(app, &resolution).await;
            return Outcome::Continue;
        }
        Command::Login { email, password } => app.login(&email, &password).await.map(Some),
        Command::Signup { email, password } => app.register(&email, &password).await.map(Some),
        Command::Forgot { email } => app.forgot_password(&email).await.map(|message| {
            println!("{}", message);
            None
        }),
        Command::Reset { password, confirm } => app.reset_password(&password, &confirm).await.map(|message| {
            println!("{}", message);
            None
        }),
        Command::Logout => Ok(Some(app.logout().await)),
        Command::Characters => app.refresh_characters().await.map(|_| None),
        Command::Select(id) => app.select_character(id).await.map(|_| None),
        Command::History => app.load_history().await.map(|_| None),
        Command::Survey => app.check_survey_status().await.map(|open| {
            if !open {
                println!("The survey opens once every conversation is complete.");
            }
            None
        }),
        Command::Role { user_id, is_admin } => app.set_admin_role(user_id, is_admin).await.map(|message| {
            println!("{}", message);
            None
        }),
        Command::Send(text) => app.send(&text).await.map(|_| None),
    };

    match result {
        Ok(Some(resolution)) => show(app, &resolution).await,
        Ok(None) => {
            let resolution = app.view().await;
            show(app, &resolution).await;
        }
        Err(e) => {
            println!("! {}", render::error(&e));
            if e.is_auth() {
                let resolution = app.view().await;
                show(app, &resolution).await;
            }
        }
    }

    Outcome::Continue
}

/// Print the screen for `resolution`, loading admin data the view needs
pub async fn show(app: &App, resolution: &Resolution) {
    let state = app.snapshot().await;
    print!("{}", render::screen(&state, &resolution.view, app.survey_url()));

    match &resolution.view {
        View::Admin => match app.admin_conversations().await {
            Ok(list) => print!("{}", render::conversations(&list)),
            Err(e) => println!("! {}", render::error(&e)),
        },
        View::AdminConversation { id } => match app.admin_conversation_messages(*id).await {
            Ok(messages) => print!("{}", render::transcript(&messages, "Character")),
            Err(e) => println!("! {}", render::error(&e)),
        },
        _ => {}
    }
}
