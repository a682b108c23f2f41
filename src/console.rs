/// Line-oriented operator console on stdin
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::collector::Command;
use crate::models::RoomKey;

pub const HELP: &str = "Commands: start | stop | room <living room|kitchen|bedroom> | session <name> | upload | reset | status | quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "start" | "scan" => Ok(Command::Start),
        "stop" => Ok(Command::Stop),
        "room" if !rest.is_empty() => rest.parse::<RoomKey>().map(Command::SetRoom),
        "room" => Err("Which room? living room, kitchen or bedroom".to_string()),
        "session" => Ok(Command::SetSession(rest.to_string())),
        "upload" => Ok(Command::Upload),
        "reset" => Ok(Command::Reset),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        "" => Err(HELP.to_string()),
        other => Err(format!("Unknown command '{}'. {}", other, HELP)),
    }
}

/// Read commands from stdin until EOF or `quit`
///
/// EOF only ends the console; the collector keeps running until Ctrl+C,
/// so the binary can run with stdin closed.
pub async fn read_commands(commands: mpsc::Sender<Command>) {
    info!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read console input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(command) => {
                let quit = command == Command::Quit;
                if commands.send(command).await.is_err() || quit {
                    return;
                }
            }
            Err(message) => warn!("{}", message),
        }
    }

    info!("Console input closed; press Ctrl+C to exit");
}
