//! Interactive chat: slash commands edit the draft, `/send` submits it.

use std::io::Write;

use anyhow::Result;
use shared::Event;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::shell::{Settled, Shell};

pub const HELP: &str = "\
/photo PATH     attach a photo
/clear          remove the photo
/city NAME      set your city
/state XX       set your state by code or name
/states [TEXT]  browse states, narrowing by TEXT
/pick XX        choose a state from the list
/send           ask GreenVision
/dismiss        hide the last error
/help           show this list
/quit           leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Photo(String),
    ClearPhoto,
    City(String),
    State(String),
    BrowseStates(String),
    PickState(String),
    Send,
    Dismiss,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?}, try /help")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

pub fn parse(line: &str) -> Result<Option<ChatCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let required = |cmd: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingArgument(cmd))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match name {
        "/photo" => ChatCommand::Photo(required("/photo")?),
        "/clear" => ChatCommand::ClearPhoto,
        // an empty city is allowed; validation reports it on /send
        "/city" => ChatCommand::City(rest.to_string()),
        "/state" => ChatCommand::State(required("/state")?),
        "/states" => ChatCommand::BrowseStates(rest.to_string()),
        "/pick" => ChatCommand::PickState(required("/pick")?),
        "/send" => ChatCommand::Send,
        "/dismiss" => ChatCommand::Dismiss,
        "/help" => ChatCommand::Help,
        "/quit" | "/exit" => ChatCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

enum Input {
    Line(Option<String>),
    Settled(Settled),
}

/// Reads commands while earlier submissions are still waiting on the
/// webhook; replies are printed as soon as they arrive.
pub async fn run<W: Write>(shell: &mut Shell<W>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("{HELP}\n");

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            Some(settled) = shell.next_settled(), if shell.has_pending() => Input::Settled(settled),
        };

        let line = match input {
            Input::Settled(settled) => {
                shell.apply(settled).await?;
                continue;
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => line,
        };

        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            ChatCommand::Photo(path) => shell.pick_file(path).await?,
            ChatCommand::ClearPhoto => shell.dispatch(Event::ClearImage).await?,
            ChatCommand::City(city) => shell.dispatch(Event::CityChanged(city)).await?,
            ChatCommand::State(state) => shell.dispatch(Event::StateTyped(state)).await?,
            ChatCommand::BrowseStates(search) => {
                if !shell.view().state_selector.open {
                    shell.dispatch(Event::StateSelectorToggled).await?;
                }
                shell.dispatch(Event::StateSearchChanged(search)).await?;
            }
            ChatCommand::PickState(code) => shell.dispatch(Event::StateSelected(code)).await?,
            ChatCommand::Send => shell.dispatch(Event::Submit).await?,
            ChatCommand::Dismiss => shell.dispatch(Event::DismissError).await?,
            ChatCommand::Help => eprintln!("{HELP}"),
            ChatCommand::Quit => break,
        }
    }

    if shell.has_pending() {
        eprintln!("waiting for pending replies...");
        shell.settle_all().await?;
    }

    Ok(())
}
