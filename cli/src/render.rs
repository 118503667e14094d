//! Prints the view model as a scrolling chat transcript. Only messages that
//! are new or changed since the last render are written.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{Local, TimeZone};
use shared::{MessageView, Role, ViewModel};

#[derive(Debug, Default)]
pub struct Renderer {
    /// message id -> was it pending when last printed
    printed: HashMap<String, bool>,
    welcomed: bool,
    last_validation: Option<String>,
    last_error: Option<String>,
}

impl Renderer {
    pub fn render(&mut self, view: &ViewModel, out: &mut impl Write) -> io::Result<()> {
        if let Some(welcome) = &view.welcome {
            if !self.welcomed {
                writeln!(out, "GreenVision: {welcome}\n")?;
                self.welcomed = true;
            }
        }

        for message in &view.messages {
            let changed = self.printed.get(&message.id) != Some(&message.pending);
            if changed {
                write_message(message, out)?;
                self.printed.insert(message.id.clone(), message.pending);
            }
        }

        if view.validation_error != self.last_validation {
            if let Some(text) = &view.validation_error {
                writeln!(out, "! {text}")?;
            }
            self.last_validation.clone_from(&view.validation_error);
        }

        let error = view
            .error
            .as_ref()
            .map(|e| format!("{} [{}]", e.message, e.error_code));
        if error != self.last_error {
            if let Some(text) = &error {
                writeln!(out, "! {text}")?;
            }
            self.last_error = error;
        }

        if view.state_selector.open {
            write_selector(view, out)?;
        }

        out.flush()
    }
}

fn write_message(message: &MessageView, out: &mut impl Write) -> io::Result<()> {
    let time = Local
        .timestamp_millis_opt(i64::try_from(message.timestamp_ms).unwrap_or(i64::MAX))
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();

    match message.role {
        Role::User => {
            writeln!(out, "[{time}] You: {}", message.text)?;
            if let Some(image) = &message.image {
                writeln!(out, "        photo: {}", image.file_name)?;
            }
            if let Some(location) = &message.location_label {
                writeln!(out, "        location: {location}")?;
            }
        }
        Role::Assistant if message.pending => {
            writeln!(out, "[{time}] GreenVision: ...")?;
        }
        Role::Assistant => {
            writeln!(out, "[{time}] GreenVision: {}", message.text)?;
        }
    }
    Ok(())
}

fn write_selector(view: &ViewModel, out: &mut impl Write) -> io::Result<()> {
    let selector = &view.state_selector;
    if selector.no_matches {
        return writeln!(out, "  no states match {:?}", selector.search);
    }
    for option in &selector.options {
        let marker = if option.selected { '*' } else { ' ' };
        writeln!(out, " {marker} {}  {}", option.code, option.name)?;
    }
    Ok(())
}
